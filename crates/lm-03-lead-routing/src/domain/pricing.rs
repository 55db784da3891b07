//! # Pricing
//!
//! Rules are scanned by `priority DESC, id ASC`; the first active rule whose
//! optional constraints all hold sets the base price.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use shared_types::entities::{LeadRequest, Money, PricingRule};

/// How the offer price for a lead was derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub base: Money,
    /// `None` when the fallback price was used.
    pub rule_id: Option<u64>,
    pub surge_applied: bool,
    pub exclusive_applied: bool,
    pub price: Money,
}

fn normalize_postal(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn rule_matches(rule: &PricingRule, lead: &LeadRequest) -> bool {
    if !rule.active || rule.tenant_id != lead.tenant_id {
        return false;
    }
    if let Some(service) = rule.service_id {
        if !lead.service_ids.contains(&service) {
            return false;
        }
    }
    if let Some(postal) = rule.postal_code.as_deref() {
        match lead.location.postal_code.as_deref() {
            Some(lead_postal) if normalize_postal(lead_postal) == normalize_postal(postal) => {}
            _ => return false,
        }
    }
    rule.timing.map_or(true, |timing| timing == lead.timing)
}

/// Highest-priority matching rule, ties broken by lowest id.
pub fn select_rule<'a>(rules: &'a [PricingRule], lead: &LeadRequest) -> Option<&'a PricingRule> {
    rules
        .iter()
        .filter(|rule| rule_matches(rule, lead))
        .min_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)))
}

/// Price for every offer created from `lead`.
pub fn quote(rules: &[PricingRule], lead: &LeadRequest, fallback: Money) -> PriceQuote {
    let rule = select_rule(rules, lead);
    let base = rule.map_or(fallback, |r| r.base_price);
    let mut price = base;

    // The fallback carries the default multipliers: no surge, 3x exclusive
    let surge_applied = lead.timing.is_urgent();
    if surge_applied {
        price *= rule.map_or(Decimal::ONE, |r| r.surge_multiplier);
    }
    let exclusive_applied = lead.is_exclusive;
    if exclusive_applied {
        price *= rule.map_or(Decimal::from(3), |r| r.exclusive_multiplier);
    }

    PriceQuote {
        base,
        rule_id: rule.map(|r| r.id),
        surge_applied,
        exclusive_applied,
        price: price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    }
}
