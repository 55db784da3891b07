//! # Fingerprint
//!
//! Normalized key identifying equivalent submissions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::entities::{ConsumerContact, LeadRequest, ServiceId, TenantId, Timestamp};
use std::collections::BTreeSet;
use std::fmt;

/// Hex-encoded SHA-256 of the normalized submission identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a submission.
    ///
    /// `bucket_ms` must be non-zero; zero is treated as one millisecond.
    pub fn compute(
        tenant_id: TenantId,
        contact: &ConsumerContact,
        service_ids: &BTreeSet<ServiceId>,
        created_at: Timestamp,
        bucket_ms: u64,
    ) -> Self {
        let bucket = created_at / bucket_ms.max(1);
        let services = service_ids
            .iter()
            .map(|s| s.0.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(tenant_id.0.to_be_bytes());
        hasher.update(b"|");
        hasher.update(normalized_identity(contact).as_bytes());
        hasher.update(b"|");
        hasher.update(services.as_bytes());
        hasher.update(b"|");
        hasher.update(bucket.to_be_bytes());

        Self(hex::encode(hasher.finalize()))
    }

    pub fn for_lead(lead: &LeadRequest, bucket_ms: u64) -> Self {
        Self::compute(
            lead.tenant_id,
            &lead.contact,
            &lead.service_ids,
            lead.created_at,
            bucket_ms,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs
        f.write_str(self.0.get(..12).unwrap_or(&self.0))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// `email;phone`, or the lowercased name when both are absent.
pub fn normalized_identity(contact: &ConsumerContact) -> String {
    let email = contact.email.as_deref().map(normalize_email).unwrap_or_default();
    let phone = contact.phone.as_deref().map(normalize_phone).unwrap_or_default();

    if email.is_empty() && phone.is_empty() {
        let name = contact
            .name
            .as_deref()
            .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .unwrap_or_default();
        return format!("name:{name}");
    }
    format!("{email};{phone}")
}
