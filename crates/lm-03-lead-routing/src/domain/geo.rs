//! # Geo
//!
//! Two-phase distance filtering: a cheap bounding box rejects far-away
//! service areas, then the haversine distance decides precisely.

use shared_types::entities::GeoPoint;

/// Mean earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude box containing every point within `radius_km` of a
/// center. Never excludes a point whose haversine distance is within range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    /// Half-width in degrees around `center_lng`; `>= 180` spans the globe.
    pub lng_half_width: f64,
    pub center_lng: f64,
}

// Absorbs floating point noise at the box edge.
const EDGE_SLACK_DEG: f64 = 1e-9;

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let angular = (radius_km.max(0.0) / EARTH_RADIUS_KM).to_degrees();
        let min_lat = center.lat - angular;
        let max_lat = center.lat + angular;

        // A box touching a pole spans every longitude
        let lng_half_width = if min_lat <= -90.0 || max_lat >= 90.0 || angular >= 90.0 {
            180.0
        } else {
            let ratio = angular.to_radians().sin() / center.lat.to_radians().cos();
            if ratio >= 1.0 {
                180.0
            } else {
                ratio.asin().to_degrees()
            }
        };

        Self {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            lng_half_width,
            center_lng: center.lng,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        if point.lat < self.min_lat - EDGE_SLACK_DEG || point.lat > self.max_lat + EDGE_SLACK_DEG {
            return false;
        }
        if self.lng_half_width >= 180.0 {
            return true;
        }
        // Shortest angular separation, handles the antimeridian
        let mut dlng = (point.lng - self.center_lng).abs() % 360.0;
        if dlng > 180.0 {
            dlng = 360.0 - dlng;
        }
        dlng <= self.lng_half_width + EDGE_SLACK_DEG
    }
}

/// Distance from `point` to `center` when it lies within `radius_km`.
///
/// Runs the bounding box first and the haversine only on survivors.
/// The comparison is exact: `distance <= radius` with no tolerance.
pub fn distance_within(center: GeoPoint, radius_km: f64, point: GeoPoint) -> Option<f64> {
    if !BoundingBox::around(center, radius_km).contains(point) {
        return None;
    }
    let distance = haversine_km(center, point);
    (distance <= radius_km).then_some(distance)
}
