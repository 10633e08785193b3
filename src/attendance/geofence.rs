//! Circular admission zone around the office.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in meters between two coordinates.
pub fn haversine_distance(a: GeoCoordinate, b: GeoCoordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // rounding can push h a hair above 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceDecision {
    pub within_radius: bool,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct GeofenceValidator {
    office: GeoCoordinate,
    radius_meters: f64,
}

impl GeofenceValidator {
    pub fn new(office: GeoCoordinate, radius_meters: f64) -> Self {
        Self {
            office,
            radius_meters,
        }
    }

    pub fn office(&self) -> GeoCoordinate {
        self.office
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Degenerate input never passes: it is reported as infinitely far away.
    pub fn evaluate(&self, candidate: GeoCoordinate) -> GeofenceDecision {
        if !candidate.is_valid() || !self.office.is_valid() || !self.radius_meters.is_finite() {
            return GeofenceDecision {
                within_radius: false,
                distance_meters: f64::INFINITY,
            };
        }

        let distance_meters = haversine_distance(self.office, candidate);
        GeofenceDecision {
            within_radius: distance_meters <= self.radius_meters,
            distance_meters,
        }
    }
}
