use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_MILES: f64 = 3958.8;
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
const EARTH_RADIUS_KM: f64 = 6371.0;

pub const METERS_PER_MILE: f64 = 1609.344;

/// A lat/lng pair. (0,0) is the unresolved sentinel — provider calls must
/// not be made against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// The unresolved sentinel.
    pub fn sentinel() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }

    pub fn is_sentinel(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }

    /// True when both coordinates are finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

/// Distance unit for haversine calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Meters,
    Kilometers,
}

impl DistanceUnit {
    fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => EARTH_RADIUS_MILES,
            Self::Meters => EARTH_RADIUS_METERS,
            Self::Kilometers => EARTH_RADIUS_KM,
        }
    }
}

/// Haversine distance between two points in the specified unit.
pub fn haversine(a: GeoPoint, b: GeoPoint, unit: DistanceUnit) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(b.lat - a.lat);
    let dlng = to_rad(b.lng - a.lng);

    let h = (dlat / 2.0).sin().powi(2)
        + to_rad(a.lat).cos() * to_rad(b.lat).cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().asin();
    unit.earth_radius() * c
}

/// Haversine distance in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine(a, b, DistanceUnit::Meters)
}

/// Haversine distance in miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine(a, b, DistanceUnit::Miles)
}

/// Round a coordinate to 3 decimal places (~110m). Cache keys bucket on
/// this so nearby requests share entries.
pub fn bucket_coord(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
