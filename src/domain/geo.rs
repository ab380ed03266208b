//! Geospatial helpers: great-circle distance and coordinate normalization.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Divisor applied to fixed-point micro-degree input.
const MICRO_DEGREES: f64 = 1_000_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Interprets out-of-range input as micro-degrees.
    ///
    /// If `|lat| > 90` or `|lng| > 180`, both components are divided by
    /// 1,000,000. Values already in range are returned unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.lat.abs() > 90.0 || self.lng.abs() > 180.0 {
            Self::new(self.lat / MICRO_DEGREES, self.lng / MICRO_DEGREES)
        } else {
            self
        }
    }
}

/// Haversine great-circle distance in meters between `a` and `b`.
#[must_use]
pub fn distance_meters(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `h` a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}
