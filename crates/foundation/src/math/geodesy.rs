use serde::{Deserialize, Serialize};

/// GRS80 semi-major axis (meters). ETRS89 is defined on this ellipsoid.
pub const GRS80_A: f64 = 6_378_137.0;
/// GRS80 flattening.
pub const GRS80_F: f64 = 1.0 / 298.257_222_101;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `"lat, lon"` with five decimal places, as shown for a clicked position.
    pub fn format_position(&self) -> String {
        format!("{:.5}, {:.5}", self.lat, self.lon)
    }
}

/// Projected coordinate (easting, northing) in meters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub x: f64,
    pub y: f64,
}

impl MetricPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::GeoPoint;

    #[test]
    fn position_uses_five_decimals() {
        let p = GeoPoint::new(51.272570, 7.199918);
        assert_eq!(p.format_position(), "51.27257, 7.19992");
    }

    #[test]
    fn position_pads_short_values() {
        let p = GeoPoint::new(51.0, -7.5);
        assert_eq!(p.format_position(), "51.00000, -7.50000");
    }
}
