use serde::{Deserialize, Serialize};

use crate::math::{GeoPoint, MetricPoint};

/// Axis-aligned box in a projected (metric) CRS.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Builds the smallest box containing both corners, in any order.
    pub fn from_corners(a: MetricPoint, b: MetricPoint) -> Self {
        Aabb2 {
            min: [a.x.min(b.x), a.y.min(b.y)],
            max: [a.x.max(b.x), a.y.max(b.y)],
        }
    }

    /// Square box of `2 * half_extent` side length centred on `center`.
    pub fn around(center: MetricPoint, half_extent: f64) -> Self {
        Aabb2 {
            min: [center.x - half_extent, center.y - half_extent],
            max: [center.x + half_extent, center.y + half_extent],
        }
    }

    pub fn left(&self) -> f64 {
        self.min[0]
    }

    pub fn bottom(&self) -> f64 {
        self.min[1]
    }

    pub fn right(&self) -> f64 {
        self.max[0]
    }

    pub fn top(&self) -> f64 {
        self.max[1]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn contains(&self, p: MetricPoint) -> bool {
        p.x >= self.min[0] && p.x <= self.max[0] && p.y >= self.min[1] && p.y <= self.max[1]
    }
}

/// Geographic bounds as reported by a 2D map engine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBounds {
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        GeoBounds {
            south_west,
            north_east,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south_west.lat + self.north_east.lat) * 0.5,
            (self.south_west.lon + self.north_east.lon) * 0.5,
        )
    }
}
