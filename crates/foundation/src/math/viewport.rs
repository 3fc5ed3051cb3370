use serde::{Deserialize, Serialize};

use super::MetricPoint;
use crate::bounds::Aabb2;

/// Pixel size of a rendered map view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel offset from the top-left corner of a viewport.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelOffset {
    pub x: i64,
    pub y: i64,
}

/// A map view expressed in the metric CRS, independent of the engine that
/// produced it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: Aabb2,
    pub size: ViewportSize,
}

impl Viewport {
    pub fn new(bounds: Aabb2, size: ViewportSize) -> Self {
        Self { bounds, size }
    }

    /// Pixel of `p`; `y` grows downwards from the top edge.
    pub fn pixel_offset(&self, p: MetricPoint) -> PixelOffset {
        pixel_offset(p, self.bounds, self.size)
    }
}

pub fn pixel_offset(p: MetricPoint, bounds: Aabb2, size: ViewportSize) -> PixelOffset {
    let x = (p.x - bounds.left()) / bounds.width() * size.width as f64;
    let y = (bounds.top() - p.y) / bounds.height() * size.height as f64;
    PixelOffset {
        x: x.round() as i64,
        y: y.round() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::{Viewport, ViewportSize, pixel_offset};
    use crate::bounds::Aabb2;
    use crate::math::MetricPoint;

    #[test]
    fn corners_map_to_pixel_extremes() {
        let bounds = Aabb2::new([1000.0, 2000.0], [1100.0, 2050.0]);
        let size = ViewportSize::new(800, 400);

        let top_left = pixel_offset(MetricPoint::new(1000.0, 2050.0), bounds, size);
        assert_eq!((top_left.x, top_left.y), (0, 0));

        let bottom_right = pixel_offset(MetricPoint::new(1100.0, 2000.0), bounds, size);
        assert_eq!((bottom_right.x, bottom_right.y), (800, 400));
    }

    #[test]
    fn rounds_to_nearest_pixel() {
        let vp = Viewport::new(
            Aabb2::new([0.0, 0.0], [10.0, 10.0]),
            ViewportSize::new(3, 3),
        );
        // 5/10 * 3 = 1.5 -> 2 ; (10 - 2) / 10 * 3 = 2.4 -> 2
        let px = vp.pixel_offset(MetricPoint::new(5.0, 2.0));
        assert_eq!((px.x, px.y), (2, 2));
    }

    #[test]
    fn centre_of_square_window() {
        let center = MetricPoint::new(374_434.5, 5_681_675.25);
        let vp = Viewport::new(Aabb2::around(center, 25.0), ViewportSize::new(101, 101));
        let px = vp.pixel_offset(center);
        assert_eq!((px.x, px.y), (51, 51));
    }
}
