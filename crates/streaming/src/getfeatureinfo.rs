//! WMS 1.1.1 GetFeatureInfo request construction.

use foundation::math::{GeoPoint, PixelOffset, Viewport, ViewportSize, geo_to_metric};
use foundation::{Aabb2, GeoBounds};
use runtime::MapAdapter;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchError;

pub const WMS_VERSION: &str = "1.1.1";

/// Query parameters owned by the builder; copies already present on the
/// service URL are replaced.
const OWNED_PARAMS: [&str; 16] = [
    "SERVICE",
    "VERSION",
    "REQUEST",
    "FORMAT",
    "TRANSPARENT",
    "STYLES",
    "LAYERS",
    "QUERY_LAYERS",
    "SRS",
    "BBOX",
    "WIDTH",
    "HEIGHT",
    "X",
    "Y",
    "INFO_FORMAT",
    "FEATURE_COUNT",
];

/// Synthetic view used for engines without a flat viewport.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeWindow {
    pub half_extent_m: f64,
    pub size_px: u32,
}

impl Default for GlobeWindow {
    fn default() -> Self {
        Self {
            half_extent_m: 25.0,
            size_px: 101,
        }
    }
}

/// Metric bbox, pixel size and click pixel shared by every raster request
/// of one batch.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QueryWindow {
    pub viewport: Viewport,
    pub pixel: PixelOffset,
}

impl QueryWindow {
    pub fn from_viewport(bounds: GeoBounds, size: ViewportSize, click: GeoPoint) -> Self {
        let bbox = Aabb2::from_corners(
            geo_to_metric(bounds.south_west),
            geo_to_metric(bounds.north_east),
        );
        let viewport = Viewport::new(bbox, size);
        Self {
            viewport,
            pixel: viewport.pixel_offset(geo_to_metric(click)),
        }
    }

    pub fn around(click: GeoPoint, window: GlobeWindow) -> Self {
        let center = geo_to_metric(click);
        let viewport = Viewport::new(
            Aabb2::around(center, window.half_extent_m),
            ViewportSize::new(window.size_px, window.size_px),
        );
        Self {
            viewport,
            pixel: viewport.pixel_offset(center),
        }
    }

    /// Window of whatever engine is active.
    pub fn for_adapter(adapter: &dyn MapAdapter, click: GeoPoint, globe: GlobeWindow) -> Self {
        match adapter.viewport_bounds() {
            Some(bounds) => Self::from_viewport(bounds, adapter.viewport_size(), click),
            None => Self::around(click, globe),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GetFeatureInfo<'a> {
    pub service_url: &'a str,
    pub layers: &'a str,
    pub srs: &'a str,
    pub info_format: &'a str,
    pub feature_count: u32,
    pub window: &'a QueryWindow,
}

impl GetFeatureInfo<'_> {
    pub fn url(&self) -> Result<Url, FetchError> {
        let mut url = Url::parse(self.service_url).map_err(|source| FetchError::InvalidUrl {
            url: self.service_url.to_string(),
            source,
        })?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !OWNED_PARAMS.contains(&k.to_ascii_uppercase().as_str()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);

        let bbox = self.window.viewport.bounds;
        let size = self.window.viewport.size;
        let pixel = self.window.pixel;
        url.query_pairs_mut()
            .extend_pairs(kept)
            .append_pair("SERVICE", "WMS")
            .append_pair("VERSION", WMS_VERSION)
            .append_pair("REQUEST", "GetFeatureInfo")
            .append_pair("FORMAT", "image/png")
            .append_pair("TRANSPARENT", "true")
            .append_pair("STYLES", "")
            .append_pair("LAYERS", self.layers)
            .append_pair("QUERY_LAYERS", self.layers)
            .append_pair("SRS", self.srs)
            .append_pair(
                "BBOX",
                &format!(
                    "{:.3},{:.3},{:.3},{:.3}",
                    bbox.left(),
                    bbox.bottom(),
                    bbox.right(),
                    bbox.top()
                ),
            )
            .append_pair("WIDTH", &size.width.to_string())
            .append_pair("HEIGHT", &size.height.to_string())
            .append_pair("X", &pixel.x.to_string())
            .append_pair("Y", &pixel.y.to_string())
            .append_pair("INFO_FORMAT", self.info_format)
            .append_pair("FEATURE_COUNT", &self.feature_count.to_string());
        Ok(url)
    }
}
