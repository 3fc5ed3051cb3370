use foundation::LayerId;
use serde::{Deserialize, Serialize};

use crate::keywords::LayerKeywords;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    #[serde(rename = "WMTS")]
    Wmts,
    /// Non-tiled WMS rendered as a single image.
    #[serde(rename = "WMTS_NT")]
    WmtsNonTiled,
    #[serde(rename = "VECTOR")]
    Vector,
}

impl LayerKind {
    /// Raster layers answer queries through WMS GetFeatureInfo.
    pub fn is_raster(self) -> bool {
        matches!(self, LayerKind::Wmts | LayerKind::WmtsNonTiled)
    }
}

/// WMS endpoint backing a raster layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmsService {
    pub url: String,
    /// Comma separated WMS layer names, used for LAYERS and QUERY_LAYERS.
    pub layers: String,
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub layer_type: LayerKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub zoom_min: Option<f64>,
    #[serde(default)]
    pub zoom_max: Option<f64>,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub use_in_feature_info: bool,
    #[serde(default)]
    pub metadata_keywords: Vec<String>,
    #[serde(default)]
    pub service: Option<WmsService>,
}

impl Layer {
    pub fn new(id: impl Into<String>, layer_type: LayerKind) -> Self {
        Self {
            id: LayerId::new(id),
            layer_type,
            title: None,
            visible: true,
            opacity: 1.0,
            zoom_min: None,
            zoom_max: None,
            queryable: true,
            use_in_feature_info: true,
            metadata_keywords: Vec::new(),
            service: None,
        }
    }

    pub fn with_service(mut self, url: impl Into<String>, layers: impl Into<String>) -> Self {
        self.service = Some(WmsService {
            url: url.into(),
            layers: layers.into(),
        });
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.metadata_keywords.push(keyword.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn keywords(&self) -> LayerKeywords {
        LayerKeywords::parse(&self.metadata_keywords)
    }
}
