use foundation::LayerId;
use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Id carried by the position pseudo-feature of every committed batch.
pub const INFORMATION_ID: &str = "information";

pub const POSITION_HEADER: &str = "Position";
pub const INFORMATION_HEADER: &str = "Information";
pub const TOO_MANY_MESSAGE: &str =
    "Too many results at this position. Zoom in or hide layers to narrow the query.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tooltip: None,
            icon_name: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_icon(mut self, icon_name: impl Into<String>) -> Self {
        self.icon_name = Some(icon_name.into());
        self
    }
}

/// Display properties of a feature in the info box.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_color: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub generic_links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u32>,
    /// Raw service payload the properties were derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wms_props: Option<Map<String, Value>>,
    /// Mapping keys without a dedicated field.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<LayerId>,
    /// Id of the feature inside its vector source, for vector and mesh hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_id: Option<String>,
    /// Where the feature was queried; the selection marker is drawn here.
    pub position: GeoPoint,
    /// Native geometry (GeoJSON) when the source delivered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    pub properties: FeatureProperties,
}

impl Feature {
    pub fn is_information(&self) -> bool {
        self.id == INFORMATION_ID
    }

    /// Position pseudo-feature: the click coordinate with five decimals.
    pub fn position(click: GeoPoint) -> Self {
        Feature {
            id: INFORMATION_ID.to_string(),
            layer_id: None,
            vector_id: None,
            position: click,
            geometry: None,
            properties: FeatureProperties {
                header: POSITION_HEADER.to_string(),
                title: click.format_position(),
                ..FeatureProperties::default()
            },
        }
    }

    /// Replaces a crowded result: asks the user to zoom in or hide layers.
    pub fn too_many(click: GeoPoint) -> Self {
        let mut f = Feature::position(click);
        f.properties.header = INFORMATION_HEADER.to_string();
        f.properties.subtitle = Some(TOO_MANY_MESSAGE.to_string());
        f
    }
}

#[cfg(test)]
mod tests {
    use super::{Feature, INFORMATION_ID, TOO_MANY_MESSAGE};
    use foundation::math::GeoPoint;

    #[test]
    fn position_feature_formats_click() {
        let f = Feature::position(GeoPoint::new(51.272570, 7.199918));
        assert_eq!(f.id, INFORMATION_ID);
        assert!(f.is_information());
        assert_eq!(f.properties.title, "51.27257, 7.19992");
        assert!(f.layer_id.is_none());
    }

    #[test]
    fn too_many_keeps_position_title() {
        let f = Feature::too_many(GeoPoint::new(51.0, 7.0));
        assert!(f.is_information());
        assert_eq!(f.properties.title, "51.00000, 7.00000");
        assert_eq!(f.properties.subtitle.as_deref(), Some(TOO_MANY_MESSAGE));
    }

    #[test]
    fn serializes_camel_case() {
        let f = Feature::position(GeoPoint::new(51.0, 7.0));
        let json = serde_json::to_value(&f).expect("json");
        assert!(json["properties"].get("genericLinks").is_some());
        assert!(json.get("layerId").is_none());
    }
}
