//! Turns raw service payloads into info-box properties.

pub mod eval;
pub mod expr;

use scene::{FeatureProperties, Link};
use serde_json::{Map, Value};
use tracing::debug;

use crate::keywords::LayerKeywords;
use crate::layer::Layer;

pub use expr::{Expr, ExprError};

const LINK_KEYS: [&str; 3] = ["url", "tel", "email"];

#[derive(Debug, Clone, PartialEq)]
pub struct MappingExpr {
    root: Expr,
}

impl MappingExpr {
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        Ok(Self {
            root: expr::parse(src)?,
        })
    }

    /// `Ok(None)` when the mapping evaluates to a falsy value.
    pub fn evaluate(
        &self,
        payload: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, ExprError> {
        match eval::evaluate(&self.root, payload)? {
            Value::Object(map) => Ok(Some(map)),
            v if !eval::truthy(&v) => Ok(None),
            _ => Err(ExprError::NotAnObject),
        }
    }
}

/// Per-layer mapping state, built once per query batch.
#[derive(Debug, Clone)]
pub struct FeatureMapper {
    mapping: Option<Result<MappingExpr, ExprError>>,
    keywords: LayerKeywords,
    default_header: String,
}

impl FeatureMapper {
    pub fn for_layer(layer: &Layer) -> Self {
        let keywords = layer.keywords();
        let mapping = keywords.info_box_mapping.as_deref().map(MappingExpr::parse);
        Self {
            mapping,
            keywords,
            default_header: layer
                .title
                .clone()
                .unwrap_or_else(|| layer.id.as_str().to_string()),
        }
    }

    pub fn keywords(&self) -> &LayerKeywords {
        &self.keywords
    }

    /// Maps one candidate. Returns `Ok(None)` when the mapping rejects it.
    ///
    /// `legacy_url` is the full-query link of raster layers; it is attached
    /// unless the layer blocks it.
    pub fn map(
        &self,
        payload: &Map<String, Value>,
        legacy_url: Option<&str>,
    ) -> Result<Option<FeatureProperties>, ExprError> {
        let mapped = match &self.mapping {
            Some(Ok(expr)) => match expr.evaluate(payload)? {
                Some(m) => m,
                None => return Ok(None),
            },
            Some(Err(e)) => return Err(e.clone()),
            None => default_mapping(payload),
        };

        let mut props = self.properties_from(mapped);
        props.zoom = self.keywords.feature_info_zoom;
        props.wms_props = Some(payload.clone());
        if let Some(url) = legacy_url
            && !self.keywords.block_legacy_get_feature_info
        {
            props
                .generic_links
                .push(Link::new(url).with_tooltip("Full query").with_icon("info"));
        }
        Ok(Some(props))
    }

    fn properties_from(&self, mut mapped: Map<String, Value>) -> FeatureProperties {
        let mut take = |key: &str| {
            mapped
                .remove(key)
                .map(|v| eval::display(&v))
                .filter(|s| !s.is_empty())
        };

        let header = take("header").unwrap_or_else(|| self.default_header.clone());
        let header_color = take("headerColor");
        let title = take("title").unwrap_or_default();
        let subtitle = take("subtitle");
        let additional_info = take("additionalInfo");

        let mut generic_links = Vec::new();
        for key in LINK_KEYS {
            let Some(value) = take(key) else { continue };
            generic_links.push(match key {
                "tel" => Link::new(format!("tel:{value}")).with_tooltip(value).with_icon("phone"),
                "email" => Link::new(format!("mailto:{value}"))
                    .with_tooltip(value)
                    .with_icon("envelope"),
                _ => Link::new(value).with_tooltip("Homepage").with_icon("external-link"),
            });
        }

        if !mapped.is_empty() {
            debug!("mapping produced extra keys {:?}", mapped.keys().collect::<Vec<_>>());
        }

        FeatureProperties {
            header,
            header_color,
            title,
            subtitle,
            additional_info,
            generic_links,
            zoom: None,
            wms_props: None,
            extra: mapped,
        }
    }
}

/// Without a mapping the first non-empty payload value becomes the title.
fn default_mapping(payload: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(title) = payload.values().map(eval::display).find(|s| !s.is_empty()) {
        out.insert("title".to_string(), Value::String(title));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ExprError, FeatureMapper};
    use crate::layer::{Layer, LayerKind};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};

    fn payload(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    fn tree_layer() -> Layer {
        Layer::new("trees", LayerKind::WmtsNonTiled)
            .with_title("Baumkataster")
            .with_keyword("infoBoxMapping:header: \"Baum\"")
            .with_keyword("infoBoxMapping:title: p.ART\ntel: p.TEL\ncategory: p.KAT")
            .with_keyword("featureInfoZoom:18")
    }

    #[test]
    fn maps_recognised_keys_and_keeps_extras() {
        let mapper = FeatureMapper::for_layer(&tree_layer());
        let props = mapper
            .map(
                &payload(json!({ "ART": "Linde", "TEL": "0202 123", "KAT": "A" })),
                Some("https://maps.example.org/wms?REQUEST=GetFeatureInfo"),
            )
            .expect("mapped")
            .expect("feature");

        assert_eq!(props.header, "Baum");
        assert_eq!(props.title, "Linde");
        assert_eq!(props.zoom, Some(18));
        assert_eq!(props.extra.get("category"), Some(&json!("A")));
        assert_eq!(props.generic_links.len(), 2);
        assert_eq!(props.generic_links[0].url, "tel:0202 123");
        assert_eq!(props.generic_links[1].icon_name.as_deref(), Some("info"));
        assert_eq!(
            props.wms_props.as_ref().and_then(|p| p.get("ART")),
            Some(&json!("Linde"))
        );
    }

    #[test]
    fn blocked_layers_get_no_legacy_link() {
        let layer = tree_layer().with_keyword("blockLegacyGetFeatureInfo");
        let props = FeatureMapper::for_layer(&layer)
            .map(&payload(json!({ "ART": "Eiche" })), Some("https://x"))
            .expect("mapped")
            .expect("feature");
        assert!(props.generic_links.is_empty());
    }

    #[test]
    fn falsy_mapping_drops_candidate() {
        let layer = Layer::new("l", LayerKind::Vector)
            .with_keyword("infoBoxMapping:(p) => p.SHOW == 'ja' ? { title: p.NAME } : null");
        let mapper = FeatureMapper::for_layer(&layer);
        assert!(
            mapper
                .map(&payload(json!({ "SHOW": "nein", "NAME": "x" })), None)
                .expect("mapped")
                .is_none()
        );
        let shown = mapper
            .map(&payload(json!({ "SHOW": "ja", "NAME": "x" })), None)
            .expect("mapped")
            .expect("feature");
        assert_eq!(shown.header, "l");
    }

    #[test]
    fn broken_mapping_is_an_error() {
        let layer = Layer::new("l", LayerKind::Vector).with_keyword("infoBoxMapping:title: p.(");
        assert!(FeatureMapper::for_layer(&layer).map(&Map::new(), None).is_err());
    }

    #[test]
    fn deeply_nested_mapping_is_rejected() {
        let keyword = format!(
            "infoBoxMapping:title: {}p.A{}",
            "(".repeat(5_000),
            ")".repeat(5_000)
        );
        let layer = Layer::new("l", LayerKind::Vector).with_keyword(keyword);
        assert_eq!(
            FeatureMapper::for_layer(&layer).map(&payload(json!({ "A": "x" })), None),
            Err(ExprError::TooDeep)
        );
    }

    #[test]
    fn default_mapping_uses_first_value() {
        let layer = Layer::new("l", LayerKind::Wmts).with_title("Flurstücke");
        let props = FeatureMapper::for_layer(&layer)
            .map(&payload(json!({ "EMPTY": "", "FLST": "123/4" })), None)
            .expect("mapped")
            .expect("feature");
        assert_eq!(props.header, "Flurstücke");
        assert_eq!(props.title, "123/4");
    }
}
