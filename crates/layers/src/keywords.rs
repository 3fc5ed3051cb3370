//! Key:value protocol embedded in a layer's metadata keywords.
//!
//! - `infoBoxMapping:<expr>`: repeatable, joined with newlines in order.
//! - `featureInfoZoom:<int>`: zoom level used when jumping to a feature.
//! - `blockLegacyGetFeatureInfo`: suppresses the full-query deep link.
//!
//! Keywords owned by other subsystems (style URLs, thumbnails, ...) are ignored.

use tracing::warn;

pub const INFO_BOX_MAPPING: &str = "infoBoxMapping";
pub const FEATURE_INFO_ZOOM: &str = "featureInfoZoom";
pub const BLOCK_LEGACY_GET_FEATURE_INFO: &str = "blockLegacyGetFeatureInfo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordError {
    InvalidZoom(String),
}

impl std::fmt::Display for KeywordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeywordError::InvalidZoom(v) => write!(f, "invalid {FEATURE_INFO_ZOOM} value: {v:?}"),
        }
    }
}

impl std::error::Error for KeywordError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerKeywords {
    pub info_box_mapping: Option<String>,
    pub feature_info_zoom: Option<u32>,
    pub block_legacy_get_feature_info: bool,
}

pub fn parse_zoom(value: &str) -> Result<u32, KeywordError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| KeywordError::InvalidZoom(value.to_string()))
}

impl LayerKeywords {
    pub fn parse(keywords: &[String]) -> Self {
        let mut out = LayerKeywords::default();
        let mut mapping: Vec<&str> = Vec::new();

        for kw in keywords {
            let kw = kw.trim();
            if kw == BLOCK_LEGACY_GET_FEATURE_INFO {
                out.block_legacy_get_feature_info = true;
                continue;
            }
            let Some((key, value)) = kw.split_once(':') else {
                continue;
            };
            match key.trim() {
                INFO_BOX_MAPPING => mapping.push(value),
                FEATURE_INFO_ZOOM => match parse_zoom(value) {
                    Ok(z) => out.feature_info_zoom = Some(z),
                    Err(e) => warn!("ignoring keyword: {e}"),
                },
                _ => {}
            }
        }

        if !mapping.is_empty() {
            out.info_box_mapping = Some(mapping.join("\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{KeywordError, LayerKeywords, parse_zoom};

    fn kws(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn concatenates_repeated_mapping_entries() {
        let parsed = LayerKeywords::parse(&kws(&[
            "infoBoxMapping:header: \"Baum\"",
            "vectorStyle:https://example.org/style.json",
            "infoBoxMapping:title: p.ART",
        ]));
        assert_eq!(
            parsed.info_box_mapping.as_deref(),
            Some("header: \"Baum\"\ntitle: p.ART")
        );
        assert!(!parsed.block_legacy_get_feature_info);
    }

    #[test]
    fn reads_zoom_and_block_flag() {
        let parsed = LayerKeywords::parse(&kws(&[
            "featureInfoZoom:18",
            "blockLegacyGetFeatureInfo",
            "thumbnail:https://example.org/t.png",
        ]));
        assert_eq!(parsed.feature_info_zoom, Some(18));
        assert!(parsed.block_legacy_get_feature_info);
        assert!(parsed.info_box_mapping.is_none());
    }

    #[test]
    fn malformed_zoom_is_ignored() {
        let parsed = LayerKeywords::parse(&kws(&["featureInfoZoom:high"]));
        assert_eq!(parsed.feature_info_zoom, None);
        assert_eq!(
            parse_zoom("high"),
            Err(KeywordError::InvalidZoom("high".to_string()))
        );
    }
}
