use foundation::LayerId;
use foundation::math::GeoPoint;

use crate::feature::Feature;
use crate::selection::InfoText;

/// Features one layer contributed to a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerResult {
    pub layer_id: LayerId,
    pub features: Vec<Feature>,
}

impl LayerResult {
    pub fn new(layer_id: LayerId, features: Vec<Feature>) -> Self {
        Self { layer_id, features }
    }

    pub fn empty(layer_id: LayerId) -> Self {
        Self::new(layer_id, Vec::new())
    }
}

/// Sticky hints that promote one result to the front.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preferences<'a> {
    pub layer_id: Option<&'a LayerId>,
    pub vector_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Merged features; the last entry is always the position pseudo-feature.
    pub features: Vec<Feature>,
    /// The preferred vector id matched nothing and must be forgotten.
    pub clear_preferred_vector: bool,
    pub info_text: InfoText,
}

/// Merges per-layer results (in layer-stack order) into one ordered list.
///
/// Ordering contract:
/// - Empty layers are dropped; the flattened list is reversed so the topmost
///   layer's features come first.
/// - A match on the preferred vector id is moved to the front. If that id is
///   set but matches nothing it is cleared and the preferred layer id gets
///   its turn.
/// - The position pseudo-feature is appended last. When no queryable layer
///   existed it is the only entry.
pub fn reconcile(
    results: Vec<LayerResult>,
    had_queryable_layers: bool,
    prefs: Preferences<'_>,
    click: GeoPoint,
) -> Reconciled {
    if !had_queryable_layers {
        return Reconciled {
            features: vec![Feature::position(click)],
            clear_preferred_vector: false,
            info_text: InfoText::AddLayer,
        };
    }

    let mut features: Vec<Feature> = results
        .into_iter()
        .filter(|r| !r.features.is_empty())
        .flat_map(|r| r.features)
        .collect();
    features.reverse();

    let mut clear_preferred_vector = false;
    let mut promoted = false;
    if let Some(vector_id) = prefs.vector_id {
        match features
            .iter()
            .position(|f| f.vector_id.as_deref() == Some(vector_id))
        {
            Some(idx) => {
                promote(&mut features, idx);
                promoted = true;
            }
            None => clear_preferred_vector = true,
        }
    }
    if !promoted
        && let Some(layer_id) = prefs.layer_id
        && let Some(idx) = features
            .iter()
            .position(|f| f.layer_id.as_ref() == Some(layer_id))
    {
        promote(&mut features, idx);
    }

    let info_text = if features.is_empty() {
        InfoText::NothingFound
    } else {
        InfoText::None
    };
    features.push(Feature::position(click));

    Reconciled {
        features,
        clear_preferred_vector,
        info_text,
    }
}

fn promote(features: &mut Vec<Feature>, idx: usize) {
    if idx > 0 {
        let f = features.remove(idx);
        features.insert(0, f);
    }
}

#[cfg(test)]
mod tests {
    use super::{LayerResult, Preferences, reconcile};
    use crate::feature::{Feature, FeatureProperties};
    use crate::selection::InfoText;
    use foundation::LayerId;
    use foundation::math::GeoPoint;
    use pretty_assertions::assert_eq;

    fn feature(id: &str, layer: &str) -> Feature {
        Feature {
            id: id.to_string(),
            layer_id: Some(LayerId::new(layer)),
            vector_id: None,
            position: GeoPoint::new(51.0, 7.0),
            geometry: None,
            properties: FeatureProperties {
                title: id.to_string(),
                ..FeatureProperties::default()
            },
        }
    }

    fn ids(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.id.as_str()).collect()
    }

    fn click() -> GeoPoint {
        GeoPoint::new(51.272570, 7.199918)
    }

    #[test]
    fn topmost_layer_surfaces_first() {
        let out = reconcile(
            vec![
                LayerResult::new(LayerId::new("L1"), vec![feature("F1", "L1")]),
                LayerResult::new(LayerId::new("L2"), vec![feature("F2", "L2")]),
            ],
            true,
            Preferences::default(),
            click(),
        );
        assert_eq!(ids(&out.features), vec!["F2", "F1", "information"]);
        assert_eq!(out.features[2].properties.title, "51.27257, 7.19992");
        assert_eq!(out.info_text, InfoText::None);
    }

    #[test]
    fn preferred_layer_is_promoted() {
        // Stack order C, B, A reverses to A, B, C.
        let out = reconcile(
            vec![
                LayerResult::new(LayerId::new("lc"), vec![feature("C", "lc")]),
                LayerResult::new(LayerId::new("lb"), vec![feature("B", "lb")]),
                LayerResult::new(LayerId::new("la"), vec![feature("A", "la")]),
            ],
            true,
            Preferences {
                layer_id: Some(&LayerId::new("lb")),
                vector_id: None,
            },
            click(),
        );
        assert_eq!(ids(&out.features), vec!["B", "A", "C", "information"]);
    }

    #[test]
    fn preferred_vector_beats_preferred_layer() {
        let mut v = feature("V", "vec");
        v.vector_id = Some("tree-17".to_string());
        let out = reconcile(
            vec![
                LayerResult::new(LayerId::new("vec"), vec![v]),
                LayerResult::new(LayerId::new("lb"), vec![feature("B", "lb")]),
                LayerResult::new(LayerId::new("la"), vec![feature("A", "la")]),
            ],
            true,
            Preferences {
                layer_id: Some(&LayerId::new("lb")),
                vector_id: Some("tree-17"),
            },
            click(),
        );
        assert_eq!(ids(&out.features), vec!["V", "A", "B", "information"]);
        assert!(!out.clear_preferred_vector);
    }

    #[test]
    fn stale_vector_preference_is_cleared() {
        let out = reconcile(
            vec![
                LayerResult::new(LayerId::new("lb"), vec![feature("B", "lb")]),
                LayerResult::new(LayerId::new("la"), vec![feature("A", "la")]),
            ],
            true,
            Preferences {
                layer_id: Some(&LayerId::new("lb")),
                vector_id: Some("gone"),
            },
            click(),
        );
        assert!(out.clear_preferred_vector);
        assert_eq!(ids(&out.features), vec!["B", "A", "information"]);
    }

    #[test]
    fn nothing_found_yields_position_only() {
        let out = reconcile(
            vec![LayerResult::empty(LayerId::new("L1"))],
            true,
            Preferences::default(),
            click(),
        );
        assert_eq!(ids(&out.features), vec!["information"]);
        assert_eq!(out.info_text, InfoText::NothingFound);
    }

    #[test]
    fn no_queryable_layers_asks_for_a_layer() {
        let out = reconcile(Vec::new(), false, Preferences::default(), click());
        assert_eq!(ids(&out.features), vec!["information"]);
        assert_eq!(out.info_text, InfoText::AddLayer);
    }
}
