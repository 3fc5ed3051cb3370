use std::collections::{BTreeMap, BTreeSet};

use foundation::math::GeoPoint;
use foundation::{Arena, LayerId};
use layers::{FeatureMapper, Layer};
use runtime::VectorHit;
use scene::Feature;
use tracing::warn;

/// Vector hit bookkeeping of one batch. Created when the batch starts and
/// dropped when it ends.
#[derive(Debug, Default)]
pub struct BatchScope {
    hits: Arena<VectorHit>,
    by_layer: BTreeMap<LayerId, Vec<usize>>,
    found: BTreeSet<LayerId>,
    nothing_found: BTreeSet<LayerId>,
}

/// Which vector layers answered the batch and which stayed silent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorOutcome {
    pub found: Vec<LayerId>,
    pub nothing_found: Vec<LayerId>,
}

impl BatchScope {
    pub fn new(picked: Vec<VectorHit>) -> Self {
        let mut scope = Self {
            hits: Arena::with_capacity(picked.len()),
            ..Self::default()
        };
        for hit in picked {
            let layer_id = hit.layer_id.clone();
            let idx = scope.hits.alloc(hit);
            scope.by_layer.entry(layer_id).or_default().push(idx);
        }
        scope
    }

    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    pub fn hits_for<'a>(&'a self, layer_id: &LayerId) -> impl Iterator<Item = &'a VectorHit> + 'a {
        self.by_layer
            .get(layer_id)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.hits.get(idx))
    }

    /// Runs the layer's mapping over its hits; failing candidates are dropped.
    pub fn map_hits(&self, layer: &Layer, mapper: &FeatureMapper, click: GeoPoint) -> Vec<Feature> {
        self.hits_for(&layer.id)
            .filter_map(|hit| match mapper.map(&hit.properties, None) {
                Ok(Some(properties)) => Some(Feature {
                    id: format!("{}/{}", layer.id, hit.vector_id),
                    layer_id: Some(layer.id.clone()),
                    vector_id: Some(hit.vector_id.clone()),
                    position: click,
                    geometry: hit.geometry.clone(),
                    properties,
                }),
                Ok(None) => None,
                Err(e) => {
                    warn!("info box mapping failed on layer {}: {e}", layer.id);
                    None
                }
            })
            .collect()
    }

    pub fn record(&mut self, layer_id: &LayerId, produced: bool) {
        if produced {
            self.found.insert(layer_id.clone());
        } else {
            self.nothing_found.insert(layer_id.clone());
        }
    }

    pub fn finish(self) -> VectorOutcome {
        VectorOutcome {
            found: self.found.into_iter().collect(),
            nothing_found: self.nothing_found.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BatchScope;
    use foundation::LayerId;
    use foundation::math::GeoPoint;
    use layers::{FeatureMapper, Layer, LayerKind};
    use runtime::VectorHit;
    use serde_json::{Map, Value, json};

    fn hit(layer: &str, id: &str, props: Value) -> VectorHit {
        VectorHit {
            layer_id: LayerId::new(layer),
            vector_id: id.to_string(),
            properties: match props {
                Value::Object(m) => m,
                _ => Map::new(),
            },
            geometry: None,
        }
    }

    #[test]
    fn groups_hits_by_layer_and_maps_them() {
        let scope = BatchScope::new(vec![
            hit("trees", "t1", json!({ "ART": "Linde" })),
            hit("parks", "p1", json!({ "NAME": "Hardt" })),
            hit("trees", "t2", json!({ "ART": "Eiche" })),
        ]);
        assert_eq!(scope.hit_count(), 3);

        let layer =
            Layer::new("trees", LayerKind::Vector).with_keyword("infoBoxMapping:title: p.ART");
        let features = scope.map_hits(
            &layer,
            &FeatureMapper::for_layer(&layer),
            GeoPoint::new(51.0, 7.0),
        );
        let titles: Vec<&str> = features.iter().map(|f| f.properties.title.as_str()).collect();
        assert_eq!(titles, vec!["Linde", "Eiche"]);
        assert_eq!(features[1].vector_id.as_deref(), Some("t2"));
        assert_eq!(features[1].id, "trees/t2");
    }

    #[test]
    fn finish_reports_silent_layers() {
        let mut scope = BatchScope::new(Vec::new());
        scope.record(&LayerId::new("a"), true);
        scope.record(&LayerId::new("b"), false);
        let outcome = scope.finish();
        assert_eq!(outcome.found, vec![LayerId::new("a")]);
        assert_eq!(outcome.nothing_found, vec![LayerId::new("b")]);
    }
}
