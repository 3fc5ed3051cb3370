use std::sync::Arc;

use foundation::LayerId;
use foundation::math::GeoPoint;
use futures_util::future::{Either, join_all, ready};
use layers::{FeatureMapper, Layer, LayerKind};
use runtime::MapAdapter;
use scene::{Feature, LayerResult, VectorInfoCache};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::{BatchControl, BatchToken};
use crate::error::FetchError;
use crate::getfeatureinfo::{GetFeatureInfo, GlobeWindow, QueryWindow};
use crate::gml;
use crate::scope::BatchScope;
use crate::source::FeatureInfoSource;

/// Request parameters shared by every raster query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub srs: String,
    pub structured_info_format: String,
    pub legacy_info_format: String,
    pub feature_count: u32,
    pub globe_window: GlobeWindow,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            srs: "EPSG:25832".to_string(),
            structured_info_format: "application/vnd.ogc.gml".to_string(),
            legacy_info_format: "text/html".to_string(),
            feature_count: 99,
            globe_window: GlobeWindow::default(),
        }
    }
}

/// Per-layer outcome of a batch that was not superseded.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub token: BatchToken,
    pub click: GeoPoint,
    pub had_queryable_layers: bool,
    /// One entry per queried layer, in layer-stack order.
    pub results: Vec<LayerResult>,
    /// Vector features of this batch, reusable for a repeat click here.
    pub vector_cache: VectorInfoCache,
    pub vector_found: Vec<LayerId>,
    pub vector_nothing_found: Vec<LayerId>,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Completed(BatchResult),
    /// A newer batch started (or the mode changed) before this one finished.
    Aborted,
}

/// Dispatches one query per layer under a single batch token.
pub struct RequestOrchestrator {
    source: Arc<dyn FeatureInfoSource>,
    settings: QuerySettings,
    batches: BatchControl,
}

impl RequestOrchestrator {
    pub fn new(source: Arc<dyn FeatureInfoSource>, settings: QuerySettings) -> Self {
        Self {
            source,
            settings,
            batches: BatchControl::new(),
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Whether results issued under `token` may still be committed.
    pub fn is_live(&self, token: &BatchToken) -> bool {
        self.batches.is_live(token)
    }

    /// Invalidates the live batch, if any.
    pub fn cancel(&self) {
        self.batches.cancel();
    }

    /// Queries `layers` (already filtered to the queryable set) at `click`.
    ///
    /// Vector layers reuse `cache` when it was filled at the same location
    /// and otherwise consume the adapter's pick. Raster layers issue a
    /// GetFeatureInfo request each; all requests run concurrently and one
    /// failing layer only empties that layer's result.
    pub async fn run(
        &self,
        click: GeoPoint,
        layers: &[&Layer],
        adapter: &dyn MapAdapter,
        cache: &VectorInfoCache,
    ) -> BatchOutcome {
        let token = self.batches.begin();
        debug!(
            "feature info batch {} at {click:?} over {} layers",
            token.id(),
            layers.len()
        );

        let needs_pick = layers
            .iter()
            .any(|l| l.layer_type == LayerKind::Vector && cache.lookup(click, &l.id).is_none());
        let mut scope = BatchScope::new(if needs_pick {
            adapter.pick(click)
        } else {
            Vec::new()
        });

        let window = QueryWindow::for_adapter(adapter, click, self.settings.globe_window);
        let mut cached_vectors = Vec::new();
        let mut pending = Vec::with_capacity(layers.len());

        for &layer in layers {
            let mapper = FeatureMapper::for_layer(layer);
            if layer.layer_type.is_raster() {
                pending.push(Either::Left(self.query_raster(
                    layer, mapper, window, click, &token,
                )));
            } else {
                let features = cache
                    .lookup(click, &layer.id)
                    .unwrap_or_else(|| scope.map_hits(layer, &mapper, click));
                scope.record(&layer.id, !features.is_empty());
                cached_vectors.extend(features.iter().cloned());
                pending.push(Either::Right(ready(Ok::<_, FetchError>(features))));
            }
        }

        let outcomes = join_all(pending).await;

        let mut aborted = token.is_cancelled();
        let mut results = Vec::with_capacity(layers.len());
        for (layer, outcome) in layers.iter().zip(outcomes) {
            match outcome {
                Ok(features) => results.push(LayerResult::new(layer.id.clone(), features)),
                Err(FetchError::Aborted) => aborted = true,
                Err(e) => {
                    warn!("feature info for layer {} failed: {e}", layer.id);
                    results.push(LayerResult::empty(layer.id.clone()));
                }
            }
        }

        if aborted {
            debug!("feature info batch {} superseded", token.id());
            return BatchOutcome::Aborted;
        }

        let vector = scope.finish();
        BatchOutcome::Completed(BatchResult {
            token,
            click,
            had_queryable_layers: !layers.is_empty(),
            results,
            vector_cache: VectorInfoCache {
                at: Some(click),
                features: cached_vectors,
            },
            vector_found: vector.found,
            vector_nothing_found: vector.nothing_found,
        })
    }

    async fn query_raster(
        &self,
        layer: &Layer,
        mapper: FeatureMapper,
        window: QueryWindow,
        click: GeoPoint,
        token: &BatchToken,
    ) -> Result<Vec<Feature>, FetchError> {
        let Some(service) = &layer.service else {
            warn!("raster layer {} has no WMS service", layer.id);
            return Ok(Vec::new());
        };

        let structured = GetFeatureInfo {
            service_url: &service.url,
            layers: &service.layers,
            srs: &self.settings.srs,
            info_format: &self.settings.structured_info_format,
            feature_count: self.settings.feature_count,
            window: &window,
        };
        let legacy = GetFeatureInfo {
            info_format: &self.settings.legacy_info_format,
            ..structured.clone()
        }
        .url()?
        .to_string();
        let url = structured.url()?.to_string();

        let body = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(FetchError::Aborted),
            body = self.source.fetch(url) => body?,
        };

        let mut features = Vec::new();
        for (idx, payload) in gml::parse_features(&body)?.iter().enumerate() {
            match mapper.map(payload, Some(&legacy)) {
                Ok(Some(properties)) => features.push(Feature {
                    id: format!("{}/{idx}", layer.id),
                    layer_id: Some(layer.id.clone()),
                    vector_id: None,
                    position: click,
                    geometry: None,
                    properties,
                }),
                Ok(None) => {}
                Err(e) => warn!("info box mapping failed on layer {}: {e}", layer.id),
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{BatchOutcome, BatchResult, QuerySettings, RequestOrchestrator};
    use crate::source::MemorySource;
    use foundation::LayerId;
    use foundation::math::{GeoPoint, ViewportSize};
    use layers::{Layer, LayerKind};
    use runtime::{EngineKind, VectorHit, ViewportAdapter};
    use scene::VectorInfoCache;
    use serde_json::{Map, Value, json};

    const CLICK: GeoPoint = GeoPoint {
        lat: 51.272570,
        lon: 7.199918,
    };

    fn gml(art: &str) -> String {
        format!(
            "<msGMLOutput xmlns:gml=\"http://www.opengis.net/gml\">\
             <l><f><ART>{art}</ART></f></l>\
             </msGMLOutput>"
        )
    }

    fn raster(id: &str) -> Layer {
        Layer::new(id, LayerKind::WmtsNonTiled)
            .with_service(format!("https://{id}.example/wms"), id)
            .with_keyword("infoBoxMapping:title: p.ART")
    }

    fn adapter(engine: EngineKind) -> ViewportAdapter {
        ViewportAdapter::new(engine, CLICK, 15.0, ViewportSize::new(800, 600)).0
    }

    fn completed(outcome: BatchOutcome) -> BatchResult {
        match outcome {
            BatchOutcome::Completed(r) => r,
            BatchOutcome::Aborted => panic!("batch aborted"),
        }
    }

    fn titles(result: &BatchResult) -> Vec<Vec<String>> {
        result
            .results
            .iter()
            .map(|r| r.features.iter().map(|f| f.properties.title.clone()).collect())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn raster_layers_keep_stack_order() {
        let source = Arc::new(MemorySource::new());
        source.respond("https://l1.example", gml("F1"), Duration::from_millis(80));
        source.respond("https://l2.example", gml("F2"), Duration::from_millis(10));
        let orch = RequestOrchestrator::new(source.clone(), QuerySettings::default());

        let (l1, l2) = (raster("l1"), raster("l2"));
        let result = completed(
            orch.run(
                CLICK,
                &[&l1, &l2],
                &adapter(EngineKind::Raster2d),
                &VectorInfoCache::default(),
            )
            .await,
        );

        assert_eq!(titles(&result), vec![vec!["F1"], vec!["F2"]]);
        let f1 = &result.results[0].features[0];
        assert_eq!(f1.layer_id, Some(LayerId::new("l1")));
        let links = &f1.properties.generic_links;
        assert!(links[0].url.contains("INFO_FORMAT=text%2Fhtml"));
        assert_eq!(source.requests().len(), 2);
        assert!(orch.is_live(&result.token));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_layer_yields_empty_result() {
        let source = Arc::new(MemorySource::new());
        source.respond("https://l1.example", gml("F1"), Duration::ZERO);
        source.fail("https://l2.example", 500, Duration::ZERO);
        source.respond("https://l3.example", "<not xml", Duration::ZERO);
        let orch = RequestOrchestrator::new(source, QuerySettings::default());

        let (l1, l2, l3) = (raster("l1"), raster("l2"), raster("l3"));
        let result = completed(
            orch.run(
                CLICK,
                &[&l1, &l2, &l3],
                &adapter(EngineKind::Raster2d),
                &VectorInfoCache::default(),
            )
            .await,
        );
        assert_eq!(titles(&result), vec![vec!["F1".to_string()], vec![], vec![]]);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_batch_aborts_pending_one() {
        let source = Arc::new(MemorySource::new());
        source.respond("https://slow.example", gml("stale"), Duration::from_millis(200));
        source.respond("https://fast.example", gml("fresh"), Duration::from_millis(10));
        let orch = RequestOrchestrator::new(source, QuerySettings::default());
        let map = adapter(EngineKind::Raster2d);
        let cache = VectorInfoCache::default();

        let (slow, fast) = (raster("slow"), raster("fast"));
        let slow_refs = [&slow];
        let fast_refs = [&fast];
        let (first, second) = tokio::join!(orch.run(CLICK, &slow_refs, &map, &cache), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            orch.run(CLICK, &fast_refs, &map, &cache).await
        });

        assert!(matches!(first, BatchOutcome::Aborted));
        assert_eq!(titles(&completed(second)), vec![vec!["fresh"]]);
    }

    #[tokio::test]
    async fn vector_hits_are_mapped_and_cached() {
        let orch =
            RequestOrchestrator::new(Arc::new(MemorySource::new()), QuerySettings::default());
        let map = adapter(EngineKind::VectorTile2d);
        let props: Map<String, Value> = match json!({ "NAME": "Hardt" }) {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        map.set_vector_hits(vec![VectorHit {
            layer_id: LayerId::new("parks"),
            vector_id: "p1".to_string(),
            properties: props,
            geometry: None,
        }]);

        let parks = Layer::new("parks", LayerKind::Vector)
            .with_keyword("infoBoxMapping:title: p.NAME");
        let trees = Layer::new("trees", LayerKind::Vector);
        let first = completed(
            orch.run(CLICK, &[&parks, &trees], &map, &VectorInfoCache::default())
                .await,
        );
        assert_eq!(titles(&first), vec![vec!["Hardt".to_string()], vec![]]);
        assert_eq!(first.vector_found, vec![LayerId::new("parks")]);
        assert_eq!(first.vector_nothing_found, vec![LayerId::new("trees")]);

        // The engine no longer reports the hit; the cache at this spot still does.
        map.set_vector_hits(Vec::new());
        let again = completed(orch.run(CLICK, &[&parks], &map, &first.vector_cache).await);
        assert_eq!(titles(&again), vec![vec!["Hardt"]]);

        let elsewhere = GeoPoint::new(51.3, 7.2);
        let moved = completed(orch.run(elsewhere, &[&parks], &map, &first.vector_cache).await);
        assert!(moved.results[0].features.is_empty());
    }

    #[tokio::test]
    async fn globe_uses_synthetic_window() {
        let source = Arc::new(MemorySource::new());
        source.respond("https://l1.example", gml("F1"), Duration::ZERO);
        let orch = RequestOrchestrator::new(source.clone(), QuerySettings::default());

        let l1 = raster("l1");
        completed(
            orch.run(
                CLICK,
                &[&l1],
                &adapter(EngineKind::Globe3d),
                &VectorInfoCache::default(),
            )
            .await,
        );

        let requested = url::Url::parse(&source.requests()[0]).expect("url");
        let params: HashMap<String, String> = requested
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(params["WIDTH"], "101");
        assert_eq!(params["HEIGHT"], "101");
    }

    #[tokio::test]
    async fn empty_layer_set_is_flagged() {
        let orch =
            RequestOrchestrator::new(Arc::new(MemorySource::new()), QuerySettings::default());
        let result = completed(
            orch.run(
                CLICK,
                &[],
                &adapter(EngineKind::Raster2d),
                &VectorInfoCache::default(),
            )
            .await,
        );
        assert!(!result.had_queryable_layers);
        assert!(result.results.is_empty());
    }
}
