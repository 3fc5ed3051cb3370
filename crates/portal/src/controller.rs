//! Feature info controller: the single entry point the portal UI talks to.
//!
//! Map clicks, UI mode toggles, keyboard cycling, layer-stack changes and
//! off-pointer selections all end up here. The controller runs the query
//! pipeline and is the only writer of the shared [`Store`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use foundation::LayerId;
use foundation::math::GeoPoint;
use layers::{Layer, LayerKind, select_queryable};
use parking_lot::Mutex;
use runtime::{DispatchError, IdleGatedDispatcher, MapAdapter};
use scene::{
    Action, CycleDirection, Preferences, SelectionState, Store, UiMode, VectorInfoCache, reconcile,
};
use streaming::{BatchOutcome, BatchResult, FeatureInfoSource, RequestOrchestrator};
use tracing::debug;

use crate::config::PortalConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Clicks only query while the feature info mode is active.
    Ignored,
    /// A newer batch (or a mode change) took over before this one finished.
    Superseded,
    Committed { selected: Option<String>, secondary: usize },
}

pub struct FeatureInfoController {
    config: PortalConfig,
    adapter: Arc<dyn MapAdapter>,
    orchestrator: RequestOrchestrator,
    dispatcher: IdleGatedDispatcher,
    layers: Mutex<Vec<Layer>>,
    store: Mutex<Store>,
}

impl FeatureInfoController {
    pub fn new(
        config: PortalConfig,
        source: Arc<dyn FeatureInfoSource>,
        adapter: Arc<dyn MapAdapter>,
    ) -> Self {
        Self {
            orchestrator: RequestOrchestrator::new(source, config.query_settings()),
            dispatcher: IdleGatedDispatcher::new(config.idle),
            config,
            adapter,
            layers: Mutex::new(Vec::new()),
            store: Mutex::new(Store::new()),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SelectionState {
        self.store.lock().state().clone()
    }

    /// Recently applied actions, oldest first.
    pub fn actions(&self) -> Vec<Action> {
        self.store
            .lock()
            .log()
            .events()
            .map(|e| e.payload.clone())
            .collect()
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.layers.lock().clone()
    }

    fn commit(&self, store: &mut Store, actions: Vec<Action>) {
        if actions.is_empty() {
            return;
        }
        store.dispatch_all(actions);
        self.adapter
            .set_selection_marker(store.state().marker_position());
    }

    fn dispatch(&self, actions: Vec<Action>) {
        let mut store = self.store.lock();
        self.commit(&mut store, actions);
    }

    pub fn set_mode(&self, mode: UiMode) {
        let mut store = self.store.lock();
        if store.state().mode == UiMode::FeatureInfo && mode != UiMode::FeatureInfo {
            self.orchestrator.cancel();
        }
        let actions = store.state().plan_mode_change(mode);
        self.commit(&mut store, actions);
    }

    pub fn set_preferred_layer(&self, layer_id: Option<LayerId>) {
        self.dispatch(vec![Action::SetPreferredLayerId(layer_id)]);
    }

    pub fn set_preferred_vector(&self, vector_id: Option<String>) {
        self.dispatch(vec![Action::SetPreferredVectorLayerId(vector_id)]);
    }

    /// Runs a query batch at `click` and commits it unless superseded.
    pub async fn handle_click(&self, click: GeoPoint) -> ClickOutcome {
        let cache = {
            let mut store = self.store.lock();
            if store.state().mode != UiMode::FeatureInfo {
                return ClickOutcome::Ignored;
            }
            store.dispatch(Action::SetLoading(true));
            store.state().vector_info_cache.clone()
        };

        let stack = self.layers();
        let queryable = select_queryable(&stack, self.adapter.zoom());
        let outcome = self
            .orchestrator
            .run(click, &queryable, self.adapter.as_ref(), &cache)
            .await;

        match outcome {
            BatchOutcome::Aborted => ClickOutcome::Superseded,
            BatchOutcome::Completed(result) => self.commit_batch(result),
        }
    }

    fn commit_batch(&self, mut result: BatchResult) -> ClickOutcome {
        let mut store = self.store.lock();
        // Checked under the store lock: a stale batch never reaches the state.
        if !self.orchestrator.is_live(&result.token) || store.state().mode != UiMode::FeatureInfo {
            debug!("discarding stale batch {}", result.token.id());
            return ClickOutcome::Superseded;
        }
        self.retain_live_layers(&mut result);

        let mut actions = Vec::new();
        for id in &result.vector_found {
            if store.state().nothing_found_ids.contains(id) {
                actions.push(Action::RemoveNothingFoundId(id.clone()));
            }
        }
        for id in &result.vector_nothing_found {
            actions.push(Action::AddNothingFoundId(id.clone()));
        }
        actions.push(Action::SetVectorInfoCache(result.vector_cache));
        store.dispatch_all(actions);

        let state = store.state();
        let reconciled = reconcile(
            result.results,
            result.had_queryable_layers,
            Preferences {
                layer_id: state.preferred_layer_id.as_ref(),
                vector_id: state.preferred_vector_id.as_deref(),
            },
            result.click,
        );
        let actions = state.plan_commit(reconciled, result.click, self.config.max_secondary);
        self.commit(&mut store, actions);

        let state = store.state();
        let outcome = ClickOutcome::Committed {
            selected: state.selected.as_ref().map(|f| f.id.clone()),
            secondary: state.secondary.len(),
        };
        debug!("committed batch {}: {outcome:?}", result.token.id());
        outcome
    }

    /// Drops results of layers that left the queryable stack while the
    /// batch was in flight.
    fn retain_live_layers(&self, result: &mut BatchResult) {
        let live: BTreeSet<LayerId> = select_queryable(&self.layers(), self.adapter.zoom())
            .into_iter()
            .map(|l| l.id.clone())
            .collect();

        let before = result.results.len();
        result.results.retain(|r| live.contains(&r.layer_id));
        result.vector_found.retain(|id| live.contains(id));
        result.vector_nothing_found.retain(|id| live.contains(id));
        result
            .vector_cache
            .features
            .retain(|f| f.layer_id.as_ref().is_none_or(|id| live.contains(id)));
        result.had_queryable_layers &= !live.is_empty();

        if result.results.len() < before {
            debug!(
                "batch {}: dropped {} result(s) of removed layers",
                result.token.id(),
                before - result.results.len()
            );
        }
    }

    /// `Ctrl+ArrowUp` / `Ctrl+ArrowDown` cycle the candidates. Returns whether
    /// the key was consumed.
    pub fn handle_key(&self, key: &str, ctrl: bool) -> bool {
        let Some(direction) = CycleDirection::from_key(key, ctrl) else {
            return false;
        };
        let mut store = self.store.lock();
        let actions = store.state().plan_cycle(direction);
        let handled = !actions.is_empty();
        self.commit(&mut store, actions);
        handled
    }

    /// Replaces the layer stack, then reconciles the selection with it once
    /// the stack has settled.
    pub async fn set_layers(&self, layers: Vec<Layer>) {
        let removed: Vec<LayerId> = {
            let mut current = self.layers.lock();
            let keep: BTreeSet<&LayerId> = layers.iter().map(|l| &l.id).collect();
            let removed = current
                .iter()
                .filter(|l| !keep.contains(&l.id))
                .map(|l| l.id.clone())
                .collect();
            *current = layers;
            removed
        };

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        let stack = self.layers();
        let mut store = self.store.lock();

        if !stack.iter().any(|l| l.visible) {
            let mut actions = store.state().plan_reset();
            actions.push(Action::ClearNothingFoundIds);
            self.commit(&mut store, actions);
            return;
        }

        for id in &removed {
            let actions = store.state().plan_layer_removed(id);
            self.commit(&mut store, actions);
        }

        let vector_ids: Vec<LayerId> = select_queryable(&stack, self.adapter.zoom())
            .into_iter()
            .filter(|l| l.layer_type == LayerKind::Vector)
            .map(|l| l.id.clone())
            .collect();
        let actions = store.state().plan_prune_nothing_found(&vector_ids);
        self.commit(&mut store, actions);
    }

    pub async fn remove_layer(&self, layer_id: &LayerId) {
        let remaining: Vec<Layer> = self
            .layers()
            .into_iter()
            .filter(|l| &l.id != layer_id)
            .collect();
        self.set_layers(remaining).await;
    }

    /// Selection from outside the pointer (gazetteer hit, 3D pick).
    ///
    /// Switches to the feature info mode, records the preferences, and
    /// fires a synthetic click at `target` once the engine is idle. The
    /// click arrives through the adapter's regular click path and is
    /// expected to be fed back into [`Self::handle_click`].
    pub async fn select_off_pointer(
        &self,
        target: GeoPoint,
        preferred_layer: Option<LayerId>,
        preferred_vector: Option<String>,
    ) -> Result<(), DispatchError> {
        self.set_mode(UiMode::FeatureInfo);
        self.dispatch(vec![
            Action::SetPreferredLayerId(preferred_layer),
            Action::SetPreferredVectorLayerId(preferred_vector),
        ]);
        self.dispatcher
            .dispatch_click(self.adapter.as_ref(), target)
            .await
    }

    /// Drops every cached vector hit, e.g. after the engine restyled.
    pub fn clear_vector_cache(&self) {
        self.dispatch(vec![Action::SetVectorInfoCache(VectorInfoCache::default())]);
    }
}
