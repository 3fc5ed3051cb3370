//! Selection state machine for the feature info box.
//!
//! `SelectionState` only changes through [`Action`]s. The `plan_*` methods
//! are pure: they look at the current state and return the actions a
//! transition needs, so every change is visible in the store's action log.

use std::collections::{BTreeSet, VecDeque};

use foundation::LayerId;
use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::feature::Feature;
use crate::reconcile::Reconciled;

/// Upper bound on simultaneously displayable secondary elements.
pub const DEFAULT_MAX_SECONDARY: usize = 4;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiMode {
    #[default]
    Default,
    FeatureInfo,
    Measurement,
}

/// Explanatory text shown next to the selected feature.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoText {
    #[default]
    None,
    AddLayer,
    NothingFound,
    TooMany,
}

impl InfoText {
    pub fn message(self) -> Option<&'static str> {
        match self {
            InfoText::None => None,
            InfoText::AddLayer => {
                Some("Add a layer to the map to query information at this position.")
            }
            InfoText::NothingFound => Some("No information found at this position."),
            InfoText::TooMany => Some(crate::feature::TOO_MANY_MESSAGE),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CycleDirection {
    /// Head of the ring becomes selected, old selection goes to the back.
    Up,
    /// Tail of the ring becomes selected, old selection goes to the front.
    Down,
}

impl CycleDirection {
    /// `Ctrl+ArrowUp` / `Ctrl+ArrowDown`; anything else is ignored.
    pub fn from_key(key: &str, ctrl: bool) -> Option<Self> {
        if !ctrl {
            return None;
        }
        match key {
            "ArrowUp" => Some(CycleDirection::Up),
            "ArrowDown" => Some(CycleDirection::Down),
            _ => None,
        }
    }
}

/// Features picked from vector/mesh layers at one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorInfoCache {
    pub at: Option<GeoPoint>,
    pub features: Vec<Feature>,
}

impl VectorInfoCache {
    /// Cached features of `layer_id`, if the cache was filled at `at`.
    pub fn lookup(&self, at: GeoPoint, layer_id: &LayerId) -> Option<Vec<Feature>> {
        if self.at != Some(at) {
            return None;
        }
        let hits: Vec<Feature> = self
            .features
            .iter()
            .filter(|f| f.layer_id.as_ref() == Some(layer_id))
            .cloned()
            .collect();
        (!hits.is_empty()).then_some(hits)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetUiMode(UiMode),
    SetSelectedFeature(Option<Feature>),
    SetFeatures(Vec<Feature>),
    SetSecondaryInfoBoxElements(Vec<Feature>),
    SetLoading(bool),
    AddNothingFoundId(LayerId),
    RemoveNothingFoundId(LayerId),
    ClearNothingFoundIds,
    SetPreferredLayerId(Option<LayerId>),
    SetPreferredVectorLayerId(Option<String>),
    SetInfoText(InfoText),
    SetInfoTextToNothingFound,
    SetVectorInfoCache(VectorInfoCache),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub mode: UiMode,
    pub selected: Option<Feature>,
    /// Candidate ring; the front is shown next.
    pub secondary: VecDeque<Feature>,
    /// Last committed merged result.
    pub features: Vec<Feature>,
    pub preferred_layer_id: Option<LayerId>,
    pub preferred_vector_id: Option<String>,
    pub nothing_found_ids: BTreeSet<LayerId>,
    pub vector_info_cache: VectorInfoCache,
    pub loading: bool,
    pub info_text: InfoText,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetUiMode(mode) => self.mode = mode,
            Action::SetSelectedFeature(f) => self.selected = f,
            Action::SetFeatures(fs) => self.features = fs,
            Action::SetSecondaryInfoBoxElements(fs) => self.secondary = fs.into(),
            Action::SetLoading(loading) => self.loading = loading,
            Action::AddNothingFoundId(id) => {
                self.nothing_found_ids.insert(id);
            }
            Action::RemoveNothingFoundId(id) => {
                self.nothing_found_ids.remove(&id);
            }
            Action::ClearNothingFoundIds => self.nothing_found_ids.clear(),
            Action::SetPreferredLayerId(id) => self.preferred_layer_id = id,
            Action::SetPreferredVectorLayerId(id) => self.preferred_vector_id = id,
            Action::SetInfoText(text) => self.info_text = text,
            Action::SetInfoTextToNothingFound => self.info_text = InfoText::NothingFound,
            Action::SetVectorInfoCache(cache) => self.vector_info_cache = cache,
        }
    }

    /// Actions that empty the selection and everything derived from a query.
    pub fn plan_reset(&self) -> Vec<Action> {
        vec![
            Action::SetSelectedFeature(None),
            Action::SetSecondaryInfoBoxElements(Vec::new()),
            Action::SetFeatures(Vec::new()),
            Action::SetPreferredLayerId(None),
            Action::SetInfoText(InfoText::None),
            Action::SetVectorInfoCache(VectorInfoCache::default()),
            Action::SetLoading(false),
        ]
    }

    /// Leaving `FeatureInfo` clears the selection; other transitions only
    /// switch the mode.
    pub fn plan_mode_change(&self, mode: UiMode) -> Vec<Action> {
        if mode == self.mode {
            return Vec::new();
        }
        let mut actions = vec![Action::SetUiMode(mode)];
        if self.mode == UiMode::FeatureInfo {
            actions.extend(self.plan_reset());
        }
        actions
    }

    /// Commits a reconciled batch: head becomes selected, the rest the ring.
    ///
    /// More than `max_secondary` candidates collapse into a single
    /// "too many" pseudo-feature.
    pub fn plan_commit(
        &self,
        reconciled: Reconciled,
        click: GeoPoint,
        max_secondary: usize,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if reconciled.clear_preferred_vector {
            actions.push(Action::SetPreferredVectorLayerId(None));
        }

        let features = reconciled.features;
        if features.len().saturating_sub(1) > max_secondary {
            let collapsed = Feature::too_many(click);
            actions.extend([
                Action::SetFeatures(vec![collapsed.clone()]),
                Action::SetSelectedFeature(Some(collapsed)),
                Action::SetSecondaryInfoBoxElements(Vec::new()),
                Action::SetInfoText(InfoText::TooMany),
            ]);
        } else {
            let mut rest = features.clone();
            let head = if rest.is_empty() {
                None
            } else {
                Some(rest.remove(0))
            };
            actions.push(Action::SetFeatures(features));
            actions.push(Action::SetSelectedFeature(head));
            actions.push(Action::SetSecondaryInfoBoxElements(rest));
            actions.push(match reconciled.info_text {
                InfoText::NothingFound => Action::SetInfoTextToNothingFound,
                other => Action::SetInfoText(other),
            });
        }
        actions.push(Action::SetLoading(false));
        actions
    }

    /// Rotates the candidate ring. Up and Down are exact inverses.
    pub fn plan_cycle(&self, direction: CycleDirection) -> Vec<Action> {
        let Some(current) = self.selected.clone() else {
            return Vec::new();
        };
        if self.secondary.is_empty() {
            return Vec::new();
        }

        let mut ring = self.secondary.clone();
        let next = match direction {
            CycleDirection::Up => {
                let next = ring.pop_front();
                ring.push_back(current);
                next
            }
            CycleDirection::Down => {
                let next = ring.pop_back();
                ring.push_front(current);
                next
            }
        };

        vec![
            Action::SetSelectedFeature(next),
            Action::SetSecondaryInfoBoxElements(ring.into()),
        ]
    }

    /// Drops features of a removed layer, promoting the next candidate when
    /// the selected feature belonged to it.
    pub fn plan_layer_removed(&self, layer_id: &LayerId) -> Vec<Action> {
        let from_layer = |f: &Feature| f.layer_id.as_ref() == Some(layer_id);

        let mut ring: VecDeque<Feature> = self
            .secondary
            .iter()
            .filter(|f| !from_layer(f))
            .cloned()
            .collect();
        let features: Vec<Feature> = self
            .features
            .iter()
            .filter(|f| !from_layer(f))
            .cloned()
            .collect();

        let mut actions = Vec::new();
        if self.selected.as_ref().is_some_and(from_layer) {
            actions.push(Action::SetSelectedFeature(ring.pop_front()));
        }
        if self.preferred_layer_id.as_ref() == Some(layer_id) {
            actions.push(Action::SetPreferredLayerId(None));
        }
        if self.nothing_found_ids.contains(layer_id) {
            actions.push(Action::RemoveNothingFoundId(layer_id.clone()));
        }
        actions.push(Action::SetSecondaryInfoBoxElements(ring.into()));
        actions.push(Action::SetFeatures(features));
        actions
    }

    /// Keeps `nothing_found_ids` within the currently queryable vector layers.
    pub fn plan_prune_nothing_found(&self, queryable_vector_ids: &[LayerId]) -> Vec<Action> {
        self.nothing_found_ids
            .iter()
            .filter(|id| !queryable_vector_ids.contains(id))
            .map(|id| Action::RemoveNothingFoundId(id.clone()))
            .collect()
    }

    pub fn marker_position(&self) -> Option<GeoPoint> {
        self.selected.as_ref().map(|f| f.position)
    }
}
