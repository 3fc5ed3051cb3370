//! Capability surface of a map rendering engine.
//!
//! The three engines (2D raster/vector, 2D vector-tile, 3D globe) expose
//! bounds, size and clicks through different native calls. Each one is
//! wrapped once in a [`MapAdapter`] so the query pipeline never branches on
//! the concrete engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use foundation::math::{GeoPoint, ViewportSize};
use foundation::{GeoBounds, LayerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Raster2d,
    VectorTile2d,
    Globe3d,
}

/// Screen position in CSS pixels, origin top-left.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// A rendered vector or mesh feature under the pointer, as reported by the
/// engine's own picking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorHit {
    pub layer_id: LayerId,
    pub vector_id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

pub type IdleCallback = Box<dyn Fn(bool) + Send + Sync>;

pub trait MapAdapter: Send + Sync {
    fn engine(&self) -> EngineKind;

    fn project(&self, p: GeoPoint) -> Option<ScreenPoint>;

    /// Geographic bounds of the current view. `None` for engines without a
    /// flat 2D view (the globe).
    fn viewport_bounds(&self) -> Option<GeoBounds>;

    fn viewport_size(&self) -> ViewportSize;

    fn zoom(&self) -> f64;

    /// Synthesize a click at `p`; the engine routes it to the regular click handler.
    fn fire_click(&self, p: GeoPoint);

    fn is_idle(&self) -> bool;

    fn on_idle_changed(&self, callback: IdleCallback);

    /// Features the engine rendered at `p`. Picking is synchronous.
    fn pick(&self, _p: GeoPoint) -> Vec<VectorHit> {
        Vec::new()
    }

    /// Show (or hide with `None`) the marker of the selected feature.
    fn set_selection_marker(&self, _p: Option<GeoPoint>) {}
}

/// Shared idle flag with change notification, for adapters to embed.
#[derive(Clone, Default)]
pub struct IdleSignal {
    inner: Arc<IdleInner>,
}

#[derive(Default)]
struct IdleInner {
    idle: AtomicBool,
    callbacks: Mutex<Vec<IdleCallback>>,
}

impl IdleSignal {
    pub fn new(idle: bool) -> Self {
        let signal = Self::default();
        signal.inner.idle.store(idle, Ordering::SeqCst);
        signal
    }

    pub fn is_idle(&self) -> bool {
        self.inner.idle.load(Ordering::SeqCst)
    }

    /// Updates the flag; callbacks only run when the value actually changes.
    pub fn set(&self, idle: bool) {
        let prev = self.inner.idle.swap(idle, Ordering::SeqCst);
        if prev == idle {
            return;
        }
        for cb in self.inner.callbacks.lock().iter() {
            cb(idle);
        }
    }

    pub fn subscribe(&self, callback: IdleCallback) {
        self.inner.callbacks.lock().push(callback);
    }
}

/// A click synthesized through [`MapAdapter::fire_click`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SyntheticClick {
    pub engine: EngineKind,
    pub point: GeoPoint,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct ViewState {
    center: GeoPoint,
    zoom: f64,
    size: ViewportSize,
}

/// In-process adapter backed by a plain camera description.
///
/// Bounds follow the usual 256px tile pyramid: one pixel spans
/// `360 / (256 * 2^zoom)` degrees of longitude, latitude is scaled by
/// `cos(lat)`. Synthetic clicks are forwarded on a channel so the owner can
/// feed them into the same click handler as pointer clicks.
pub struct ViewportAdapter {
    engine: EngineKind,
    view: Mutex<ViewState>,
    idle: IdleSignal,
    clicks: mpsc::UnboundedSender<SyntheticClick>,
    marker: Mutex<Option<GeoPoint>>,
    hits: Mutex<Vec<VectorHit>>,
}

impl ViewportAdapter {
    pub fn new(
        engine: EngineKind,
        center: GeoPoint,
        zoom: f64,
        size: ViewportSize,
    ) -> (Self, mpsc::UnboundedReceiver<SyntheticClick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = Self {
            engine,
            view: Mutex::new(ViewState { center, zoom, size }),
            idle: IdleSignal::new(true),
            clicks: tx,
            marker: Mutex::new(None),
            hits: Mutex::new(Vec::new()),
        };
        (adapter, rx)
    }

    pub fn idle_signal(&self) -> &IdleSignal {
        &self.idle
    }

    pub fn set_view(&self, center: GeoPoint, zoom: f64) {
        let mut view = self.view.lock();
        view.center = center;
        view.zoom = zoom;
    }

    pub fn marker(&self) -> Option<GeoPoint> {
        *self.marker.lock()
    }

    /// Hits returned by the next [`MapAdapter::pick`] calls.
    pub fn set_vector_hits(&self, hits: Vec<VectorHit>) {
        *self.hits.lock() = hits;
    }

    fn degrees_per_pixel(view: &ViewState) -> (f64, f64) {
        let lon = 360.0 / (256.0 * 2f64.powf(view.zoom));
        let lat = lon * view.center.lat.to_radians().cos();
        (lat, lon)
    }
}

impl MapAdapter for ViewportAdapter {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn project(&self, p: GeoPoint) -> Option<ScreenPoint> {
        let view = *self.view.lock();
        let (dlat, dlon) = Self::degrees_per_pixel(&view);
        Some(ScreenPoint {
            x: view.size.width as f64 * 0.5 + (p.lon - view.center.lon) / dlon,
            y: view.size.height as f64 * 0.5 - (p.lat - view.center.lat) / dlat,
        })
    }

    fn viewport_bounds(&self) -> Option<GeoBounds> {
        if self.engine == EngineKind::Globe3d {
            return None;
        }
        let view = *self.view.lock();
        let (dlat, dlon) = Self::degrees_per_pixel(&view);
        let half_w = view.size.width as f64 * 0.5 * dlon;
        let half_h = view.size.height as f64 * 0.5 * dlat;
        Some(GeoBounds::new(
            GeoPoint::new(view.center.lat - half_h, view.center.lon - half_w),
            GeoPoint::new(view.center.lat + half_h, view.center.lon + half_w),
        ))
    }

    fn viewport_size(&self) -> ViewportSize {
        self.view.lock().size
    }

    fn zoom(&self) -> f64 {
        self.view.lock().zoom
    }

    fn fire_click(&self, p: GeoPoint) {
        let click = SyntheticClick {
            engine: self.engine,
            point: p,
        };
        if self.clicks.send(click).is_err() {
            tracing::debug!("synthetic click dropped, no receiver: {p:?}");
        }
    }

    fn is_idle(&self) -> bool {
        self.idle.is_idle()
    }

    fn on_idle_changed(&self, callback: IdleCallback) {
        self.idle.subscribe(callback);
    }

    fn pick(&self, _p: GeoPoint) -> Vec<VectorHit> {
        self.hits.lock().clone()
    }

    fn set_selection_marker(&self, p: Option<GeoPoint>) {
        *self.marker.lock() = p;
    }
}
