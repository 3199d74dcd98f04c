//! SyncDashboard - the dashboard exported to JavaScript
//!
//! Video tiles report positions from `timeupdate` handlers. Each report
//! schedules one microtask that drains the event queue, so follower seeks
//! never run inside a media event handler.

use crate::catalog::FetchCatalog;
use crate::hls_engine::HlsJsEngine;
use js_sys::Function;
use multiview_core::{
    parse_catalog, CatalogProvider, Dashboard, DashboardConfig, PlaybackEngine, StreamDescriptor,
};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tokio::sync::watch;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::Element;

pub(crate) fn to_js(e: multiview_core::Error) -> JsValue {
    js_sys::Error::new(&format!("[{}] {}", e.error_code(), e)).into()
}

fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| js_sys::Error::new(&e.to_string()).into())
}

type LeaderCallback = Rc<RefCell<Option<Function>>>;

struct DrainState {
    dashboard: Weak<RefCell<Dashboard>>,
    leader: RefCell<watch::Receiver<f64>>,
    on_leader: LeaderCallback,
    scheduled: Cell<bool>,
}

impl DrainState {
    fn new(dashboard: &Rc<RefCell<Dashboard>>, on_leader: LeaderCallback) -> Self {
        Self {
            dashboard: Rc::downgrade(dashboard),
            leader: RefCell::new(dashboard.borrow().subscribe_leader()),
            on_leader,
            scheduled: Cell::new(false),
        }
    }

    /// Mark a drain as pending. False if one is already scheduled.
    fn request(&self) -> bool {
        !self.scheduled.replace(true)
    }

    /// Latest leader position, if it moved since the last call
    fn leader_change(&self) -> Option<f64> {
        let mut leader = self.leader.borrow_mut();
        if !leader.has_changed().unwrap_or(false) {
            return None;
        }
        let position = *leader.borrow_and_update();
        Some(position)
    }

    /// Drain queued reports. Returns the leader position when it changed.
    fn drain(&self) -> Option<f64> {
        self.scheduled.set(false);
        let dashboard = self.dashboard.upgrade()?;

        let handled = match dashboard.try_borrow_mut() {
            Ok(mut dash) => dash.drain(),
            // Reports stay queued; the next wake drains them
            Err(_) => return None,
        };

        let position = self.leader_change()?;
        debug!(handled, position, "Leader position changed");

        // Cloned out so the callback may call back into the dashboard
        let callback = self.on_leader.borrow().clone();
        if let Some(callback) = callback {
            let _ = callback.call1(&JsValue::NULL, &JsValue::from_f64(position));
        }
        Some(position)
    }
}

/// Synchronized grid of live HLS tiles
#[wasm_bindgen]
pub struct SyncDashboard {
    inner: Rc<RefCell<Dashboard>>,
    on_leader: LeaderCallback,
}

#[wasm_bindgen]
impl SyncDashboard {
    /// Create a dashboard whose video tiles are appended to `container`.
    /// `config` is a `DashboardConfig` object, or undefined for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(container: Element, config: JsValue) -> Result<SyncDashboard, JsValue> {
        let config: DashboardConfig = if config.is_undefined() || config.is_null() {
            DashboardConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from(js_sys::Error::new(&e.to_string())))?
        };

        let tuning = config.engine.clone();
        let factory = move |descriptor: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
            Box::new(HlsJsEngine::new(container.clone(), descriptor.id, tuning.clone()))
        };

        let inner = Rc::new(RefCell::new(Dashboard::new(config, factory).map_err(to_js)?));
        let on_leader: LeaderCallback = Rc::new(RefCell::new(None));

        let state = Rc::new(DrainState::new(&inner, Rc::clone(&on_leader)));
        inner.borrow_mut().set_waker(move || {
            if !state.request() {
                return;
            }
            let state = Rc::clone(&state);
            spawn_local(async move {
                state.drain();
            });
        });

        Ok(Self { inner, on_leader })
    }

    /// Fetch the catalog from `endpoint` and mount it. Resolves to the
    /// number of tiles that attached.
    pub fn load(&self, endpoint: String) -> js_sys::Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let result = FetchCatalog::new(endpoint).fetch().await;
            let attached = inner.borrow_mut().apply_catalog(result).map_err(to_js)?;
            Ok(JsValue::from(attached as u32))
        })
    }

    /// Mount a catalog given as JSON (`[{ "id": 1, "url": "..." }]`)
    #[wasm_bindgen(js_name = mountStreams)]
    pub fn mount_streams(&self, json: &str) -> Result<u32, JsValue> {
        let result = parse_catalog(json);
        let attached = self.inner.borrow_mut().apply_catalog(result).map_err(to_js)?;
        Ok(attached as u32)
    }

    /// Play every tile. Returns the dispatch report.
    #[wasm_bindgen(js_name = playAll)]
    pub fn play_all(&self) -> Result<JsValue, JsValue> {
        let report = self.inner.borrow_mut().play_all();
        to_js_value(&report)
    }

    #[wasm_bindgen(js_name = pauseAll)]
    pub fn pause_all(&self) -> Result<JsValue, JsValue> {
        let report = self.inner.borrow_mut().pause_all();
        to_js_value(&report)
    }

    #[wasm_bindgen(js_name = seekTo)]
    pub fn seek_to(&self, stream_id: u32, position: f64) -> Result<(), JsValue> {
        self.inner.borrow_mut().seek_to(stream_id, position).map_err(to_js)
    }

    /// Point one tile at a new locator. Returns the playback path used.
    #[wasm_bindgen(js_name = setSource)]
    pub fn set_source(&self, stream_id: u32, url: &str) -> Result<String, JsValue> {
        let support = self.inner.borrow_mut().set_source(stream_id, url).map_err(to_js)?;
        Ok(format!("{support:?}").to_lowercase())
    }

    #[wasm_bindgen(js_name = leaderPosition)]
    pub fn leader_position(&self) -> f64 {
        self.inner.borrow().leader_position()
    }

    #[wasm_bindgen(js_name = leaderStream)]
    pub fn leader_stream(&self) -> Option<u32> {
        self.inner.borrow().leader().map(|s| s.descriptor().id)
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.inner.borrow().snapshot();
        to_js_value(&snapshot)
    }

    pub fn status(&self) -> Result<JsValue, JsValue> {
        to_js_value(self.inner.borrow().status())
    }

    /// Register `callback(position)` for leader position changes
    #[wasm_bindgen(js_name = onLeaderPosition)]
    pub fn on_leader_position(&self, callback: Function) {
        *self.on_leader.borrow_mut() = Some(callback);
    }

    /// Process queued reports now. Returns the number handled.
    pub fn drain(&self) -> u32 {
        self.inner.borrow_mut().drain() as u32
    }

    /// Detach every tile and remove the video elements
    pub fn unmount(&self) {
        self.inner.borrow_mut().unmount();
    }
}
