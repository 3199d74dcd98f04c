//! Multiview WASM - Synchronized HLS grid for the browser
//!
//! Binds the dashboard core to `<video>` tiles:
//! - hls.js playback when available, native HLS otherwise
//! - Leader position propagation and follower drift correction
//! - Play/pause fan-out across all tiles
//! - Catalog loading through `fetch`
//!
//! ## Integration
//!
//! ```javascript
//! import init, { SyncDashboard } from '@multiview/wasm';
//!
//! await init();
//! const dash = new SyncDashboard(document.getElementById('grid'));
//! dash.onLeaderPosition((t) => console.log('leader at', t));
//! await dash.load('/api/streams');
//! dash.playAll();
//! ```

use multiview_core::DashboardConfig;
use wasm_bindgen::prelude::*;

mod catalog;
mod dashboard;
mod hls_engine;
mod logging;

pub use catalog::FetchCatalog;
pub use dashboard::SyncDashboard;
pub use hls_engine::HlsJsEngine;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init(tracing::Level::INFO);
    multiview_core::init();
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Whether hls.js is loaded and usable on this page
#[wasm_bindgen(js_name = hlsJsSupported)]
pub fn hls_js_supported() -> bool {
    hls_engine::library_available()
}

/// Default dashboard configuration as a plain object
#[wasm_bindgen(js_name = defaultConfig)]
pub fn default_config() -> Result<JsValue, JsValue> {
    config_to_js(&DashboardConfig::default())
}

/// Configuration for low-latency sources (0.5s tolerance)
#[wasm_bindgen(js_name = lowLatencyConfig)]
pub fn low_latency_config() -> Result<JsValue, JsValue> {
    config_to_js(&DashboardConfig::low_latency())
}

fn config_to_js(config: &DashboardConfig) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(config).map_err(|e| js_sys::Error::new(&e.to_string()).into())
}
