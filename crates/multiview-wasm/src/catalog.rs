//! Catalog fetched with the browser's `fetch`

use crate::hls_engine::js_message;
use async_trait::async_trait;
use multiview_core::{parse_catalog, CatalogProvider, Error, Result, StreamDescriptor};
use tracing::info;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

/// `{ id, url }` catalog served by the page's backend
#[derive(Debug, Clone)]
pub struct FetchCatalog {
    endpoint: String,
}

impl FetchCatalog {
    /// `endpoint` may be relative to the page, e.g. `/api/streams`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

fn fetch_error(e: wasm_bindgen::JsValue) -> Error {
    Error::CatalogFetch(js_message(&e))
}

#[async_trait(?Send)]
impl CatalogProvider for FetchCatalog {
    async fn fetch(&self) -> Result<Vec<StreamDescriptor>> {
        let window = web_sys::window().ok_or_else(|| Error::CatalogFetch("no window".into()))?;

        let response: Response = JsFuture::from(window.fetch_with_str(&self.endpoint))
            .await
            .map_err(fetch_error)?
            .dyn_into()
            .map_err(|_| Error::CatalogFetch("fetch did not return a Response".into()))?;

        if !response.ok() {
            return Err(Error::CatalogFetch(format!(
                "HTTP {} {}",
                response.status(),
                response.status_text()
            )));
        }

        let body = JsFuture::from(response.text().map_err(fetch_error)?)
            .await
            .map_err(fetch_error)?
            .as_string()
            .ok_or_else(|| Error::CatalogDecode("response body is not text".into()))?;

        let streams = parse_catalog(&body)?;
        info!(endpoint = %self.endpoint, streams = streams.len(), "Catalog fetched");
        Ok(streams)
    }
}
