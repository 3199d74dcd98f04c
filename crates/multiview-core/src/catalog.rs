//! Stream catalog providers
//!
//! The catalog is an ordered list of `{ id, url }` records. Order matters:
//! the default leader policy picks the first entry.

use crate::{Error, Result, StreamDescriptor};
use async_trait::async_trait;
use std::collections::HashSet;

/// Source of the ordered stream list
#[async_trait(?Send)]
pub trait CatalogProvider {
    /// Fetch the catalog in display order
    async fn fetch(&self) -> Result<Vec<StreamDescriptor>>;
}

/// Decode a catalog JSON document (`[{ "id": 1, "url": "..." }, ...]`)
pub fn parse_catalog(json: &str) -> Result<Vec<StreamDescriptor>> {
    let streams: Vec<StreamDescriptor> =
        serde_json::from_str(json).map_err(|e| Error::CatalogDecode(e.to_string()))?;
    validate_catalog(&streams)?;
    Ok(streams)
}

/// Sessions are keyed by catalog id, so ids must be unique
pub fn validate_catalog(streams: &[StreamDescriptor]) -> Result<()> {
    let mut seen = HashSet::with_capacity(streams.len());
    for stream in streams {
        if !seen.insert(stream.id) {
            return Err(Error::CatalogDecode(format!("duplicate stream id {}", stream.id)));
        }
    }
    Ok(())
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticCatalog {
    streams: Vec<StreamDescriptor>,
}

impl StaticCatalog {
    pub fn new(streams: Vec<StreamDescriptor>) -> Self {
        Self { streams }
    }

    /// Build from bare locators, numbering ids from 1
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let streams = urls
            .into_iter()
            .zip(1..)
            .map(|(url, id)| StreamDescriptor::new(id, url))
            .collect();
        Self { streams }
    }

    /// The six locally proxied streams served under `/hls`
    pub fn local() -> Self {
        Self::from_urls((1..=6).map(|i| format!("/hls/stream{i}/index.m3u8")))
    }

    /// Public live test streams, useful without a local packager
    pub fn public_test_streams() -> Self {
        Self::from_urls([
            "https://cph-p2p-msl.akamaized.net/hls/live/2000341/test/master.m3u8",
            "https://moctobpltc-i.akamaihd.net/hls/live/571329/eight/playlist.m3u8",
            "https://pl.it-dev.info/node/free-hls-for-testing/chunks.m3u8",
            "https://pl.it-dev.info/node/free-hls-for-testing/chunks.m3u8",
            "https://moctobpltc-i.akamaihd.net/hls/live/571329/eight/playlist.m3u8",
            "https://cph-p2p-msl.akamaized.net/hls/live/2000341/test/master.m3u8",
        ])
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }
}

#[async_trait(?Send)]
impl CatalogProvider for StaticCatalog {
    async fn fetch(&self) -> Result<Vec<StreamDescriptor>> {
        Ok(self.streams.clone())
    }
}

#[cfg(feature = "http")]
pub use http::HttpCatalog;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use crate::config::CatalogConfig;
    use reqwest::Client;
    use std::time::Duration;
    use tracing::{info, instrument};
    use url::Url;

    /// Catalog served over HTTP as JSON
    #[derive(Debug, Clone)]
    pub struct HttpCatalog {
        endpoint: Url,
        client: Client,
    }

    impl HttpCatalog {
        pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
            let endpoint = Url::parse(endpoint)
                .map_err(|e| Error::InvalidConfig(format!("catalog endpoint '{endpoint}': {e}")))?;
            let client = Client::builder().timeout(timeout).build()?;
            Ok(Self { endpoint, client })
        }

        /// Build from configuration; fails when no endpoint is configured
        pub fn from_config(config: &CatalogConfig) -> Result<Self> {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| Error::InvalidConfig("no catalog endpoint configured".into()))?;
            Self::new(endpoint, Duration::from_millis(config.request_timeout_ms))
        }

        pub fn endpoint(&self) -> &Url {
            &self.endpoint
        }

        /// Origin of the endpoint, the natural base for root-relative locators
        pub fn origin(&self) -> Option<Url> {
            self.endpoint.join("/").ok()
        }
    }

    #[async_trait(?Send)]
    impl CatalogProvider for HttpCatalog {
        #[instrument(skip(self), fields(endpoint = %self.endpoint))]
        async fn fetch(&self) -> Result<Vec<StreamDescriptor>> {
            let response = self
                .client
                .get(self.endpoint.clone())
                .send()
                .await
                .map_err(|e| Error::CatalogFetch(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::CatalogFetch(format!("HTTP {status}")));
            }

            let body = response
                .text()
                .await
                .map_err(|e| Error::CatalogFetch(e.to_string()))?;
            let streams = parse_catalog(&body)?;

            info!(streams = streams.len(), "Catalog fetched");
            Ok(streams)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let streams = parse_catalog(
            r#"[{ "id": 1, "url": "/hls/stream1/index.m3u8" }, { "id": 2, "url": "/hls/stream2/index.m3u8" }]"#,
        )
        .unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[1], StreamDescriptor::new(2, "/hls/stream2/index.m3u8"));
    }

    #[test]
    fn test_parse_rejects_bad_documents() {
        assert!(matches!(parse_catalog("{}"), Err(Error::CatalogDecode(_))));
        assert!(matches!(
            parse_catalog(r#"[{ "id": 1, "url": "/a.m3u8" }, { "id": 1, "url": "/b.m3u8" }]"#),
            Err(Error::CatalogDecode(_))
        ));
    }

    #[test]
    fn test_local_catalog() {
        let catalog = StaticCatalog::local();
        assert_eq!(catalog.streams().len(), 6);
        assert_eq!(catalog.streams()[0], StreamDescriptor::new(1, "/hls/stream1/index.m3u8"));
        assert_eq!(catalog.streams()[5].id, 6);
    }

    #[test]
    fn test_static_fetch() {
        let catalog = StaticCatalog::public_test_streams();
        let streams = tokio_test::block_on(catalog.fetch()).unwrap();
        assert_eq!(streams.len(), 6);
        assert!(validate_catalog(&streams).is_ok());
    }
}
