//! HTTP part fetcher against the legacy service gateway.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use caravel_core::cid::PartCid;
use caravel_pipeline::traits::{BoxError, ByteStream, FetchError, FetchedPart, PartFetcher};
use futures::TryStreamExt;
use reqwest::Url;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Fetches part archives with `GET {gateway}/{partCid}`.
///
/// The response body is surfaced as a stream and never buffered here; the
/// pipeline forwards it chunk by chunk to the destination when demanded.
#[derive(Clone)]
pub struct HttpPartFetcher {
    http: reqwest::Client,
    gateway_url: Url,
}

impl HttpPartFetcher {
    pub fn new(gateway_url: &str) -> Result<Self> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if gateway_url.ends_with('/') {
            gateway_url.to_string()
        } else {
            format!("{gateway_url}/")
        };
        let gateway_url = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidUrl(format!("gateway URL: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            gateway_url,
        })
    }

    fn part_url(&self, part: &PartCid) -> std::result::Result<Url, FetchError> {
        self.gateway_url
            .join(part.as_str())
            .map_err(|e| FetchError::Transport(format!("building part URL: {e}")))
    }
}

#[async_trait]
impl PartFetcher for HttpPartFetcher {
    async fn fetch(
        &self,
        part: &PartCid,
        cancel: &CancellationToken,
    ) -> std::result::Result<FetchedPart, FetchError> {
        let url = self.part_url(part)?;
        tracing::debug!(part = %part, %url, "fetching part");

        let request = self.http.get(url).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = request => response.map_err(|e| FetchError::Transport(e.to_string()))?,
        };

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body: ByteStream =
            Box::pin(response.bytes_stream().map_err(|e| Box::new(e) as BoxError));

        Ok(FetchedPart {
            status,
            headers,
            body,
        })
    }
}
