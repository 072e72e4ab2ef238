//! Streaming byte pass-through to destination-chosen URLs.

use async_trait::async_trait;
use caravel_pipeline::traits::{ByteStream, CopyError, PartCopier};
use reqwest::header::CONTENT_LENGTH;
use std::collections::BTreeMap;

/// PUTs fetched part bodies to presigned destination URLs.
///
/// The body stream is handed to reqwest as-is, so bytes flow from the
/// gateway response straight into the PUT without intermediate buffering.
#[derive(Clone, Default)]
pub struct HttpPartCopier {
    http: reqwest::Client,
}

impl HttpPartCopier {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PartCopier for HttpPartCopier {
    async fn copy(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content_length: u64,
        body: ByteStream,
    ) -> Result<u16, CopyError> {
        tracing::debug!(%url, content_length, "copying part bytes");
        let mut request = self
            .http
            .put(url)
            .header(CONTENT_LENGTH, content_length)
            .body(reqwest::Body::wrap_stream(body));
        for (name, value) in headers {
            // The advertised length must match the streamed body.
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CopyError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}
