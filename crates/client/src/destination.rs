//! HTTP destination client issuing capability invocations.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use caravel_core::auth::Authorization;
use caravel_core::cid::{PartCid, UploadCid};
use caravel_core::receipt::Receipt;
use caravel_pipeline::traits::{DestinationClient, InvokeError};
use reqwest::Url;
use serde::Serialize;
use serde_json::{Value, json};

/// Issues `part/register` and `upload/register` invocations against the
/// destination's invocation bridge and decodes the signed receipts.
///
/// The bridge performs the actual capability encoding and signing; this
/// client only names the operation, the target namespace, and the proofs.
#[derive(Clone)]
pub struct HttpDestinationClient {
    http: reqwest::Client,
    api_url: Url,
    space: String,
    auth: Authorization,
}

/// Wire shape POSTed to the bridge.
#[derive(Debug, Serialize)]
struct InvocationRequest<'a> {
    op: &'a str,
    with: &'a str,
    args: Value,
    prf: &'a [Value],
}

impl HttpDestinationClient {
    pub fn new(api_url: &str, space: &str, auth: Authorization) -> Result<Self> {
        let api_url =
            Url::parse(api_url).map_err(|e| ClientError::InvalidUrl(format!("api URL: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_url,
            space: space.to_string(),
            auth,
        })
    }

    async fn invoke(&self, op: &str, args: Value) -> std::result::Result<Receipt, InvokeError> {
        let request = InvocationRequest {
            op,
            with: &self.space,
            args,
            prf: self.auth.proofs(),
        };
        let response = self
            .http
            .post(self.api_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokeError::Transport(format!(
                "invocation bridge returned HTTP {status}"
            )));
        }
        response
            .json::<Receipt>()
            .await
            .map_err(|e| InvokeError::Transport(format!("undecodable receipt: {e}")))
    }
}

#[async_trait]
impl DestinationClient for HttpDestinationClient {
    async fn register_part(
        &self,
        part: &PartCid,
        size: u64,
    ) -> std::result::Result<Receipt, InvokeError> {
        tracing::debug!(part = %part, size, "registering part");
        self.invoke(
            "part/register",
            json!({ "link": part.as_str(), "size": size }),
        )
        .await
    }

    async fn register_upload(
        &self,
        root: &UploadCid,
        shards: &[PartCid],
    ) -> std::result::Result<Receipt, InvokeError> {
        tracing::debug!(upload = %root, shards = shards.len(), "registering upload");
        let shards: Vec<&str> = shards.iter().map(PartCid::as_str).collect();
        self.invoke(
            "upload/register",
            json!({ "root": root.as_str(), "shards": shards }),
        )
        .await
    }
}
