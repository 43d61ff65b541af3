//! Forwarding of the raw collection payload to the downstream writer.
//!
//! The writer's verdict gates all notification work: anything other than a
//! 200 is passed back to the caller verbatim and stops the pipeline.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::UnfolderError;
use crate::trans_id::TRANSACTION_ID_HEADER;

/// Status and body exactly as the writer returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwarderResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Forwarder: Send + Sync {
    /// PUT the original request body to the writer. A transport failure is a
    /// gateway error; any HTTP status, including 4xx/5xx, is a valid
    /// response to be passed through.
    async fn forward(
        &self,
        tid: &str,
        collection_uuid: Uuid,
        collection_type: &str,
        body: &[u8],
    ) -> Result<ForwarderResponse, UnfolderError>;
}

pub struct HttpForwarder {
    client: reqwest::Client,
    writer_uri: String,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client, writer_uri: String) -> Self {
        Self {
            client,
            writer_uri: writer_uri.trim_end_matches('/').to_string(),
        }
    }

    fn build_uri(&self, collection_type: &str, collection_uuid: Uuid) -> String {
        format!("{}/{collection_type}/{collection_uuid}", self.writer_uri)
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        tid: &str,
        collection_uuid: Uuid,
        collection_type: &str,
        body: &[u8],
    ) -> Result<ForwarderResponse, UnfolderError> {
        let uri = self.build_uri(collection_type, collection_uuid);
        let resp = self
            .client
            .put(&uri)
            .header("Content-Type", "application/json;charset=utf-8")
            .header(TRANSACTION_ID_HEADER, tid)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                UnfolderError::Gateway(format!("error forwarding to writer at [{uri}]: {e}"))
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| UnfolderError::Gateway(format!("could not read writer response: {e}")))?;

        Ok(ForwarderResponse {
            status,
            body: body.to_vec(),
        })
    }
}
