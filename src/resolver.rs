//! Request-payload resolution and content expansion.
//!
//! `resolve_uuids_and_date` pulls the member uuids and last-modified
//! timestamp out of the inbound collection payload. `ContentResolver`
//! expands member uuids into full content documents via the document store.

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::UnfolderError;
use crate::trans_id::TRANSACTION_ID_HEADER;

/// Opaque content document; only the `uuid` field is interpreted.
pub type ContentRecord = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct UuidsAndDate {
    pub uuids: Vec<Uuid>,
    pub last_modified: String,
}

#[derive(Debug, Deserialize)]
struct ContentCollection {
    #[serde(rename = "lastModified")]
    last_modified: String,
    #[serde(default)]
    items: Vec<CollectionItem>,
}

#[derive(Debug, Deserialize)]
struct CollectionItem {
    uuid: String,
}

/// Parse the inbound collection payload into member uuids and the
/// last-modified timestamp. Every item uuid must be syntactically valid and
/// the timestamp must be RFC 3339.
pub fn resolve_uuids_and_date(body: &[u8]) -> Result<UuidsAndDate, UnfolderError> {
    let cc: ContentCollection = serde_json::from_slice(body)
        .map_err(|e| UnfolderError::Validation(format!("unmarshalling error: {e}")))?;

    DateTime::parse_from_rfc3339(&cc.last_modified).map_err(|e| {
        UnfolderError::Validation(format!(
            "invalid lastModified value [{}]: {e}",
            cc.last_modified
        ))
    })?;

    let uuids = cc
        .items
        .iter()
        .map(|item| {
            Uuid::parse_str(&item.uuid)
                .map_err(|e| UnfolderError::Validation(format!("uuid validation error: {e}")))
        })
        .collect::<Result<Vec<Uuid>, UnfolderError>>()?;

    Ok(UuidsAndDate {
        uuids,
        last_modified: cc.last_modified,
    })
}

#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Expand the given uuids into full content documents. Only uuids still
    /// present in the source of truth should ever be passed here.
    async fn resolve_contents(
        &self,
        uuids: &[Uuid],
        tid: &str,
    ) -> Result<Vec<ContentRecord>, UnfolderError>;
}

pub struct HttpContentResolver {
    client: reqwest::Client,
    uri: String,
}

impl HttpContentResolver {
    pub fn new(client: reqwest::Client, uri: String) -> Self {
        Self { client, uri }
    }
}

#[async_trait]
impl ContentResolver for HttpContentResolver {
    async fn resolve_contents(
        &self,
        uuids: &[Uuid],
        tid: &str,
    ) -> Result<Vec<ContentRecord>, UnfolderError> {
        let query: Vec<(&str, String)> = uuids.iter().map(|u| ("uuid", u.to_string())).collect();
        let resp = self
            .client
            .get(&self.uri)
            .query(&query)
            .header(TRANSACTION_ID_HEADER, tid)
            .header("Content-Type", "application/json; charset=utf-8")
            .send()
            .await
            .map_err(|e| {
                UnfolderError::Gateway(format!(
                    "error calling content resolver at [{}]: {e}",
                    self.uri
                ))
            })?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(UnfolderError::Gateway(format!(
                "content resolver at [{}] responded with status [{status}]: {body}",
                self.uri
            )));
        }

        resp.json::<Vec<ContentRecord>>().await.map_err(|e| {
            UnfolderError::Gateway(format!("could not parse content resolver response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uuids_and_timestamp() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let body = format!(
            r#"{{"lastModified":"2024-03-01T12:00:00.000Z","items":[{{"uuid":"{a}"}},{{"uuid":"{b}"}}]}}"#
        );

        let resolved = resolve_uuids_and_date(body.as_bytes()).unwrap();
        assert_eq!(resolved.uuids, vec![a, b]);
        assert_eq!(resolved.last_modified, "2024-03-01T12:00:00.000Z");
    }

    #[test]
    fn empty_items_are_fine() {
        let body = br#"{"lastModified":"2024-03-01T12:00:00.000Z","items":[]}"#;
        let resolved = resolve_uuids_and_date(body).unwrap();
        assert!(resolved.uuids.is_empty());
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = resolve_uuids_and_date(b"{not json").unwrap_err();
        assert!(matches!(err, UnfolderError::Validation(_)));
    }

    #[test]
    fn invalid_item_uuid_is_a_validation_error() {
        let body = br#"{"lastModified":"2024-03-01T12:00:00.000Z","items":[{"uuid":"nope"}]}"#;
        let err = resolve_uuids_and_date(body).unwrap_err();
        assert!(matches!(err, UnfolderError::Validation(_)));
    }

    #[test]
    fn invalid_timestamp_is_a_validation_error() {
        let body = br#"{"lastModified":"yesterday","items":[]}"#;
        let err = resolve_uuids_and_date(body).unwrap_err();
        assert!(matches!(err, UnfolderError::Validation(_)));
        assert!(err.to_string().contains("lastModified"));
    }

    #[test]
    fn missing_last_modified_is_a_validation_error() {
        let err = resolve_uuids_and_date(br#"{"items":[]}"#).unwrap_err();
        assert!(matches!(err, UnfolderError::Validation(_)));
    }

    #[test]
    fn timestamp_with_offset_is_accepted() {
        let body = br#"{"lastModified":"2024-03-01T12:00:00.000+02:00","items":[]}"#;
        assert!(resolve_uuids_and_date(body).is_ok());
    }
}
