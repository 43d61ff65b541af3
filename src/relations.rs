//! Client for the relations API, which knows the previously recorded state
//! of a collection: the items it contained and the item containing it.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::UnfolderError;
use crate::trans_id::TRANSACTION_ID_HEADER;

/// Previously recorded relations of a collection. `contained_in` is the
/// parent item (e.g. a lead article) holding this collection, when one
/// exists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionRelations {
    #[serde(deserialize_with = "uuid_or_empty")]
    pub contained_in: Option<Uuid>,
    pub contains: Vec<Uuid>,
}

/// The relations API reports a missing parent as either an absent field or
/// an empty string; both mean "no parent".
fn uuid_or_empty<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[async_trait]
pub trait RelationsResolver: Send + Sync {
    /// Fetch the recorded relations for a collection. A 404 from the API
    /// means no prior state and yields empty relations, not an error.
    async fn resolve(
        &self,
        collection_uuid: Uuid,
        tid: &str,
    ) -> Result<CollectionRelations, UnfolderError>;
}

pub struct HttpRelationsResolver {
    client: reqwest::Client,
    /// URI template with a `{uuid}` placeholder.
    uri_template: String,
}

impl HttpRelationsResolver {
    pub fn new(client: reqwest::Client, uri_template: String) -> Self {
        Self {
            client,
            uri_template,
        }
    }

    fn build_uri(&self, collection_uuid: Uuid) -> String {
        self.uri_template
            .replacen("{uuid}", &collection_uuid.to_string(), 1)
    }
}

#[async_trait]
impl RelationsResolver for HttpRelationsResolver {
    async fn resolve(
        &self,
        collection_uuid: Uuid,
        tid: &str,
    ) -> Result<CollectionRelations, UnfolderError> {
        let uri = self.build_uri(collection_uuid);
        let resp = self
            .client
            .get(&uri)
            .header(TRANSACTION_ID_HEADER, tid)
            .header("Content-Type", "application/json; charset=utf-8")
            .send()
            .await
            .map_err(|e| {
                UnfolderError::Gateway(format!("error calling relations api at [{uri}]: {e}"))
            })?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| {
            UnfolderError::Gateway(format!("could not read relations api response: {e}"))
        })?;

        interpret_response(&uri, status, &body)
    }
}

fn interpret_response(
    uri: &str,
    status: u16,
    body: &[u8],
) -> Result<CollectionRelations, UnfolderError> {
    if status == 404 {
        return Ok(CollectionRelations::default());
    }
    if status != 200 {
        return Err(UnfolderError::Gateway(format!(
            "relations api at [{uri}] responded with status [{status}]: {}",
            String::from_utf8_lossy(body)
        )));
    }
    serde_json::from_slice(body).map_err(|e| {
        UnfolderError::Gateway(format!("could not parse relations api response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_means_no_prior_state() {
        let relations = interpret_response("http://x", 404, b"not found").unwrap();
        assert_eq!(relations, CollectionRelations::default());
    }

    #[test]
    fn non_ok_status_is_a_gateway_error() {
        let err = interpret_response("http://x", 503, b"down").unwrap_err();
        assert!(matches!(err, UnfolderError::Gateway(_)));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn parses_relations_body() {
        let parent = Uuid::new_v4();
        let member = Uuid::new_v4();
        let body = format!(r#"{{"containedIn":"{parent}","contains":["{member}"]}}"#);

        let relations = interpret_response("http://x", 200, body.as_bytes()).unwrap();
        assert_eq!(relations.contained_in, Some(parent));
        assert_eq!(relations.contains, vec![member]);
    }

    #[test]
    fn empty_contained_in_means_no_parent() {
        let relations =
            interpret_response("http://x", 200, br#"{"containedIn":"","contains":[]}"#).unwrap();
        assert_eq!(relations.contained_in, None);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let relations = interpret_response("http://x", 200, b"{}").unwrap();
        assert_eq!(relations.contained_in, None);
        assert!(relations.contains.is_empty());
    }

    #[test]
    fn malformed_body_is_a_gateway_error() {
        let err = interpret_response("http://x", 200, b"<html>").unwrap_err();
        assert!(matches!(err, UnfolderError::Gateway(_)));
    }

    #[test]
    fn uri_template_substitution() {
        let resolver = HttpRelationsResolver::new(
            reqwest::Client::new(),
            "http://host/contentcollection/{uuid}/relations".into(),
        );
        let uuid = Uuid::new_v4();
        assert_eq!(
            resolver.build_uri(uuid),
            format!("http://host/contentcollection/{uuid}/relations")
        );
    }
}
