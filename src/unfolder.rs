//! The unfold orchestrator: a linear pipeline run once per request.
//!
//! Order matters. The membership delta is computed from the state recorded
//! *before* the write, the writer is consulted before any notification work,
//! and a non-200 writer verdict (or a collection type outside the allow
//! list) passes the writer's response through verbatim with no events
//! emitted. Removed members are never sent to the content resolver; they are
//! announced as tombstones.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::response::Response;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::differ::diff;
use crate::error::UnfolderError;
use crate::forwarder::Forwarder;
use crate::producer::ContentProducer;
use crate::relations::RelationsResolver;
use crate::resolver::{resolve_uuids_and_date, ContentResolver};
use crate::routing::AppState;
use crate::trans_id::{self, TRANSACTION_ID_HEADER};

pub struct Unfolder {
    relations_resolver: Arc<dyn RelationsResolver>,
    forwarder: Arc<dyn Forwarder>,
    content_resolver: Arc<dyn ContentResolver>,
    producer: ContentProducer,
    whitelist: HashSet<String>,
}

impl Unfolder {
    pub fn new(
        relations_resolver: Arc<dyn RelationsResolver>,
        forwarder: Arc<dyn Forwarder>,
        content_resolver: Arc<dyn ContentResolver>,
        producer: ContentProducer,
        whitelist: HashSet<String>,
    ) -> Self {
        Self {
            relations_resolver,
            forwarder,
            content_resolver,
            producer,
            whitelist,
        }
    }

    async fn unfold(
        &self,
        tid: &str,
        collection_uuid: Uuid,
        collection_type: &str,
        body: &[u8],
    ) -> (StatusCode, Vec<u8>) {
        let uuids_and_date = match resolve_uuids_and_date(body) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(%tid, %collection_uuid, %collection_type, "error while resolving uuids: {e}");
                return error_response(&e);
            }
        };

        let relations = match self.relations_resolver.resolve(collection_uuid, tid).await {
            Ok(relations) => relations,
            Err(e) => {
                error!(%tid, %collection_uuid, %collection_type, "error while fetching old collection relations: {e}");
                return error_response(&e);
            }
        };

        let mut notify = diff(&uuids_and_date.uuids, &relations.contains);

        let fw_resp = match self
            .forwarder
            .forward(tid, collection_uuid, collection_type, body)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(%tid, %collection_uuid, %collection_type, "error during forwarding: {e}");
                return error_response(&e);
            }
        };

        // Write gate: a rejected write must never produce stale notifications.
        if fw_resp.status != 200 {
            warn!(
                tid, %collection_uuid, collection_type,
                "skip unfolding, writer returned status [{}]", fw_resp.status
            );
            return (pass_through_status(fw_resp.status), fw_resp.body);
        }

        if !self.whitelist.contains(collection_type) {
            info!(
                tid, %collection_uuid, collection_type,
                "skip unfolding, collection type not in unfolding whitelist"
            );
            return (pass_through_status(fw_resp.status), fw_resp.body);
        }

        // The parent's containment relationship changed even though its own
        // membership didn't, so it is always re-announced. Insertion takes
        // precedence over a same-uuid delta entry.
        if let Some(parent) = relations.contained_in {
            notify.insert(parent, false);
        }

        if notify.is_empty() {
            info!(
                tid, %collection_uuid, collection_type,
                "skip unfolding, no uuids to notify after diff was done"
            );
            return (StatusCode::OK, fw_resp.body);
        }

        let to_resolve: Vec<Uuid> = notify
            .iter()
            .filter(|(_, &removed)| !removed)
            .map(|(&uuid, _)| uuid)
            .collect();
        let contents = if to_resolve.is_empty() {
            Vec::new()
        } else {
            match self.content_resolver.resolve_contents(&to_resolve, tid).await {
                Ok(contents) => contents,
                Err(e) => {
                    error!(%tid, %collection_uuid, %collection_type, "error while resolving contents: {e}");
                    return error_response(&e);
                }
            }
        };

        info!(
            tid, %collection_uuid, collection_type,
            "done unfolding, sending {} message(s)", notify.len()
        );
        self.producer
            .send(tid, &uuids_and_date.last_modified, &notify, &contents)
            .await;

        (StatusCode::OK, fw_resp.body)
    }
}

/// `PUT /content-collection/{collectionType}/{uuid}`
pub async fn handle(
    State(state): State<AppState>,
    Path((collection_type, uuid)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tid = trans_id::from_headers(&headers);

    let (status, body) = match Uuid::parse_str(&uuid) {
        Ok(collection_uuid) => {
            state
                .unfolder
                .unfold(&tid, collection_uuid, &collection_type, &body)
                .await
        }
        Err(e) => {
            error!(%tid, %uuid, %collection_type, "invalid uuid in request path: {e}");
            error_response(&UnfolderError::Validation(format!(
                "invalid uuid in request path: {e}"
            )))
        }
    };

    write_response(&tid, status, body)
}

fn write_response(tid: &str, status: StatusCode, body: Vec<u8>) -> Response {
    Response::builder()
        .status(status)
        .header(TRANSACTION_ID_HEADER, tid)
        .header(CONTENT_TYPE, "application/json;charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|e| {
            error!(tid, "error building response: {e}");
            Response::new(Body::empty())
        })
}

fn error_response(err: &UnfolderError) -> (StatusCode, Vec<u8>) {
    let body = serde_json::json!({ "message": err.to_string() });
    (err.http_status(), body.to_string().into_bytes())
}

/// Map the writer's status for pass-through; anything unrepresentable is
/// reported as a bad gateway.
fn pass_through_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}
