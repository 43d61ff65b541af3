//! Publication-event shaping and queue publishing.
//!
//! One message is produced per notify-set entry. Members that are still in
//! the collection (or the parent item) carry the full resolved content
//! document as `payload`; members that left the collection are announced as
//! tombstones with the `payload` field omitted entirely. Consumers interpret
//! an absent payload as "this item left the collection" — this omission is
//! part of the wire contract.
//!
//! Messages are fanned out independently: a failed publish is logged with
//! the affected uuid and transaction id and never aborts the remaining
//! sends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::warn;
use uuid::Uuid;

use crate::differ::MembershipDelta;
use crate::error::UnfolderError;
use crate::resolver::ContentRecord;
use crate::trans_id::TRANSACTION_ID_HEADER;

const CONTENT_URI_BASE: &str = "http://collection-unfolder.svc.local/content/";
const MESSAGE_TYPE: &str = "cms-content-published";
const ORIGIN_SYSTEM_ID: &str = "http://systems.local/cms-publisher";

/// A fully shaped queue message: string headers plus a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Single-shot delivery attempt; no retries.
    async fn publish(&self, message: QueueMessage) -> Result<(), UnfolderError>;
}

/// Publisher posting messages to the message-queue HTTP proxy as
/// `{"headers": {...}, "body": "..."}` on the configured topic.
pub struct HttpMessagePublisher {
    client: reqwest::Client,
    topic_uri: String,
}

impl HttpMessagePublisher {
    pub fn new(client: reqwest::Client, proxy_uri: &str, topic: &str) -> Self {
        Self {
            client,
            topic_uri: format!("{}/topics/{topic}", proxy_uri.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl MessagePublisher for HttpMessagePublisher {
    async fn publish(&self, message: QueueMessage) -> Result<(), UnfolderError> {
        let envelope = serde_json::json!({
            "headers": message.headers,
            "body": message.body,
        });
        let resp = self
            .client
            .post(&self.topic_uri)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                UnfolderError::Gateway(format!(
                    "error posting to queue proxy at [{}]: {e}",
                    self.topic_uri
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UnfolderError::Gateway(format!(
                "queue proxy at [{}] responded with status [{status}]",
                self.topic_uri
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicationMessageBody<'a> {
    uuid: String,
    content_uri: String,
    last_modified: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a ContentRecord>,
}

pub struct ContentProducer {
    publisher: Arc<dyn MessagePublisher>,
}

impl ContentProducer {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }

    /// Shape one message per notify-set entry and fan them out. Individual
    /// failures are logged and swallowed; the caller's response is fixed by
    /// the write gate before this runs.
    pub async fn send(
        &self,
        tid: &str,
        last_modified: &str,
        notify: &MembershipDelta,
        contents: &[ContentRecord],
    ) {
        let mut tasks = JoinSet::new();
        for (uuid, message) in build_messages(tid, last_modified, notify, contents) {
            let publisher = Arc::clone(&self.publisher);
            let tid = tid.to_string();
            tasks.spawn(async move {
                if let Err(e) = publisher.publish(message).await {
                    warn!(%uuid, %tid, "unable to publish message: {e}");
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }
}

/// Build the outbound messages for a notify set. Entries with
/// `removed = false` whose content document did not come back from the
/// resolver are skipped with a warning; that is a resolvable inconsistency,
/// not a fatal error.
fn build_messages(
    tid: &str,
    last_modified: &str,
    notify: &MembershipDelta,
    contents: &[ContentRecord],
) -> Vec<(Uuid, QueueMessage)> {
    let by_uuid: HashMap<Uuid, &ContentRecord> = contents
        .iter()
        .filter_map(|record| record_uuid(record).map(|uuid| (uuid, record)))
        .collect();

    let mut messages = Vec::with_capacity(notify.len());
    for (&uuid, &removed) in notify {
        let payload = if removed {
            None
        } else {
            match by_uuid.get(&uuid) {
                Some(record) => Some(*record),
                None => {
                    warn!(%uuid, tid, "skipping message, no resolved content for uuid");
                    continue;
                }
            }
        };

        let body = PublicationMessageBody {
            uuid: uuid.to_string(),
            content_uri: format!("{CONTENT_URI_BASE}{uuid}"),
            last_modified,
            payload,
        };
        let body = match serde_json::to_string(&body) {
            Ok(body) => body,
            Err(e) => {
                warn!(%uuid, tid, "skipping message, could not serialize body: {e}");
                continue;
            }
        };

        messages.push((uuid, QueueMessage {
            headers: message_headers(tid, last_modified),
            body,
        }));
    }
    messages
}

fn record_uuid(record: &ContentRecord) -> Option<Uuid> {
    record
        .get("uuid")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn message_headers(tid: &str, last_modified: &str) -> HashMap<String, String> {
    HashMap::from([
        (TRANSACTION_ID_HEADER.to_string(), tid.to_string()),
        ("Message-Timestamp".to_string(), last_modified.to_string()),
        ("Message-Id".to_string(), Uuid::new_v4().to_string()),
        ("Message-Type".to_string(), MESSAGE_TYPE.to_string()),
        ("Origin-System-Id".to_string(), ORIGIN_SYSTEM_ID.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const LAST_MODIFIED: &str = "2024-03-01T12:00:00.000Z";

    fn record_for(uuid: Uuid) -> ContentRecord {
        let mut record = ContentRecord::new();
        record.insert("uuid".into(), serde_json::Value::String(uuid.to_string()));
        record.insert("title".into(), serde_json::Value::String("A title".into()));
        record
    }

    fn body_json(message: &QueueMessage) -> serde_json::Value {
        serde_json::from_str(&message.body).expect("message body must be JSON")
    }

    #[test]
    fn retained_member_carries_full_payload() {
        let uuid = Uuid::new_v4();
        let notify = MembershipDelta::from([(uuid, false)]);
        let messages = build_messages("tid_1", LAST_MODIFIED, &notify, &[record_for(uuid)]);

        assert_eq!(messages.len(), 1);
        let body = body_json(&messages[0].1);
        assert_eq!(body["uuid"], uuid.to_string());
        assert_eq!(body["lastModified"], LAST_MODIFIED);
        assert_eq!(body["payload"]["title"], "A title");
        assert_eq!(
            body["contentUri"],
            format!("{CONTENT_URI_BASE}{uuid}")
        );
    }

    #[test]
    fn removed_member_becomes_a_tombstone_without_payload() {
        let uuid = Uuid::new_v4();
        let notify = MembershipDelta::from([(uuid, true)]);
        let messages = build_messages("tid_1", LAST_MODIFIED, &notify, &[]);

        assert_eq!(messages.len(), 1);
        let body = body_json(&messages[0].1);
        assert_eq!(body["uuid"], uuid.to_string());
        assert!(
            body.get("payload").is_none(),
            "tombstone must omit the payload field entirely"
        );
    }

    #[test]
    fn unresolved_member_is_skipped() {
        let (resolved, unresolved) = (Uuid::new_v4(), Uuid::new_v4());
        let notify = MembershipDelta::from([(resolved, false), (unresolved, false)]);
        let messages = build_messages("tid_1", LAST_MODIFIED, &notify, &[record_for(resolved)]);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, resolved);
    }

    #[test]
    fn headers_carry_tid_timestamp_and_fresh_message_id() {
        let uuid = Uuid::new_v4();
        let notify = MembershipDelta::from([(uuid, true)]);
        let first = build_messages("tid_1", LAST_MODIFIED, &notify, &[]);
        let second = build_messages("tid_1", LAST_MODIFIED, &notify, &[]);

        let headers = &first[0].1.headers;
        assert_eq!(headers[TRANSACTION_ID_HEADER], "tid_1");
        assert_eq!(headers["Message-Timestamp"], LAST_MODIFIED);
        assert_eq!(headers["Message-Type"], MESSAGE_TYPE);
        assert_eq!(headers["Origin-System-Id"], ORIGIN_SYSTEM_ID);
        assert_ne!(
            headers["Message-Id"], second[0].1.headers["Message-Id"],
            "message ids must be globally unique per event"
        );
    }

    #[test]
    fn record_without_uuid_field_is_ignored() {
        let uuid = Uuid::new_v4();
        let notify = MembershipDelta::from([(uuid, false)]);
        let messages = build_messages("tid_1", LAST_MODIFIED, &notify, &[ContentRecord::new()]);
        assert!(messages.is_empty());
    }

    struct FlakyPublisher {
        sent: Mutex<Vec<QueueMessage>>,
        fail_uuid: Uuid,
    }

    #[async_trait]
    impl MessagePublisher for FlakyPublisher {
        async fn publish(&self, message: QueueMessage) -> Result<(), UnfolderError> {
            if message.body.contains(&self.fail_uuid.to_string()) {
                return Err(UnfolderError::Gateway("queue rejected message".into()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failed_publish_does_not_abort_the_rest() {
        let (ok_a, failing, ok_b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let publisher = Arc::new(FlakyPublisher {
            sent: Mutex::new(Vec::new()),
            fail_uuid: failing,
        });
        let producer = ContentProducer::new(Arc::clone(&publisher) as Arc<dyn MessagePublisher>);

        let notify = MembershipDelta::from([(ok_a, true), (failing, true), (ok_b, true)]);
        producer.send("tid_1", LAST_MODIFIED, &notify, &[]).await;

        assert_eq!(publisher.sent.lock().unwrap().len(), 2);
    }
}
