//! Transaction-id propagation.
//!
//! Every inbound request is tagged with an `X-Request-Id`; if the caller did
//! not supply one, a fresh `tid_` id is generated. The id is echoed on the
//! response and forwarded on every outbound call so failures can be
//! correlated across services.

use axum::http::HeaderMap;
use uuid::Uuid;

pub const TRANSACTION_ID_HEADER: &str = "X-Request-Id";

/// Extract the transaction id from the request headers, generating a fresh
/// one when the header is absent or empty.
pub fn from_headers(headers: &HeaderMap) -> String {
    headers
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_transaction_id)
}

pub fn new_transaction_id() -> String {
    format!("tid_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn propagates_existing_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSACTION_ID_HEADER, HeaderValue::from_static("tid_abc"));
        assert_eq!(from_headers(&headers), "tid_abc");
    }

    #[test]
    fn generates_when_missing() {
        let tid = from_headers(&HeaderMap::new());
        assert!(tid.starts_with("tid_"));
        assert!(tid.len() > 4);
    }

    #[test]
    fn generates_when_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSACTION_ID_HEADER, HeaderValue::from_static(""));
        assert!(from_headers(&headers).starts_with("tid_"));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_transaction_id(), new_transaction_id());
    }
}
