//! collection-unfolder — forwards updated content collections to the
//! collection writer and, when the writer accepts, unfolds the membership
//! delta into one publication event per affected item on the
//! post-publication queue. Items that left the collection are announced as
//! tombstones (no payload).

pub mod config;
pub mod differ;
pub mod error;
pub mod forwarder;
pub mod health;
pub mod producer;
pub mod relations;
pub mod resolver;
pub mod routing;
pub mod trans_id;
pub mod unfolder;
