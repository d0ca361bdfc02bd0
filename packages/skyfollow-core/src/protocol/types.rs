//! Wire shapes the core reads from and writes to the remote protocol.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An actor as returned by directory search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorView {
    /// Decentralized identifier
    pub did: String,
    /// Full handle (e.g. `alice.bsky.social`)
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Profile statistics used for enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub did: String,
    #[serde(default)]
    pub posts_count: u64,
    #[serde(default)]
    pub followers_count: u64,
}

/// One record from a listing of the caller's own repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedRecord {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub value: serde_json::Value,
}

impl ListedRecord {
    /// The `subject` did of a follow-shaped record, if any.
    pub fn subject(&self) -> Option<&str> {
        self.value.get("subject").and_then(|s| s.as_str())
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub records: Vec<ListedRecord>,
    /// Opaque token for the next page; absent when exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// A follow record written into the caller's own collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub subject: String,
    pub created_at: String,
}

impl FollowRecord {
    /// A follow of `subject` stamped with `now`.
    pub fn new(collection: &str, subject: &str, now: DateTime<Utc>) -> Self {
        Self {
            record_type: collection.to_string(),
            subject: subject.to_string(),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
