//! Expiring key/value persistence for campaign state.
//!
//! Every write carries its own time-to-live, so a record made of several
//! keys can expire piecemeal. Readers treat a missing or expired key the
//! same way: the value is simply absent.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: mutex-guarded map, used by tests and embedders that
//!   manage persistence themselves.
//! - [`CookieJar`]: a JSON file with per-entry expiry, used by the CLI.

mod cookie_jar;
mod memory;

pub use cookie_jar::CookieJar;
pub use memory::MemoryStore;
#[cfg(test)]
pub(crate) use memory::tests::ManualClock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::item::ItemKey;

/// Errors from store writes. Reads never fail; see [`PersistentStore::get`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Lifetime of a stored value, measured from the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Expires this many days after the write.
    Days(u32),
    /// Kept until explicitly deleted.
    Indefinite,
}

impl Ttl {
    /// Absolute expiry for a write happening at `now`.
    pub fn expires_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Ttl::Days(days) => Some(now + Duration::days(i64::from(days))),
            Ttl::Indefinite => None,
        }
    }
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Key/value persistence with per-write expiry.
///
/// All values are strings. Implementations must be safe to share between
/// the collection state and the token manager.
pub trait PersistentStore: Send + Sync {
    /// Returns the value, or `None` when the key is missing, expired or
    /// cannot be read. Never fails.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes `value`, readable until `ttl` elapses.
    fn set(&self, key: &str, value: &str, ttl: Ttl) -> Result<(), StoreError>;

    /// Removes `key`; subsequent reads return `None` immediately.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Serializes a flag as the literal `"true"` / `"false"`.
pub fn encode_flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Decodes a stored flag. Only the exact string `"true"` is true; absent,
/// expired or malformed values all read as `false` so a damaged record
/// can only lose progress, never grant it.
pub fn decode_flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}

/// Store key names for one campaign (`{ACTID}_...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    prefix: String,
}

impl StoreKeys {
    pub fn new(actid: impl Into<String>) -> Self {
        Self {
            prefix: actid.into(),
        }
    }

    pub fn user_id(&self) -> String {
        format!("{}_user_id", self.prefix)
    }

    pub fn item_state(&self, item: ItemKey) -> String {
        format!("{}_{}_state", self.prefix, item.as_str())
    }

    pub fn redeem_state(&self) -> String {
        format!("{}_redeem_state", self.prefix)
    }

    pub fn token(&self) -> String {
        format!("{}_token", self.prefix)
    }

    /// Every key the campaign writes, token included.
    pub fn all(&self) -> Vec<String> {
        let mut keys = vec![self.user_id()];
        keys.extend(ItemKey::ALL.iter().map(|item| self.item_state(*item)));
        keys.push(self.redeem_state());
        keys.push(self.token());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flag_codec_is_exact() {
        assert_eq!(encode_flag(true), "true");
        assert_eq!(encode_flag(false), "false");

        assert!(decode_flag(Some("true")));
        assert!(!decode_flag(Some("false")));
        assert!(!decode_flag(None));
        assert!(!decode_flag(Some("TRUE")));
        assert!(!decode_flag(Some("1")));
        assert!(!decode_flag(Some(" true")));
        assert!(!decode_flag(Some("")));
    }

    #[test]
    fn store_keys_follow_campaign_prefix() {
        let keys = StoreKeys::new("web_2025_itf_forest");
        assert_eq!(keys.user_id(), "web_2025_itf_forest_user_id");
        assert_eq!(
            keys.item_state(ItemKey::Item3),
            "web_2025_itf_forest_item_3_state"
        );
        assert_eq!(keys.redeem_state(), "web_2025_itf_forest_redeem_state");
        assert_eq!(keys.token(), "web_2025_itf_forest_token");
        assert_eq!(keys.all().len(), 7);
    }

    #[test]
    fn ttl_expiry() {
        let now = Utc::now();
        assert_eq!(Ttl::Days(7).expires_at(now), Some(now + Duration::days(7)));
        assert_eq!(Ttl::Indefinite.expires_at(now), None);
    }
}
