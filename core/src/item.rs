//! Collectible items and the QR token lookup table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the four collectible items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKey {
    #[serde(rename = "item_1")]
    Item1,
    #[serde(rename = "item_2")]
    Item2,
    #[serde(rename = "item_3")]
    Item3,
    #[serde(rename = "item_4")]
    Item4,
}

impl ItemKey {
    pub const ALL: [ItemKey; 4] = [
        ItemKey::Item1,
        ItemKey::Item2,
        ItemKey::Item3,
        ItemKey::Item4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKey::Item1 => "item_1",
            ItemKey::Item2 => "item_2",
            ItemKey::Item3 => "item_3",
            ItemKey::Item4 => "item_4",
        }
    }

    /// Zero-based slot, for indexing fixed arrays.
    pub fn index(self) -> usize {
        match self {
            ItemKey::Item1 => 0,
            ItemKey::Item2 => 1,
            ItemKey::Item3 => 2,
            ItemKey::Item4 => 3,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownItemKey(pub String);

impl fmt::Display for UnknownItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown item key '{}' (expected item_1..item_4)", self.0)
    }
}

impl std::error::Error for UnknownItemKey {}

impl FromStr for ItemKey {
    type Err = UnknownItemKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKey::ALL
            .into_iter()
            .find(|item| item.as_str() == s)
            .ok_or_else(|| UnknownItemKey(s.to_string()))
    }
}

/// Static, injective map from scanned QR payloads to items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrTable {
    entries: HashMap<String, ItemKey>,
}

/// Pairs that would break the one-token-one-item mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrTableError {
    #[error("tokens '{first}' and '{second}' both map to {item}")]
    DuplicateItem {
        item: ItemKey,
        first: String,
        second: String,
    },
    #[error("token '{token}' maps to both {first} and {second}")]
    DuplicateToken {
        token: String,
        first: ItemKey,
        second: ItemKey,
    },
}

impl QrTable {
    /// Builds a table. Each token names exactly one item and each item is
    /// named by exactly one token; repeating an identical pair is allowed.
    pub fn new<I, S>(pairs: I) -> Result<Self, QrTableError>
    where
        I: IntoIterator<Item = (S, ItemKey)>,
        S: Into<String>,
    {
        let mut entries = HashMap::new();
        let mut owners: HashMap<ItemKey, String> = HashMap::new();
        for (token, item) in pairs {
            let token = token.into();
            if let Some(&first) = entries.get(&token)
                && first != item
            {
                return Err(QrTableError::DuplicateToken {
                    token,
                    first,
                    second: item,
                });
            }
            if let Some(first) = owners.get(&item)
                && *first != token
            {
                return Err(QrTableError::DuplicateItem {
                    item,
                    first: first.clone(),
                    second: token,
                });
            }
            owners.insert(item, token.clone());
            entries.insert(token, item);
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, token: &str) -> Option<ItemKey> {
        self.entries.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QrTable {
    fn default() -> Self {
        Self {
            entries: crate::config::default_qr_codes().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn item_key_round_trips_through_str() {
        for item in ItemKey::ALL {
            assert_eq!(item.as_str().parse::<ItemKey>(), Ok(item));
        }
        assert!("item_5".parse::<ItemKey>().is_err());
        assert_eq!(ItemKey::Item4.index(), 3);
    }

    #[test]
    fn item_key_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&ItemKey::Item2).unwrap(),
            r#""item_2""#
        );
    }

    #[test]
    fn default_table_maps_campaign_codes() {
        let table = QrTable::default();
        assert_eq!(table.len(), 4);
        assert_eq!(table.lookup("h4f9k2w7p1xR"), Some(ItemKey::Item1));
        assert_eq!(table.lookup("z8m3n6v2b9qE"), Some(ItemKey::Item2));
        assert_eq!(table.lookup("a1s7d4f2g9kL"), Some(ItemKey::Item3));
        assert_eq!(table.lookup("p5o8i3u7y2tW"), Some(ItemKey::Item4));
        assert_eq!(table.lookup("h4f9k2w7p1xr"), None);
    }

    #[test]
    fn duplicate_item_is_rejected() {
        let err = QrTable::new([("aaa", ItemKey::Item1), ("bbb", ItemKey::Item1)]).unwrap_err();
        assert_eq!(
            err,
            QrTableError::DuplicateItem {
                item: ItemKey::Item1,
                first: "aaa".to_string(),
                second: "bbb".to_string(),
            }
        );
    }

    #[test]
    fn token_claiming_two_items_is_rejected() {
        let err = QrTable::new([("aaa", ItemKey::Item1), ("aaa", ItemKey::Item2)]).unwrap_err();
        assert_eq!(
            err,
            QrTableError::DuplicateToken {
                token: "aaa".to_string(),
                first: ItemKey::Item1,
                second: ItemKey::Item2,
            }
        );
        assert_eq!(err.to_string(), "token 'aaa' maps to both item_1 and item_2");
    }

    #[test]
    fn repeated_identical_pair_is_accepted() {
        let table = QrTable::new([("aaa", ItemKey::Item3), ("aaa", ItemKey::Item3)]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("aaa"), Some(ItemKey::Item3));
    }
}
