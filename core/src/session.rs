//! Collection state for one visitor, mirrored into the persistent store.
//!
//! The in-memory [`CollectionState`] is authoritative for the session.
//! Store writes happen after the in-memory change and a failed write is
//! logged, not propagated: a later reload sees a partial record, which
//! the flag codec degrades to "not collected".

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::item::ItemKey;
use crate::store::{PersistentStore, StoreKeys, Ttl, decode_flag, encode_flag};

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Locally generated visitor identifier, `user_<millis><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
            .collect();
        Self(format!("user_{millis}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VisitorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Four item flags plus the redeemed flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    pub visitor_id: Option<VisitorId>,
    pub items: [bool; 4],
    pub redeemed: bool,
}

impl CollectionState {
    pub fn is_collected(&self, item: ItemKey) -> bool {
        self.items[item.index()]
    }

    pub fn all_collected(&self) -> bool {
        self.items.iter().all(|collected| *collected)
    }

    pub fn collected_count(&self) -> usize {
        self.items.iter().filter(|collected| **collected).count()
    }
}

/// Result of [`Session::initialize_from_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visitor {
    /// No identity stored; the caller must create one.
    New,
    /// Identity found and state hydrated.
    Returning(VisitorId),
}

/// Owns the collection state and keeps the store in step with it.
pub struct Session {
    store: Arc<dyn PersistentStore>,
    keys: StoreKeys,
    ttl: Ttl,
    state: CollectionState,
}

impl Session {
    pub fn new(store: Arc<dyn PersistentStore>, keys: StoreKeys, ttl: Ttl) -> Self {
        Self {
            store,
            keys,
            ttl,
            state: CollectionState::default(),
        }
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn visitor_id(&self) -> Option<&VisitorId> {
        self.state.visitor_id.as_ref()
    }

    pub fn keys(&self) -> &StoreKeys {
        &self.keys
    }

    /// Whether the store already records a redemption, possibly made by
    /// another handle on the same store.
    pub fn stored_redeemed(&self) -> bool {
        decode_flag(self.store.get(&self.keys.redeem_state()).as_deref())
    }

    /// Adopts a redemption recorded in the store. Returns true when the
    /// in-memory state changed.
    pub fn sync_redeemed_from_store(&mut self) -> bool {
        if self.state.redeemed || !self.stored_redeemed() {
            return false;
        }
        self.state.redeemed = true;
        self.state.items = [true; 4];
        tracing::info!("redemption recorded elsewhere for {:?}", self.state.visitor_id);
        true
    }

    /// Identity currently in the store, which may have been replaced or
    /// cleared behind this session's back.
    pub fn stored_visitor_id(&self) -> Option<VisitorId> {
        self.store.get(&self.keys.user_id()).map(VisitorId::from)
    }

    /// Hydrates from the store. Malformed or expired flags read as false.
    ///
    /// Without a stored identity the in-memory state is cleared too, so a
    /// following [`Session::create_identity`] always starts a fresh record.
    pub fn initialize_from_store(&mut self) -> Visitor {
        let Some(raw_id) = self.store.get(&self.keys.user_id()) else {
            tracing::debug!("no stored visitor identity");
            self.state = CollectionState::default();
            return Visitor::New;
        };
        let visitor_id = VisitorId::from(raw_id);

        let mut items = [false; 4];
        for item in ItemKey::ALL {
            let raw = self.store.get(&self.keys.item_state(item));
            items[item.index()] = decode_flag(raw.as_deref());
        }
        let redeemed = decode_flag(self.store.get(&self.keys.redeem_state()).as_deref());

        // Redemption is final. If an item flag expired before the redeemed
        // flag, treat the set as complete rather than reopening redemption.
        if redeemed {
            items = [true; 4];
        }

        self.state = CollectionState {
            visitor_id: Some(visitor_id.clone()),
            items,
            redeemed,
        };
        tracing::debug!(
            "returning visitor {visitor_id}: {} items, redeemed={redeemed}",
            self.state.collected_count()
        );
        Visitor::Returning(visitor_id)
    }

    /// Starts a fresh identity with everything uncollected.
    pub fn create_identity(&mut self) -> VisitorId {
        let visitor_id = VisitorId::generate();
        self.state = CollectionState {
            visitor_id: Some(visitor_id.clone()),
            items: [false; 4],
            redeemed: false,
        };

        self.persist(&self.keys.user_id(), visitor_id.as_str());
        for item in ItemKey::ALL {
            self.persist(&self.keys.item_state(item), encode_flag(false));
        }
        self.persist(&self.keys.redeem_state(), encode_flag(false));

        tracing::info!("created visitor {visitor_id}");
        visitor_id
    }

    /// Returns true only when the item flips from uncollected to collected.
    pub fn mark_collected(&mut self, item: ItemKey) -> bool {
        if self.state.is_collected(item) {
            return false;
        }
        self.state.items[item.index()] = true;
        self.persist(&self.keys.item_state(item), encode_flag(true));
        tracing::info!("collected {item} ({}/4)", self.state.collected_count());
        true
    }

    pub fn can_redeem(&self) -> bool {
        self.state.all_collected() && !self.state.redeemed
    }

    /// Returns true only when this call performed the redemption.
    pub fn mark_redeemed(&mut self) -> bool {
        if !self.can_redeem() {
            return false;
        }
        self.state.redeemed = true;
        self.persist(&self.keys.redeem_state(), encode_flag(true));
        tracing::info!("redeemed for visitor {:?}", self.state.visitor_id);
        true
    }

    /// Forgets the visitor entirely, including any stored bearer token.
    pub fn reset(&mut self) {
        for key in self.keys.all() {
            if let Err(e) = self.store.delete(&key) {
                tracing::warn!("failed to delete {key}: {e}");
            }
        }
        self.state = CollectionState::default();
        tracing::info!("visitor state reset");
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value, self.ttl) {
            tracing::warn!("failed to persist {key}: {e}");
        }
    }
}
