//! # Caching Tiers
//!
//! Memo cells with three lifetimes:
//!
//! - `TxCache<T>`: lives in one transaction's concept object and dies with it.
//! - `SessionCache<C>`: a transaction-local view of a value shared by every
//!   transaction of a session. It is seeded from the session tier by copy and
//!   changed only through explicit deltas. On commit the deltas, not the
//!   value, are folded back into the tier, so a sibling transaction's changes
//!   are never overwritten.
//! - `PermanentCache<T>`: computed once, frozen afterwards.
//!
//! A type's current shard is deliberately a `TxCache`: two transactions may
//! disagree about which shard is current, and sharing it would route new
//! instances inconsistently.

use crate::types::ConceptId;
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TRANSACTION TIER
// =============================================================================

/// A value cached for the lifetime of one transaction.
#[derive(Debug, Clone)]
pub struct TxCache<T> {
    value: Option<T>,
}

impl<T> Default for TxCache<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> TxCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

// =============================================================================
// PERMANENT TIER
// =============================================================================

/// A value computed at most once and never changed.
#[derive(Debug, Clone)]
pub struct PermanentCache<T> {
    cell: OnceCell<T>,
}

impl<T> Default for PermanentCache<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> PermanentCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache already holding `value`.
    #[must_use]
    pub fn with(value: T) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(value);
        Self { cell }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Return the cached value, computing it with `init` on first access.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

// =============================================================================
// SESSION TIER
// =============================================================================

/// A value that can be changed by replayable deltas.
pub trait Incremental: Clone {
    type Delta: Clone;

    fn apply(&mut self, delta: &Self::Delta);
}

/// Change to a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDelta<T> {
    Insert(T),
    Remove(T),
}

impl<T: Ord + Clone> Incremental for BTreeSet<T> {
    type Delta = SetDelta<T>;

    fn apply(&mut self, delta: &Self::Delta) {
        match delta {
            SetDelta::Insert(item) => {
                self.insert(item.clone());
            }
            SetDelta::Remove(item) => {
                self.remove(item);
            }
        }
    }
}

/// A monotone count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter(pub u64);

/// Change to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDelta {
    Increment,
}

impl Incremental for Counter {
    type Delta = CounterDelta;

    fn apply(&mut self, delta: &Self::Delta) {
        match delta {
            CounterDelta::Increment => self.0 = self.0.saturating_add(1),
        }
    }
}

/// Transaction-local view of a session-shared value.
///
/// There is no blanket `set`: once materialized the value only changes
/// through [`SessionCache::apply`].
#[derive(Debug, Clone)]
pub struct SessionCache<C: Incremental> {
    local: Option<C>,
    pending: Vec<C::Delta>,
}

impl<C: Incremental> Default for SessionCache<C> {
    fn default() -> Self {
        Self {
            local: None,
            pending: Vec::new(),
        }
    }
}

impl<C: Incremental> SessionCache<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&C> {
        self.local.as_ref()
    }

    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.local.is_some()
    }

    /// Seed from the session tier by copy, replaying this transaction's
    /// deltas on top. Returns whether a value is now available.
    pub fn load_snapshot(&mut self, tier: Option<&C>) -> bool {
        if self.local.is_none() {
            if let Some(shared) = tier {
                let mut local = shared.clone();
                for delta in &self.pending {
                    local.apply(delta);
                }
                self.local = Some(local);
            }
        }
        self.local.is_some()
    }

    /// Seed with a value computed from the graph as this transaction sees it.
    pub fn load_fresh(&mut self, value: C) {
        if self.local.is_none() {
            self.local = Some(value);
        }
    }

    /// Record a change. It is applied to the local view if materialized and
    /// always kept for folding into the session tier.
    pub fn apply(&mut self, delta: C::Delta) {
        if let Some(local) = self.local.as_mut() {
            local.apply(&delta);
        }
        self.pending.push(delta);
    }

    /// Merge this transaction's changes into the session tier.
    ///
    /// A tier value is only ever changed by replaying deltas. An empty tier
    /// slot adopts the local view, which was computed from the committed graph.
    pub fn fold_into(self, tier: &mut Option<C>) {
        match tier {
            Some(shared) => {
                for delta in &self.pending {
                    shared.apply(delta);
                }
            }
            None => *tier = self.local,
        }
    }
}

/// Shared state of one concept in the session tier.
#[derive(Debug, Clone, Default)]
pub struct SessionEntry {
    /// Roles a type plays.
    pub plays: Option<BTreeSet<ConceptId>>,
    /// Roles a relationship type relates.
    pub relates: Option<BTreeSet<ConceptId>>,
    /// Relationship types relating a role.
    pub relationship_types: Option<BTreeSet<ConceptId>>,
    /// Types playing a role.
    pub players: Option<BTreeSet<ConceptId>>,
    /// Number of shards of a type.
    pub shard_count: Option<Counter>,
}

/// The session cache tier: shared concept state keyed by concept id.
#[derive(Debug, Clone, Default)]
pub struct SessionTier {
    entries: BTreeMap<ConceptId, SessionEntry>,
}

impl SessionTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, id: &ConceptId) -> Option<&SessionEntry> {
        self.entries.get(id)
    }

    pub fn entry_mut(&mut self, id: &ConceptId) -> &mut SessionEntry {
        self.entries.entry(id.clone()).or_default()
    }

    /// Drop everything known about a deleted concept.
    pub fn evict(&mut self, id: &ConceptId) {
        self.entries.remove(id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConceptId {
        ConceptId::new(s)
    }

    #[test]
    fn tx_cache_set_and_clear() {
        let mut cache = TxCache::new();
        assert!(cache.get().is_none());
        cache.set(5);
        assert_eq!(cache.get(), Some(&5));
        cache.clear();
        assert!(cache.get().is_none());
    }

    #[test]
    fn permanent_cache_computes_once() {
        let cache = PermanentCache::new();
        let mut calls = 0;
        let first = *cache
            .get_or_try_init(|| {
                calls += 1;
                Ok::<_, ()>(7)
            })
            .expect("init");
        let second = *cache
            .get_or_try_init(|| Ok::<_, ()>(8))
            .expect("cached");
        assert_eq!((first, second, calls), (7, 7, 1));
    }

    #[test]
    fn permanent_cache_failed_init_leaves_cell_empty() {
        let cache: PermanentCache<u8> = PermanentCache::new();
        assert!(cache.get_or_try_init(|| Err("boom")).is_err());
        assert!(cache.get().is_none());
    }

    #[test]
    fn snapshot_replays_pending_deltas() {
        let mut cache: SessionCache<BTreeSet<ConceptId>> = SessionCache::new();
        cache.apply(SetDelta::Insert(id("V2")));

        let shared: BTreeSet<_> = [id("V1")].into_iter().collect();
        assert!(cache.load_snapshot(Some(&shared)));

        let local = cache.get().expect("materialized");
        assert!(local.contains(&id("V1")));
        assert!(local.contains(&id("V2")));
    }

    #[test]
    fn fold_applies_deltas_without_clobbering_siblings() {
        let mut tier: Option<BTreeSet<ConceptId>> = Some([id("V1")].into_iter().collect());

        let mut first: SessionCache<BTreeSet<ConceptId>> = SessionCache::new();
        first.load_snapshot(tier.as_ref());
        let mut second: SessionCache<BTreeSet<ConceptId>> = SessionCache::new();
        second.load_snapshot(tier.as_ref());

        first.apply(SetDelta::Insert(id("V2")));
        second.apply(SetDelta::Remove(id("V1")));

        first.fold_into(&mut tier);
        second.fold_into(&mut tier);

        let merged = tier.expect("tier");
        assert_eq!(merged.into_iter().collect::<Vec<_>>(), vec![id("V2")]);
    }

    #[test]
    fn fold_into_empty_tier_adopts_local_view() {
        let mut tier = None;
        let mut cache: SessionCache<Counter> = SessionCache::new();
        cache.load_fresh(Counter(2));
        cache.apply(CounterDelta::Increment);
        cache.fold_into(&mut tier);
        assert_eq!(tier, Some(Counter(3)));
    }

    #[test]
    fn unmaterialized_cache_still_records_deltas() {
        let mut tier = Some(Counter(4));
        let mut cache: SessionCache<Counter> = SessionCache::new();
        cache.apply(CounterDelta::Increment);
        assert!(!cache.is_materialized());
        cache.fold_into(&mut tier);
        assert_eq!(tier, Some(Counter(5)));
    }

    #[test]
    fn session_tier_eviction() {
        let mut tier = SessionTier::new();
        tier.entry_mut(&id("V1")).shard_count = Some(Counter(1));
        assert_eq!(tier.len(), 1);
        tier.evict(&id("V1"));
        assert!(tier.is_empty());
    }
}
