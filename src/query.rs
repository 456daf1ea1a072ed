//! Keyed fetch slots with request generations and a small per-key cache.
//!
//! Every issued request carries a [`FetchTicket`]. A completion is accepted only
//! when its ticket matches the latest key and generation, so a slow response for
//! an old key never overwrites the state of the current one.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use serde::Serialize;

use crate::backend::FetchError;

pub const DEFAULT_MAX_CACHED_KEYS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket<K> {
    pub key: K,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Stored,
    Failed(FetchError),
    Stale,
}

#[derive(Debug, Clone)]
pub struct KeyedQuery<K, T> {
    key: Option<K>,
    generation: u64,
    status: QueryStatus,
    last_error: Option<FetchError>,
    cache: HashMap<K, T>,
    cache_order: VecDeque<K>,
    max_cached_keys: usize,
}

impl<K, T> Default for KeyedQuery<K, T>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_CACHED_KEYS)
    }
}

impl<K, T> KeyedQuery<K, T>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_cached_keys: usize) -> Self {
        Self {
            key: None,
            generation: 0,
            status: QueryStatus::Idle,
            last_error: None,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            max_cached_keys: max_cached_keys.max(1),
        }
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Switches to `key` and issues a request for it. Returns `None` when the key is unchanged.
    pub fn set_key(&mut self, key: K) -> Option<FetchTicket<K>> {
        if self.key.as_ref() == Some(&key) {
            return None;
        }
        self.key = Some(key.clone());
        Some(self.issue(key))
    }

    /// Issues a fresh request for the current key, superseding any in-flight one.
    pub fn refetch(&mut self) -> Option<FetchTicket<K>> {
        let key = self.key.clone()?;
        Some(self.issue(key))
    }

    fn issue(&mut self, key: K) -> FetchTicket<K> {
        self.generation = self.generation.wrapping_add(1);
        self.status = QueryStatus::Loading;
        self.last_error = None;
        FetchTicket {
            key,
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket<K>) -> bool {
        ticket.generation == self.generation && self.key.as_ref() == Some(&ticket.key)
    }

    pub fn resolve(
        &mut self,
        ticket: &FetchTicket<K>,
        result: Result<T, FetchError>,
    ) -> ResolveOutcome {
        if !self.is_current(ticket) {
            return ResolveOutcome::Stale;
        }

        match result {
            Ok(value) => {
                self.store(ticket.key.clone(), value);
                self.status = QueryStatus::Success;
                ResolveOutcome::Stored
            }
            Err(err) => {
                self.status = QueryStatus::Error;
                self.last_error = Some(err.clone());
                ResolveOutcome::Failed(err)
            }
        }
    }

    /// Data cached for the current key, possibly from an earlier request.
    pub fn data(&self) -> Option<&T> {
        self.key.as_ref().and_then(|key| self.cache.get(key))
    }

    pub fn cached(&self, key: &K) -> Option<&T> {
        self.cache.get(key)
    }

    fn store(&mut self, key: K, value: T) {
        if self.cache.insert(key.clone(), value).is_none() {
            self.cache_order.push_back(key);
        }

        while self.cache_order.len() > self.max_cached_keys {
            let Some(oldest) = self.cache_order.pop_front() else {
                break;
            };
            if self.key.as_ref() == Some(&oldest) {
                self.cache_order.push_back(oldest);
                continue;
            }
            self.cache.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_error() -> FetchError {
        FetchError::Transport {
            url: "http://backend/search/".to_string(),
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn unchanged_key_does_not_issue() {
        let mut query: KeyedQuery<String, u32> = KeyedQuery::new();
        assert!(query.set_key("ape".to_string()).is_some());
        assert!(query.set_key("ape".to_string()).is_none());
        assert_eq!(query.generation(), 1);
        assert!(query.is_loading());
    }

    #[test]
    fn stale_ticket_for_old_key_is_ignored() {
        let mut query: KeyedQuery<String, u32> = KeyedQuery::new();
        let old = query.set_key("ape".to_string()).unwrap();
        let current = query.set_key("punk".to_string()).unwrap();

        assert_eq!(query.resolve(&old, Ok(1)), ResolveOutcome::Stale);
        assert!(query.data().is_none());
        assert!(query.is_loading());

        assert_eq!(query.resolve(&current, Ok(2)), ResolveOutcome::Stored);
        assert_eq!(query.data(), Some(&2));
        assert_eq!(query.status(), QueryStatus::Success);
    }

    #[test]
    fn refetch_supersedes_earlier_generation_of_same_key() {
        let mut query: KeyedQuery<String, u32> = KeyedQuery::new();
        let first = query.set_key("ape".to_string()).unwrap();
        let second = query.refetch().unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(query.resolve(&first, Ok(1)), ResolveOutcome::Stale);
        assert_eq!(query.resolve(&second, Ok(2)), ResolveOutcome::Stored);
        assert_eq!(query.data(), Some(&2));
    }

    #[test]
    fn returning_to_cached_key_serves_data_while_loading() {
        let mut query: KeyedQuery<String, u32> = KeyedQuery::new();
        let ape = query.set_key("ape".to_string()).unwrap();
        query.resolve(&ape, Ok(7));
        query.set_key("punk".to_string()).unwrap();
        assert!(query.data().is_none());

        query.set_key("ape".to_string()).unwrap();
        assert!(query.is_loading());
        assert_eq!(query.data(), Some(&7));
    }

    #[test]
    fn failure_keeps_previous_data_and_records_error() {
        let mut query: KeyedQuery<String, u32> = KeyedQuery::new();
        let first = query.set_key("ape".to_string()).unwrap();
        query.resolve(&first, Ok(3));
        let retry = query.refetch().unwrap();

        let outcome = query.resolve(&retry, Err(transport_error()));
        assert_eq!(outcome, ResolveOutcome::Failed(transport_error()));
        assert_eq!(query.status(), QueryStatus::Error);
        assert_eq!(query.last_error(), Some(&transport_error()));
        assert_eq!(query.data(), Some(&3));
    }

    #[test]
    fn cache_evicts_oldest_key_but_never_the_current_one() {
        let mut query: KeyedQuery<u32, u32> = KeyedQuery::with_capacity(2);
        for key in 0..3 {
            let ticket = query.set_key(key).unwrap();
            query.resolve(&ticket, Ok(key * 10));
        }

        assert!(query.cached(&0).is_none());
        assert_eq!(query.cached(&1), Some(&10));
        assert_eq!(query.cached(&2), Some(&20));
        assert_eq!(query.data(), Some(&20));
    }
}
