// TDB - Time-travel Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Single-flight fetch cache
//!
//! Each key maps to one shared future. The first caller for a key creates and
//! registers it; every later caller awaits the same future, so a key is
//! fetched at most once while its fetch is pending or after it succeeded.
//!
//! A key can be in one of three states:
//! 1. Not in the map: never fetched (or the last fetch failed)
//! 2. In the map, pending: a fetch is in flight
//! 3. In the map, resolved: the value is memoized
//!
//! Failed fetches are removed so that a later caller can retry.

use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::trace;

use crate::transport::TransportError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, TransportError>>>;

/// A map from key to a shared, memoized fetch.
pub struct SingleFlightCache<K, V>
where
    V: Clone,
{
    entries: Mutex<HashMap<K, SharedFetch<V>>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    /// An empty cache
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Return the value for `key`, fetching it with `fetch` unless a fetch
    /// for the key already exists.
    ///
    /// `fetch` is only invoked by the caller that registers the entry.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, TransportError>> + Send + 'static,
    {
        let shared = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(existing) => {
                    trace!(?key, "Joining existing fetch");
                    existing.clone()
                }
                None => {
                    trace!(?key, "Registering new fetch");
                    let shared = fetch().boxed().shared();
                    entries.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        if result.is_err() {
            let mut entries = self.entries.lock();
            // Only drop our own entry; a newer fetch may have replaced it
            if entries.get(&key).is_some_and(|current| current.ptr_eq(&shared)) {
                entries.remove(&key);
            }
        }

        result
    }

    /// The memoized value for `key`, if its fetch has completed successfully
    pub fn peek(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock();
        entries.get(key)?.peek()?.as_ref().ok().cloned()
    }

    /// Whether `key` has a pending or completed fetch
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Keep only the entries whose key satisfies `keep`.
    ///
    /// Pending fetches that are dropped still complete for their current
    /// awaiters; they are just no longer shared with new callers.
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.lock().retain(|key, _| keep(key));
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries, pending or resolved
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Default for SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for SingleFlightCache<K, V>
where
    K: Debug,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("SingleFlightCache").field("keys", &entries.keys().collect::<Vec<_>>()).finish()
    }
}
