//! Bounded in-memory cache with least-recently-used eviction and idle expiry.
//!
//! Both the auth-session registry and the agent-session store sit on top of
//! this map so neither can grow without bound. Time comes from an injected
//! [`Clock`] so eviction behavior is testable without sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Source of "now" for anything that needs wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Slot<V> {
    value: V,
    last_used: DateTime<Utc>,
}

/// Bounded LRU map. Inserting past capacity evicts the entry with the oldest
/// last touch; entries idle past `idle_timeout` are dropped on access and on
/// insert sweeps.
pub struct BoundedCache<K, V> {
    capacity: usize,
    idle_timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, idle_timeout: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            idle_timeout,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, refreshing its recency. Idle-expired entries are
    /// treated as absent and removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            if self.expired(slot, now) {
                slots.remove(key);
                return None;
            }
        }
        let slot = slots.get_mut(key)?;
        slot.last_used = now;
        Some(slot.value.clone())
    }

    /// Insert a value, evicting the least-recently-used entry if the cache
    /// is full.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        Self::sweep(&mut slots, self.idle_timeout, now);
        if !slots.contains_key(&key) && slots.len() >= self.capacity {
            Self::evict_oldest(&mut slots);
        }
        slots.insert(
            key,
            Slot {
                value,
                last_used: now,
            },
        );
    }

    /// Fetch the value for a key, creating it with `make` if absent (or idle
    /// expired). The returned value is a clone of the stored one.
    pub fn get_or_insert_with(&self, key: &K, make: impl FnOnce() -> V) -> V {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        Self::sweep(&mut slots, self.idle_timeout, now);
        if !slots.contains_key(key) && slots.len() >= self.capacity {
            Self::evict_oldest(&mut slots);
        }
        let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
            value: make(),
            last_used: now,
        });
        slot.last_used = now;
        slot.value.clone()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.slots.lock().remove(key).map(|slot| slot.value)
    }

    /// Drop every idle-expired entry; returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.lock();
        let before = slots.len();
        Self::sweep(&mut slots, self.idle_timeout, now);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    fn expired(&self, slot: &Slot<V>, now: DateTime<Utc>) -> bool {
        match self.idle_timeout {
            Some(ttl) => now - slot.last_used > ttl,
            None => false,
        }
    }

    fn sweep(slots: &mut HashMap<K, Slot<V>>, ttl: Option<Duration>, now: DateTime<Utc>) {
        if let Some(ttl) = ttl {
            slots.retain(|_, slot| now - slot.last_used <= ttl);
        }
    }

    fn evict_oldest(slots: &mut HashMap<K, Slot<V>>) {
        let oldest = slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            slots.remove(&key);
        }
    }
}

/// Test clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
