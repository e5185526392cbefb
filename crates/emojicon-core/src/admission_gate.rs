//! Admission control for render requests: requester cooldowns and
//! destination render locks.
//!
//! Both registries are point-read/point-write maps behind a std mutex. No
//! guard is ever held across an await point. `try_lock` is an atomic
//! acquire-if-absent, so two concurrent requests can never both own the same
//! destination.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::identity::{Destination, RequesterId};
use crate::time_utils::Clock;

/// Requester id to cooldown-expiry map. Entries are never removed; they
/// expire by timestamp comparison.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    expiries: Mutex<HashMap<RequesterId, u64>>,
}

impl CooldownRegistry {
    /// Returns the milliseconds left on an active cooldown, or `None` when the
    /// requester may proceed.
    pub fn remaining_ms(&self, requester: RequesterId, now_ms: u64) -> Option<u64> {
        let expiries = lock_or_recover(&self.expiries);
        expiries
            .get(&requester)
            .copied()
            .filter(|expiry| *expiry > now_ms)
            .map(|expiry| expiry - now_ms)
    }

    pub fn is_allowed(&self, requester: RequesterId, now_ms: u64) -> bool {
        self.remaining_ms(requester, now_ms).is_none()
    }

    /// Creates or overwrites the requester's expiry at `now_ms + duration_ms`.
    pub fn set(&self, requester: RequesterId, now_ms: u64, duration_ms: u64) {
        let mut expiries = lock_or_recover(&self.expiries);
        expiries.insert(requester, now_ms.saturating_add(duration_ms));
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.expiries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Set of destinations that currently have a render in flight.
#[derive(Debug, Default)]
pub struct DestinationLockRegistry {
    locked: Mutex<HashSet<Destination>>,
}

impl DestinationLockRegistry {
    pub fn is_locked(&self, destination: Destination) -> bool {
        lock_or_recover(&self.locked).contains(&destination)
    }

    /// Acquires the destination if nobody holds it. Returns `false` when it
    /// was already locked.
    pub fn try_lock(&self, destination: Destination) -> bool {
        lock_or_recover(&self.locked).insert(destination)
    }

    pub fn unlock(&self, destination: Destination) {
        lock_or_recover(&self.locked).remove(&destination);
    }

    pub fn locked_count(&self) -> usize {
        lock_or_recover(&self.locked).len()
    }
}

struct AdmissionGateInner {
    cooldowns: CooldownRegistry,
    locks: DestinationLockRegistry,
    clock: Arc<dyn Clock>,
}

/// Process-wide admission service injected into the request handler.
///
/// Cheap to clone; every clone shares the same registries and clock.
#[derive(Clone)]
pub struct AdmissionGate {
    inner: Arc<AdmissionGateInner>,
}

impl AdmissionGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(AdmissionGateInner {
                cooldowns: CooldownRegistry::default(),
                locks: DestinationLockRegistry::default(),
                clock,
            }),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Returns `true` when the requester is not cooling down.
    pub fn check_cooldown(&self, requester: RequesterId) -> bool {
        self.inner.cooldowns.is_allowed(requester, self.now_ms())
    }

    pub fn cooldown_remaining_ms(&self, requester: RequesterId) -> Option<u64> {
        self.inner.cooldowns.remaining_ms(requester, self.now_ms())
    }

    pub fn set_cooldown(&self, requester: RequesterId, duration_ms: u64) {
        self.inner
            .cooldowns
            .set(requester, self.now_ms(), duration_ms);
    }

    pub fn is_locked(&self, destination: Destination) -> bool {
        self.inner.locks.is_locked(destination)
    }

    pub fn try_lock(&self, destination: Destination) -> bool {
        self.inner.locks.try_lock(destination)
    }

    pub fn unlock(&self, destination: Destination) {
        self.inner.locks.unlock(destination);
    }

    /// Locks `destination` and returns a guard that unlocks it on drop, or
    /// `None` when another request already holds it.
    pub fn acquire(&self, destination: Destination) -> Option<DestinationLockGuard> {
        if !self.try_lock(destination) {
            tracing::debug!(%destination, "destination lock already held");
            return None;
        }
        Some(DestinationLockGuard {
            gate: self.clone(),
            destination,
        })
    }

    pub fn locked_count(&self) -> usize {
        self.inner.locks.locked_count()
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("cooldowns", &self.inner.cooldowns.len())
            .field("locked_destinations", &self.inner.locks.locked_count())
            .finish()
    }
}

/// Held for the duration of a render. Dropping it releases the destination,
/// whichever way the request ends.
#[derive(Debug)]
pub struct DestinationLockGuard {
    gate: AdmissionGate,
    destination: Destination,
}

impl DestinationLockGuard {
    pub fn destination(&self) -> Destination {
        self.destination
    }
}

impl Drop for DestinationLockGuard {
    fn drop(&mut self) {
        self.gate.unlock(self.destination);
        tracing::debug!(destination = %self.destination, "destination lock released");
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
