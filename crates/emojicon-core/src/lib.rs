//! Foundational primitives shared across Emojicon crates.
//!
//! Provides the clock abstraction used for cooldown expiry and the admission
//! gate (per-requester cooldowns and per-destination render locks) that every
//! inbound render request passes through.

pub mod admission_gate;
pub mod identity;
pub mod time_utils;

pub use admission_gate::{
    AdmissionGate, CooldownRegistry, DestinationLockGuard, DestinationLockRegistry,
};
pub use identity::{Destination, RequesterId};
pub use time_utils::{Clock, ManualClock, MonotonicClock};
