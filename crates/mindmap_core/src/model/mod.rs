//! Domain model for persisted maps and nodes plus the client-facing shapes.
//!
//! # Responsibility
//! - Define canonical records stored by the map/node repositories.
//! - Define the explicit client payload shapes accepted at the boundary.
//!
//! # Invariants
//! - Timestamps carry millisecond precision, matching storage.
//! - A node is owned by exactly one map; node ids are unique per map.

use chrono::{DateTime, SubsecRound, Utc};

pub mod client;
pub mod ids;
pub mod map;
pub mod node;

/// Current UTC time truncated to the millisecond precision used in storage.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
