use crate::ids::{ControllerId, ShipSymbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long a queued request remains eligible to be granted, carried over
/// from the source's `get_request_timeout()` (40 seconds).
pub const REQUEST_TTL_SECONDS: i64 = 40;

/// One row of `CONTROL.SHIP_LOCKS`: who owns a ship, at what priority, and
/// whether it's currently uninterruptible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipLock {
    pub ship_symbol: ShipSymbol,
    pub controller: Option<ControllerId>,
    pub priority: i32,
    pub blocked: bool,
}

impl ShipLock {
    pub fn unowned(ship_symbol: ShipSymbol) -> Self {
        Self {
            ship_symbol,
            controller: None,
            priority: -1,
            blocked: false,
        }
    }

    pub fn is_free_for(&self, controller: &ControllerId, priority: i32) -> bool {
        !self.blocked
            && match &self.controller {
                None => true,
                Some(c) => c == controller || self.priority < priority,
            }
    }
}

/// One row of `CONTROL.SHIP_REQUESTS`: a controller's pending bid for a ship
/// it does not currently own, queued when the ship is blocked or already
/// held by an equal-or-higher priority controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipRequest {
    pub ship_symbol: ShipSymbol,
    pub controller: ControllerId,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl ShipRequest {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_seconds() <= REQUEST_TTL_SECONDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_free_lock_is_available_to_anyone() {
        let lock = ShipLock::unowned(ShipSymbol("S1".into()));
        assert!(lock.is_free_for(&ControllerId("A".into()), 0));
    }

    #[test]
    fn a_blocked_lock_is_never_available() {
        let mut lock = ShipLock::unowned(ShipSymbol("S1".into()));
        lock.blocked = true;
        assert!(!lock.is_free_for(&ControllerId("A".into()), 1000));
    }

    #[test]
    fn higher_priority_can_take_from_lower_priority_owner() {
        let lock = ShipLock {
            ship_symbol: ShipSymbol("S1".into()),
            controller: Some(ControllerId("A".into())),
            priority: 100,
            blocked: false,
        };
        assert!(lock.is_free_for(&ControllerId("B".into()), 350));
        assert!(!lock.is_free_for(&ControllerId("B".into()), 100));
    }
}
