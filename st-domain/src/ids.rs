use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Agent callsign, e.g. `FLWI`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentSymbol(pub String);

impl Display for AgentSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// e.g. `X1-FM66-A1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaypointSymbol(pub String);

impl WaypointSymbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// `X1-FM66-A1` -> `X1-FM66`, same algorithm as the source's
    /// `extract_system_symbol`: join everything but the last `-`-segment.
    pub fn system_symbol(&self) -> SystemSymbol {
        let parts: Vec<&str> = self.0.split('-').collect();
        if parts.len() <= 2 {
            SystemSymbol(self.0.clone())
        } else {
            SystemSymbol(parts[..parts.len() - 1].join("-"))
        }
    }
}

impl Display for WaypointSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// e.g. `X1-FM66`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemSymbol(pub String);

impl SystemSymbol {
    pub fn with_waypoint_suffix(&self, suffix: &str) -> WaypointSymbol {
        WaypointSymbol(format!("{}-{}", self.0, suffix))
    }
}

impl Display for SystemSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipSymbol(pub String);

impl Display for ShipSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the controller that currently owns (or is requesting) a ship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControllerId(pub String);

impl Display for ControllerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const MARKET_INTEL_CONTROLLER: &str = "MARKET-INTEL-CONTROLLER";
pub const EXTRACTION_CONTROLLER: &str = "EXTRACTION-CONTROLLER";
pub const TRADING_CONTROLLER: &str = "TRADING-CONTROLLER";

/// Base priorities, carried over from the source's `BASE_PRIO_*` constants.
/// `HAULERS` strictly outranks `TRADERS` so a hauler can preempt a trader's
/// ship; equal priorities would contend as equals instead (FRM invariant #3).
pub const BASE_PRIO_EXTRACTORS: i32 = 100;
pub const BASE_PRIO_HAULERS: i32 = 350;
pub const BASE_PRIO_TRADERS: i32 = 300;
pub const BASE_PRIO_SATELLITES: i32 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_symbol_strips_waypoint_suffix() {
        let wp = WaypointSymbol::new("X1-FM66-A1");
        assert_eq!(wp.system_symbol(), SystemSymbol("X1-FM66".to_string()));
    }

    #[test]
    fn system_symbol_of_a_two_part_system_is_itself() {
        let wp = WaypointSymbol::new("X1-FM66");
        assert_eq!(wp.system_symbol(), SystemSymbol("X1-FM66".to_string()));
    }
}
