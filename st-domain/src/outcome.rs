use std::fmt::{Display, Formatter};

/// Closed set of reasons a domain operation refused to proceed — the remote
/// API's 4xx responses translated into something a controller can match on
/// instead of inspecting a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainFailureKind {
    AlreadyAtDestination,
    MarketDoesNotTrade,
    CargoEmpty,
    CrossWaypointTransfer,
    CooldownActive,
    CapacityExceeded,
    Other(String),
}

impl Display for DomainFailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainFailureKind::AlreadyAtDestination => write!(f, "already at destination"),
            DomainFailureKind::MarketDoesNotTrade => write!(f, "market does not trade this good"),
            DomainFailureKind::CargoEmpty => write!(f, "cargo is empty"),
            DomainFailureKind::CrossWaypointTransfer => write!(f, "cannot transfer cargo across waypoints"),
            DomainFailureKind::CooldownActive => write!(f, "cooldown still active"),
            DomainFailureKind::CapacityExceeded => write!(f, "capacity exceeded"),
            DomainFailureKind::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Replaces "exceptions as control flow" (design note §9): every ship
/// operation returns one of these instead of throwing. Controllers match on
/// the variant instead of catching.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed; also used for idempotent no-ops (e.g.
    /// navigating to the waypoint a ship already occupies).
    Success(T),
    /// A refusal the domain itself raised — not a bug, not transient.
    DomainFailure(DomainFailureKind),
    /// Worth retrying: rate limits, timeouts, 5xx, the synthetic 599.
    Transient,
    /// Not worth retrying; the caller should surface and stop.
    Fatal(anyhow::Error),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::DomainFailure(k) => Outcome::DomainFailure(k),
            Outcome::Transient => Outcome::Transient,
            Outcome::Fatal(e) => Outcome::Fatal(e),
        }
    }

    pub fn into_result(self) -> anyhow::Result<T> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::DomainFailure(k) => Err(anyhow::anyhow!("domain failure: {k}")),
            Outcome::Transient => Err(anyhow::anyhow!("transient failure")),
            Outcome::Fatal(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_only_transforms_success() {
        let outcome: Outcome<i32> = Outcome::Success(4);
        assert!(matches!(outcome.map(|v| v * 2), Outcome::Success(8)));

        let outcome: Outcome<i32> = Outcome::DomainFailure(DomainFailureKind::CargoEmpty);
        assert!(matches!(outcome.map(|v| v * 2), Outcome::DomainFailure(_)));
    }
}
