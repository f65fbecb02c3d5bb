use crate::ids::{ShipSymbol, SystemSymbol, WaypointSymbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The four roles this fleet actually assigns; the remote API's registration
/// role carries more values (FABRICATOR, REFINERY, ...) but the controllers
/// here only ever dispatch these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipRole {
    Command,
    Satellite,
    Excavator,
    Hauler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavStatus {
    InTransit,
    InOrbit,
    Docked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightMode {
    Drift,
    Stealth,
    Cruise,
    Burn,
}

impl FlightMode {
    /// Fuel units consumed for a hop of the given rounded distance, per the
    /// fuel-cost model this planner uses (DRIFT=1, CRUISE/STEALTH=round(d),
    /// BURN=2*round(d)).
    pub fn fuel_cost(&self, rounded_distance: i64) -> i64 {
        match self {
            FlightMode::Drift => 1,
            FlightMode::Cruise | FlightMode::Stealth => rounded_distance,
            FlightMode::Burn => 2 * rounded_distance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub destination: RouteWaypoint,
    pub origin: RouteWaypoint,
    pub departure_time: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWaypoint {
    pub symbol: WaypointSymbol,
    pub system_symbol: SystemSymbol,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nav {
    pub system_symbol: SystemSymbol,
    pub waypoint_symbol: WaypointSymbol,
    pub route: Route,
    pub status: NavStatus,
    pub flight_mode: FlightMode,
}

impl Nav {
    pub fn is_in_orbit(&self) -> bool {
        self.status == NavStatus::InOrbit
    }

    pub fn is_docked(&self) -> bool {
        self.status == NavStatus::Docked
    }

    pub fn is_in_transit(&self) -> bool {
        self.status == NavStatus::InTransit
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fuel {
    pub current: i64,
    pub capacity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooldown {
    pub ship_symbol: ShipSymbol,
    pub total_seconds: i64,
    pub remaining_seconds: i64,
    pub expiration: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(exp) => exp > now,
            None => self.remaining_seconds > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub symbol: String,
    pub units: i64,
}

impl Inventory {
    pub fn new(symbol: impl Into<String>, units: i64) -> Self {
        Self {
            symbol: symbol.into(),
            units,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cargo {
    pub capacity: i64,
    pub units: i64,
    pub inventory: Vec<Inventory>,
}

#[derive(Debug, Clone)]
pub enum CargoError {
    NotEnoughSpace { needed: i64, available: i64 },
    NotEnoughItems {
        symbol: String,
        needed: i64,
        available: i64,
    },
}

impl std::fmt::Display for CargoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CargoError::NotEnoughSpace { needed, available } => {
                write!(f, "not enough cargo space: need {needed}, have {available}")
            }
            CargoError::NotEnoughItems { symbol, needed, available } => {
                write!(f, "not enough of {symbol} in cargo: need {needed}, have {available}")
            }
        }
    }
}

impl std::error::Error for CargoError {}

impl Cargo {
    pub fn available_cargo_space(&self) -> i64 {
        self.capacity - self.units
    }

    /// Adds `units` of `symbol`, enforcing capacity — the invariant that
    /// `cargo.units == sum(inventory[*].units)` is maintained by construction.
    pub fn with_item_added(&self, symbol: &str, units: i64) -> Result<Self, CargoError> {
        if units > self.available_cargo_space() {
            return Err(CargoError::NotEnoughSpace {
                needed: units,
                available: self.available_cargo_space(),
            });
        }
        let mut inventory = self.inventory.clone();
        match inventory.iter_mut().find(|i| i.symbol == symbol) {
            Some(entry) => entry.units += units,
            None => inventory.push(Inventory::new(symbol, units)),
        }
        Ok(Self {
            capacity: self.capacity,
            units: self.units + units,
            inventory,
        })
    }

    /// Removes `units` of `symbol`. The row is dropped entirely once it
    /// reaches zero, per the sentinel-row/delete-on-zero invariant.
    pub fn with_units_removed(&self, symbol: &str, units: i64) -> Result<Self, CargoError> {
        let available = self
            .inventory
            .iter()
            .find(|i| i.symbol == symbol)
            .map(|i| i.units)
            .unwrap_or(0);
        if units > available {
            return Err(CargoError::NotEnoughItems {
                symbol: symbol.to_string(),
                needed: units,
                available,
            });
        }
        let inventory = self
            .inventory
            .iter()
            .filter_map(|i| {
                if i.symbol != symbol {
                    Some(i.clone())
                } else if i.units - units > 0 {
                    Some(Inventory::new(i.symbol.clone(), i.units - units))
                } else {
                    None
                }
            })
            .collect();
        Ok(Self {
            capacity: self.capacity,
            units: self.units - units,
            inventory,
        })
    }

    pub fn units_of(&self, symbol: &str) -> i64 {
        self.inventory
            .iter()
            .find(|i| i.symbol == symbol)
            .map(|i| i.units)
            .unwrap_or(0)
    }

    pub fn has_trade_good(&self, symbol: &str) -> bool {
        self.units_of(symbol) > 0
    }

    /// Fraction of capacity currently filled, used by the hauler dispatch
    /// threshold check.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.units as f64 / self.capacity as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipMountSymbol {
    MiningLaserI,
    MiningLaserIi,
    MiningLaserIii,
    GasSiphonI,
    GasSiphonIi,
    GasSiphonIii,
    SurveyorI,
    SurveyorIi,
    SurveyorIii,
    CargoHoldI,
}

impl ShipMountSymbol {
    pub fn is_mining_laser(&self) -> bool {
        matches!(
            self,
            ShipMountSymbol::MiningLaserI | ShipMountSymbol::MiningLaserIi | ShipMountSymbol::MiningLaserIii
        )
    }

    pub fn is_gas_siphon(&self) -> bool {
        matches!(
            self,
            ShipMountSymbol::GasSiphonI | ShipMountSymbol::GasSiphonIi | ShipMountSymbol::GasSiphonIii
        )
    }

    pub fn is_surveyor(&self) -> bool {
        matches!(
            self,
            ShipMountSymbol::SurveyorI | ShipMountSymbol::SurveyorIi | ShipMountSymbol::SurveyorIii
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub symbol: ShipMountSymbol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub faction_symbol: String,
    pub role: ShipRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub symbol: ShipSymbol,
    pub registration: Registration,
    pub nav: Nav,
    pub cargo: Cargo,
    pub fuel: Fuel,
    pub cooldown: Cooldown,
    pub mounts: Vec<Mount>,
}

impl Ship {
    pub fn role(&self) -> ShipRole {
        self.registration.role
    }

    pub fn is_in_orbit(&self) -> bool {
        self.nav.is_in_orbit()
    }

    pub fn is_docked(&self) -> bool {
        self.nav.is_docked()
    }

    pub fn is_mining_drone(&self) -> bool {
        self.mounts.iter().any(|m| m.symbol.is_mining_laser())
    }

    pub fn is_siphon_drone(&self) -> bool {
        self.mounts.iter().any(|m| m.symbol.is_gas_siphon())
    }

    pub fn is_surveyor(&self) -> bool {
        self.mounts.iter().any(|m| m.symbol.is_surveyor())
    }

    pub fn is_hauler(&self) -> bool {
        self.role() == ShipRole::Hauler
    }

    pub fn is_command(&self) -> bool {
        self.role() == ShipRole::Command
    }

    pub fn available_cargo_space(&self) -> i64 {
        self.cargo.available_cargo_space()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cargo(capacity: i64) -> Cargo {
        Cargo {
            capacity,
            units: 0,
            inventory: vec![],
        }
    }

    #[test]
    fn adding_cargo_tracks_units_and_inventory_together() {
        let cargo = empty_cargo(10).with_item_added("IRON_ORE", 4).unwrap();
        assert_eq!(cargo.units, 4);
        assert_eq!(cargo.units_of("IRON_ORE"), 4);
    }

    #[test]
    fn adding_beyond_capacity_is_refused() {
        let cargo = empty_cargo(10).with_item_added("IRON_ORE", 4).unwrap();
        let err = cargo.with_item_added("IRON_ORE", 7).unwrap_err();
        assert!(matches!(err, CargoError::NotEnoughSpace { .. }));
    }

    #[test]
    fn removing_all_units_of_a_good_drops_the_inventory_row() {
        let cargo = empty_cargo(10).with_item_added("IRON_ORE", 4).unwrap();
        let cargo = cargo.with_units_removed("IRON_ORE", 4).unwrap();
        assert_eq!(cargo.units, 0);
        assert!(cargo.inventory.is_empty());
    }

    #[test]
    fn removing_more_than_held_is_refused() {
        let cargo = empty_cargo(10).with_item_added("IRON_ORE", 4).unwrap();
        let err = cargo.with_units_removed("IRON_ORE", 5).unwrap_err();
        assert!(matches!(err, CargoError::NotEnoughItems { .. }));
    }
}
