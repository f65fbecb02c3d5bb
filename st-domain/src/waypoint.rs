use crate::ids::{SystemSymbol, WaypointSymbol};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaypointType {
    Planet,
    GasGiant,
    Moon,
    OrbitalStation,
    JumpGate,
    AsteroidField,
    Asteroid,
    EngineeredAsteroid,
    AsteroidBase,
    Nebula,
    DebrisField,
    GravityWell,
    ArtificialGravityWell,
    FuelStation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaypointTraitSymbol {
    Uncharted,
    Marketplace,
    Shipyard,
    FuelStation,
    StripMine,
    Stargazer,
    MineralDeposits,
    CommonMetalDeposits,
    PreciousMetalDeposits,
    RareMetalDeposits,
    MethanePools,
    IceCrystals,
    ExplosiveGases,
    StrongMagnetosphere,
    VibrantAuroras,
    SaltFlats,
    Canyons,
    PerpetualDaylight,
    PerpetualOvercast,
    DrySeabeds,
    MagmaSeas,
    Supervolcanoes,
    AshClouds,
    Vast,
    Cramped,
    Toxic,
    Temperate,
    JovianPlanet,
    JunkYard,
    Rocky,
    BreathableAtmosphere,
    ThinAtmosphere,
    MicroGravityAnomalies,
    HighTech,
    Overcrowded,
    CorruptGovt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointTrait {
    pub symbol: WaypointTraitSymbol,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub symbol: WaypointSymbol,
    pub r#type: WaypointType,
    pub system_symbol: SystemSymbol,
    pub x: i64,
    pub y: i64,
    pub traits: Vec<WaypointTrait>,
    pub is_under_construction: bool,
}

impl Waypoint {
    pub fn has_trait(&self, t: WaypointTraitSymbol) -> bool {
        self.traits.iter().any(|wt| wt.symbol == t)
    }

    pub fn has_marketplace(&self) -> bool {
        self.has_trait(WaypointTraitSymbol::Marketplace)
    }

    pub fn is_fuel_station(&self) -> bool {
        self.has_trait(WaypointTraitSymbol::FuelStation) || self.r#type == WaypointType::FuelStation
    }

    pub fn is_extractable(&self) -> bool {
        matches!(
            self.r#type,
            WaypointType::AsteroidField
                | WaypointType::Asteroid
                | WaypointType::EngineeredAsteroid
                | WaypointType::AsteroidBase
        )
    }

    pub fn is_siphonable(&self) -> bool {
        self.r#type == WaypointType::GasGiant
    }
}

/// Euclidean distance between two waypoints in the same system, rounded as
/// the planner's fuel-cost model requires.
pub fn distance(a: (i64, i64), b: (i64, i64)) -> f64 {
    (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f64).sqrt()
}

/// A cached, symmetric pairwise distance — `dist(a, b) == dist(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub a: (i64, i64),
    pub b: (i64, i64),
    pub value: f64,
}

impl Distance {
    pub fn between(a: (i64, i64), b: (i64, i64)) -> Self {
        Self {
            a,
            b,
            value: distance(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric() {
        let a = (0, 0);
        let b = (3, 4);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, b), 5.0);
    }
}
