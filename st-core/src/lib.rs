pub mod clock;
pub mod configuration;
pub mod controllers;
pub mod fleet;
pub mod pagination;
pub mod pathfinder;
pub mod reqwest_helpers;
pub mod runtime;
pub mod ship_ops;
pub mod st_client;

pub use clock::{Clock, SystemClock};
pub use configuration::AgentConfiguration;
pub use fleet::FleetResourceManager;
pub use runtime::TaskRuntime;
pub use ship_ops::{RemoteShipOps, ShipOps};
pub use st_client::{StClient, StClientTrait};
