pub mod frm;
pub mod ids;
pub mod market;
pub mod outcome;
pub mod ship;
pub mod trade;
pub mod waypoint;
pub mod wire;

pub use frm::*;
pub use ids::*;
pub use market::*;
pub use outcome::*;
pub use ship::*;
pub use trade::*;
pub use waypoint::*;
pub use wire::*;
