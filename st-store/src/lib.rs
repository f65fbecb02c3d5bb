pub mod adapter;
pub mod bmc;
pub mod db;

pub use adapter::*;
pub use bmc::*;
pub use db::*;
