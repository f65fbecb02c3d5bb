pub mod extract_haul;
pub mod greedy_trader;
pub mod market_intel;

pub use extract_haul::ExtractHaulController;
pub use greedy_trader::GreedyTraderController;
pub use market_intel::{MarketIntelController, MarketIntelMode};
