//! Real-time multi-strategy portfolio simulation over a shared cash and
//! position ledger.

pub mod models;
pub mod simulator;

pub use models::{
    BalancePoint, ClosedTrade, PortfolioStatus, PositionStatus, SimulatedPosition,
    SimulationReport,
};
pub use simulator::PortfolioSimulator;
