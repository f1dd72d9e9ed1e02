pub mod conservative;
pub mod momentum;
pub mod registry;

pub use conservative::{ConservativeConfig, ConservativeTrendStrategy};
pub use momentum::{MomentumConfig, ModerateMomentumStrategy};
pub use registry::{RegistryValidation, StrategyInfo, StrategyRegistry};

#[cfg(test)]
mod tests;
