pub mod error;
pub mod helpers;
pub mod strategy;
pub mod types;

pub use error::*;
pub use strategy::*;
pub use types::*;
