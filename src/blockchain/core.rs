// core.rs splits the engine into the chain state machine and the pure validator.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
