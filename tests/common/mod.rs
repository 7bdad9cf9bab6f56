pub mod mocks;
pub mod strategies;

pub use mocks::*;
pub use strategies::*;
