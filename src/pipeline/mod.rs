pub mod content;
pub mod extraction;
pub mod generation;
pub mod orchestrator;
pub mod transport;
pub mod translation;

pub use orchestrator::*;
pub use translation::*;
