//! ECS Components
//!
//! Entity components for things, intents, orders, workers and benches.

pub mod bench;
pub mod intent;
pub mod order;
pub mod thing;
pub mod worker;
pub mod world;

pub use bench::*;
pub use intent::*;
pub use order::*;
pub use thing::*;
pub use worker::*;
pub use world::*;
