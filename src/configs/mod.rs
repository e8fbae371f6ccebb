pub mod base;
pub mod bot;
pub mod engine;
pub mod gateway;
pub mod logging;
pub mod spotify;

pub use base::*;
pub use bot::*;
pub use engine::*;
pub use gateway::*;
pub use logging::*;
pub use spotify::*;
