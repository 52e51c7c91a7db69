//! Data models

pub mod correlation;
pub mod indicator;
pub mod network;
pub mod profile;
pub mod rule;

pub use correlation::*;
pub use indicator::*;
pub use network::*;
pub use profile::*;
pub use rule::*;
