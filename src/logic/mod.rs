//! Business logic & engines
//!
//! - `condition` - dotted-path condition evaluation
//! - `detection` - indicator/rule stores, scoring, correlation
//! - `network` - flow store, lateral movement, topology
//! - `response` - action dispatch with bounded history
//! - `enrichment` - indicator context fill
//! - `mitre` - ATT&CK technique table

pub mod condition;
pub mod detection;
pub mod enrichment;
pub mod mitre;
pub mod network;
pub mod response;

pub use detection::DetectionEngine;
pub use network::NetworkAnalysis;
