//! Network analysis models

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

/// A single observed network flow between two hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFlow {
    pub id: Uuid,
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,
    pub source_port: u16,
    pub dest_port: u16,
    pub protocol: Protocol,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub flags: Vec<String>,
}

/// Flow ingestion request body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlow {
    pub source_ip: IpAddr,
    pub dest_ip: IpAddr,

    pub source_port: u16,

    #[validate(range(min = 1, message = "destination port must be non-zero"))]
    pub dest_port: u16,

    pub protocol: Protocol,

    #[serde(default)]
    pub bytes_sent: u64,

    #[serde(default)]
    pub bytes_received: u64,

    #[serde(default)]
    pub packets: u64,

    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub flags: Vec<String>,
}

/// A source host fanning out to internal targets over an admin protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LateralMovement {
    pub id: Uuid,
    pub source_host: IpAddr,
    /// Most recently reached target; evidence lists the full set
    pub target_host: IpAddr,
    pub technique: String,
    pub mitre_technique: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    pub ip: IpAddr,
    pub internal: bool,
    pub flows: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyEdge {
    pub source: String,
    pub dest: String,
    pub flows: usize,
    pub bytes: u64,
}

/// Host/edge graph derived from stored flows on demand
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTopology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
    pub generated_at: DateTime<Utc>,
}
