//! Network analysis engine
//!
//! Flow store with on-demand lateral movement detection and topology
//! derivation. Like the detection engine, everything is process-local and
//! lock-protected; flows are the only input.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Instant;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    CreateFlow, LateralMovement, NetworkFlow, NetworkTopology, TopologyEdge, TopologyNode,
};

use super::mitre;

/// A source host reaching at least this many distinct internal targets on an
/// admin protocol within the scan window is flagged
const LATERAL_FANOUT_THRESHOLD: usize = 3;

/// Lateral movement scan window
const LATERAL_WINDOW_MINUTES: i64 = 30;

/// Admin-protocol ports and their MITRE remote-services techniques
const ADMIN_PORTS: &[(u16, &str, &str)] = &[
    (445, "SMB", "T1021.002"),
    (3389, "RDP", "T1021.001"),
    (22, "SSH", "T1021.004"),
    (5985, "WinRM", "T1021.006"),
    (5986, "WinRM", "T1021.006"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub flows: usize,
    pub monitored_hosts: usize,
    pub bytes_observed: u64,
    pub lateral_movements: usize,
    pub uptime_seconds: u64,
}

pub struct NetworkAnalysis {
    inner: RwLock<NetworkState>,
    started_at: Instant,
}

struct NetworkState {
    flows: HashMap<Uuid, NetworkFlow>,
    flow_order: Vec<Uuid>,
}

impl NetworkAnalysis {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(NetworkState {
                flows: HashMap::new(),
                flow_order: Vec::new(),
            }),
            started_at: Instant::now(),
        }
    }

    pub fn record_flow(&self, req: CreateFlow) -> NetworkFlow {
        let flow = NetworkFlow {
            id: Uuid::new_v4(),
            source_ip: req.source_ip,
            dest_ip: req.dest_ip,
            source_port: req.source_port,
            dest_port: req.dest_port,
            protocol: req.protocol,
            bytes_sent: req.bytes_sent,
            bytes_received: req.bytes_received,
            packets: req.packets,
            start_time: Utc::now(),
            end_time: req.end_time,
            flags: req.flags,
        };

        let mut state = self.inner.write();
        state.flow_order.push(flow.id);
        state.flows.insert(flow.id, flow.clone());
        flow
    }

    pub fn flow(&self, id: Uuid) -> Option<NetworkFlow> {
        self.inner.read().flows.get(&id).cloned()
    }

    pub fn flows(&self) -> Vec<NetworkFlow> {
        let state = self.inner.read();
        state
            .flow_order
            .iter()
            .filter_map(|id| state.flows.get(id))
            .cloned()
            .collect()
    }

    pub fn remove_flow(&self, id: Uuid) -> bool {
        let mut state = self.inner.write();
        if state.flows.remove(&id).is_some() {
            state.flow_order.retain(|fid| *fid != id);
            true
        } else {
            false
        }
    }

    /// Scan stored flows for admin-protocol fan-out from a single source
    pub fn detect_lateral_movement(&self) -> Vec<LateralMovement> {
        let state = self.inner.read();
        let cutoff = Utc::now() - Duration::minutes(LATERAL_WINDOW_MINUTES);

        // (source, service) -> distinct internal targets, most recent last
        let mut fanout: HashMap<(IpAddr, &'static str, &'static str), Vec<IpAddr>> =
            HashMap::new();

        for flow in state
            .flow_order
            .iter()
            .filter_map(|id| state.flows.get(id))
        {
            if flow.start_time < cutoff || !is_internal(flow.dest_ip) {
                continue;
            }
            let Some((_, service, technique)) = ADMIN_PORTS
                .iter()
                .copied()
                .find(|(port, _, _)| *port == flow.dest_port)
            else {
                continue;
            };

            let targets = fanout
                .entry((flow.source_ip, service, technique))
                .or_default();
            if !targets.contains(&flow.dest_ip) {
                targets.push(flow.dest_ip);
            }
        }

        let mut findings = Vec::new();
        for ((source, service, technique_id), targets) in fanout {
            if targets.len() < LATERAL_FANOUT_THRESHOLD {
                continue;
            }

            let technique_name = mitre::technique(technique_id)
                .map(|t| t.name.to_string())
                .unwrap_or_else(|| technique_id.to_string());
            // Confidence grows with fan-out beyond the threshold
            let confidence =
                (0.5 + 0.1 * (targets.len() - LATERAL_FANOUT_THRESHOLD) as f64).min(0.95);

            let target_host = *targets.last().unwrap_or(&source);
            let target_list = targets
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ");

            findings.push(LateralMovement {
                id: Uuid::new_v4(),
                source_host: source,
                target_host,
                technique: format!("Remote Services: {}", technique_name),
                mitre_technique: technique_id.to_string(),
                confidence,
                timestamp: Utc::now(),
                evidence: vec![
                    format!(
                        "{} distinct internal {} targets within {} minutes",
                        targets.len(),
                        service,
                        LATERAL_WINDOW_MINUTES
                    ),
                    format!("targets: {}", target_list),
                ],
            });
        }

        findings
    }

    /// Derive the host/edge graph from stored flows
    pub fn topology(&self) -> NetworkTopology {
        let state = self.inner.read();

        let mut node_stats: HashMap<IpAddr, (usize, u64)> = HashMap::new();
        let mut edge_stats: HashMap<(IpAddr, IpAddr), (usize, u64)> = HashMap::new();

        for flow in state
            .flow_order
            .iter()
            .filter_map(|id| state.flows.get(id))
        {
            let bytes = flow.bytes_sent + flow.bytes_received;

            for ip in [flow.source_ip, flow.dest_ip] {
                let entry = node_stats.entry(ip).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += bytes;
            }

            let edge = edge_stats
                .entry((flow.source_ip, flow.dest_ip))
                .or_insert((0, 0));
            edge.0 += 1;
            edge.1 += bytes;
        }

        let mut nodes: Vec<TopologyNode> = node_stats
            .into_iter()
            .map(|(ip, (flows, bytes))| TopologyNode {
                id: ip.to_string(),
                ip,
                internal: is_internal(ip),
                flows,
                bytes,
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<TopologyEdge> = edge_stats
            .into_iter()
            .map(|((source, dest), (flows, bytes))| TopologyEdge {
                source: source.to_string(),
                dest: dest.to_string(),
                flows,
                bytes,
            })
            .collect();
        edges.sort_by(|a, b| (&a.source, &a.dest).cmp(&(&b.source, &b.dest)));

        NetworkTopology {
            nodes,
            edges,
            generated_at: Utc::now(),
        }
    }

    pub fn metrics(&self) -> NetworkMetrics {
        // Taken before the read lock below; detection acquires its own
        let lateral_movements = self.detect_lateral_movement().len();

        let state = self.inner.read();
        let mut hosts: HashSet<IpAddr> = HashSet::new();
        let mut bytes = 0u64;
        for flow in state.flows.values() {
            hosts.insert(flow.source_ip);
            hosts.insert(flow.dest_ip);
            bytes += flow.bytes_sent + flow.bytes_received;
        }

        NetworkMetrics {
            flows: state.flows.len(),
            monitored_hosts: hosts.len(),
            bytes_observed: bytes,
            lateral_movements,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for NetworkAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

/// RFC1918/loopback/link-local for v4; loopback and unique-local for v6
fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;

    fn flow(source: &str, dest: &str, dest_port: u16) -> CreateFlow {
        CreateFlow {
            source_ip: source.parse().unwrap(),
            dest_ip: dest.parse().unwrap(),
            source_port: 50000,
            dest_port,
            protocol: Protocol::Tcp,
            bytes_sent: 1024,
            bytes_received: 2048,
            packets: 10,
            end_time: None,
            flags: vec![],
        }
    }

    #[test]
    fn test_flow_round_trip() {
        let net = NetworkAnalysis::new();
        let created = net.record_flow(flow("10.0.0.5", "10.0.0.9", 443));

        let fetched = net.flow(created.id).unwrap();
        assert_eq!(fetched.dest_port, 443);
        assert_eq!(fetched.bytes_sent, 1024);

        assert!(net.remove_flow(created.id));
        assert!(net.flow(created.id).is_none());
    }

    #[test]
    fn test_lateral_movement_fanout_threshold() {
        let net = NetworkAnalysis::new();
        net.record_flow(flow("10.0.0.5", "10.0.1.1", 445));
        net.record_flow(flow("10.0.0.5", "10.0.1.2", 445));
        assert!(net.detect_lateral_movement().is_empty());

        net.record_flow(flow("10.0.0.5", "10.0.1.3", 445));
        let findings = net.detect_lateral_movement();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.source_host, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(finding.mitre_technique, "T1021.002");
        assert!(finding.technique.contains("SMB"));
        assert!(finding.confidence >= 0.5);
        assert_eq!(finding.evidence.len(), 2);
    }

    #[test]
    fn test_lateral_movement_ignores_external_targets() {
        let net = NetworkAnalysis::new();
        // Public destinations do not count toward fan-out
        net.record_flow(flow("10.0.0.5", "203.0.113.1", 445));
        net.record_flow(flow("10.0.0.5", "203.0.113.2", 445));
        net.record_flow(flow("10.0.0.5", "203.0.113.3", 445));
        assert!(net.detect_lateral_movement().is_empty());
    }

    #[test]
    fn test_lateral_movement_repeat_target_counts_once() {
        let net = NetworkAnalysis::new();
        for _ in 0..5 {
            net.record_flow(flow("10.0.0.5", "10.0.1.1", 3389));
        }
        assert!(net.detect_lateral_movement().is_empty());
    }

    #[test]
    fn test_topology_aggregation() {
        let net = NetworkAnalysis::new();
        net.record_flow(flow("10.0.0.5", "10.0.0.9", 443));
        net.record_flow(flow("10.0.0.5", "10.0.0.9", 443));
        net.record_flow(flow("10.0.0.9", "203.0.113.1", 80));

        let topology = net.topology();
        assert_eq!(topology.nodes.len(), 3);
        assert_eq!(topology.edges.len(), 2);

        let edge = topology
            .edges
            .iter()
            .find(|e| e.source == "10.0.0.5" && e.dest == "10.0.0.9")
            .unwrap();
        assert_eq!(edge.flows, 2);
        assert_eq!(edge.bytes, 2 * (1024 + 2048));

        let external = topology
            .nodes
            .iter()
            .find(|n| n.id == "203.0.113.1")
            .unwrap();
        assert!(!external.internal);
    }

    #[test]
    fn test_metrics() {
        let net = NetworkAnalysis::new();
        net.record_flow(flow("10.0.0.5", "10.0.0.9", 443));

        let metrics = net.metrics();
        assert_eq!(metrics.flows, 1);
        assert_eq!(metrics.monitored_hosts, 2);
        assert_eq!(metrics.bytes_observed, 1024 + 2048);
    }
}
