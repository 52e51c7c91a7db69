//! MITRE ATT&CK mapping
//!
//! Small technique table used to enrich rules and lateral movement findings.
//! Stored as opaque strings on the wire.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy)]
pub struct MitreTechnique {
    pub id: &'static str,
    pub name: &'static str,
    pub tactic: &'static str,
}

pub static TECHNIQUES: Lazy<HashMap<&'static str, MitreTechnique>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert(
        "T1059",
        MitreTechnique {
            id: "T1059",
            name: "Command and Scripting Interpreter",
            tactic: "execution",
        },
    );
    m.insert(
        "T1059.001",
        MitreTechnique {
            id: "T1059.001",
            name: "PowerShell",
            tactic: "execution",
        },
    );
    m.insert(
        "T1003.001",
        MitreTechnique {
            id: "T1003.001",
            name: "LSASS Memory",
            tactic: "credential-access",
        },
    );
    m.insert(
        "T1105",
        MitreTechnique {
            id: "T1105",
            name: "Ingress Tool Transfer",
            tactic: "command-and-control",
        },
    );
    m.insert(
        "T1496",
        MitreTechnique {
            id: "T1496",
            name: "Resource Hijacking",
            tactic: "impact",
        },
    );
    m.insert(
        "T1021.001",
        MitreTechnique {
            id: "T1021.001",
            name: "Remote Desktop Protocol",
            tactic: "lateral-movement",
        },
    );
    m.insert(
        "T1021.002",
        MitreTechnique {
            id: "T1021.002",
            name: "SMB/Windows Admin Shares",
            tactic: "lateral-movement",
        },
    );
    m.insert(
        "T1021.004",
        MitreTechnique {
            id: "T1021.004",
            name: "SSH",
            tactic: "lateral-movement",
        },
    );
    m.insert(
        "T1021.006",
        MitreTechnique {
            id: "T1021.006",
            name: "Windows Remote Management",
            tactic: "lateral-movement",
        },
    );

    m
});

pub fn technique(id: &str) -> Option<&'static MitreTechnique> {
    TECHNIQUES.get(id)
}

/// Tactic label for a technique id, if known
pub fn tactic_for(id: &str) -> Option<&'static str> {
    technique(id).map(|t| t.tactic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technique_lookup() {
        let t = technique("T1021.002").unwrap();
        assert_eq!(t.name, "SMB/Windows Admin Shares");
        assert_eq!(t.tactic, "lateral-movement");
        assert!(technique("T9999").is_none());
    }

    #[test]
    fn test_tactic_for() {
        assert_eq!(tactic_for("T1059.001"), Some("execution"));
        assert_eq!(tactic_for("unknown"), None);
    }
}
