//! Detection engine
//!
//! In-memory indicator and rule stores with weighted-condition matching,
//! time-windowed indicator correlation, behavioral profiling, and response
//! action dispatch. All state lives behind one `RwLock` for the process
//! lifetime; nothing is persisted.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{
    BehavioralProfile, ConditionOperator, Correlation, CorrelationRule, CorrelationStatus,
    CreateCorrelationRule, CreateIndicator, CreateRule, DetectionRule, ObserveEntity,
    ResponseActionType, RiskAssessment, RiskFactor, RuleAction, RuleCondition, RuleMetadata,
    ThreatIndicator, UpdateRule,
};

use super::condition::ConditionEvaluator;
use super::enrichment;
use super::mitre;
use super::response::{ActionContext, ActionDispatcher, ActionRecord};

// Behavioral baseline smoothing factor
const BASELINE_ALPHA: f64 = 0.3;

// Risk factor weights
const ANOMALY_WEIGHT: f64 = 0.5;
const CORRELATION_WEIGHT: f64 = 0.3;
const MATURITY_WEIGHT: f64 = 0.2;

// Simulated event-stream counter range reported by the metrics endpoint
const SIMULATED_EVENTS_MIN: u64 = 5_000;
const SIMULATED_EVENTS_MAX: u64 = 15_000;

/// Engine-level counters for the overview endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetrics {
    /// Simulated event-stream volume; no real feed is attached
    pub total_events: u64,
    pub indicators: usize,
    pub active_rules: usize,
    pub correlation_rules: usize,
    pub correlations: usize,
    pub behavioral_profiles: usize,
    pub actions_executed: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    pub id: Uuid,
    pub name: String,
    pub score: f64,
    pub priority: f64,
}

/// Outcome of evaluating one event record against the rule store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub matched_rules: Vec<MatchedRule>,
    pub actions_dispatched: usize,
}

pub struct DetectionEngine {
    inner: RwLock<EngineState>,
    started_at: Instant,
}

struct EngineState {
    indicators: HashMap<Uuid, ThreatIndicator>,
    /// Ingest order; the maps alone do not preserve it
    indicator_order: Vec<Uuid>,
    rules: HashMap<Uuid, DetectionRule>,
    rule_order: Vec<Uuid>,
    correlation_rules: HashMap<Uuid, CorrelationRule>,
    correlation_rule_order: Vec<Uuid>,
    correlations: Vec<Correlation>,
    profiles: HashMap<String, BehavioralProfile>,
    evaluator: ConditionEvaluator,
    dispatcher: ActionDispatcher,
}

impl DetectionEngine {
    pub fn new(max_action_history: usize) -> Self {
        let mut state = EngineState {
            indicators: HashMap::new(),
            indicator_order: Vec::new(),
            rules: HashMap::new(),
            rule_order: Vec::new(),
            correlation_rules: HashMap::new(),
            correlation_rule_order: Vec::new(),
            correlations: Vec::new(),
            profiles: HashMap::new(),
            evaluator: ConditionEvaluator::new(),
            dispatcher: ActionDispatcher::new(max_action_history),
        };

        for rule in builtin_rules() {
            state.rule_order.push(rule.id);
            state.rules.insert(rule.id, rule);
        }
        for rule in builtin_correlation_rules() {
            state.correlation_rule_order.push(rule.id);
            state.correlation_rules.insert(rule.id, rule);
        }

        Self {
            inner: RwLock::new(state),
            started_at: Instant::now(),
        }
    }

    // ------------------------------------------------------------------
    // Indicators
    // ------------------------------------------------------------------

    /// Ingest an indicator: enrich, store, then run correlation checks
    pub fn add_indicator(&self, req: CreateIndicator) -> ThreatIndicator {
        let mut indicator = ThreatIndicator {
            id: Uuid::new_v4(),
            indicator_type: req.indicator_type,
            value: req.value,
            confidence: req.confidence,
            severity: req.severity,
            source: req.source,
            timestamp: Utc::now(),
            tags: req.tags,
            context: Default::default(),
        };
        enrichment::enrich(
            indicator.indicator_type,
            &indicator.value,
            &mut indicator.context,
        );

        let mut state = self.inner.write();
        state.indicator_order.push(indicator.id);
        state.indicators.insert(indicator.id, indicator.clone());

        let emitted = state.check_correlations(&indicator);
        if !emitted.is_empty() {
            tracing::info!(
                indicator = %indicator.value,
                correlations = emitted.len(),
                "indicator triggered correlations"
            );
        }

        indicator
    }

    pub fn indicator(&self, id: Uuid) -> Option<ThreatIndicator> {
        self.inner.read().indicators.get(&id).cloned()
    }

    pub fn indicators(&self) -> Vec<ThreatIndicator> {
        let state = self.inner.read();
        state
            .indicator_order
            .iter()
            .filter_map(|id| state.indicators.get(id))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Detection rules
    // ------------------------------------------------------------------

    pub fn add_rule(&self, req: CreateRule) -> DetectionRule {
        let now = Utc::now();

        let mut tactics = req.mitre_tactics;
        if tactics.is_empty() {
            for technique in &req.mitre_techniques {
                if let Some(tactic) = mitre::tactic_for(technique) {
                    if !tactics.iter().any(|t| t == tactic) {
                        tactics.push(tactic.to_string());
                    }
                }
            }
        }

        let rule = DetectionRule {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            enabled: req.enabled.unwrap_or(true),
            priority: req.priority,
            conditions: req.conditions,
            actions: req.actions,
            metadata: RuleMetadata {
                author: req.author.unwrap_or_else(|| "api".to_string()),
                created: now,
                modified: now,
                tags: req.tags,
                mitre_tactics: tactics,
                mitre_techniques: req.mitre_techniques,
            },
        };

        let mut state = self.inner.write();
        state.rule_order.push(rule.id);
        state.rules.insert(rule.id, rule.clone());
        tracing::debug!(rule = %rule.name, id = %rule.id, "detection rule created");
        rule
    }

    pub fn rule(&self, id: Uuid) -> Option<DetectionRule> {
        self.inner.read().rules.get(&id).cloned()
    }

    pub fn rules(&self) -> Vec<DetectionRule> {
        let state = self.inner.read();
        state
            .rule_order
            .iter()
            .filter_map(|id| state.rules.get(id))
            .cloned()
            .collect()
    }

    pub fn update_rule(&self, id: Uuid, req: UpdateRule) -> Option<DetectionRule> {
        let mut state = self.inner.write();
        let rule = state.rules.get_mut(&id)?;

        if let Some(name) = req.name {
            rule.name = name;
        }
        if let Some(description) = req.description {
            rule.description = description;
        }
        if let Some(enabled) = req.enabled {
            rule.enabled = enabled;
        }
        if let Some(priority) = req.priority {
            rule.priority = priority;
        }
        if let Some(conditions) = req.conditions {
            rule.conditions = conditions;
        }
        if let Some(actions) = req.actions {
            rule.actions = actions;
        }
        rule.metadata.modified = Utc::now();

        Some(rule.clone())
    }

    pub fn remove_rule(&self, id: Uuid) -> bool {
        let mut state = self.inner.write();
        if state.rules.remove(&id).is_some() {
            state.rule_order.retain(|rid| *rid != id);
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Correlation rules & correlations
    // ------------------------------------------------------------------

    pub fn add_correlation_rule(&self, req: CreateCorrelationRule) -> CorrelationRule {
        let rule = CorrelationRule {
            id: Uuid::new_v4(),
            name: req.name,
            enabled: req.enabled.unwrap_or(true),
            time_window_minutes: req.time_window_minutes,
            min_occurrences: req.min_occurrences,
            actions: req.actions,
        };

        let mut state = self.inner.write();
        state.correlation_rule_order.push(rule.id);
        state.correlation_rules.insert(rule.id, rule.clone());
        rule
    }

    pub fn correlation_rules(&self) -> Vec<CorrelationRule> {
        let state = self.inner.read();
        state
            .correlation_rule_order
            .iter()
            .filter_map(|id| state.correlation_rules.get(id))
            .cloned()
            .collect()
    }

    pub fn correlations(&self) -> Vec<Correlation> {
        self.inner.read().correlations.clone()
    }

    pub fn set_correlation_status(
        &self,
        id: Uuid,
        status: CorrelationStatus,
    ) -> Option<Correlation> {
        let mut state = self.inner.write();
        let correlation = state.correlations.iter_mut().find(|c| c.id == id)?;
        correlation.status = status;
        Some(correlation.clone())
    }

    // ------------------------------------------------------------------
    // Rule matching & evaluation
    // ------------------------------------------------------------------

    /// `match_rules(record) -> Vec<DetectionRule>`: a rule matches when the
    /// summed weights of its true conditions reach its priority. Returned in
    /// rule insertion order; no tie-breaking.
    pub fn match_rules(&self, record: &Value) -> Vec<DetectionRule> {
        let mut state = self.inner.write();
        state
            .match_rules_scored(record)
            .into_iter()
            .map(|(rule, _)| rule)
            .collect()
    }

    /// Evaluate a record and synchronously dispatch the actions of every
    /// matching rule
    pub fn evaluate_event(&self, record: &Value) -> EvaluationResult {
        let mut state = self.inner.write();
        let matched = state.match_rules_scored(record);

        let mut actions_dispatched = 0;
        for (rule, _) in &matched {
            let context = ActionContext {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                trigger: "event evaluation".to_string(),
            };
            for action in &rule.actions {
                state.dispatcher.execute(action, &context);
                actions_dispatched += 1;
            }
        }

        EvaluationResult {
            matched_rules: matched
                .into_iter()
                .map(|(rule, score)| MatchedRule {
                    id: rule.id,
                    name: rule.name,
                    score,
                    priority: rule.priority,
                })
                .collect(),
            actions_dispatched,
        }
    }

    pub fn action_history(&self) -> Vec<ActionRecord> {
        self.inner.read().dispatcher.history().to_vec()
    }

    // ------------------------------------------------------------------
    // Behavioral profiling & risk
    // ------------------------------------------------------------------

    pub fn observe_entity(&self, req: ObserveEntity) -> BehavioralProfile {
        let mut state = self.inner.write();
        state.observe(req)
    }

    pub fn profiles(&self) -> Vec<BehavioralProfile> {
        self.inner.read().profiles.values().cloned().collect()
    }

    pub fn assess_risk(&self, entity_id: &str) -> Option<RiskAssessment> {
        self.inner.read().assess_risk(entity_id)
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    pub fn metrics(&self) -> EngineMetrics {
        let state = self.inner.read();
        EngineMetrics {
            total_events: rand::thread_rng().gen_range(SIMULATED_EVENTS_MIN..SIMULATED_EVENTS_MAX),
            indicators: state.indicators.len(),
            active_rules: state.rules.values().filter(|r| r.enabled).count(),
            correlation_rules: state.correlation_rules.len(),
            correlations: state.correlations.len(),
            behavioral_profiles: state.profiles.len(),
            actions_executed: state.dispatcher.total_executed(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl EngineState {
    fn match_rules_scored(&mut self, record: &Value) -> Vec<(DetectionRule, f64)> {
        // Clone candidates so the evaluator's regex cache can borrow mutably
        let candidates: Vec<DetectionRule> = self
            .rule_order
            .iter()
            .filter_map(|id| self.rules.get(id))
            .filter(|rule| rule.enabled)
            .cloned()
            .collect();

        let mut matched = Vec::new();
        for rule in candidates {
            let score: f64 = rule
                .conditions
                .iter()
                .filter(|c| self.evaluator.evaluate(c, record))
                .map(|c| c.weight)
                .sum();

            if score >= rule.priority {
                matched.push((rule, score));
            }
        }
        matched
    }

    /// `check_correlations(indicator) -> Vec<Correlation>`
    ///
    /// Linear scan of all stored indicators per rule; an indicator joins the
    /// group when it shares the trigger's type or its non-empty geolocation.
    fn check_correlations(&mut self, trigger: &ThreatIndicator) -> Vec<Correlation> {
        let mut emitted = Vec::new();
        let trigger_geo = trigger
            .context
            .geolocation
            .as_deref()
            .filter(|g| !g.is_empty());

        let rule_ids: Vec<Uuid> = self.correlation_rule_order.clone();
        for rule_id in rule_ids {
            let Some(rule) = self.correlation_rules.get(&rule_id) else {
                continue;
            };
            if !rule.enabled {
                continue;
            }

            let cutoff = trigger.timestamp - Duration::minutes(rule.time_window_minutes);
            let members: Vec<ThreatIndicator> = self
                .indicator_order
                .iter()
                .filter_map(|id| self.indicators.get(id))
                .filter(|i| i.timestamp >= cutoff)
                .filter(|i| {
                    i.indicator_type == trigger.indicator_type
                        || (trigger_geo.is_some()
                            && i.context.geolocation.as_deref() == trigger_geo)
                })
                .cloned()
                .collect();

            if members.len() < rule.min_occurrences {
                continue;
            }

            let confidence =
                members.iter().map(|i| i.confidence).sum::<f64>() / members.len() as f64;
            let severity = members
                .iter()
                .map(|i| i.severity.rank())
                .max()
                .unwrap_or(1);

            let correlation = Correlation {
                id: Uuid::new_v4(),
                rule_id: rule.id,
                indicators: members,
                confidence,
                severity,
                timestamp: Utc::now(),
                status: CorrelationStatus::Active,
            };

            let context = ActionContext {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                trigger: format!("indicator {}", trigger.value),
            };
            let actions = rule.actions.clone();
            for action in &actions {
                self.dispatcher.execute(action, &context);
            }

            self.correlations.push(correlation.clone());
            emitted.push(correlation);
        }

        emitted
    }

    fn observe(&mut self, req: ObserveEntity) -> BehavioralProfile {
        let now = Utc::now();
        let profile = self
            .profiles
            .entry(req.entity_id.clone())
            .or_insert_with(|| BehavioralProfile {
                entity_id: req.entity_id.clone(),
                entity_type: req.entity_type.clone(),
                baseline: HashMap::new(),
                anomaly_score: 0.0,
                samples: 0,
                last_updated: now,
            });

        let mut deviations = Vec::new();
        for (metric, value) in &req.metrics {
            let baseline = profile.baseline.entry(metric.clone()).or_insert(*value);
            deviations.push((value - *baseline).abs() / (baseline.abs() + 1.0));
            *baseline = (1.0 - BASELINE_ALPHA) * *baseline + BASELINE_ALPHA * value;
        }

        let mean_deviation =
            deviations.iter().sum::<f64>() / deviations.len().max(1) as f64;
        profile.anomaly_score = mean_deviation.min(1.0);
        profile.samples += 1;
        profile.last_updated = now;

        profile.clone()
    }

    fn assess_risk(&self, entity_id: &str) -> Option<RiskAssessment> {
        let profile = self.profiles.get(entity_id)?;

        let anomaly_points = profile.anomaly_score * 100.0;
        let correlation_hits = self
            .correlations
            .iter()
            .filter(|c| c.indicators.iter().any(|i| i.value == entity_id))
            .count();
        let correlation_points = (correlation_hits as f64 * 20.0).min(100.0);
        // New entities carry baseline uncertainty
        let maturity_points = 100.0 / (1.0 + profile.samples as f64);

        let factors = vec![
            RiskFactor {
                name: "behavioral_anomaly".to_string(),
                weight: ANOMALY_WEIGHT,
                score: anomaly_points,
                detail: format!("anomaly score {:.2}", profile.anomaly_score),
            },
            RiskFactor {
                name: "correlation_membership".to_string(),
                weight: CORRELATION_WEIGHT,
                score: correlation_points,
                detail: format!("{} correlation(s) reference this entity", correlation_hits),
            },
            RiskFactor {
                name: "baseline_maturity".to_string(),
                weight: MATURITY_WEIGHT,
                score: maturity_points,
                detail: format!("{} observation(s)", profile.samples),
            },
        ];

        let risk_score = factors
            .iter()
            .map(|f| f.weight * f.score)
            .sum::<f64>()
            .clamp(0.0, 100.0);

        Some(RiskAssessment {
            entity_id: entity_id.to_string(),
            risk_score,
            factors,
            computed_at: Utc::now(),
        })
    }
}

// ----------------------------------------------------------------------
// Built-in rules
// ----------------------------------------------------------------------

fn condition(field: &str, operator: ConditionOperator, value: Value, weight: f64) -> RuleCondition {
    RuleCondition {
        field: field.to_string(),
        operator,
        value,
        weight,
    }
}

fn alert(target: &str) -> RuleAction {
    RuleAction {
        action_type: ResponseActionType::Alert,
        target: target.to_string(),
        parameters: Value::Null,
    }
}

fn builtin_rule(
    name: &str,
    description: &str,
    priority: f64,
    conditions: Vec<RuleCondition>,
    actions: Vec<RuleAction>,
    techniques: &[&str],
) -> DetectionRule {
    let now = Utc::now();
    let mut tactics: Vec<String> = Vec::new();
    for technique in techniques {
        if let Some(tactic) = mitre::tactic_for(technique) {
            if !tactics.iter().any(|t| t == tactic) {
                tactics.push(tactic.to_string());
            }
        }
    }

    DetectionRule {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: description.to_string(),
        enabled: true,
        priority,
        conditions,
        actions,
        metadata: RuleMetadata {
            author: "builtin".to_string(),
            created: now,
            modified: now,
            tags: vec!["builtin".to_string()],
            mitre_tactics: tactics,
            mitre_techniques: techniques.iter().map(|t| t.to_string()).collect(),
        },
    }
}

fn builtin_rules() -> Vec<DetectionRule> {
    vec![
        builtin_rule(
            "Encoded PowerShell Execution",
            "PowerShell running with an encoded command line",
            12.0,
            vec![
                condition(
                    "process.name",
                    ConditionOperator::Equals,
                    json!("powershell.exe"),
                    4.0,
                ),
                condition(
                    "process.command_line",
                    ConditionOperator::Regex,
                    json!("(?i)-enc|-encodedcommand"),
                    8.0,
                ),
            ],
            vec![alert("soc")],
            &["T1059.001"],
        ),
        builtin_rule(
            "LSASS Memory Access Tooling",
            "Known credential-dump tooling or lsass referenced on a command line",
            10.0,
            vec![
                condition(
                    "process.name",
                    ConditionOperator::In,
                    json!(["procdump.exe", "mimikatz.exe"]),
                    10.0,
                ),
                condition(
                    "process.command_line",
                    ConditionOperator::Regex,
                    json!("(?i)lsass"),
                    10.0,
                ),
            ],
            vec![
                alert("soc"),
                RuleAction {
                    action_type: ResponseActionType::Isolate,
                    target: "endpoint".to_string(),
                    parameters: Value::Null,
                },
            ],
            &["T1003.001"],
        ),
        builtin_rule(
            "Certutil File Download",
            "Certutil used to fetch a remote file (LOLBin abuse)",
            10.0,
            vec![
                condition(
                    "process.name",
                    ConditionOperator::Equals,
                    json!("certutil.exe"),
                    5.0,
                ),
                condition(
                    "process.command_line",
                    ConditionOperator::Regex,
                    json!("(?i)-urlcache|-split"),
                    5.0,
                ),
            ],
            vec![alert("soc")],
            &["T1105"],
        ),
        builtin_rule(
            "High-Confidence Severe Threat",
            "Feed match with high confidence and high or critical severity",
            10.0,
            vec![
                condition(
                    "threat.confidence",
                    ConditionOperator::Greater,
                    json!(0.9),
                    6.0,
                ),
                condition(
                    "threat.severity",
                    ConditionOperator::In,
                    json!(["high", "critical"]),
                    4.0,
                ),
            ],
            vec![RuleAction {
                action_type: ResponseActionType::Block,
                target: "firewall".to_string(),
                parameters: Value::Null,
            }],
            &[],
        ),
    ]
}

fn builtin_correlation_rules() -> Vec<CorrelationRule> {
    vec![
        CorrelationRule {
            id: Uuid::new_v4(),
            name: "Indicator burst".to_string(),
            enabled: true,
            time_window_minutes: 60,
            min_occurrences: 3,
            actions: vec![alert("soc")],
        },
        CorrelationRule {
            id: Uuid::new_v4(),
            name: "Shared infrastructure cluster".to_string(),
            enabled: true,
            time_window_minutes: 1440,
            min_occurrences: 5,
            actions: vec![RuleAction {
                action_type: ResponseActionType::Notify,
                target: "threat-intel".to_string(),
                parameters: Value::Null,
            }],
        },
    ]
}
