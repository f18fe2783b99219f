// evaluator.rs — Effective policy evaluation.
//
// The evaluator composes up to four layer documents into one effective
// policy:
//
// 1. Build the ordered layer list [network?, local, handshake?, capsule?]
// 2. Collect each layer's ingress/egress sub-policy (local falls back to the
//    default sub-policy for a domain it omits; other layers that omit a
//    domain simply don't take part in that domain's fold)
// 3. Fold ingress and egress with the layer intersectors
// 4. Score the combined policy into a risk tier
// 5. Decide whether the capsule asks the user for more than the handshake
//    layer grants (consent)
//
// Absent layers are excluded, never treated as fully open. Evaluation is
// total and pure apart from the id/timestamp drawn from the MetadataSource.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EvaluatorConfig;
use crate::error::PolicyError;
use crate::intersect::{intersect_egress, intersect_ingress};
use crate::record::{PolicyDecision, PolicyDenial};
use crate::risk::assess_risk;
use crate::schema::{CanonicalPolicy, EgressPolicy, IngressPolicy, PolicyLayer, RiskTier};

/// The documents supplied for one evaluation, one explicit slot per layer.
#[derive(Debug, Clone, Copy)]
pub struct PolicyStack<'a> {
    pub network: Option<&'a CanonicalPolicy>,
    pub local: &'a CanonicalPolicy,
    pub handshake: Option<&'a CanonicalPolicy>,
    pub capsule: Option<&'a CanonicalPolicy>,
}

impl<'a> PolicyStack<'a> {
    /// A stack with only the mandatory local layer.
    pub fn new(local: &'a CanonicalPolicy) -> Self {
        Self {
            network: None,
            local,
            handshake: None,
            capsule: None,
        }
    }

    pub fn with_network(mut self, network: &'a CanonicalPolicy) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_handshake(mut self, handshake: &'a CanonicalPolicy) -> Self {
        self.handshake = Some(handshake);
        self
    }

    pub fn with_capsule(mut self, capsule: &'a CanonicalPolicy) -> Self {
        self.capsule = Some(capsule);
        self
    }

    /// Supplied layers in evaluation order.
    pub fn layers(&self) -> Vec<(PolicyLayer, &'a CanonicalPolicy)> {
        [
            (PolicyLayer::Network, self.network),
            (PolicyLayer::Local, Some(self.local)),
            (PolicyLayer::Handshake, self.handshake),
            (PolicyLayer::Capsule, self.capsule),
        ]
        .into_iter()
        .filter_map(|(layer, doc)| doc.map(|d| (layer, d)))
        .collect()
    }

    /// Caller-side input-contract check: every document must be active and
    /// tagged with the layer it is supplied as.
    ///
    /// Evaluation itself does not require this to pass.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (layer, doc) in self.layers() {
            if doc.layer != layer {
                return Err(PolicyError::LayerMismatch {
                    policy_id: doc.id.clone(),
                    expected: layer,
                    found: doc.layer,
                });
            }
            if !doc.is_active {
                return Err(PolicyError::InactivePolicy {
                    policy_id: doc.id.clone(),
                    layer,
                });
            }
        }
        Ok(())
    }
}

/// Source of the only non-deterministic parts of an evaluation.
pub trait MetadataSource: Send + Sync {
    /// A fresh unique identifier.
    fn next_id(&self) -> String;
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Random UUIDs and the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMetadata;

impl MetadataSource for SystemMetadata {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed id and timestamp, for reproducible evaluations.
#[derive(Debug, Clone)]
pub struct FixedMetadata {
    pub id: String,
    pub at: DateTime<Utc>,
}

impl MetadataSource for FixedMetadata {
    fn next_id(&self) -> String {
        self.id.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

/// A capability the capsule requests beyond what the handshake layer grants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsentTrigger {
    /// Capsule allows dynamic content the handshake layer doesn't.
    DynamicContent,
    /// Capsule allows reconstruction the handshake layer doesn't.
    Reconstruction,
    /// Capsule allows bulk export the handshake layer doesn't.
    BulkExport,
    /// Capsule drops an approval requirement the handshake layer imposes.
    ApprovalBypass,
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePolicyResult {
    /// The synthesized effective policy.
    pub effective: CanonicalPolicy,
    /// Ingress decisions followed by egress decisions, in fold order.
    pub decisions: Vec<PolicyDecision>,
    /// Ingress denials followed by egress denials, in fold order.
    pub denials: Vec<PolicyDenial>,
    pub requires_consent: bool,
    /// Why consent is required; empty when it isn't.
    pub consent_triggers: Vec<ConsentTrigger>,
    pub effective_risk_tier: RiskTier,
    /// Layers that took part, in evaluation order.
    pub applied_layers: Vec<PolicyLayer>,
    pub evaluated_at: DateTime<Utc>,
}

/// Composes layer stacks into effective policies.
pub struct PolicyEvaluator {
    config: EvaluatorConfig,
    metadata: Box<dyn MetadataSource>,
}

impl PolicyEvaluator {
    /// Create an evaluator using the system clock and random ids.
    ///
    /// The config is validated here as well, so thresholds built in code
    /// are held to the same rules as ones loaded from TOML.
    pub fn new(config: EvaluatorConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self {
            config,
            metadata: Box::new(SystemMetadata),
        })
    }

    /// Replace the id/timestamp source.
    pub fn with_metadata(mut self, metadata: impl MetadataSource + 'static) -> Self {
        self.metadata = Box::new(metadata);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Compute the effective policy for a layer stack.
    pub fn evaluate(&self, stack: &PolicyStack<'_>) -> EffectivePolicyResult {
        let layers = stack.layers();
        let applied_layers: Vec<PolicyLayer> = layers.iter().map(|(layer, _)| *layer).collect();

        for (layer, doc) in &layers {
            if doc.layer != *layer {
                warn!(
                    policy_id = %doc.id,
                    supplied_as = %layer,
                    tagged_as = %doc.layer,
                    "policy layer tag does not match its slot"
                );
            }
        }

        let default_ingress = IngressPolicy::default();
        let default_egress = EgressPolicy::default();

        let ingress_slots: Vec<(PolicyLayer, Option<&IngressPolicy>)> = layers
            .iter()
            .map(|(layer, doc)| match (layer, doc.ingress.as_ref()) {
                (PolicyLayer::Local, None) => (*layer, Some(&default_ingress)),
                (_, sub) => (*layer, sub),
            })
            .collect();
        let egress_slots: Vec<(PolicyLayer, Option<&EgressPolicy>)> = layers
            .iter()
            .map(|(layer, doc)| match (layer, doc.egress.as_ref()) {
                (PolicyLayer::Local, None) => (*layer, Some(&default_egress)),
                (_, sub) => (*layer, sub),
            })
            .collect();

        let ingress = intersect_ingress(&ingress_slots);
        let egress = intersect_egress(&egress_slots);

        let effective_risk_tier = assess_risk(&ingress.policy, &egress.policy, &self.config.risk);
        let consent_triggers = consent_triggers(stack.handshake, stack.capsule);
        let requires_consent = !consent_triggers.is_empty();

        let mut decisions = ingress.decisions;
        decisions.extend(egress.decisions);
        let mut denials = ingress.denials;
        denials.extend(egress.denials);

        let evaluated_at = self.metadata.now();
        let effective = self.synthesize(
            &applied_layers,
            ingress.policy,
            egress.policy,
            effective_risk_tier,
            evaluated_at,
        );

        info!(
            effective_id = %effective.id,
            layers = ?applied_layers,
            decisions = decisions.len(),
            denials = denials.len(),
            risk_tier = %effective_risk_tier,
            requires_consent,
            "effective policy computed"
        );

        EffectivePolicyResult {
            effective,
            decisions,
            denials,
            requires_consent,
            consent_triggers,
            effective_risk_tier,
            applied_layers,
            evaluated_at,
        }
    }

    fn synthesize(
        &self,
        applied_layers: &[PolicyLayer],
        ingress: IngressPolicy,
        egress: EgressPolicy,
        risk_tier: RiskTier,
        at: DateTime<Utc>,
    ) -> CanonicalPolicy {
        let names: Vec<&str> = applied_layers.iter().map(|l| l.as_str()).collect();
        let mut tags: BTreeSet<String> = BTreeSet::new();
        tags.insert("effective".to_string());
        tags.extend(names.iter().map(|n| n.to_string()));

        CanonicalPolicy {
            id: format!("{}-{}", self.config.effective.id_prefix, self.metadata.next_id()),
            name: self.config.effective.name.clone(),
            description: format!("Intersection of layers: {}", names.join(", ")),
            layer: applied_layers.last().copied().unwrap_or(PolicyLayer::Local),
            version: 1,
            created_at: at,
            updated_at: at,
            risk_tier,
            is_active: true,
            tags,
            ingress: Some(ingress),
            egress: Some(egress),
        }
    }
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self {
            config: EvaluatorConfig::default(),
            metadata: Box::new(SystemMetadata),
        }
    }
}

/// Compute the effective policy with the default evaluator.
pub fn compute_effective_policy(stack: &PolicyStack<'_>) -> EffectivePolicyResult {
    PolicyEvaluator::default().evaluate(stack)
}

/// What the capsule requests beyond the handshake layer.
///
/// Only meaningful when both layers are supplied. A handshake document that
/// omits a domain grants what the default sub-policy grants.
fn consent_triggers(
    handshake: Option<&CanonicalPolicy>,
    capsule: Option<&CanonicalPolicy>,
) -> Vec<ConsentTrigger> {
    let (Some(handshake), Some(capsule)) = (handshake, capsule) else {
        return Vec::new();
    };

    let mut triggers = Vec::new();

    if let Some(asked) = &capsule.ingress {
        let granted = handshake.ingress.clone().unwrap_or_default();
        if asked.allow_dynamic_content && !granted.allow_dynamic_content {
            triggers.push(ConsentTrigger::DynamicContent);
        }
        if asked.allow_reconstruction && !granted.allow_reconstruction {
            triggers.push(ConsentTrigger::Reconstruction);
        }
    }

    if let Some(asked) = &capsule.egress {
        let granted = handshake.egress.clone().unwrap_or_default();
        if asked.allow_bulk_export && !granted.allow_bulk_export {
            triggers.push(ConsentTrigger::BulkExport);
        }
        if granted.require_approval && !asked.require_approval {
            triggers.push(ConsentTrigger::ApprovalBypass);
        }
    }

    triggers
}
