// schema.rs — Policy document shapes and default sub-policies.
//
// A CanonicalPolicy is one layer's permission document. It carries two
// optional sub-policies: ingress (what may come in) and egress (what may go
// out). Documents are authored elsewhere and are read-only here; the
// evaluator only ever produces new documents.
//
// Serialized field names are camelCase so documents written by the editor
// round-trip unchanged. Omitted sub-policy fields take the default
// sub-policy's value, which is conservative (fail-closed).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// The four policy layers, most authoritative first.
///
/// Layer order is the fold order used by the evaluator: a later layer can
/// only narrow what earlier layers permit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyLayer {
    /// Network baseline: organization-wide.
    Network,
    /// Local node: device/user level, always present.
    Local,
    /// Handshake: per trusted sender.
    Handshake,
    /// Capsule: per request.
    Capsule,
}

impl PolicyLayer {
    /// All layers in evaluation order.
    pub const ALL: [PolicyLayer; 4] = [
        PolicyLayer::Network,
        PolicyLayer::Local,
        PolicyLayer::Handshake,
        PolicyLayer::Capsule,
    ];

    /// Authority rank: 0 is the most authoritative.
    pub fn authority(self) -> u8 {
        match self {
            PolicyLayer::Network => 0,
            PolicyLayer::Local => 1,
            PolicyLayer::Handshake => 2,
            PolicyLayer::Capsule => 3,
        }
    }

    /// Whether this layer must always be supplied to the evaluator.
    pub fn is_mandatory(self) -> bool {
        self == PolicyLayer::Local
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyLayer::Network => "network",
            PolicyLayer::Local => "local",
            PolicyLayer::Handshake => "handshake",
            PolicyLayer::Capsule => "capsule",
        }
    }
}

impl fmt::Display for PolicyLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of a policy a field or record belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDomain {
    Ingress,
    Egress,
}

impl fmt::Display for PolicyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDomain::Ingress => f.write_str("ingress"),
            PolicyDomain::Egress => f.write_str("egress"),
        }
    }
}

/// Ordinal classification of how permissive a policy is.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => f.write_str("low"),
            RiskTier::Medium => f.write_str("medium"),
            RiskTier::High => f.write_str("high"),
            RiskTier::Critical => f.write_str("critical"),
        }
    }
}

/// How inbound artefacts may be parsed. Ordered from strictest to loosest.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum ParsingConstraint {
    #[default]
    Strict,
    Permissive,
    Custom,
}

impl ParsingConstraint {
    /// Lower rank is stricter.
    pub fn strictness_rank(self) -> u8 {
        match self {
            ParsingConstraint::Strict => 0,
            ParsingConstraint::Permissive => 1,
            ParsingConstraint::Custom => 2,
        }
    }

    /// The stricter of two constraints.
    pub fn stricter(self, other: Self) -> Self {
        if other.strictness_rank() < self.strictness_rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for ParsingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsingConstraint::Strict => f.write_str("strict"),
            ParsingConstraint::Permissive => f.write_str("permissive"),
            ParsingConstraint::Custom => f.write_str("custom"),
        }
    }
}

/// Rules for inbound artefacts.
///
/// `allowed_artefact_types` is deny-by-default: empty means nothing is
/// allowed. `allowed_sources` is the opposite: empty means no explicit
/// source restriction. `blocked_sources` always applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct IngressPolicy {
    pub allowed_artefact_types: Vec<String>,
    pub allowed_sources: Vec<String>,
    pub blocked_sources: Vec<String>,
    pub max_size_bytes: u64,
    pub max_total_size_bytes: u64,
    pub max_attachments: u64,
    pub allow_reconstruction: bool,
    pub allow_dynamic_content: bool,
    pub allow_external_resources: bool,
    pub require_source_verification: bool,
    pub parsing_constraint: ParsingConstraint,
}

impl Default for IngressPolicy {
    /// The default ingress sub-policy: plain-data artefacts only, nothing
    /// active, strict parsing.
    fn default() -> Self {
        Self {
            allowed_artefact_types: vec![
                "text".to_string(),
                "markdown".to_string(),
                "json".to_string(),
            ],
            allowed_sources: Vec::new(),
            blocked_sources: Vec::new(),
            max_size_bytes: 10_000_000,
            max_total_size_bytes: 50_000_000,
            max_attachments: 10,
            allow_reconstruction: false,
            allow_dynamic_content: false,
            allow_external_resources: false,
            require_source_verification: true,
            parsing_constraint: ParsingConstraint::Strict,
        }
    }
}

impl IngressPolicy {
    /// Whether an artefact type is on the allow-list.
    pub fn permits_artefact_type(&self, artefact_type: &str) -> bool {
        self.allowed_artefact_types.iter().any(|t| t == artefact_type)
    }

    /// Whether a source passes the block-list and, if declared, the allow-list.
    pub fn permits_source(&self, source: &str) -> bool {
        if self.blocked_sources.iter().any(|s| s == source) {
            return false;
        }
        self.allowed_sources.is_empty() || self.allowed_sources.iter().any(|s| s == source)
    }
}

/// Rules for outbound data.
///
/// `allowed_destinations` is unrestricted when empty; the data-category
/// and channel allow-lists are deny-by-default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EgressPolicy {
    pub allowed_destinations: Vec<String>,
    pub blocked_destinations: Vec<String>,
    pub allowed_data_categories: Vec<String>,
    pub allowed_channels: Vec<String>,
    pub require_approval: bool,
    pub require_encryption: bool,
    pub audit_all_egress: bool,
    pub redact_sensitive_data: bool,
    pub require_destination_verification: bool,
    pub allow_bulk_export: bool,
    pub max_egress_size_bytes: u64,
    pub max_operations_per_hour: u64,
}

impl Default for EgressPolicy {
    /// The default egress sub-policy: public data over the API channel, every
    /// safeguard required, no bulk export.
    fn default() -> Self {
        Self {
            allowed_destinations: Vec::new(),
            blocked_destinations: Vec::new(),
            allowed_data_categories: vec!["public".to_string()],
            allowed_channels: vec!["api".to_string()],
            require_approval: true,
            require_encryption: true,
            audit_all_egress: true,
            redact_sensitive_data: true,
            require_destination_verification: true,
            allow_bulk_export: false,
            max_egress_size_bytes: 10_000_000,
            max_operations_per_hour: 100,
        }
    }
}

impl EgressPolicy {
    /// Whether a destination passes the block-list and, if declared, the allow-list.
    pub fn permits_destination(&self, destination: &str) -> bool {
        if self.blocked_destinations.iter().any(|d| d == destination) {
            return false;
        }
        self.allowed_destinations.is_empty()
            || self.allowed_destinations.iter().any(|d| d == destination)
    }

    pub fn permits_data_category(&self, category: &str) -> bool {
        self.allowed_data_categories.iter().any(|c| c == category)
    }

    pub fn permits_channel(&self, channel: &str) -> bool {
        self.allowed_channels.iter().any(|c| c == channel)
    }
}

fn default_version() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

/// One layer's policy document.
///
/// ```yaml
/// id: "org-baseline"
/// name: "Organization baseline"
/// layer: network
/// riskTier: low
/// ingress:
///   allowedArtefactTypes: ["text"]
///   allowDynamicContent: false
/// egress:
///   blockedDestinations: ["evil.com"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub layer: PolicyLayer,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub risk_tier: RiskTier,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress: Option<EgressPolicy>,
}

impl CanonicalPolicy {
    /// Create an active, empty document for a layer. Both sub-policies are absent.
    pub fn new(id: impl Into<String>, name: impl Into<String>, layer: PolicyLayer) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            layer,
            version: default_version(),
            created_at: now,
            updated_at: now,
            risk_tier: RiskTier::Low,
            is_active: true,
            tags: BTreeSet::new(),
            ingress: None,
            egress: None,
        }
    }

    pub fn with_ingress(mut self, ingress: IngressPolicy) -> Self {
        self.ingress = Some(ingress);
        self
    }

    pub fn with_egress(mut self, egress: EgressPolicy) -> Self {
        self.egress = Some(egress);
        self
    }

    /// Parse a document from YAML.
    pub fn from_yaml_str(data: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Parse a document from JSON.
    pub fn from_json_str(data: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(data)?)
    }
}
