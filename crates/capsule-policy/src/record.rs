// record.rs — Decision and denial audit records.
//
// Every narrowing the intersectors perform leaves a record behind so the
// preview UI can explain why the effective policy looks the way it does.
// A PolicyDecision means "this field was tightened or required by layer X";
// a PolicyDenial means "this requested capability is not available, because
// of layer X".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::schema::{ParsingConstraint, PolicyDomain, PolicyLayer};

/// The specific value a denial rejected.
///
/// Serialized as `{"kind": "text", "value": "html"}` so a constraint name
/// never reads back as an allow-list entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RequestedValue {
    /// An allow-list entry (artefact type, destination, channel, ...).
    Text(String),
    /// A boolean permission or requirement.
    Flag(bool),
    /// A numeric ceiling.
    Limit(u64),
    /// A parsing constraint.
    Constraint(ParsingConstraint),
}

impl fmt::Display for RequestedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestedValue::Text(v) => write!(f, "'{}'", v),
            RequestedValue::Flag(v) => write!(f, "{}", v),
            RequestedValue::Limit(v) => write!(f, "{}", v),
            RequestedValue::Constraint(v) => write!(f, "{}", v),
        }
    }
}

/// A field was tightened or a requirement imposed by a layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub domain: PolicyDomain,
    pub capability: String,
    /// Name of the layer that made the decision.
    pub layer: String,
    pub reason: String,
}

/// A capability that is not available in the effective policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDenial {
    pub domain: PolicyDomain,
    pub capability: String,
    /// Name of the layer the loss is attributed to.
    pub layer: String,
    pub reason: String,
    pub requested_value: RequestedValue,
}

impl PolicyDecision {
    /// Build a decision attributed to an arbitrary named layer.
    pub fn new(
        domain: PolicyDomain,
        capability: impl Into<String>,
        reason: impl Into<String>,
        layer: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        let layer = layer.into();
        if layer.trim().is_empty() {
            return Err(PolicyError::EmptyLayerName);
        }
        Ok(Self {
            domain,
            capability: capability.into(),
            layer,
            reason: reason.into(),
        })
    }

    /// Build a decision attributed to one of the four policy layers.
    pub fn by_layer(
        domain: PolicyDomain,
        capability: impl Into<String>,
        reason: impl Into<String>,
        layer: PolicyLayer,
    ) -> Self {
        Self {
            domain,
            capability: capability.into(),
            layer: layer.as_str().to_string(),
            reason: reason.into(),
        }
    }
}

impl PolicyDenial {
    /// Build a denial attributed to an arbitrary named layer.
    pub fn new(
        domain: PolicyDomain,
        capability: impl Into<String>,
        reason: impl Into<String>,
        layer: impl Into<String>,
        requested_value: RequestedValue,
    ) -> Result<Self, PolicyError> {
        let layer = layer.into();
        if layer.trim().is_empty() {
            return Err(PolicyError::EmptyLayerName);
        }
        Ok(Self {
            domain,
            capability: capability.into(),
            layer,
            reason: reason.into(),
            requested_value,
        })
    }

    /// Build a denial attributed to one of the four policy layers.
    pub fn by_layer(
        domain: PolicyDomain,
        capability: impl Into<String>,
        reason: impl Into<String>,
        layer: PolicyLayer,
        requested_value: RequestedValue,
    ) -> Self {
        Self {
            domain,
            capability: capability.into(),
            layer: layer.as_str().to_string(),
            reason: reason.into(),
            requested_value,
        }
    }
}
