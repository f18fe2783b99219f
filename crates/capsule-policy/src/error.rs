// error.rs — Error types for the policy subsystem.
//
// The evaluation core itself is total: intersecting, evaluating, verifying
// and diffing never fail. These errors only arise at the edges: parsing
// documents, loading config, and the caller-side input-contract check.

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::PolicyLayer;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A decision or denial record was built without naming a layer.
    #[error("policy record requires a non-empty layer name")]
    EmptyLayerName,

    /// A document was supplied in a layer slot that does not match its own tag.
    #[error("policy '{policy_id}' is tagged as the {found} layer but was supplied as the {expected} layer")]
    LayerMismatch {
        policy_id: String,
        expected: PolicyLayer,
        found: PolicyLayer,
    },

    /// An inactive document was supplied as part of a layer stack.
    #[error("policy '{policy_id}' supplied as the {layer} layer is not active")]
    InactivePolicy {
        policy_id: String,
        layer: PolicyLayer,
    },

    /// A YAML policy document could not be parsed.
    #[error("failed to parse policy YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// A JSON policy document could not be parsed.
    #[error("failed to parse policy JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Reading a config file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The evaluator config is not valid TOML for the expected shape.
    #[error("failed to parse evaluator config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The evaluator config parsed but its values are inconsistent.
    #[error("invalid evaluator config: {reason}")]
    InvalidConfig { reason: String },
}
