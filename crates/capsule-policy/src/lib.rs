//! # capsule-policy
//!
//! Layered ingress/egress policy evaluation for capsule exchange.
//!
//! Up to four policy documents (network baseline, local node, sender
//! handshake, and per-request capsule) are intersected into one
//! *effective policy* by [`compute_effective_policy`]. The result carries
//! an audit trail of [`PolicyDecision`]s and [`PolicyDenial`]s, a risk tier,
//! and whether the capsule needs user consent.
//!
//! ## Key invariants
//!
//! - **No escalation**: a later layer can only narrow what earlier layers
//!   permit. [`verify_no_escalation`] checks any two documents pairwise.
//! - **Fail closed**: absent layers are excluded from the fold, never
//!   treated as fully open; anything not granted by every applied layer is
//!   denied.
//! - **Pure**: evaluation performs no I/O. Only the effective policy's id
//!   and timestamps come from an injectable [`MetadataSource`].

pub mod capability;
pub mod config;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod field;
pub mod intersect;
pub mod record;
pub mod risk;
pub mod schema;
pub mod sets;

pub use capability::{is_capability_allowed, Capability};
pub use config::{EffectiveConfig, EvaluatorConfig, RiskThresholds};
pub use error::PolicyError;
pub use escalation::{get_denied_capabilities, verify_no_escalation, EscalationReport};
pub use evaluator::{
    compute_effective_policy, ConsentTrigger, EffectivePolicyResult, FixedMetadata,
    MetadataSource, PolicyEvaluator, PolicyStack, SystemMetadata,
};
pub use field::{FieldCategory, SubPolicy};
pub use intersect::{intersect_egress, intersect_ingress, Intersection};
pub use record::{PolicyDecision, PolicyDenial, RequestedValue};
pub use risk::assess_risk;
pub use schema::{
    CanonicalPolicy, EgressPolicy, IngressPolicy, ParsingConstraint, PolicyDomain, PolicyLayer,
    RiskTier,
};
pub use sets::{intersect_arrays, union_arrays};
