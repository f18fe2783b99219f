// risk.rs — Risk-tier scoring for a combined policy.
//
// Four core factors each add CORE_FACTOR_WEIGHT: dynamic content allowed,
// reconstruction allowed, approval not required, encryption not required.
// Secondary factors add one point each. The score only ever grows as the
// policy becomes more permissive, so the tier is monotone in every factor.

use crate::config::RiskThresholds;
use crate::schema::{EgressPolicy, IngressPolicy, RiskTier};

/// Score contributed by each core factor.
pub const CORE_FACTOR_WEIGHT: u32 = 2;

/// Score contributed by each secondary factor.
pub const SECONDARY_FACTOR_WEIGHT: u32 = 1;

/// Permissiveness score of an ingress/egress pair.
pub fn risk_score(ingress: &IngressPolicy, egress: &EgressPolicy) -> u32 {
    let core = [
        ingress.allow_dynamic_content,
        ingress.allow_reconstruction,
        !egress.require_approval,
        !egress.require_encryption,
    ];
    let secondary = [
        ingress.allow_external_resources,
        egress.allow_bulk_export,
        !egress.audit_all_egress,
        !egress.redact_sensitive_data,
    ];

    let count = |flags: &[bool]| flags.iter().filter(|f| **f).count() as u32;
    count(&core) * CORE_FACTOR_WEIGHT + count(&secondary) * SECONDARY_FACTOR_WEIGHT
}

/// Map a combined policy onto a risk tier.
pub fn assess_risk(
    ingress: &IngressPolicy,
    egress: &EgressPolicy,
    thresholds: &RiskThresholds,
) -> RiskTier {
    let score = risk_score(ingress, egress);
    if score >= thresholds.critical_threshold {
        RiskTier::Critical
    } else if score >= thresholds.high_threshold {
        RiskTier::High
    } else if score >= thresholds.medium_threshold {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}
