// escalation.rs — No-escalation verification and requested-vs-effective diffs.
//
// Both walk the same field table as the intersectors, but compare two
// documents instead of combining them:
//
// - verify_no_escalation(higher, lower): can `lower` grant anything `higher`
//   does not? Every such field is a violation, surfaced to an operator.
// - get_denied_capabilities(requested, effective): which parts of a request
//   did the effective policy not grant? One denial per capability or value.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::field::{FieldRule, SubPolicy};
use crate::record::{PolicyDenial, RequestedValue};
use crate::schema::{CanonicalPolicy, PolicyLayer};

/// Layer name denial diffs are attributed to.
pub const EFFECTIVE_LAYER_NAME: &str = "effective";

/// Outcome of a pairwise escalation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EscalationReport {
    pub valid: bool,
    pub violations: Vec<String>,
}

/// Check that `lower` grants nothing beyond `higher`.
///
/// A domain is compared when `lower` declares it and `higher` either
/// declares it or is the local layer, whose missing domains evaluate as
/// the default sub-policy. Never fails: `valid == false` with messages is
/// the failure signal.
pub fn verify_no_escalation(higher: &CanonicalPolicy, lower: &CanonicalPolicy) -> EscalationReport {
    let mut violations = Vec::new();

    if lower.layer.authority() < higher.layer.authority() {
        violations.push(format!(
            "{} layer '{}' is more authoritative than {} layer '{}' it is checked against",
            lower.layer, lower.id, higher.layer, higher.id
        ));
    }

    let ingress = as_evaluated(higher.ingress.as_ref(), higher.layer);
    if let (Some(h), Some(l)) = (ingress, &lower.ingress) {
        compare_for_escalation(&*h, l, higher, lower, &mut violations);
    }
    let egress = as_evaluated(higher.egress.as_ref(), higher.layer);
    if let (Some(h), Some(l)) = (egress, &lower.egress) {
        compare_for_escalation(&*h, l, higher, lower, &mut violations);
    }

    for violation in &violations {
        warn!(higher = %higher.id, lower = %lower.id, "escalation: {}", violation);
    }

    EscalationReport {
        valid: violations.is_empty(),
        violations,
    }
}

/// The sub-policy evaluation would fold in for `layer`.
fn as_evaluated<P: SubPolicy>(declared: Option<&P>, layer: PolicyLayer) -> Option<Cow<'_, P>> {
    match declared {
        Some(sub) => Some(Cow::Borrowed(sub)),
        None if layer == PolicyLayer::Local => Some(Cow::Owned(P::default())),
        None => None,
    }
}

fn compare_for_escalation<P: SubPolicy>(
    higher: &P,
    lower: &P,
    higher_doc: &CanonicalPolicy,
    lower_doc: &CanonicalPolicy,
    violations: &mut Vec<String>,
) {
    let (hl, ll) = (higher_doc.layer, lower_doc.layer);
    let domain = P::DOMAIN;

    for field in P::fields() {
        let name = field.name;
        match field.rule {
            FieldRule::StrictAllowList(access) => {
                let permitted = (access.get)(higher);
                for value in (access.get)(lower).iter().filter(|v| !permitted.contains(v)) {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer allows '{value}' which {hl} layer does not permit"
                    ));
                }
            }
            FieldRule::OptionalAllowList(access) => {
                let permitted = (access.get)(higher);
                if permitted.is_empty() {
                    continue;
                }
                for value in (access.get)(lower).iter().filter(|v| !permitted.contains(v)) {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer allows '{value}' which {hl} layer does not permit"
                    ));
                }
            }
            FieldRule::BlockList { list, guards } => {
                let blocked = (list.get)(higher);
                for value in guards(lower).iter().filter(|v| blocked.contains(v)) {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer allows '{value}' which {hl} layer blocks"
                    ));
                }
            }
            FieldRule::Permission(access) => {
                if (access.get)(lower) && !(access.get)(higher) {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer allows what {hl} layer forbids"
                    ));
                }
            }
            FieldRule::Requirement(access) => {
                if (access.get)(higher) && !(access.get)(lower) {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer relaxes a requirement {hl} layer imposes"
                    ));
                }
            }
            FieldRule::Ceiling(access) => {
                let (h, l) = ((access.get)(higher), (access.get)(lower));
                if l > h {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer ceiling {l} exceeds {hl} layer ceiling {h}"
                    ));
                }
            }
            FieldRule::Strictness(access) => {
                let (h, l) = ((access.get)(higher), (access.get)(lower));
                if l.strictness_rank() > h.strictness_rank() {
                    violations.push(format!(
                        "{domain}.{name}: {ll} layer uses {l} parsing, looser than {hl} layer's {h}"
                    ));
                }
            }
        }
    }
}

/// Explain which parts of `requested` did not survive into `effective`.
///
/// An effective document missing a domain is compared as the default
/// sub-policy for that domain.
pub fn get_denied_capabilities(
    requested: &CanonicalPolicy,
    effective: &CanonicalPolicy,
) -> Vec<PolicyDenial> {
    let mut denials = Vec::new();
    if let Some(asked) = &requested.ingress {
        let granted = effective.ingress.clone().unwrap_or_default();
        diff_denials(asked, &granted, &mut denials);
    }
    if let Some(asked) = &requested.egress {
        let granted = effective.egress.clone().unwrap_or_default();
        diff_denials(asked, &granted, &mut denials);
    }
    denials
}

fn diff_denials<P: SubPolicy>(asked: &P, granted: &P, denials: &mut Vec<PolicyDenial>) {
    let domain = P::DOMAIN;
    let mut deny = |name: &str, reason: String, value: RequestedValue| {
        denials.push(PolicyDenial {
            domain,
            capability: name.to_string(),
            layer: EFFECTIVE_LAYER_NAME.to_string(),
            reason,
            requested_value: value,
        });
    };

    for field in P::fields() {
        let name = field.name;
        match field.rule {
            FieldRule::StrictAllowList(access) => {
                let permitted = (access.get)(granted);
                for value in (access.get)(asked).into_iter().filter(|v| !permitted.contains(v)) {
                    deny(
                        name,
                        format!("{name} '{value}' is not permitted by the effective policy"),
                        RequestedValue::Text(value),
                    );
                }
            }
            FieldRule::OptionalAllowList(access) => {
                let permitted = (access.get)(granted);
                if permitted.is_empty() {
                    continue;
                }
                for value in (access.get)(asked).into_iter().filter(|v| !permitted.contains(v)) {
                    deny(
                        name,
                        format!("{name} '{value}' is outside the effective allow-list"),
                        RequestedValue::Text(value),
                    );
                }
            }
            FieldRule::BlockList { list, guards } => {
                let blocked = (list.get)(granted);
                for value in guards(asked).into_iter().filter(|v| blocked.contains(v)) {
                    deny(
                        name,
                        format!("'{value}' is blocked by the effective policy"),
                        RequestedValue::Text(value),
                    );
                }
            }
            FieldRule::Permission(access) => {
                if (access.get)(asked) && !(access.get)(granted) {
                    deny(
                        name,
                        format!("{name} is not granted by the effective policy"),
                        RequestedValue::Flag(true),
                    );
                }
            }
            FieldRule::Requirement(access) => {
                if !(access.get)(asked) && (access.get)(granted) {
                    deny(
                        name,
                        format!("{name} cannot be waived; the effective policy requires it"),
                        RequestedValue::Flag(false),
                    );
                }
            }
            FieldRule::Ceiling(access) => {
                let (a, g) = ((access.get)(asked), (access.get)(granted));
                if a > g {
                    deny(
                        name,
                        format!("{name} of {a} exceeds the effective ceiling of {g}"),
                        RequestedValue::Limit(a),
                    );
                }
            }
            FieldRule::Strictness(access) => {
                let (a, g) = ((access.get)(asked), (access.get)(granted));
                if a.strictness_rank() > g.strictness_rank() {
                    deny(
                        name,
                        format!("{a} parsing is looser than the effective {g} parsing"),
                        RequestedValue::Constraint(a),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EgressPolicy, IngressPolicy, ParsingConstraint, PolicyDomain};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn network(ingress: IngressPolicy, egress: EgressPolicy) -> CanonicalPolicy {
        CanonicalPolicy::new("nbp", "Network", PolicyLayer::Network)
            .with_ingress(ingress)
            .with_egress(egress)
    }

    fn local(ingress: IngressPolicy, egress: EgressPolicy) -> CanonicalPolicy {
        CanonicalPolicy::new("lnp", "Local", PolicyLayer::Local)
            .with_ingress(ingress)
            .with_egress(egress)
    }

    #[test]
    fn identical_layers_are_valid() {
        let higher = network(IngressPolicy::default(), EgressPolicy::default());
        let lower = local(IngressPolicy::default(), EgressPolicy::default());
        let report = verify_no_escalation(&higher, &lower);
        assert!(report.valid, "{:?}", report.violations);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn narrower_lower_layer_is_valid() {
        let higher = network(IngressPolicy::default(), EgressPolicy::default());
        let lower = local(
            IngressPolicy {
                allowed_artefact_types: strings(&["text"]),
                max_size_bytes: 1_000,
                ..IngressPolicy::default()
            },
            EgressPolicy {
                blocked_destinations: strings(&["evil.com"]),
                max_operations_per_hour: 10,
                ..EgressPolicy::default()
            },
        );
        assert!(verify_no_escalation(&higher, &lower).valid);
    }

    #[test]
    fn dynamic_content_escalation_is_reported() {
        let higher = network(IngressPolicy::default(), EgressPolicy::default());
        let lower = local(
            IngressPolicy {
                allow_dynamic_content: true,
                ..IngressPolicy::default()
            },
            EgressPolicy::default(),
        );
        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("allowDynamicContent"));
    }

    #[test]
    fn artefact_type_and_channel_escalations_are_reported() {
        let higher = network(
            IngressPolicy {
                allowed_artefact_types: strings(&["text"]),
                ..IngressPolicy::default()
            },
            EgressPolicy::default(),
        );
        let lower = local(
            IngressPolicy {
                allowed_artefact_types: strings(&["text", "html"]),
                ..IngressPolicy::default()
            },
            EgressPolicy {
                allowed_channels: strings(&["api", "webhook"]),
                ..EgressPolicy::default()
            },
        );
        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert!(report.violations.iter().any(|v| v.contains("'html'")));
        assert!(report.violations.iter().any(|v| v.contains("'webhook'")));
    }

    #[test]
    fn larger_ceiling_is_reported() {
        let higher = network(IngressPolicy::default(), EgressPolicy::default());
        let lower = local(
            IngressPolicy::default(),
            EgressPolicy {
                max_egress_size_bytes: 20_000_000,
                ..EgressPolicy::default()
            },
        );
        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert!(report.violations[0].contains("maxEgressSizeBytes"));
        assert!(report.violations[0].contains("20000000"));
    }

    #[test]
    fn relaxed_requirement_and_looser_parsing_are_reported() {
        let higher = network(IngressPolicy::default(), EgressPolicy::default());
        let lower = local(
            IngressPolicy {
                parsing_constraint: ParsingConstraint::Custom,
                ..IngressPolicy::default()
            },
            EgressPolicy {
                require_encryption: false,
                ..EgressPolicy::default()
            },
        );
        let report = verify_no_escalation(&higher, &lower);
        assert_eq!(report.violations.len(), 2);
    }

    #[test]
    fn allowing_a_blocked_destination_is_reported() {
        let higher = network(
            IngressPolicy::default(),
            EgressPolicy {
                blocked_destinations: strings(&["evil.com"]),
                ..EgressPolicy::default()
            },
        );
        let lower = local(
            IngressPolicy::default(),
            EgressPolicy {
                allowed_destinations: strings(&["evil.com"]),
                ..EgressPolicy::default()
            },
        );
        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert!(report.violations[0].contains("blocks"));
    }

    #[test]
    fn reversed_authority_is_reported() {
        let higher = local(IngressPolicy::default(), EgressPolicy::default());
        let lower = network(IngressPolicy::default(), EgressPolicy::default());
        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert!(report.violations[0].contains("more authoritative"));
    }

    #[test]
    fn domains_missing_on_either_side_are_skipped() {
        let higher = CanonicalPolicy::new("nbp", "Network", PolicyLayer::Network)
            .with_egress(EgressPolicy::default());
        let lower = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule).with_ingress(
            IngressPolicy {
                allow_dynamic_content: true,
                ..IngressPolicy::default()
            },
        );
        assert!(verify_no_escalation(&higher, &lower).valid);
    }

    #[test]
    fn diff_lists_each_missing_value_and_flag() {
        let requested = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule)
            .with_ingress(IngressPolicy {
                allowed_artefact_types: strings(&["text", "html", "pdf"]),
                allow_dynamic_content: true,
                max_attachments: 50,
                ..IngressPolicy::default()
            })
            .with_egress(EgressPolicy {
                require_approval: false,
                ..EgressPolicy::default()
            });
        let effective = CanonicalPolicy::new("eff", "Effective", PolicyLayer::Capsule)
            .with_ingress(IngressPolicy {
                allowed_artefact_types: strings(&["text"]),
                ..IngressPolicy::default()
            })
            .with_egress(EgressPolicy::default());

        let denials = get_denied_capabilities(&requested, &effective);
        let summary: Vec<(PolicyDomain, &str)> = denials
            .iter()
            .map(|d| (d.domain, d.capability.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (PolicyDomain::Ingress, "allowedArtefactTypes"),
                (PolicyDomain::Ingress, "allowedArtefactTypes"),
                (PolicyDomain::Ingress, "maxAttachments"),
                (PolicyDomain::Ingress, "allowDynamicContent"),
                (PolicyDomain::Egress, "requireApproval"),
            ]
        );
        assert!(denials.iter().all(|d| d.layer == EFFECTIVE_LAYER_NAME));
        assert_eq!(denials[0].requested_value, RequestedValue::Text("html".to_string()));
        assert_eq!(denials[2].requested_value, RequestedValue::Limit(50));
    }

    #[test]
    fn diff_of_granted_request_is_empty() {
        let requested = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule)
            .with_ingress(IngressPolicy::default());
        let effective = CanonicalPolicy::new("eff", "Effective", PolicyLayer::Capsule)
            .with_ingress(IngressPolicy::default())
            .with_egress(EgressPolicy::default());
        assert!(get_denied_capabilities(&requested, &effective).is_empty());
    }

    #[test]
    fn diff_reports_blocked_destination() {
        let requested = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule).with_egress(
            EgressPolicy {
                allowed_destinations: strings(&["evil.com", "ok.example"]),
                ..EgressPolicy::default()
            },
        );
        let effective = CanonicalPolicy::new("eff", "Effective", PolicyLayer::Capsule).with_egress(
            EgressPolicy {
                allowed_destinations: strings(&["evil.com", "ok.example"]),
                blocked_destinations: strings(&["evil.com"]),
                ..EgressPolicy::default()
            },
        );
        let denials = get_denied_capabilities(&requested, &effective);
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].capability, "blockedDestinations");
        assert_eq!(denials[0].requested_value, RequestedValue::Text("evil.com".to_string()));
    }

    #[test]
    fn local_without_domain_is_checked_as_default() {
        let higher = CanonicalPolicy::new("lnp", "Local", PolicyLayer::Local);
        let lower = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule).with_ingress(
            IngressPolicy {
                allow_dynamic_content: true,
                allowed_artefact_types: strings(&["html"]),
                ..IngressPolicy::default()
            },
        );

        let report = verify_no_escalation(&higher, &lower);
        assert!(!report.valid);
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("allowedArtefactTypes") && v.contains("'html'")));
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("allowDynamicContent")));
    }

    #[test]
    fn non_local_without_domain_is_not_compared() {
        let higher = CanonicalPolicy::new("hsp", "Handshake", PolicyLayer::Handshake);
        let lower = CanonicalPolicy::new("cap", "Capsule", PolicyLayer::Capsule).with_ingress(
            IngressPolicy {
                allow_dynamic_content: true,
                ..IngressPolicy::default()
            },
        );
        let report = verify_no_escalation(&higher, &lower);
        assert!(report.valid, "{:?}", report.violations);
    }
}
