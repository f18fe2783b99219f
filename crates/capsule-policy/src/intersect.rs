// intersect.rs — Layer intersectors.
//
// Folds an ordered list of layer sub-policies into one combined sub-policy.
// Absent layers are skipped. The first present layer seeds the running
// result (or the default sub-policy when no layer is present), and every
// later layer can only narrow it, field by field, according to the field's
// category in the field table.
//
// Allow-list and permission narrowing is recorded from both directions:
// what the incoming layer removes from the running result is denied by the
// incoming layer, and what the incoming layer asks for beyond the running
// result is denied by the earliest layer that excluded it.

use tracing::debug;

use crate::field::{Accessor, Field, FieldRule, SubPolicy};
use crate::record::{PolicyDecision, PolicyDenial, RequestedValue};
use crate::schema::{EgressPolicy, IngressPolicy, ParsingConstraint, PolicyLayer};
use crate::sets::{intersect_arrays, union_arrays};

/// A combined sub-policy and the records explaining how it was reached.
#[derive(Debug, Clone)]
pub struct Intersection<P> {
    pub policy: P,
    pub decisions: Vec<PolicyDecision>,
    pub denials: Vec<PolicyDenial>,
}

/// One slot in the layer stack: the layer and its sub-policy, if it has one.
pub type LayerSlot<'a, P> = (PolicyLayer, Option<&'a P>);

/// Combine ingress sub-policies across layers.
pub fn intersect_ingress(slots: &[LayerSlot<'_, IngressPolicy>]) -> Intersection<IngressPolicy> {
    intersect_layers(slots)
}

/// Combine egress sub-policies across layers.
pub fn intersect_egress(slots: &[LayerSlot<'_, EgressPolicy>]) -> Intersection<EgressPolicy> {
    intersect_layers(slots)
}

/// Fold any sub-policy across layers using its field table.
pub fn intersect_layers<P: SubPolicy>(slots: &[LayerSlot<'_, P>]) -> Intersection<P> {
    let present: Vec<(PolicyLayer, &P)> = slots
        .iter()
        .filter_map(|(layer, policy)| policy.map(|p| (*layer, p)))
        .collect();

    let Some(((seed_layer, seed), _)) = present.split_first() else {
        debug!(domain = %P::DOMAIN, "no layer supplies this domain; using defaults");
        return Intersection {
            policy: P::default(),
            decisions: Vec::new(),
            denials: Vec::new(),
        };
    };

    debug!(domain = %P::DOMAIN, layer = %seed_layer, "seeding fold");
    let mut acc = Intersection {
        policy: (*seed).clone(),
        decisions: Vec::new(),
        denials: Vec::new(),
    };

    let fields = P::fields();
    for step in 1..present.len() {
        let (layer, incoming) = present[step];
        let earlier = &present[..step];
        debug!(domain = %P::DOMAIN, layer = %layer, "folding layer");
        for field in &fields {
            combine_field(field, &mut acc, incoming, layer, earlier);
        }
    }

    acc
}

fn combine_field<P: SubPolicy>(
    field: &Field<P>,
    acc: &mut Intersection<P>,
    incoming: &P,
    layer: PolicyLayer,
    earlier: &[(PolicyLayer, &P)],
) {
    match &field.rule {
        FieldRule::StrictAllowList(access) => {
            narrow_allow_list(field.name, *access, acc, incoming, layer, earlier, false);
        }
        FieldRule::OptionalAllowList(access) => {
            let running = (access.get)(&acc.policy);
            let offered = (access.get)(incoming);
            if offered.is_empty() {
                return;
            }
            if running.is_empty() {
                acc.decisions.push(PolicyDecision::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!(
                        "{} restricted to {} entr{} by {} layer",
                        field.name,
                        offered.len(),
                        if offered.len() == 1 { "y" } else { "ies" },
                        layer
                    ),
                    layer,
                ));
                (access.set)(&mut acc.policy, offered);
                return;
            }
            narrow_allow_list(field.name, *access, acc, incoming, layer, earlier, true);
        }
        FieldRule::BlockList { list, .. } => {
            let running = (list.get)(&acc.policy);
            let offered = (list.get)(incoming);
            let combined = union_arrays(&running, &offered);
            for value in combined.iter().filter(|v| !running.contains(v)) {
                acc.decisions.push(PolicyDecision::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!("'{}' blocked by {} layer", value, layer),
                    layer,
                ));
            }
            (list.set)(&mut acc.policy, combined);
        }
        FieldRule::Permission(access) => {
            let running = (access.get)(&acc.policy);
            let offered = (access.get)(incoming);
            if running && !offered {
                debug!(field = field.name, layer = %layer, "permission revoked");
                acc.denials.push(PolicyDenial::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!("{} disabled by {} layer", field.name, layer),
                    layer,
                    RequestedValue::Flag(true),
                ));
                (access.set)(&mut acc.policy, false);
            } else if !running && offered {
                let by = restricting_layer(earlier, |p| !(access.get)(p), layer);
                acc.denials.push(PolicyDenial::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!(
                        "{} requested by {} layer is not permitted by {} layer",
                        field.name, layer, by
                    ),
                    by,
                    RequestedValue::Flag(true),
                ));
            }
        }
        FieldRule::Requirement(access) => {
            if !(access.get)(&acc.policy) && (access.get)(incoming) {
                acc.decisions.push(PolicyDecision::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!("{} required by {} layer", field.name, layer),
                    layer,
                ));
                (access.set)(&mut acc.policy, true);
            }
        }
        FieldRule::Ceiling(access) => {
            let running = (access.get)(&acc.policy);
            let offered = (access.get)(incoming);
            if offered < running {
                acc.decisions.push(PolicyDecision::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!(
                        "{} lowered from {} to {} by {} layer",
                        field.name, running, offered, layer
                    ),
                    layer,
                ));
                (access.set)(&mut acc.policy, offered);
            }
        }
        FieldRule::Strictness(access) => {
            let running: ParsingConstraint = (access.get)(&acc.policy);
            let offered = (access.get)(incoming);
            if offered.strictness_rank() < running.strictness_rank() {
                acc.decisions.push(PolicyDecision::by_layer(
                    P::DOMAIN,
                    field.name,
                    format!(
                        "{} tightened from {} to {} by {} layer",
                        field.name, running, offered, layer
                    ),
                    layer,
                ));
                (access.set)(&mut acc.policy, offered);
            }
        }
    }
}

/// Intersect an allow-list field and record denials in both directions.
///
/// With `optional` set, earlier layers that declared no entries are
/// unrestricted and can't be blamed for excluding a value.
fn narrow_allow_list<P: SubPolicy>(
    name: &'static str,
    access: Accessor<P, Vec<String>>,
    acc: &mut Intersection<P>,
    incoming: &P,
    layer: PolicyLayer,
    earlier: &[(PolicyLayer, &P)],
    optional: bool,
) {
    let running = (access.get)(&acc.policy);
    let offered = (access.get)(incoming);
    let combined = intersect_arrays(&running, &offered);

    for value in running.iter().filter(|v| !combined.contains(v)) {
        debug!(field = name, value = %value, layer = %layer, "allow-list entry dropped");
        acc.denials.push(PolicyDenial::by_layer(
            P::DOMAIN,
            name,
            format!("{} '{}' not permitted by {} layer", name, value, layer),
            layer,
            RequestedValue::Text(value.clone()),
        ));
    }

    for value in offered.iter().filter(|v| !running.contains(v)) {
        let by = restricting_layer(
            earlier,
            |p| {
                let list = (access.get)(p);
                !(optional && list.is_empty()) && !list.contains(value)
            },
            layer,
        );
        acc.denials.push(PolicyDenial::by_layer(
            P::DOMAIN,
            name,
            format!(
                "{} '{}' requested by {} layer is not permitted by {} layer",
                name, value, layer, by
            ),
            by,
            RequestedValue::Text(value.clone()),
        ));
    }

    (access.set)(&mut acc.policy, combined);
}

/// The earliest already-applied layer matching `excludes`, falling back to
/// the most recent one.
fn restricting_layer<P>(
    earlier: &[(PolicyLayer, &P)],
    excludes: impl Fn(&P) -> bool,
    fallback: PolicyLayer,
) -> PolicyLayer {
    earlier
        .iter()
        .find(|entry| excludes(entry.1))
        .or_else(|| earlier.last())
        .map(|(layer, _)| *layer)
        .unwrap_or(fallback)
}
