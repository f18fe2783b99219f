// field.rs — Field-category metadata for ingress and egress sub-policies.
//
// Every sub-policy field belongs to one combination category. The
// intersector, the escalation verifier, and the denial diff all walk the
// same field table, so adding a field means adding one line here rather
// than touching three hand-written comparisons.

use serde::{Deserialize, Serialize};

use crate::schema::{EgressPolicy, IngressPolicy, ParsingConstraint, PolicyDomain};

/// How a field combines across layers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    /// Intersect every step; empty means nothing allowed.
    StrictAllowList,
    /// Intersect only when both sides declare entries; empty means unrestricted.
    OptionalAllowList,
    /// Union every step.
    BlockList,
    /// Boolean AND: any `false` wins.
    Permission,
    /// Boolean OR: any `true` wins.
    Requirement,
    /// Numeric MIN.
    Ceiling,
    /// Strictest value wins.
    Strictness,
}

/// Getter/setter pair for one field of a sub-policy.
pub struct Accessor<P, T> {
    pub get: fn(&P) -> T,
    pub set: fn(&mut P, T),
}

impl<P, T> Accessor<P, T> {
    pub fn new(get: fn(&P) -> T, set: fn(&mut P, T)) -> Self {
        Self { get, set }
    }
}

impl<P, T> Clone for Accessor<P, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, T> Copy for Accessor<P, T> {}

/// The combination rule of a field, with typed access to its value.
pub enum FieldRule<P> {
    StrictAllowList(Accessor<P, Vec<String>>),
    OptionalAllowList(Accessor<P, Vec<String>>),
    /// `guards` reads the allow-list this block-list takes precedence over.
    BlockList {
        list: Accessor<P, Vec<String>>,
        guards: fn(&P) -> Vec<String>,
    },
    Permission(Accessor<P, bool>),
    Requirement(Accessor<P, bool>),
    Ceiling(Accessor<P, u64>),
    Strictness(Accessor<P, ParsingConstraint>),
}

/// One named field of a sub-policy.
pub struct Field<P> {
    /// Document (camelCase) name, also used as the capability name in records.
    pub name: &'static str,
    pub rule: FieldRule<P>,
}

impl<P> Field<P> {
    pub fn new(name: &'static str, rule: FieldRule<P>) -> Self {
        Self { name, rule }
    }

    pub fn category(&self) -> FieldCategory {
        match self.rule {
            FieldRule::StrictAllowList(_) => FieldCategory::StrictAllowList,
            FieldRule::OptionalAllowList(_) => FieldCategory::OptionalAllowList,
            FieldRule::BlockList { .. } => FieldCategory::BlockList,
            FieldRule::Permission(_) => FieldCategory::Permission,
            FieldRule::Requirement(_) => FieldCategory::Requirement,
            FieldRule::Ceiling(_) => FieldCategory::Ceiling,
            FieldRule::Strictness(_) => FieldCategory::Strictness,
        }
    }
}

/// A sub-policy the generic fold can combine.
pub trait SubPolicy: Clone + Default + std::fmt::Debug {
    const DOMAIN: PolicyDomain;

    /// The field table, in the order records are emitted.
    fn fields() -> Vec<Field<Self>>;
}

macro_rules! accessor {
    ($policy:ty, $field:ident: $ty:ty) => {
        Accessor::new(
            |p: &$policy| -> $ty { p.$field.clone() },
            |p: &mut $policy, value: $ty| p.$field = value,
        )
    };
}

impl SubPolicy for IngressPolicy {
    const DOMAIN: PolicyDomain = PolicyDomain::Ingress;

    #[allow(clippy::clone_on_copy)]
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new(
                "allowedArtefactTypes",
                FieldRule::StrictAllowList(accessor!(IngressPolicy, allowed_artefact_types: Vec<String>)),
            ),
            Field::new(
                "allowedSources",
                FieldRule::OptionalAllowList(accessor!(IngressPolicy, allowed_sources: Vec<String>)),
            ),
            Field::new(
                "blockedSources",
                FieldRule::BlockList {
                    list: accessor!(IngressPolicy, blocked_sources: Vec<String>),
                    guards: |p: &IngressPolicy| -> Vec<String> { p.allowed_sources.clone() },
                },
            ),
            Field::new(
                "maxSizeBytes",
                FieldRule::Ceiling(accessor!(IngressPolicy, max_size_bytes: u64)),
            ),
            Field::new(
                "maxTotalSizeBytes",
                FieldRule::Ceiling(accessor!(IngressPolicy, max_total_size_bytes: u64)),
            ),
            Field::new(
                "maxAttachments",
                FieldRule::Ceiling(accessor!(IngressPolicy, max_attachments: u64)),
            ),
            Field::new(
                "allowReconstruction",
                FieldRule::Permission(accessor!(IngressPolicy, allow_reconstruction: bool)),
            ),
            Field::new(
                "allowDynamicContent",
                FieldRule::Permission(accessor!(IngressPolicy, allow_dynamic_content: bool)),
            ),
            Field::new(
                "allowExternalResources",
                FieldRule::Permission(accessor!(IngressPolicy, allow_external_resources: bool)),
            ),
            Field::new(
                "requireSourceVerification",
                FieldRule::Requirement(accessor!(IngressPolicy, require_source_verification: bool)),
            ),
            Field::new(
                "parsingConstraint",
                FieldRule::Strictness(accessor!(IngressPolicy, parsing_constraint: ParsingConstraint)),
            ),
        ]
    }
}

impl SubPolicy for EgressPolicy {
    const DOMAIN: PolicyDomain = PolicyDomain::Egress;

    #[allow(clippy::clone_on_copy)]
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::new(
                "allowedDestinations",
                FieldRule::OptionalAllowList(accessor!(EgressPolicy, allowed_destinations: Vec<String>)),
            ),
            Field::new(
                "blockedDestinations",
                FieldRule::BlockList {
                    list: accessor!(EgressPolicy, blocked_destinations: Vec<String>),
                    guards: |p: &EgressPolicy| -> Vec<String> { p.allowed_destinations.clone() },
                },
            ),
            Field::new(
                "allowedDataCategories",
                FieldRule::StrictAllowList(accessor!(EgressPolicy, allowed_data_categories: Vec<String>)),
            ),
            Field::new(
                "allowedChannels",
                FieldRule::StrictAllowList(accessor!(EgressPolicy, allowed_channels: Vec<String>)),
            ),
            Field::new(
                "requireApproval",
                FieldRule::Requirement(accessor!(EgressPolicy, require_approval: bool)),
            ),
            Field::new(
                "requireEncryption",
                FieldRule::Requirement(accessor!(EgressPolicy, require_encryption: bool)),
            ),
            Field::new(
                "auditAllEgress",
                FieldRule::Requirement(accessor!(EgressPolicy, audit_all_egress: bool)),
            ),
            Field::new(
                "redactSensitiveData",
                FieldRule::Requirement(accessor!(EgressPolicy, redact_sensitive_data: bool)),
            ),
            Field::new(
                "requireDestinationVerification",
                FieldRule::Requirement(accessor!(EgressPolicy, require_destination_verification: bool)),
            ),
            Field::new(
                "allowBulkExport",
                FieldRule::Permission(accessor!(EgressPolicy, allow_bulk_export: bool)),
            ),
            Field::new(
                "maxEgressSizeBytes",
                FieldRule::Ceiling(accessor!(EgressPolicy, max_egress_size_bytes: u64)),
            ),
            Field::new(
                "maxOperationsPerHour",
                FieldRule::Ceiling(accessor!(EgressPolicy, max_operations_per_hour: u64)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_of<P: SubPolicy>(name: &str) -> Option<FieldCategory> {
        P::fields()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.category())
    }

    #[test]
    fn ingress_table_covers_every_field() {
        assert_eq!(IngressPolicy::fields().len(), 11);
        assert_eq!(
            category_of::<IngressPolicy>("allowedArtefactTypes"),
            Some(FieldCategory::StrictAllowList)
        );
        assert_eq!(
            category_of::<IngressPolicy>("allowedSources"),
            Some(FieldCategory::OptionalAllowList)
        );
        assert_eq!(
            category_of::<IngressPolicy>("requireSourceVerification"),
            Some(FieldCategory::Requirement)
        );
        assert_eq!(
            category_of::<IngressPolicy>("parsingConstraint"),
            Some(FieldCategory::Strictness)
        );
    }

    #[test]
    fn egress_table_covers_every_field() {
        assert_eq!(EgressPolicy::fields().len(), 12);
        assert_eq!(
            category_of::<EgressPolicy>("allowedChannels"),
            Some(FieldCategory::StrictAllowList)
        );
        assert_eq!(
            category_of::<EgressPolicy>("blockedDestinations"),
            Some(FieldCategory::BlockList)
        );
        assert_eq!(
            category_of::<EgressPolicy>("allowBulkExport"),
            Some(FieldCategory::Permission)
        );
        assert_eq!(
            category_of::<EgressPolicy>("maxOperationsPerHour"),
            Some(FieldCategory::Ceiling)
        );
    }

    #[test]
    fn accessors_read_and_write_the_named_field() {
        let fields = EgressPolicy::fields();
        let mut egress = EgressPolicy::default();
        for field in &fields {
            if let FieldRule::Ceiling(access) = &field.rule {
                if field.name == "maxOperationsPerHour" {
                    (access.set)(&mut egress, 7);
                    assert_eq!((access.get)(&egress), 7);
                }
            }
        }
        assert_eq!(egress.max_operations_per_hour, 7);
        assert_eq!(
            egress.max_egress_size_bytes,
            EgressPolicy::default().max_egress_size_bytes
        );
    }
}
