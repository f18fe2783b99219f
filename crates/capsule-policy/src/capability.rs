// capability.rs — Named capability lookup for enforcement points.
//
// Enforcement points don't query policies field by field; they ask whether
// one of a small, fixed set of named capabilities is allowed. Anything not
// on the list, asked of the wrong domain, or asked of a policy that lacks
// the domain is denied.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{CanonicalPolicy, PolicyDomain};

/// A capability an enforcement point can ask about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    // Ingress
    AllowReconstruction,
    AllowDynamicContent,
    AllowExternalResources,
    /// Accept artefacts without verifying their source.
    UnverifiedSources,
    // Egress
    AllowBulkExport,
    /// Send without human approval.
    UnapprovedEgress,
    /// Send without encryption.
    UnencryptedEgress,
    /// Send to destinations that were not verified.
    UnverifiedDestinations,
}

impl Capability {
    pub const INGRESS: [Capability; 4] = [
        Capability::AllowReconstruction,
        Capability::AllowDynamicContent,
        Capability::AllowExternalResources,
        Capability::UnverifiedSources,
    ];

    pub const EGRESS: [Capability; 4] = [
        Capability::AllowBulkExport,
        Capability::UnapprovedEgress,
        Capability::UnencryptedEgress,
        Capability::UnverifiedDestinations,
    ];

    pub fn domain(self) -> PolicyDomain {
        if Self::INGRESS.contains(&self) {
            PolicyDomain::Ingress
        } else {
            PolicyDomain::Egress
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::AllowReconstruction => "allowReconstruction",
            Capability::AllowDynamicContent => "allowDynamicContent",
            Capability::AllowExternalResources => "allowExternalResources",
            Capability::UnverifiedSources => "unverifiedSources",
            Capability::AllowBulkExport => "allowBulkExport",
            Capability::UnapprovedEgress => "unapprovedEgress",
            Capability::UnencryptedEgress => "unencryptedEgress",
            Capability::UnverifiedDestinations => "unverifiedDestinations",
        }
    }

    /// Look up a capability by name within a domain.
    pub fn lookup(domain: PolicyDomain, name: &str) -> Option<Capability> {
        let candidates: &[Capability] = match domain {
            PolicyDomain::Ingress => &Self::INGRESS,
            PolicyDomain::Egress => &Self::EGRESS,
        };
        candidates.iter().copied().find(|c| c.name() == name)
    }

    /// Whether the capability is allowed by a policy. Fails closed.
    pub fn is_allowed_by(self, policy: &CanonicalPolicy) -> bool {
        match self.domain() {
            PolicyDomain::Ingress => {
                let Some(ingress) = &policy.ingress else {
                    return false;
                };
                match self {
                    Capability::AllowReconstruction => ingress.allow_reconstruction,
                    Capability::AllowDynamicContent => ingress.allow_dynamic_content,
                    Capability::AllowExternalResources => ingress.allow_external_resources,
                    Capability::UnverifiedSources => !ingress.require_source_verification,
                    _ => false,
                }
            }
            PolicyDomain::Egress => {
                let Some(egress) = &policy.egress else {
                    return false;
                };
                match self {
                    Capability::AllowBulkExport => egress.allow_bulk_export,
                    Capability::UnapprovedEgress => !egress.require_approval,
                    Capability::UnencryptedEgress => !egress.require_encryption,
                    Capability::UnverifiedDestinations => !egress.require_destination_verification,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the named capability is allowed in `domain` of `policy`.
///
/// Unknown names, names from the other domain, and missing sub-policies
/// all answer `false`.
pub fn is_capability_allowed(policy: &CanonicalPolicy, domain: PolicyDomain, capability: &str) -> bool {
    Capability::lookup(domain, capability).is_some_and(|c| c.is_allowed_by(policy))
}
