// check.rs — Single-capability lookup, as an enforcement point would do it.

use std::path::Path;

use capsule_policy::{is_capability_allowed, PolicyDomain};

use super::load_policy;

pub fn execute(policy: &Path, domain: PolicyDomain, capability: &str) -> anyhow::Result<()> {
    let policy = load_policy(policy)?;
    if is_capability_allowed(&policy, domain, capability) {
        println!("allowed");
        Ok(())
    } else {
        println!("denied");
        anyhow::bail!("{}.{} is not allowed by '{}'", domain, capability, policy.id);
    }
}
