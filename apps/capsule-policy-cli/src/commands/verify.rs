// verify.rs — Pairwise no-escalation check.

use std::path::Path;

use capsule_policy::verify_no_escalation;

use super::load_policy;

pub fn execute(higher: &Path, lower: &Path) -> anyhow::Result<()> {
    let higher = load_policy(higher)?;
    let lower = load_policy(lower)?;

    let report = verify_no_escalation(&higher, &lower);
    if report.valid {
        println!(
            "No escalation: {} layer '{}' stays within {} layer '{}'.",
            lower.layer, lower.id, higher.layer, higher.id
        );
        return Ok(());
    }

    println!("{} violation(s):", report.violations.len());
    for violation in &report.violations {
        println!("  - {}", violation);
    }
    anyhow::bail!("'{}' escalates beyond '{}'", lower.id, higher.id);
}
