// diff.rs — Explain which requested capabilities were not granted.

use std::path::Path;

use capsule_policy::get_denied_capabilities;

use super::load_policy;

pub fn execute(requested: &Path, effective: &Path) -> anyhow::Result<()> {
    let requested = load_policy(requested)?;
    let effective = load_policy(effective)?;

    let denials = get_denied_capabilities(&requested, &effective);
    tracing::info!(denials = denials.len(), "diffed '{}' against '{}'", requested.id, effective.id);
    println!("{}", serde_json::to_string_pretty(&denials)?);
    Ok(())
}
