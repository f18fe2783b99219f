// evaluate.rs — Compute the effective policy for a layer stack.

use std::path::Path;

use anyhow::Context;
use capsule_policy::{EvaluatorConfig, PolicyEvaluator, PolicyStack};

use super::load_policy;

pub fn execute(
    local: &Path,
    network: Option<&Path>,
    handshake: Option<&Path>,
    capsule: Option<&Path>,
    config: &Path,
    lenient: bool,
) -> anyhow::Result<()> {
    let config = EvaluatorConfig::load_or_default(config)
        .with_context(|| format!("failed to load config {}", config.display()))?;

    let local = load_policy(local)?;
    let network = network.map(load_policy).transpose()?;
    let handshake = handshake.map(load_policy).transpose()?;
    let capsule = capsule.map(load_policy).transpose()?;

    let stack = PolicyStack {
        network: network.as_ref(),
        local: &local,
        handshake: handshake.as_ref(),
        capsule: capsule.as_ref(),
    };
    if !lenient {
        stack.validate()?;
    }

    let result = PolicyEvaluator::new(config)?.evaluate(&stack);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
