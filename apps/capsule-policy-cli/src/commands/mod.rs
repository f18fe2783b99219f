pub mod check;
pub mod diff;
pub mod evaluate;
pub mod verify;

use std::path::Path;

use anyhow::Context;
use capsule_policy::CanonicalPolicy;
use serde::Deserialize;

/// The part of `evaluate` output a policy can be read back from.
#[derive(Deserialize)]
struct EvaluationOutput {
    effective: CanonicalPolicy,
}

/// Read a policy document. `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON. A file written by `evaluate` is accepted too;
/// its effective policy is returned.
pub fn load_policy(path: &Path) -> anyhow::Result<CanonicalPolicy> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy {}", path.display()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");

    let parsed = if is_yaml {
        CanonicalPolicy::from_yaml_str(&data)
    } else {
        CanonicalPolicy::from_json_str(&data)
    };
    let policy = match parsed {
        Ok(policy) => policy,
        Err(err) => {
            let output: Option<EvaluationOutput> = if is_yaml {
                serde_yaml::from_str(&data).ok()
            } else {
                serde_json::from_str(&data).ok()
            };
            // Report the document error, not the fallback's.
            output
                .map(|output| output.effective)
                .ok_or(err)
                .with_context(|| format!("failed to parse policy {}", path.display()))?
        }
    };
    tracing::debug!(policy_id = %policy.id, layer = %policy.layer, "loaded {}", path.display());
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_policy::{compute_effective_policy, IngressPolicy, PolicyLayer, PolicyStack};
    use tempfile::TempDir;

    fn local() -> CanonicalPolicy {
        CanonicalPolicy::new("laptop", "Laptop", PolicyLayer::Local).with_ingress(IngressPolicy {
            allowed_artefact_types: vec!["text".to_string()],
            ..IngressPolicy::default()
        })
    }

    #[test]
    fn loads_evaluation_output_as_its_effective_policy() {
        let dir = TempDir::new().unwrap();
        let local = local();
        let result = compute_effective_policy(&PolicyStack::new(&local));

        let path = dir.path().join("effective.json");
        std::fs::write(&path, serde_json::to_string_pretty(&result).unwrap()).unwrap();
        assert_eq!(load_policy(&path).unwrap(), result.effective);

        let path = dir.path().join("effective.yaml");
        std::fs::write(&path, serde_yaml::to_string(&result).unwrap()).unwrap();
        assert_eq!(load_policy(&path).unwrap(), result.effective);
    }

    #[test]
    fn loads_plain_documents_by_extension() {
        let dir = TempDir::new().unwrap();
        let policy = local();

        let path = dir.path().join("local.yml");
        std::fs::write(&path, serde_yaml::to_string(&policy).unwrap()).unwrap();
        assert_eq!(load_policy(&path).unwrap(), policy);

        let path = dir.path().join("local.policy");
        std::fs::write(&path, serde_json::to_string(&policy).unwrap()).unwrap();
        assert_eq!(load_policy(&path).unwrap(), policy);
    }

    #[test]
    fn document_error_is_reported_when_nothing_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"name\": \"no id\"}").unwrap();

        let err = load_policy(&path).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("failed to parse policy"), "{}", chain);
        assert!(chain.contains("id"), "{}", chain);
    }
}
