// command_flow.rs — Integration tests driving the `cpolicy` binary.
//
// Flow:
//   1. Write layer documents (YAML and JSON) into a scratch directory
//   2. cpolicy evaluate → effective.json
//   3. cpolicy diff / check read effective.json back
//   4. cpolicy verify / check signal failure through the exit status

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

const NETWORK_YAML: &str = r#"
id: org-baseline
name: Organization baseline
layer: network
ingress:
  allowedArtefactTypes: [text]
egress:
  blockedDestinations: [evil.com]
  requireEncryption: false
"#;

const LOCAL_JSON: &str = r#"{
  "id": "laptop",
  "name": "Laptop",
  "layer": "local",
  "ingress": { "allowedArtefactTypes": ["text", "markdown", "html"] },
  "egress": { "requireEncryption": false }
}"#;

const CAPSULE_YAML: &str = r#"
id: cap-42
name: Inbound capsule
layer: capsule
ingress:
  allowedArtefactTypes: [text, html]
  allowDynamicContent: true
"#;

fn cpolicy(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cpolicy"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "error")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn scratch() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("network.yaml"), NETWORK_YAML).unwrap();
    fs::write(dir.path().join("local.json"), LOCAL_JSON).unwrap();
    fs::write(dir.path().join("capsule.yaml"), CAPSULE_YAML).unwrap();
    dir
}

fn evaluate_to_file(dir: &Path) {
    let output = cpolicy(
        dir,
        &["evaluate", "--local", "local.json", "--network", "network.yaml"],
    );
    assert!(
        output.status.success(),
        "evaluate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    fs::write(dir.join("effective.json"), &output.stdout).unwrap();
}

#[test]
fn evaluate_reads_yaml_and_json_layers() {
    let dir = scratch();
    let output = cpolicy(
        dir.path(),
        &["evaluate", "--local", "local.json", "--network", "network.yaml"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["appliedLayers"], serde_json::json!(["network", "local"]));
    assert_eq!(
        result["effective"]["ingress"]["allowedArtefactTypes"],
        serde_json::json!(["text"])
    );
    assert_eq!(result["effective"]["layer"], "local");

    // markdown and html were cut by the network layer.
    let denials = result["denials"].as_array().unwrap();
    assert!(denials
        .iter()
        .any(|d| d["requestedValue"]["value"] == "html" && d["layer"] == "network"));
}

#[test]
fn evaluate_output_feeds_diff() {
    let dir = scratch();
    evaluate_to_file(dir.path());

    let output = cpolicy(
        dir.path(),
        &["diff", "--requested", "capsule.yaml", "--effective", "effective.json"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let denials: Value = serde_json::from_str(&stdout(&output)).unwrap();
    let denials = denials.as_array().unwrap();
    assert!(denials.iter().any(|d| d["capability"] == "allowedArtefactTypes"
        && d["requestedValue"] == serde_json::json!({"kind": "text", "value": "html"})));
    assert!(denials.iter().any(|d| d["capability"] == "allowDynamicContent"));
    assert!(denials.iter().all(|d| d["layer"] == "effective"));
}

#[test]
fn evaluate_output_feeds_check() {
    let dir = scratch();
    evaluate_to_file(dir.path());

    let allowed = cpolicy(
        dir.path(),
        &[
            "check",
            "--policy",
            "effective.json",
            "--domain",
            "egress",
            "--capability",
            "unencryptedEgress",
        ],
    );
    assert!(allowed.status.success(), "{}", String::from_utf8_lossy(&allowed.stderr));
    assert_eq!(stdout(&allowed).trim(), "allowed");

    let denied = cpolicy(
        dir.path(),
        &[
            "check",
            "--policy",
            "effective.json",
            "--domain",
            "ingress",
            "--capability",
            "allowDynamicContent",
        ],
    );
    assert!(!denied.status.success());
    assert_eq!(stdout(&denied).trim(), "denied");
}

#[test]
fn check_denies_unknown_capability() {
    let dir = scratch();
    let output = cpolicy(
        dir.path(),
        &[
            "check",
            "--policy",
            "local.json",
            "--domain",
            "ingress",
            "--capability",
            "launchMissiles",
        ],
    );
    assert!(!output.status.success());
    assert_eq!(stdout(&output).trim(), "denied");
}

#[test]
fn verify_exits_nonzero_on_escalation() {
    let dir = scratch();

    let output = cpolicy(
        dir.path(),
        &["verify", "--higher", "network.yaml", "--lower", "capsule.yaml"],
    );
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("violation(s)"), "{}", text);
    assert!(text.contains("'html'"), "{}", text);
}

#[test]
fn verify_accepts_narrower_layer() {
    let dir = scratch();
    fs::write(
        dir.path().join("narrow.yaml"),
        "id: narrow\nname: Narrow\nlayer: capsule\ningress:\n  allowedArtefactTypes: [text]\n",
    )
    .unwrap();

    let output = cpolicy(
        dir.path(),
        &["verify", "--higher", "network.yaml", "--lower", "narrow.yaml"],
    );
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).starts_with("No escalation"));
}

#[test]
fn unparsable_policy_is_reported() {
    let dir = scratch();
    fs::write(dir.path().join("broken.json"), "{\"name\": \"no id\"}").unwrap();

    let output = cpolicy(
        dir.path(),
        &[
            "check",
            "--policy",
            "broken.json",
            "--domain",
            "ingress",
            "--capability",
            "allowReconstruction",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse policy"), "{}", stderr);
}
