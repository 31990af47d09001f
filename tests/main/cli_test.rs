//! CLI contract tests.

use std::path::Path;

use assert_cmd::Command;

fn write_node(dir: &Path, runtime: &str, kubelet: &str, os_image: &str) -> std::path::PathBuf {
    let node = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Node",
        "status": {
            "nodeInfo": {
                "containerRuntimeVersion": runtime,
                "kubeletVersion": kubelet,
                "osImage": os_image,
            }
        }
    });
    let path = dir.join("node.json");
    std::fs::write(&path, node.to_string()).expect("write node");
    path
}

/// Run the binary with an isolated config location and return stdout.
fn run(dir: &Path, args: &[&str], envs: &[(&str, &str)]) -> String {
    let mut cmd = Command::cargo_bin("spod-resolver").expect("binary should build");
    cmd.env("SPOD_RESOLVER_CONFIG", dir.join("absent.toml"))
        .env_remove("SPOD_SECCOMP_PROFILE_PATH")
        .env_remove("SPOD_SELINUXD_MAPPING_FILE")
        .env_remove("SPOD_RETRY_MAX_ATTEMPTS")
        .env_remove("RELATED_IMAGE_SELINUXD")
        .env_remove("RELATED_IMAGE_SELINUXD_EL8")
        .env_remove("RELATED_IMAGE_SELINUXD_EL9")
        .args(args);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("binary should run");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim_end().to_owned()
}

#[test]
fn prints_runtime_and_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "cri-o://1.29.1", "v1.29.5", "");
    let node = node.to_string_lossy();

    assert_eq!(run(dir.path(), &["runtime", "--node", &node], &[]), "cri-o");
    assert_eq!(run(dir.path(), &["kubelet-version", "--node", &node], &[]), "v1.29.5");
}

#[test]
fn prints_profile_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "cri-o://1.2.3", "v1.22.3", "");
    let node = node.to_string_lossy();

    assert_eq!(
        run(dir.path(), &["profile-path", "--node", &node], &[]),
        "localhost/security-profiles-operator.json"
    );
    assert_eq!(
        run(
            dir.path(),
            &["profile-path", "--node", &node, "--base-path", "custom.json"],
            &[]
        ),
        "localhost/custom.json"
    );
}

#[test]
fn reads_node_from_stdin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cmd = Command::cargo_bin("spod-resolver").expect("binary should build");
    let output = cmd
        .env("SPOD_RESOLVER_CONFIG", dir.path().join("absent.toml"))
        .args(["runtime", "--node", "-"])
        .write_stdin(r#"{"status":{"nodeInfo":{"containerRuntimeVersion":"containerd://1.7.2"}}}"#)
        .output()
        .expect("binary should run");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim_end(), "containerd");
}

#[test]
fn null_node_resolves_to_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("null.json");
    std::fs::write(&path, "null").expect("write");
    let node = path.to_string_lossy();

    assert_eq!(run(dir.path(), &["runtime", "--node", &node], &[]), "");
}

#[test]
fn prints_selinuxd_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(
        dir.path(),
        "cri-o://1.29.1",
        "v1.29.5",
        "Red Hat Enterprise Linux CoreOS 9.6.20250715-0 (Plow)",
    );
    let node = node.to_string_lossy();

    let out = run(
        dir.path(),
        &["selinuxd-image", "--node", &node],
        &[("RELATED_IMAGE_SELINUXD_EL9", "quay.io/selinuxd:el9")],
    );
    assert_eq!(out, "RELATED_IMAGE_SELINUXD_EL9\tquay.io/selinuxd:el9");
}

#[test]
fn selinuxd_image_fallback_names_default_variable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "containerd://1.7.2", "v1.29.5", "Some other OS");
    let node = node.to_string_lossy();

    let out = run(
        dir.path(),
        &["selinuxd-image", "--node", &node],
        &[("RELATED_IMAGE_SELINUXD", "quay.io/selinuxd:default")],
    );
    assert_eq!(out, "RELATED_IMAGE_SELINUXD\tquay.io/selinuxd:default");
}

#[test]
fn malformed_mapping_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "cri-o://1.29.1", "v1.29.5", "Some other OS");
    let mapping = dir.path().join("mapping.json");
    std::fs::write(&mapping, "{not json").expect("write");
    let node = node.to_string_lossy().into_owned();
    let mapping = mapping.to_string_lossy().into_owned();

    let output = Command::cargo_bin("spod-resolver")
        .expect("binary should build")
        .env("SPOD_RESOLVER_CONFIG", dir.path().join("absent.toml"))
        .args(["selinuxd-image", "--node", node.as_str(), "--mapping", mapping.as_str()])
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("malformed image mapping"));
}

#[test]
fn check_profile_finds_existing_profile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "docker://24.0.7", "v1.28.2", "");
    let root = dir.path().join("seccomp");
    std::fs::create_dir_all(&root).expect("mkdir");
    std::fs::write(root.join("security-profiles-operator.json"), "{}").expect("write");

    let out = run(
        dir.path(),
        &[
            "check-profile",
            "--node",
            &node.to_string_lossy(),
            "--root",
            &root.to_string_lossy(),
        ],
        &[],
    );
    assert_eq!(out, "localhost/security-profiles-operator.json");
}

#[test]
fn check_profile_gives_up_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let node = write_node(dir.path(), "docker://24.0.7", "v1.28.2", "");
    let node = node.to_string_lossy().into_owned();
    let root = dir.path().join("empty").to_string_lossy().into_owned();

    let output = Command::cargo_bin("spod-resolver")
        .expect("binary should build")
        .env("SPOD_RESOLVER_CONFIG", dir.path().join("absent.toml"))
        .env("SPOD_RETRY_MAX_ATTEMPTS", "1")
        .args(["check-profile", "--node", node.as_str(), "--root", root.as_str()])
        .output()
        .expect("binary should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not available"));
}
