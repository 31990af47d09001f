//! Seccomp profile path resolution.
//!
//! CRI-O before kubelet v1.24.0 resolved `localhost` seccomp profiles only
//! when the reference carried an explicit `localhost/` segment. Every other
//! runtime gets the qualified path unconditionally.

use semver::Version;
use tracing::debug;

use crate::node::{get_container_runtime, get_version, Node};

/// Default file name of the operator's own seccomp profile.
pub const LOCAL_SECCOMP_PROFILE_PATH: &str = "security-profiles-operator.json";

/// Qualifier prepended to profile paths for runtimes that require it.
pub const LOCALHOST_PREFIX: &str = "localhost/";

/// Runtime name whose handling depends on the kubelet version.
pub const CRIO_RUNTIME: &str = "cri-o";

/// First kubelet version at which CRI-O takes the unqualified path.
/// Tracks CRI-O release history; keep in sync with upstream.
pub const CRIO_UNQUALIFIED_SINCE: (u64, u64, u64) = (1, 24, 0);

/// Resolve the seccomp profile reference to hand to the runtime on `node`.
///
/// Returns `base_path` unmodified for CRI-O nodes whose kubelet is at or
/// above v1.24.0, and `localhost/<base_path>` otherwise. A CRI-O node with a
/// missing or unparseable kubelet version is treated as current and gets
/// `base_path` unmodified.
pub fn get_seccomp_localhost_profile_path(node: Option<&Node>, base_path: &str) -> String {
    let runtime = get_container_runtime(node);
    if runtime != CRIO_RUNTIME {
        debug!(runtime = %runtime, "runtime requires localhost qualifier");
        return qualified(base_path);
    }

    let kubelet_version = get_version(node);
    match parse_kubelet_version(&kubelet_version) {
        Some(version) if version_triple(&version) < CRIO_UNQUALIFIED_SINCE => {
            debug!(kubelet_version = %kubelet_version, "cri-o predates unqualified profile paths");
            qualified(base_path)
        }
        Some(_) => base_path.to_owned(),
        None => {
            debug!(
                kubelet_version = %kubelet_version,
                "unparseable kubelet version, using unqualified profile path"
            );
            base_path.to_owned()
        }
    }
}

/// Parse a kubelet version such as `v1.25.3`, `1.25.3`, `v1.25` or
/// `v1.27.8+k3s1`.
///
/// Shorthand forms with a missing minor or patch component are completed
/// with zeros. Returns `None` for anything else.
pub fn parse_kubelet_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if stripped.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(stripped) {
        return Some(version);
    }

    // Shorthand: "1" or "1.24", no pre-release or build suffix.
    let mut parts = stripped.split('.');
    let major = parse_component(parts.next()?)?;
    let minor = match parts.next() {
        Some(p) => parse_component(p)?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, 0))
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Ordering key that ignores pre-release and build metadata.
fn version_triple(version: &Version) -> (u64, u64, u64) {
    (version.major, version.minor, version.patch)
}

fn qualified(base_path: &str) -> String {
    format!("{LOCALHOST_PREFIX}{base_path}")
}
