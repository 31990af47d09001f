//! Node metadata model and the two extractors that read it.
//!
//! Only the slice of a Kubernetes `Node` that the resolvers need is modelled.
//! Every level is optional because kubelets populate `status.nodeInfo` lazily
//! after a node joins, and the extractors must stay total over such input.

use serde::{Deserialize, Serialize};

/// Separator between runtime name and version in `containerRuntimeVersion`.
const RUNTIME_SEPARATOR: &str = "://";

/// A cluster node as reported by the API server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Observed node status.
    #[serde(default)]
    pub status: Option<NodeStatus>,
}

/// Status section of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// System facts self-reported by the kubelet.
    #[serde(default)]
    pub node_info: Option<NodeSystemInfo>,
}

/// Runtime, kubelet and OS facts about a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSystemInfo {
    /// Runtime identity in `<name>://<version>` form, e.g. `cri-o://1.2.3`.
    #[serde(default)]
    pub container_runtime_version: String,
    /// Kubelet version, normally `v<major>.<minor>.<patch>`.
    #[serde(default)]
    pub kubelet_version: String,
    /// Human-readable OS description, e.g. `Red Hat Enterprise Linux CoreOS 9.6...`.
    #[serde(default)]
    pub os_image: String,
}

impl Node {
    /// Build a node carrying only the given system info.
    pub fn with_info(info: NodeSystemInfo) -> Self {
        Self {
            status: Some(NodeStatus {
                node_info: Some(info),
            }),
        }
    }

    /// The reported system info, if the kubelet has populated it.
    pub fn info(&self) -> Option<&NodeSystemInfo> {
        self.status.as_ref()?.node_info.as_ref()
    }
}

/// Return the node's kubelet version exactly as reported.
///
/// A missing node or an unpopulated status yields an empty string.
pub fn get_version(node: Option<&Node>) -> String {
    node.and_then(Node::info)
        .map(|info| info.kubelet_version.clone())
        .unwrap_or_default()
}

/// Return the container runtime name, the part before `://` in
/// `containerRuntimeVersion`.
///
/// A missing node, an unpopulated status or a value without the separator
/// yields an empty string.
pub fn get_container_runtime(node: Option<&Node>) -> String {
    node.and_then(Node::info)
        .and_then(|info| info.container_runtime_version.split_once(RUNTIME_SEPARATOR))
        .map(|(name, _)| name.to_owned())
        .unwrap_or_default()
}

/// Return the node's OS image string, or an empty string when unknown.
pub fn get_os_image(node: Option<&Node>) -> String {
    node.and_then(Node::info)
        .map(|info| info.os_image.clone())
        .unwrap_or_default()
}
