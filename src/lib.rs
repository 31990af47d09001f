//! spod-resolver — node-aware decisions for a security-profiles daemon.
//!
//! Turns loosely structured kubelet-reported node metadata into two
//! decisions: the seccomp profile reference to hand to the container
//! runtime, and the variable naming the selinuxd image for the node's OS.
//! Missing metadata never faults; it resolves to an empty string or the
//! unmodified path.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod node;
pub mod retry;
pub mod seccomp;
pub mod selinuxd;

pub use node::{get_container_runtime, get_version, Node, NodeStatus, NodeSystemInfo};
pub use retry::{retry, retry_with, Backoff};
pub use seccomp::get_seccomp_localhost_profile_path;
pub use selinuxd::{match_image_json_mapping, ImageRule, RuleSet, RuleSetError};
