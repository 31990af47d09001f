//! spod-resolver CLI entry point.
//!
//! Each subcommand reads a node object (`kubectl get node -o json`) from a
//! file or stdin and prints one resolved value on stdout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use spod_resolver::config::ResolverConfig;
use spod_resolver::node::{get_container_runtime, get_version, Node};
use spod_resolver::seccomp::{get_seccomp_localhost_profile_path, LOCALHOST_PREFIX};
use spod_resolver::selinuxd::{match_node_image, resolve_image, RuleSet};
use spod_resolver::{logging, retry};

/// spod-resolver — resolve per-node security profile decisions.
#[derive(Parser)]
#[command(name = "spod-resolver", version, about)]
struct Cli {
    /// Config file (defaults to `$SPOD_RESOLVER_CONFIG` or `~/.spod-resolver/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Print the node's container runtime name.
    Runtime {
        /// Node JSON file, or `-` for stdin.
        #[arg(long)]
        node: PathBuf,
    },
    /// Print the node's kubelet version.
    KubeletVersion {
        /// Node JSON file, or `-` for stdin.
        #[arg(long)]
        node: PathBuf,
    },
    /// Print the seccomp profile reference for the node.
    ProfilePath {
        /// Node JSON file, or `-` for stdin.
        #[arg(long)]
        node: PathBuf,
        /// Base profile path (overrides the configured one).
        #[arg(long)]
        base_path: Option<String>,
    },
    /// Print the selinuxd image variable and the image it resolves to.
    SelinuxdImage {
        /// Node JSON file, or `-` for stdin.
        #[arg(long)]
        node: PathBuf,
        /// JSON mapping file (overrides the configured one).
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Wait until the node's resolved profile exists under a root directory.
    CheckProfile {
        /// Node JSON file, or `-` for stdin.
        #[arg(long)]
        node: PathBuf,
        /// Directory holding localhost profiles (e.g. `/var/lib/kubelet/seccomp`).
        #[arg(long)]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logging::init_json()?;
    } else {
        logging::init_cli()?;
    }

    let config = ResolverConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Runtime { node } => {
            let node = read_node(&node)?;
            println!("{}", get_container_runtime(node.as_ref()));
        }
        Command::KubeletVersion { node } => {
            let node = read_node(&node)?;
            println!("{}", get_version(node.as_ref()));
        }
        Command::ProfilePath { node, base_path } => {
            let node = read_node(&node)?;
            let base = base_path.unwrap_or(config.seccomp.profile_path);
            println!("{}", get_seccomp_localhost_profile_path(node.as_ref(), &base));
        }
        Command::SelinuxdImage { node, mapping } => {
            handle_selinuxd_image(&config, &node, mapping.as_deref())?;
        }
        Command::CheckProfile { node, root } => {
            handle_check_profile(&config, &node, &root).await?;
        }
    }

    Ok(())
}

/// Resolve and print the selinuxd image variable and its value.
fn handle_selinuxd_image(
    config: &ResolverConfig,
    node_path: &Path,
    mapping: Option<&Path>,
) -> anyhow::Result<()> {
    let node = read_node(node_path)?;

    let json = match mapping {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read image mapping {}", path.display()))?,
        None => config.selinuxd.mapping_json()?,
    };
    let rules = RuleSet::from_json(&json)?;
    debug!(rules = rules.len(), "loaded image mapping");

    let var = match_node_image(node.as_ref(), &rules);
    let resolved = resolve_image(&var, &config.selinuxd.default_image_var, |name| {
        std::env::var(name).ok()
    });

    // Output: "<var>\t<image>", where <var> is the variable that supplied
    // the image. Without an image only the matched variable (maybe empty)
    // is printed.
    match resolved {
        Some(resolved) => println!("{}\t{}", resolved.var, resolved.image),
        None => {
            warn!(var = %var, "no selinuxd image resolved");
            println!("{var}");
        }
    }
    Ok(())
}

/// Wait for the resolved profile file to appear under `root`.
async fn handle_check_profile(
    config: &ResolverConfig,
    node_path: &Path,
    root: &Path,
) -> anyhow::Result<()> {
    let node = read_node(node_path)?;
    let reference = get_seccomp_localhost_profile_path(node.as_ref(), &config.seccomp.profile_path);
    let relative = reference
        .strip_prefix(LOCALHOST_PREFIX)
        .unwrap_or(&reference)
        .to_owned();
    let target = root.join(&relative);

    let backoff = config.retry.backoff();
    retry::retry_with(
        &backoff,
        || {
            let target = target.clone();
            async move { tokio::fs::metadata(&target).await.map(|_| ()) }
        },
        |err: &std::io::Error| {
            let transient = err.kind() == std::io::ErrorKind::NotFound;
            if transient {
                info!(path = %target.display(), "profile not present yet, retrying");
            }
            transient
        },
    )
    .await
    .with_context(|| format!("profile {} not available", target.display()))?;

    println!("{reference}");
    Ok(())
}

/// Read a node object from `path`, or stdin when `path` is `-`.
///
/// A JSON `null` yields `None`.
fn read_node(path: &Path) -> anyhow::Result<Option<Node>> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read node from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read node {}", path.display()))?
    };

    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse node {}", path.display()))
}
