//! OS-image to selinuxd image mapping.
//!
//! The mapping is operator-supplied JSON: an ordered list of regular
//! expressions, each naming the environment variable that holds the
//! selinuxd image for matching nodes. Rules are evaluated in declaration
//! order and the first match wins. Patterns are opaque here; version ranges
//! must be spelled out in the pattern text (`41[0-2]` vs `41[3-9]`), and an
//! OS release outside every range simply does not match.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::node::{get_os_image, Node};

/// Variable holding the selinuxd image used when no rule applies.
pub const DEFAULT_IMAGE_VAR: &str = "RELATED_IMAGE_SELINUXD";

/// Stock mapping for RHEL CoreOS and CentOS Stream CoreOS nodes.
///
/// Covers both the CoreOS build form (`411.86.2022...`) and the direct RHEL
/// version form (`9.6.2025...`).
pub const DEFAULT_IMAGE_MAPPING: &str = r#"[
    {
        "regex": "(.*)(CoreOS).*(41[0-2]\\.[0-9]+)\\..*",
        "imageFromVar": "RELATED_IMAGE_SELINUXD_EL8"
    },
    {
        "regex": "(.*)(CoreOS).*(41[3-9]\\.[0-9]+)\\..*|(.*)(CoreOS)\\s+9\\.[0-9]+\\..*",
        "imageFromVar": "RELATED_IMAGE_SELINUXD_EL9"
    }
]"#;

/// Malformed rule data.
#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    /// The payload is not a JSON array of rule objects.
    #[error("malformed image mapping: {0}")]
    Json(#[from] serde_json::Error),

    /// A rule's pattern does not compile.
    #[error("malformed image mapping: rule {index} has invalid regex {pattern:?}: {source}")]
    InvalidPattern {
        /// Position of the rule in the mapping.
        index: usize,
        /// The offending pattern text.
        pattern: String,
        /// Compiler error.
        source: regex::Error,
    },

    /// A rule names no variable.
    #[error("malformed image mapping: rule {index} has an empty imageFromVar")]
    EmptyVariable {
        /// Position of the rule in the mapping.
        index: usize,
    },
}

/// One mapping entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRule {
    /// Regular expression searched for in the OS image string.
    pub regex: String,
    /// Name of the variable holding the image for matching nodes.
    pub image_from_var: String,
}

/// An ordered, compiled set of image rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<(Regex, ImageRule)>,
}

impl RuleSet {
    /// Parse and compile a JSON mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] if the payload is not a JSON array of rules,
    /// a pattern fails to compile, or a rule has an empty variable name.
    pub fn from_json(json: &[u8]) -> Result<Self, RuleSetError> {
        let raw: Vec<ImageRule> = serde_json::from_slice(json)?;
        let mut rules = Vec::with_capacity(raw.len());

        for (index, rule) in raw.into_iter().enumerate() {
            if rule.image_from_var.trim().is_empty() {
                return Err(RuleSetError::EmptyVariable { index });
            }
            let compiled =
                Regex::new(&rule.regex).map_err(|source| RuleSetError::InvalidPattern {
                    index,
                    pattern: rule.regex.clone(),
                    source,
                })?;
            rules.push((compiled, rule));
        }

        Ok(Self { rules })
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &ImageRule> {
        self.rules.iter().map(|(_, rule)| rule)
    }

    /// Return the variable name of the first rule matching `os_image`, or an
    /// empty string when none does.
    pub fn match_os_image(&self, os_image: &str) -> String {
        for (index, (pattern, rule)) in self.rules.iter().enumerate() {
            if pattern.is_match(os_image) {
                debug!(
                    os_image,
                    rule = index,
                    image_from_var = %rule.image_from_var,
                    "image rule matched"
                );
                return rule.image_from_var.clone();
            }
        }
        debug!(os_image, rules = self.rules.len(), "no image rule matched");
        String::new()
    }
}

/// Match `os_image` against a JSON-encoded rule set.
///
/// Returns the matching rule's variable name, or an empty string when no
/// rule matches.
///
/// # Errors
///
/// Returns [`RuleSetError`] if the rule set is malformed.
pub fn match_image_json_mapping(os_image: &str, rule_set_json: &[u8]) -> Result<String, RuleSetError> {
    let rules = RuleSet::from_json(rule_set_json)?;
    Ok(rules.match_os_image(os_image))
}

/// Match a node's OS image against a parsed rule set.
///
/// A missing node or OS image matches nothing.
pub fn match_node_image(node: Option<&Node>, rules: &RuleSet) -> String {
    rules.match_os_image(&get_os_image(node))
}

/// An image reference together with the variable that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Variable the image was read from.
    pub var: String,
    /// The image reference.
    pub image: String,
}

/// Resolve the selinuxd image reference to deploy.
///
/// Looks up `rule_var` (the matcher's result, possibly empty) through `env`,
/// falling back to `default_var` when no rule matched or the named variable
/// is unset or empty. Returns `None` when neither yields an image.
pub fn effective_image(
    rule_var: &str,
    default_var: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    resolve_image(rule_var, default_var, env).map(|resolved| resolved.image)
}

/// Like [`effective_image`], but also reports which variable supplied the
/// image.
pub fn resolve_image(
    rule_var: &str,
    default_var: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ResolvedImage> {
    let lookup = |name: &str| {
        env(name)
            .filter(|value| !value.trim().is_empty())
            .map(|image| ResolvedImage {
                var: name.to_owned(),
                image,
            })
    };

    if !rule_var.is_empty() {
        if let Some(resolved) = lookup(rule_var) {
            return Some(resolved);
        }
        warn!(
            var = rule_var,
            fallback = default_var,
            "matched image variable is unset, falling back to default"
        );
    }
    lookup(default_var)
}
