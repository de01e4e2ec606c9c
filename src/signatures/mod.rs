//! Service discovery signatures
//!
//! A signatures file names a set of rulesets; each ruleset maps a list of
//! declarative rules onto the service type assigned when they all hold.
//! Files are JSON:
//!
//! ```json
//! {
//!   "name": "builtin",
//!   "signatures": [
//!     {
//!       "name": "redis",
//!       "type": "redis",
//!       "rules": [{"comparator": "eq", "path": "ContainerImage", "value": "redis:6"}]
//!     }
//!   ]
//! }
//! ```

use crate::error::{Result, ServiceRulesError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One atomic test against a projected attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRule {
    #[serde(alias = "Comparator")]
    pub comparator: String,
    #[serde(alias = "Path")]
    pub path: String,
    #[serde(alias = "Value", default)]
    pub value: Value,
}

/// Named set of discovery rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRuleset {
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(rename = "type", alias = "Type")]
    pub service_type: String,
    /// Criteria for service identification
    #[serde(alias = "Rules", default)]
    pub rules: Vec<DiscoveryRule>,
}

/// Rulesets loaded from one source, in declared order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySignatures {
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Signatures")]
    pub signatures: Vec<DiscoveryRuleset>,
}

impl DiscoverySignatures {
    /// Decode signatures from JSON content
    ///
    /// `origin` names the source in errors and stands in for an empty `name`.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        let mut signatures: DiscoverySignatures =
            serde_json::from_str(content).map_err(|e| ServiceRulesError::MalformedRules {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        signatures.validate(origin)?;

        if signatures.name.is_empty() {
            signatures.name = origin.display().to_string();
        }

        Ok(signatures)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        for (idx, ruleset) in self.signatures.iter().enumerate() {
            if ruleset.service_type.trim().is_empty() {
                return Err(ServiceRulesError::MalformedRules {
                    path: origin.to_path_buf(),
                    message: format!(
                        "signature #{} ('{}') has an empty type",
                        idx, ruleset.name
                    ),
                });
            }
        }
        Ok(())
    }

    /// Total number of rules across all rulesets
    pub fn rule_count(&self) -> usize {
        self.signatures.iter().map(|s| s.rules.len()).sum()
    }
}

/// Read discovery signatures from a file
pub fn load_signatures(path: &Path) -> Result<DiscoverySignatures> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ServiceRulesError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

    DiscoverySignatures::from_json(&content, path)
}

/// Load every source in order, failing on the first bad one
pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<DiscoverySignatures>> {
    if paths.is_empty() {
        return Err(ServiceRulesError::ConfigurationMissing);
    }

    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            tracing::info!("loading service discovery signatures from {}", path.display());
            let loaded = load_signatures(path)?;
            tracing::debug!(
                source = %loaded.name,
                rulesets = loaded.signatures.len(),
                rules = loaded.rule_count(),
                "signatures loaded"
            );
            Ok(loaded)
        })
        .collect()
}
