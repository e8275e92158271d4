//! Engine configuration.
//!
//! ## Sources
//!
//! - JSON string: [`CloneConfig::from_json`]
//! - JSON file: [`CloneConfig::from_path`]
//! - Environment: [`CloneConfig::from_env`]
//!   - `CLONE_KERNEL_CONFIG`: path to a JSON config file (optional)
//!   - `CLONE_KERNEL_DEBUG`: `1`/`true` enables diagnostics (optional)
//!
//! ## Example
//!
//! ```json
//! {
//!   "exempt_types": ["core.String"],
//!   "exempt_capabilities": ["runnable", "function"],
//!   "field_value_rules": [
//!     { "rule": "namespace_prefix", "prefix": "io.fs." },
//!     { "rule": "namespace_except", "namespace": "vendor.search.", "allowed": "vendor.search.Document" }
//!   ],
//!   "reset_hooks": [
//!     { "type_name": "vendor.search.Reader", "fields": ["parentReaders"], "empty": "weak_set" }
//!   ],
//!   "diagnostics": true
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{CloneEngine, EngineOptions, ResetFieldsHook};
use crate::policy::{PolicyError, PolicyRegistry, ResetField, ValueRule};
use crate::types::{Capability, CollectionKind};

/// Environment variable naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "CLONE_KERNEL_CONFIG";

/// Environment variable enabling diagnostics.
pub const DEBUG_ENV: &str = "CLONE_KERNEL_DEBUG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Config is not valid JSON for [`CloneConfig`].
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    /// A rule could not be registered.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A [`ResetFieldsHook`] registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetHookConfig {
    /// Matched type (and subtypes).
    pub type_name: String,
    /// Back-reference fields reset on clone.
    pub fields: Vec<String>,
    /// Collection installed in null reset fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty: Option<CollectionKind>,
}

/// Declarative engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloneConfig {
    /// Start from [`PolicyRegistry::with_defaults`] instead of an empty policy.
    pub use_defaults: bool,
    /// Types exempt by exact name.
    pub exempt_types: Vec<String>,
    /// Types exempt together with all subtypes.
    pub exempt_type_families: Vec<String>,
    /// Exempt behavioral capabilities.
    pub exempt_capabilities: Vec<Capability>,
    /// Field-value rules.
    pub field_value_rules: Vec<ValueRule>,
    /// Back-reference fields reset by the generic classifier.
    pub reset_fields: Vec<ResetField>,
    /// Types cloned by a [`ResetFieldsHook`].
    pub reset_hooks: Vec<ResetHookConfig>,
    /// Emit diagnostics at `info`.
    pub diagnostics: bool,
    /// Alias non-instantiable sub-objects instead of failing.
    pub alias_on_instantiation_failure: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        let options = EngineOptions::default();
        Self {
            use_defaults: true,
            exempt_types: Vec::new(),
            exempt_type_families: Vec::new(),
            exempt_capabilities: Vec::new(),
            field_value_rules: Vec::new(),
            reset_fields: Vec::new(),
            reset_hooks: Vec::new(),
            diagnostics: options.diagnostics,
            alias_on_instantiation_failure: options.alias_on_instantiation_failure,
        }
    }
}

impl CloneConfig {
    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from the environment.
    ///
    /// Without `CLONE_KERNEL_CONFIG` the default configuration is used.
    /// `CLONE_KERNEL_DEBUG` overrides the file's `diagnostics` flag.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_path(PathBuf::from(path))?,
            None => Self::default(),
        };
        if let Some(debug) = std::env::var(DEBUG_ENV).ok().and_then(|s| parse_flag(&s)) {
            config.diagnostics = debug;
        }
        Ok(config)
    }

    /// Engine options carried by this config.
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            diagnostics: self.diagnostics,
            alias_on_instantiation_failure: self.alias_on_instantiation_failure,
        }
    }

    /// Build the policy registry.
    pub fn to_policy(&self) -> Result<PolicyRegistry, ConfigError> {
        let mut policy = if self.use_defaults {
            PolicyRegistry::with_defaults()
        } else {
            PolicyRegistry::new()
        };
        for name in &self.exempt_types {
            policy.exempt_type(name.clone());
        }
        for name in &self.exempt_type_families {
            policy.exempt_type_family(name.clone());
        }
        for capability in &self.exempt_capabilities {
            policy.exempt_capability(*capability);
        }
        for rule in &self.field_value_rules {
            policy.add_value_rule(rule.clone())?;
        }
        for designation in &self.reset_fields {
            policy.reset_field(designation.clone());
        }
        Ok(policy)
    }

    /// Build an engine: policy, reset hooks in declaration order, options.
    pub fn build_engine(&self) -> Result<CloneEngine, ConfigError> {
        let mut builder = CloneEngine::builder()
            .policy(self.to_policy()?)
            .options(self.options());
        for hook in &self.reset_hooks {
            let mut reset = ResetFieldsHook::new(hook.fields.iter().cloned());
            if let Some(kind) = hook.empty {
                reset = reset.with_empty(kind);
            }
            builder = builder.hook(reset.into_override(hook.type_name.clone()));
        }
        let engine = builder.build();

        tracing::debug!(
            hooks = engine.hooks().len(),
            diagnostics = self.diagnostics,
            "Clone engine configured"
        );
        Ok(engine)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
