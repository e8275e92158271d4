//! Clone Policy Check
//!
//! Loads a clone-kernel configuration, builds the engine, and prints a JSON
//! report of the effective policy, hooks and options to stdout.
//!
//! ## Configuration
//!
//! - First argument: path to a JSON config file (optional)
//! - `CLONE_KERNEL_CONFIG`: config path when no argument is given
//! - `CLONE_KERNEL_DEBUG`: enable diagnostics
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin clone_policy_check -- clone-policy.json
//! ```

use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clone_kernel::{canonical_hash_hex, CloneConfig, EngineOptions, PolicySummary};

/// Initialize the tracing subscriber with JSON or pretty format.
///
/// Logs go to stderr; stdout carries the report.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clone_policy_check=info,clone_kernel=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[derive(Serialize)]
struct PolicyReport {
    schema_version: &'static str,
    policy_fingerprint: String,
    policy: PolicySummary,
    hooks: Vec<String>,
    options: EngineOptions,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting clone policy check");

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(path = %path, "Loading config from argument");
            CloneConfig::from_path(&path)
        }
        None => CloneConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            return Err(e.into());
        }
    };

    let engine = config.build_engine()?;
    let summary = engine.policy().summary();
    let report = PolicyReport {
        schema_version: clone_kernel::CLONE_KERNEL_SCHEMA_VERSION,
        policy_fingerprint: canonical_hash_hex(&summary),
        policy: summary,
        hooks: engine
            .hooks()
            .hooks()
            .iter()
            .map(|h| format!("{} [{}]", h.name(), h.matcher()))
            .collect(),
        options: *engine.options(),
    };

    info!(
        policy_fingerprint = %report.policy_fingerprint,
        exempt_types = report.policy.exempt_types.len(),
        field_value_rules = report.policy.field_value_rules.len(),
        hooks = report.hooks.len(),
        "Clone engine built"
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
