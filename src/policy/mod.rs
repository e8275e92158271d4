//! Exemption policy definitions.

pub mod registry;
pub mod rules;

pub use registry::{PolicyRegistry, PolicySummary};
pub use rules::{FieldValueContext, PolicyError, ResetField, ValuePredicateFn, ValueRule};
