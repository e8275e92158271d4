//! Policy registry: which values are aliased instead of cloned.
//!
//! Three independent mechanisms, composed by logical OR:
//!
//! | Mechanism | Looks at | Example |
//! |-----------|----------|---------|
//! | Type exemption | value's runtime type (exact, or type + subtypes) | immutable text, locks |
//! | Capability exemption | capabilities of the value's type | closures, tasks |
//! | Field-value rules | value type + owning field | `io.fs.*` handles in any field |
//!
//! Registration is additive and happens before the registry is handed to a
//! [`CloneEngine`](crate::engine::CloneEngine). The engine owns it immutably
//! from then on, so concurrent clone passes read it without locking.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::rules::{
    FieldPredicate, FieldValueContext, PolicyError, ResetField, ValuePredicateFn, ValueRule,
};
use crate::types::{builtin, Capability, FieldDescriptor, TypeKey, TypeRegistry};

/// Serializable overview of a registry's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    /// Exactly-matched exempt types.
    pub exempt_types: Vec<String>,
    /// Exempt type families (type plus subtypes).
    pub exempt_type_families: Vec<String>,
    /// Exempt capabilities.
    pub exempt_capabilities: Vec<Capability>,
    /// Field-value rules in evaluation order.
    pub field_value_rules: Vec<String>,
    /// Back-reference fields reset on clone.
    pub reset_fields: Vec<String>,
}

/// Registry of exemption policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    exempt_types: BTreeSet<String>,
    exempt_families: BTreeSet<String>,
    exempt_capabilities: BTreeSet<Capability>,
    field_predicates: Vec<FieldPredicate>,
    reset_fields: Vec<ResetField>,
}

impl PolicyRegistry {
    /// Create an empty registry: nothing is exempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the immutable text type and every behavioural
    /// capability exempted.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.exempt_type(builtin::STRING);
        for capability in Capability::ALL {
            registry.exempt_capability(capability);
        }
        registry
    }

    /// Alias instances of exactly this type.
    pub fn exempt_type(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.exempt_types.insert(type_name.into());
        self
    }

    /// Alias instances of this type and of every subtype.
    pub fn exempt_type_family(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.exempt_families.insert(type_name.into());
        self
    }

    /// Alias every value whose type carries `capability`.
    pub fn exempt_capability(&mut self, capability: Capability) -> &mut Self {
        self.exempt_capabilities.insert(capability);
        self
    }

    /// Add a declarative field-value rule.
    pub fn add_value_rule(&mut self, rule: ValueRule) -> Result<&mut Self, PolicyError> {
        self.field_predicates.push(FieldPredicate::compile(rule)?);
        Ok(self)
    }

    /// Add a custom field-value predicate.
    pub fn add_value_predicate<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&FieldValueContext<'_>) -> bool + Send + Sync + 'static,
    {
        let predicate: Arc<ValuePredicateFn> = Arc::new(predicate);
        self.field_predicates.push(FieldPredicate::Custom {
            name: name.into(),
            predicate,
        });
        self
    }

    /// Designate a back-reference field to be reset to a fresh empty instance.
    pub fn reset_field(&mut self, designation: ResetField) -> &mut Self {
        if !self.reset_fields.contains(&designation) {
            self.reset_fields.push(designation);
        }
        self
    }

    /// Whether instances of `ty` are exempt by type.
    pub fn is_exempt_type(&self, types: &TypeRegistry, ty: TypeKey) -> bool {
        if self
            .exempt_types
            .contains(types.name(ty))
        {
            return true;
        }
        !self.exempt_families.is_empty()
            && types
                .ancestors(ty)
                .any(|t| self.exempt_families.contains(&t.name))
    }

    /// Whether instances of `ty` carry an exempt capability.
    pub fn is_exempt_capability(&self, types: &TypeRegistry, ty: TypeKey) -> bool {
        !self.exempt_capabilities.is_empty()
            && types
                .ancestors(ty)
                .any(|t| !t.capabilities.is_disjoint(&self.exempt_capabilities))
    }

    /// Type or capability exemption: the checks that need only the value's type.
    pub fn is_exempt_object(&self, types: &TypeRegistry, ty: TypeKey) -> bool {
        self.is_exempt_type(types, ty) || self.is_exempt_capability(types, ty)
    }

    /// Whether any field-value rule exempts the value in `cx`.
    pub fn is_exempt_field_value(&self, cx: &FieldValueContext<'_>) -> bool {
        self.matching_rule(cx).is_some()
    }

    /// Label of the first field-value rule that exempts the value in `cx`.
    pub fn matching_rule(&self, cx: &FieldValueContext<'_>) -> Option<String> {
        self.field_predicates
            .iter()
            .find(|p| p.matches(cx))
            .map(FieldPredicate::label)
    }

    /// Whether `field` on an owner of type `owner` is a back-reference field.
    pub fn is_reset_field(&self, types: &TypeRegistry, owner: TypeKey, field: &FieldDescriptor) -> bool {
        self.reset_fields
            .iter()
            .any(|r| r.matches(types, owner, field))
    }

    /// Overview for diagnostics.
    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            exempt_types: self.exempt_types.iter().cloned().collect(),
            exempt_type_families: self.exempt_families.iter().cloned().collect(),
            exempt_capabilities: self.exempt_capabilities.iter().copied().collect(),
            field_value_rules: self.field_predicates.iter().map(FieldPredicate::label).collect(),
            reset_fields: self.reset_fields.iter().map(ToString::to_string).collect(),
        }
    }
}
