//! Field-value exemption rules.
//!
//! A field-value rule is evaluated against the *runtime* type of the value
//! about to be assigned to a field, not against the field's declared kind.
//! Rules are pure: they only look at type descriptors.

use std::fmt;
use std::sync::Arc;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{FieldDescriptor, ObjectId, TypeDescriptor, TypeKey, TypeRegistry};

/// Error type for policy registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// A `name_pattern` rule does not compile.
    #[error("Invalid type name pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
}

/// Declarative field-value rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValueRule {
    /// Value type name starts with `prefix` (filesystem handles, storage I/O, codecs).
    NamespacePrefix {
        /// Namespace prefix, e.g. `io.fs.`.
        prefix: String,
    },
    /// Value type name contains `fragment` (e.g. generated closure names).
    NameContains {
        /// Substring to look for.
        fragment: String,
    },
    /// Value type name matches a regular expression.
    NamePattern {
        /// Pattern source.
        pattern: String,
    },
    /// Value type is compiler-generated.
    Synthetic,
    /// Value type is anonymous.
    Anonymous,
    /// Value type is, or inherits from, the named type (threads, executors).
    SubtypeOf {
        /// Qualified type name.
        type_name: String,
    },
    /// Value type is in a restricted namespace and is not the allow-listed type.
    NamespaceExcept {
        /// Restricted namespace prefix.
        namespace: String,
        /// Qualified name prefix that stays cloneable.
        allowed: String,
    },
    /// The owning object's type is compiler-generated; every reference it holds is aliased.
    SyntheticOwner,
}

impl fmt::Display for ValueRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamespacePrefix { prefix } => write!(f, "namespace_prefix({})", prefix),
            Self::NameContains { fragment } => write!(f, "name_contains({})", fragment),
            Self::NamePattern { pattern } => write!(f, "name_pattern({})", pattern),
            Self::Synthetic => write!(f, "synthetic"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::SubtypeOf { type_name } => write!(f, "subtype_of({})", type_name),
            Self::NamespaceExcept { namespace, allowed } => {
                write!(f, "namespace_except({}, {})", namespace, allowed)
            }
            Self::SyntheticOwner => write!(f, "synthetic_owner"),
        }
    }
}

/// Everything a field-value predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct FieldValueContext<'a> {
    /// Type table.
    pub types: &'a TypeRegistry,
    /// Runtime type of the object that owns the field.
    pub owner: &'a TypeDescriptor,
    /// The field being classified.
    pub field: &'a FieldDescriptor,
    /// The value read from the field.
    pub value: ObjectId,
    /// Runtime type of the value.
    pub value_type: &'a TypeDescriptor,
}

impl FieldValueContext<'_> {
    /// Key of the value's runtime type.
    pub fn value_key(&self) -> TypeKey {
        self.value_type.key
    }
}

/// Custom field-value predicate.
pub type ValuePredicateFn = dyn Fn(&FieldValueContext<'_>) -> bool + Send + Sync;

/// A compiled field-value predicate.
#[derive(Clone)]
pub(crate) enum FieldPredicate {
    Rule {
        rule: ValueRule,
        pattern: Option<Regex>,
    },
    Custom {
        name: String,
        predicate: Arc<ValuePredicateFn>,
    },
}

impl FieldPredicate {
    pub(crate) fn compile(rule: ValueRule) -> Result<Self, PolicyError> {
        let pattern = match &rule {
            ValueRule::NamePattern { pattern } => {
                Some(Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };
        Ok(Self::Rule { rule, pattern })
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Self::Rule { rule, .. } => rule.to_string(),
            Self::Custom { name, .. } => format!("custom({})", name),
        }
    }

    pub(crate) fn matches(&self, cx: &FieldValueContext<'_>) -> bool {
        let (rule, pattern) = match self {
            Self::Custom { predicate, .. } => return predicate(cx),
            Self::Rule { rule, pattern } => (rule, pattern),
        };
        let name = cx.value_type.name.as_str();
        match rule {
            ValueRule::NamespacePrefix { prefix } => name.starts_with(prefix.as_str()),
            ValueRule::NameContains { fragment } => name.contains(fragment.as_str()),
            ValueRule::NamePattern { .. } => pattern.as_ref().is_some_and(|re| re.is_match(name)),
            ValueRule::Synthetic => cx.value_type.synthetic,
            ValueRule::Anonymous => cx.value_type.anonymous,
            ValueRule::SubtypeOf { type_name } => cx.types.is_subtype_of(cx.value_key(), type_name),
            ValueRule::NamespaceExcept { namespace, allowed } => {
                name.starts_with(namespace.as_str()) && !name.starts_with(allowed.as_str())
            }
            ValueRule::SyntheticOwner => cx.owner.synthetic,
        }
    }
}

impl fmt::Debug for FieldPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Designation of a back-reference field that is reset on clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetField {
    /// Field name.
    pub field: String,
    /// Restrict to owners of this type or its subtypes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
}

impl ResetField {
    /// Reset the named field on any owner.
    pub fn named(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            owner_type: None,
        }
    }

    /// Reset the named field only on owners of `owner_type` or its subtypes.
    pub fn on(owner_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            owner_type: Some(owner_type.into()),
        }
    }

    /// Whether this designation covers `field` on an owner of type `owner`.
    pub fn matches(&self, types: &TypeRegistry, owner: TypeKey, field: &FieldDescriptor) -> bool {
        field.name == self.field
            && self
                .owner_type
                .as_deref()
                .map_or(true, |t| types.is_subtype_of(owner, t))
    }
}

impl fmt::Display for ResetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner_type {
            Some(owner) => write!(f, "{}.{}", owner, self.field),
            None => write!(f, "*.{}", self.field),
        }
    }
}
