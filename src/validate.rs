//! # Validation Rules
//!
//! Field-level constraints are declared as tables of `(field, rule, message)`
//! rows, one table per resource, and evaluated by a single engine function.
//! The engine walks an inbound candidate representation (a JSON object) and
//! collects EVERY violated rule for every field before returning, so one
//! round-trip surfaces every problem.
//!
//! Two operation kinds exist and differ in exactly one way: on
//! [`OpKind::Update`] a field absent from the candidate is not evaluated at
//! all, while a field present with a `null` value violates exactly as it
//! would on [`OpKind::Create`].
//!
//! Reference rules resolve through the [`Resolver`], so a dangling or
//! wrong-kind reference surfaces as a violation on the referencing field
//! rather than as a lookup failure.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{EntityKind, Resolver};

/// The operation a candidate representation is being validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Full representation: required fields must be present.
    Create,
    /// Partial merge: absent fields are skipped entirely.
    Update,
}

/// A single field constraint.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// The field must be present (on create) and non-null.
    Required,
    /// [`Rule::Required`], and the value must be a non-blank string.
    NonBlank,
    /// When a string is present, it may not exceed this many characters.
    MaxLength(usize),
    /// When present and non-null, the value must be a JSON integer > 0.
    PositiveInt,
    /// When present and non-null, the value must be one of these strings.
    OneOf(&'static [&'static str]),
    /// When present and non-null, the value must be an external identifier
    /// string resolving to an existing entity of this kind.
    Reference(EntityKind),
}

impl Rule {
    /// Whether absence (on create) or an explicit null violates this rule.
    ///
    /// Reference rules are not in this set: requiredness of a reference
    /// field is carried by its paired [`Rule::Required`] row, and the
    /// reference itself is checked only when a value is present.
    fn required(&self) -> bool {
        matches!(self, Rule::Required | Rule::NonBlank)
    }

    /// Short wire name of the rule, reported in violation tuples.
    fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::NonBlank => "not_blank",
            Rule::MaxLength(_) => "max_length",
            Rule::PositiveInt => "positive",
            Rule::OneOf(_) => "choice",
            Rule::Reference(_) => "reference",
        }
    }
}

/// One row of a resource's rule table.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// The candidate field the rule applies to.
    pub field: &'static str,
    /// The constraint.
    pub rule: Rule,
    /// User-facing message reported when the rule is violated.
    pub message: &'static str,
}

/// A violated rule: which field, which rule, and the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Path of the field that violated the rule.
    pub field: String,
    /// Short name of the violated rule.
    pub rule: String,
    /// User-facing message.
    pub message: String,
}

impl Violation {
    /// Creates a violation tuple.
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Violation {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// Evaluates a rule table against a candidate representation.
///
/// Returns the complete set of violations; an empty vector means the
/// candidate is accepted for the given operation kind.
pub fn check_fields(
    fields: &Map<String, Value>,
    rules: &[FieldRule],
    op: OpKind,
    resolver: &Resolver<'_>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for row in rules {
        let value = match fields.get(row.field) {
            None => {
                if op == OpKind::Create && row.rule.required() {
                    violations.push(Violation::new(row.field, row.rule.name(), row.message));
                }
                continue;
            }
            Some(Value::Null) => {
                if row.rule.required() {
                    violations.push(Violation::new(row.field, row.rule.name(), row.message));
                }
                continue;
            }
            Some(value) => value,
        };

        let ok = match row.rule {
            Rule::Required => true,
            Rule::NonBlank => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Rule::MaxLength(max) => match value.as_str() {
                Some(s) => s.chars().count() <= max,
                // Non-strings are reported by the field's NonBlank row.
                None => true,
            },
            Rule::PositiveInt => value.as_i64().is_some_and(|n| n > 0),
            Rule::OneOf(choices) => value.as_str().is_some_and(|s| choices.contains(&s)),
            Rule::Reference(kind) => match value.as_str() {
                Some(s) => resolver.resolve(s, kind).is_ok(),
                None => false,
            },
        };

        if !ok {
            violations.push(Violation::new(row.field, row.rule.name(), row.message));
        }
    }

    violations
}
