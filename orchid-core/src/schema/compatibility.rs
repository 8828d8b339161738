//! Structural compatibility analysis between type descriptors.
//!
//! Answers whether a producer's declared output shape can safely feed a
//! consumer's declared input shape. Hard errors are proven
//! incompatibilities; warnings are plausible but unproven risks. The check
//! is pure, deterministic, and total: malformed shapes degrade to
//! `unknown`, which is wildcard-compatible.

use super::descriptor::{TypeDescriptor, TypeKind};
use serde_json::Value as JsonValue;

/// Result of a compatibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityReport {
    /// Whether the shapes are compatible. False iff `errors` is non-empty.
    pub compatible: bool,
    /// Proven incompatibilities, prefixed with the property path involved.
    pub errors: Vec<String>,
    /// Unproven risks (possible undefined, partial overlap, …).
    pub warnings: Vec<String>,
}

impl CompatibilityReport {
    /// A report indicating full compatibility.
    pub fn compatible() -> Self {
        Self {
            compatible: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Human-readable one-line summary of all errors.
    pub fn error_summary(&self) -> String {
        self.errors.join("; ")
    }
}

/// Check whether `producer`'s output shape can feed `consumer`'s input shape.
pub fn check_compatibility(
    producer: &TypeDescriptor,
    consumer: &TypeDescriptor,
) -> CompatibilityReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    check_at("", producer, consumer, &mut errors, &mut warnings);

    CompatibilityReport {
        compatible: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Warn (never error) when a runnable declares no descriptor for an
/// endpoint. Absence disables static checking for edges using it.
pub fn schema_presence(
    name: &str,
    input: Option<&TypeDescriptor>,
    output: Option<&TypeDescriptor>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if input.is_none() {
        warnings.push(format!(
            "node '{}' declares no input type descriptor; static checking is disabled for its inputs",
            name
        ));
    }
    if output.is_none() {
        warnings.push(format!(
            "node '{}' declares no output type descriptor; static checking is disabled for its outputs",
            name
        ));
    }
    warnings
}

/// Quiet check used for union alternatives: compatible iff no hard errors.
fn satisfies(producer: &TypeDescriptor, consumer: &TypeDescriptor) -> bool {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    check_at("", producer, consumer, &mut errors, &mut warnings);
    errors.is_empty()
}

fn check_at(
    path: &str,
    producer: &TypeDescriptor,
    consumer: &TypeDescriptor,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    // Wildcards short-circuit everything, including modifier checks.
    if producer.kind.is_wildcard() || consumer.kind.is_wildcard() {
        return;
    }

    if producer.nullable && !consumer.nullable {
        errors.push(prefixed(
            path,
            "producer value may be null but the consumer does not accept null".to_string(),
        ));
    }

    if producer.optional && !consumer.optional {
        warnings.push(prefixed(
            path,
            "producer value may be undefined at runtime but the consumer expects a value"
                .to_string(),
        ));
    }

    if matches!(producer.kind, TypeKind::Void) {
        if !consumer.optional {
            errors.push(prefixed(
                path,
                "producer declares void output but the consumer requires a value".to_string(),
            ));
        }
        return;
    }

    match (&producer.kind, &consumer.kind) {
        // Union handling takes precedence over the basic-kind table.
        (TypeKind::Union { alternatives: alts }, TypeKind::Union { alternatives: calts }) => {
            for calt in calts {
                if !alts.iter().any(|palt| satisfies(palt, calt)) {
                    errors.push(prefixed(
                        path,
                        format!(
                            "no producer alternative satisfies consumer union alternative '{}'",
                            calt.kind.name()
                        ),
                    ));
                }
            }
        }
        (_, TypeKind::Union { alternatives }) => {
            if !alternatives.iter().any(|alt| satisfies(producer, alt)) {
                errors.push(prefixed(
                    path,
                    format!(
                        "producer type '{}' satisfies no alternative of the consumer union",
                        producer.kind.name()
                    ),
                ));
            }
        }
        (TypeKind::Union { alternatives }, _) => {
            let compatible_count = alternatives
                .iter()
                .filter(|alt| satisfies(alt, consumer))
                .count();
            if compatible_count == 0 {
                errors.push(prefixed(
                    path,
                    format!(
                        "no alternative of the producer union is compatible with consumer type '{}'",
                        consumer.kind.name()
                    ),
                ));
            } else if compatible_count < alternatives.len() {
                warnings.push(prefixed(
                    path,
                    format!(
                        "only {} of {} producer union alternatives are compatible with consumer type '{}' (partial overlap)",
                        compatible_count,
                        alternatives.len(),
                        consumer.kind.name()
                    ),
                ));
            }
        }
        (
            TypeKind::Object {
                properties: produced,
            },
            TypeKind::Object {
                properties: consumed,
            },
        ) => {
            for consumer_prop in consumed {
                match produced.iter().find(|p| p.name == consumer_prop.name) {
                    Some(producer_prop) => {
                        let child_path = child(path, &consumer_prop.name);
                        check_at(
                            &child_path,
                            &producer_prop.descriptor,
                            &consumer_prop.descriptor,
                            errors,
                            warnings,
                        );
                    }
                    None if consumer_prop.descriptor.optional => {
                        warnings.push(prefixed(
                            path,
                            format!(
                                "missing optional property '{}'",
                                consumer_prop.name
                            ),
                        ));
                    }
                    None => {
                        errors.push(prefixed(
                            path,
                            format!(
                                "missing required property '{}'",
                                consumer_prop.name
                            ),
                        ));
                    }
                }
            }
            // Producer properties the consumer does not declare are ignored.
        }
        (TypeKind::Array { element: pe }, TypeKind::Array { element: ce }) => {
            let child_path = if path.is_empty() {
                "array element".to_string()
            } else {
                format!("{} array element", path)
            };
            check_at(&child_path, pe, ce, errors, warnings);
        }
        (TypeKind::Enum { values: pv }, TypeKind::Enum { values: cv }) => {
            let overlap = pv.iter().filter(|v| cv.contains(v)).count();
            if overlap == 0 {
                errors.push(prefixed(
                    path,
                    "enum value sets are disjoint".to_string(),
                ));
            } else if !enum_sets_identical(pv, cv) {
                warnings.push(prefixed(
                    path,
                    "enum value sets overlap but are not identical".to_string(),
                ));
            }
        }
        (TypeKind::Literal { value: pv }, TypeKind::Literal { value: cv }) => {
            if pv != cv {
                errors.push(prefixed(
                    path,
                    format!("literal value {} does not match required literal {}", pv, cv),
                ));
            }
        }
        // Exact kind matches are always compatible.
        (TypeKind::String, TypeKind::String)
        | (TypeKind::Number, TypeKind::Number)
        | (TypeKind::Boolean, TypeKind::Boolean)
        | (TypeKind::Date, TypeKind::Date) => {}
        // Implicit stringification.
        (TypeKind::Number, TypeKind::String) | (TypeKind::Boolean, TypeKind::String) => {}
        (p, c) => {
            errors.push(prefixed(
                path,
                format!("cannot feed '{}' into '{}'", p.name(), c.name()),
            ));
        }
    }
}

fn enum_sets_identical(a: &[JsonValue], b: &[JsonValue]) -> bool {
    a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
}

fn child(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn prefixed(path: &str, message: String) -> String {
    if path.is_empty() {
        message
    } else {
        format!("{}: {}", path, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::Property;
    use serde_json::json;

    #[test]
    fn wildcards_accept_anything() {
        let report = check_compatibility(&TypeDescriptor::any(), &TypeDescriptor::number());
        assert!(report.compatible);

        let report = check_compatibility(
            &TypeDescriptor::string().nullable(),
            &TypeDescriptor::unknown(),
        );
        assert!(report.compatible);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn nullable_into_non_nullable_is_hard_error() {
        let report = check_compatibility(
            &TypeDescriptor::string().nullable(),
            &TypeDescriptor::string(),
        );
        assert!(!report.compatible);
        assert!(report.errors[0].contains("null"));
    }

    #[test]
    fn optional_into_required_is_soft_warning() {
        let report = check_compatibility(
            &TypeDescriptor::string().optional(),
            &TypeDescriptor::string(),
        );
        assert!(report.compatible);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("undefined"));
    }

    #[test]
    fn void_requires_optional_consumer() {
        let report =
            check_compatibility(&TypeDescriptor::void(), &TypeDescriptor::string().optional());
        assert!(report.compatible);

        let report = check_compatibility(&TypeDescriptor::void(), &TypeDescriptor::string());
        assert!(!report.compatible);
    }

    #[test]
    fn implicit_stringification() {
        assert!(check_compatibility(&TypeDescriptor::number(), &TypeDescriptor::string()).compatible);
        assert!(check_compatibility(&TypeDescriptor::boolean(), &TypeDescriptor::string()).compatible);
        assert!(!check_compatibility(&TypeDescriptor::string(), &TypeDescriptor::number()).compatible);
    }

    #[test]
    fn object_missing_required_property() {
        let producer = TypeDescriptor::object(vec![Property::new("id", TypeDescriptor::string())]);
        let consumer = TypeDescriptor::object(vec![
            Property::new("id", TypeDescriptor::string()),
            Property::new("amount", TypeDescriptor::number()),
        ]);

        let report = check_compatibility(&producer, &consumer);
        assert!(!report.compatible);
        assert!(report.errors[0].contains("amount"));
    }

    #[test]
    fn object_missing_optional_property_warns() {
        let producer = TypeDescriptor::object(vec![Property::new("id", TypeDescriptor::string())]);
        let consumer = TypeDescriptor::object(vec![
            Property::new("id", TypeDescriptor::string()),
            Property::new("notes", TypeDescriptor::string().optional()),
        ]);

        let report = check_compatibility(&producer, &consumer);
        assert!(report.compatible);
        assert!(report.warnings[0].contains("notes"));
    }

    #[test]
    fn nested_errors_carry_property_path() {
        let producer = TypeDescriptor::object(vec![Property::new(
            "order",
            TypeDescriptor::object(vec![Property::new("total", TypeDescriptor::string())]),
        )]);
        let consumer = TypeDescriptor::object(vec![Property::new(
            "order",
            TypeDescriptor::object(vec![Property::new("total", TypeDescriptor::number())]),
        )]);

        let report = check_compatibility(&producer, &consumer);
        assert!(!report.compatible);
        assert!(report.errors[0].starts_with("order.total"));
    }

    #[test]
    fn array_element_mismatch_is_prefixed() {
        let report = check_compatibility(
            &TypeDescriptor::array(TypeDescriptor::string()),
            &TypeDescriptor::array(TypeDescriptor::number()),
        );
        assert!(!report.compatible);
        assert!(report.errors[0].contains("array element"));
    }

    #[test]
    fn consumer_union_accepts_any_alternative() {
        let consumer =
            TypeDescriptor::union(vec![TypeDescriptor::string(), TypeDescriptor::number()]);
        assert!(check_compatibility(&TypeDescriptor::number(), &consumer).compatible);
        assert!(!check_compatibility(&TypeDescriptor::date(), &consumer).compatible);
    }

    #[test]
    fn producer_union_partial_overlap_warns() {
        let producer =
            TypeDescriptor::union(vec![TypeDescriptor::number(), TypeDescriptor::date()]);
        let report = check_compatibility(&producer, &TypeDescriptor::number());
        assert!(report.compatible);
        assert!(report.warnings[0].contains("partial overlap"));

        let producer = TypeDescriptor::union(vec![TypeDescriptor::date()]);
        assert!(!check_compatibility(&producer, &TypeDescriptor::number()).compatible);
    }

    #[test]
    fn union_to_union_covers_consumer_alternatives() {
        let producer =
            TypeDescriptor::union(vec![TypeDescriptor::string(), TypeDescriptor::number()]);
        let consumer =
            TypeDescriptor::union(vec![TypeDescriptor::number(), TypeDescriptor::string()]);
        assert!(check_compatibility(&producer, &consumer).compatible);

        let consumer = TypeDescriptor::union(vec![
            TypeDescriptor::number(),
            TypeDescriptor::boolean(),
        ]);
        assert!(!check_compatibility(&producer, &consumer).compatible);
    }

    #[test]
    fn enum_overlap_rules() {
        let producer = TypeDescriptor::enum_of(vec![json!("a"), json!("b")]);

        let identical = TypeDescriptor::enum_of(vec![json!("b"), json!("a")]);
        let report = check_compatibility(&producer, &identical);
        assert!(report.compatible);
        assert!(report.warnings.is_empty());

        let overlapping = TypeDescriptor::enum_of(vec![json!("b"), json!("c")]);
        let report = check_compatibility(&producer, &overlapping);
        assert!(report.compatible);
        assert!(report.warnings[0].contains("not identical"));

        let disjoint = TypeDescriptor::enum_of(vec![json!("x"), json!("y")]);
        let report = check_compatibility(&producer, &disjoint);
        assert!(!report.compatible);
        assert!(report.errors[0].contains("disjoint"));
    }

    #[test]
    fn literal_equality_required() {
        let report = check_compatibility(
            &TypeDescriptor::literal(json!("ok")),
            &TypeDescriptor::literal(json!("ok")),
        );
        assert!(report.compatible);

        let report = check_compatibility(
            &TypeDescriptor::literal(json!("ok")),
            &TypeDescriptor::literal(json!("done")),
        );
        assert!(!report.compatible);
    }

    #[test]
    fn presence_check_warns_for_missing_descriptors() {
        let warnings = schema_presence("validate", None, Some(&TypeDescriptor::string()));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("validate"));
        assert!(warnings[0].contains("input"));

        let warnings = schema_presence("validate", Some(&TypeDescriptor::string()), None);
        assert!(warnings[0].contains("output"));

        assert!(schema_presence(
            "validate",
            Some(&TypeDescriptor::string()),
            Some(&TypeDescriptor::string())
        )
        .is_empty());
    }
}
