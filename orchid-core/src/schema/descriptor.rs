//! Structural type descriptors.
//!
//! A descriptor is a declarative, introspectable description of a value
//! shape. Runnables may declare one for their input and output; the
//! compatibility validator reads them at graph-construction time. The
//! engine never enforces descriptors at runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// The shape a descriptor describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    /// A string value.
    String,
    /// A numeric value.
    Number,
    /// A boolean value.
    Boolean,
    /// A date value.
    Date,
    /// No value is produced.
    Void,
    /// An object with named, possibly-optional properties.
    Object {
        /// The declared properties, in declaration order.
        properties: Vec<Property>,
    },
    /// A homogeneous array.
    Array {
        /// The element shape.
        element: Box<TypeDescriptor>,
    },
    /// One of several alternative shapes.
    Union {
        /// The alternatives, in declaration order.
        alternatives: Vec<TypeDescriptor>,
    },
    /// One of a fixed set of literal values.
    Enum {
        /// The allowed values.
        values: Vec<JsonValue>,
    },
    /// Exactly one fixed value.
    Literal {
        /// The required value.
        value: JsonValue,
    },
    /// Compatible with anything.
    Any,
    /// A shape the describing side could not determine; treated as `Any`.
    Unknown,
}

impl TypeKind {
    /// Short human-readable name of the kind, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Void => "void",
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::Union { .. } => "union",
            Self::Enum { .. } => "enum",
            Self::Literal { .. } => "literal",
            Self::Any => "any",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this kind is compatible with everything.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any | Self::Unknown)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named property of an object descriptor.
///
/// Property optionality lives on the property's own descriptor
/// (`descriptor.optional`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// The property's shape.
    pub descriptor: TypeDescriptor,
}

impl Property {
    /// Create a new property.
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// A structural type descriptor with optionality and nullability modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// The described shape.
    pub kind: TypeKind,
    /// Whether the value may be absent entirely.
    #[serde(default)]
    pub optional: bool,
    /// Whether the value may be null.
    #[serde(default)]
    pub nullable: bool,
}

impl TypeDescriptor {
    /// Create a descriptor for the given kind with no modifiers.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
            nullable: false,
        }
    }

    /// A string descriptor.
    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    /// A number descriptor.
    pub fn number() -> Self {
        Self::new(TypeKind::Number)
    }

    /// A boolean descriptor.
    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    /// A date descriptor.
    pub fn date() -> Self {
        Self::new(TypeKind::Date)
    }

    /// A void descriptor (produces no value).
    pub fn void() -> Self {
        Self::new(TypeKind::Void)
    }

    /// An object descriptor with the given properties.
    pub fn object(properties: Vec<Property>) -> Self {
        Self::new(TypeKind::Object { properties })
    }

    /// An array descriptor with the given element shape.
    pub fn array(element: TypeDescriptor) -> Self {
        Self::new(TypeKind::Array {
            element: Box::new(element),
        })
    }

    /// A union descriptor over the given alternatives.
    pub fn union(alternatives: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Union { alternatives })
    }

    /// An enum descriptor over the given allowed values.
    pub fn enum_of(values: Vec<JsonValue>) -> Self {
        Self::new(TypeKind::Enum { values })
    }

    /// A literal descriptor requiring exactly one value.
    pub fn literal(value: impl Into<JsonValue>) -> Self {
        Self::new(TypeKind::Literal {
            value: value.into(),
        })
    }

    /// The wildcard descriptor.
    pub fn any() -> Self {
        Self::new(TypeKind::Any)
    }

    /// An undetermined descriptor; behaves as a wildcard.
    pub fn unknown() -> Self {
        Self::new(TypeKind::Unknown)
    }

    /// Mark the value as possibly absent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the value as possibly null.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Look up an object property by name.
    ///
    /// Returns `None` when the descriptor is not an object or the property
    /// is not declared.
    pub fn property(&self, name: &str) -> Option<&Property> {
        match &self.kind {
            TypeKind::Object { properties } => properties.iter().find(|p| p.name == name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_modifiers() {
        let desc = TypeDescriptor::string().optional().nullable();
        assert_eq!(desc.kind, TypeKind::String);
        assert!(desc.optional);
        assert!(desc.nullable);
    }

    #[test]
    fn object_property_lookup() {
        let desc = TypeDescriptor::object(vec![
            Property::new("id", TypeDescriptor::string()),
            Property::new("amount", TypeDescriptor::number().optional()),
        ]);

        assert!(desc.property("id").is_some());
        assert!(desc.property("amount").unwrap().descriptor.optional);
        assert!(desc.property("missing").is_none());
    }

    #[test]
    fn descriptor_serialization_roundtrip() {
        let desc = TypeDescriptor::object(vec![Property::new(
            "tags",
            TypeDescriptor::array(TypeDescriptor::enum_of(vec![json!("a"), json!("b")])),
        )])
        .nullable();

        let text = serde_json::to_string(&desc).unwrap();
        let parsed: TypeDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn wildcard_kinds() {
        assert!(TypeDescriptor::any().kind.is_wildcard());
        assert!(TypeDescriptor::unknown().kind.is_wildcard());
        assert!(!TypeDescriptor::string().kind.is_wildcard());
    }
}
