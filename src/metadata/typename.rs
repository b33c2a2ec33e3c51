//! Source-level display names for types referenced from IL.
//!
//! Resolvers that want `box int` instead of `box System.Int32` describe the referenced type
//! with a [`TypeDescriptor`] and render it with [`format`]. The rendering follows C# syntax:
//!
//! - built-in types use their keyword alias (`int`, `string`, `object`, ...)
//! - arrays render as `T[]`, by-ref types render as their element type
//! - generic instantiations render as `Name<A, B>`, dropping the `` `N `` arity suffix
//! - nested types join their declaring type with `.` instead of `+`
//!
//! # Examples
//!
//! ```rust
//! use cildecode::metadata::typename::{format, PrimitiveType, TypeDescriptor};
//!
//! let list = TypeDescriptor::Generic {
//!     definition: "System.Collections.Generic.List`1".into(),
//!     arguments: vec![TypeDescriptor::Primitive(PrimitiveType::String)],
//! };
//! assert_eq!(format(&list), "System.Collections.Generic.List<string>");
//!
//! let jagged = TypeDescriptor::Array(Box::new(TypeDescriptor::Array(Box::new(
//!     TypeDescriptor::Primitive(PrimitiveType::Int32),
//! ))));
//! assert_eq!(jagged.to_string(), "int[][]");
//! ```

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

/// Types that have a C# keyword alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum PrimitiveType {
    /// `System.Void`
    #[strum(serialize = "void")]
    Void,
    /// `System.Boolean`
    #[strum(serialize = "bool")]
    Boolean,
    /// `System.Byte`
    #[strum(serialize = "byte")]
    Byte,
    /// `System.SByte`
    #[strum(serialize = "sbyte")]
    SByte,
    /// `System.Int16`
    #[strum(serialize = "short")]
    Int16,
    /// `System.UInt16`
    #[strum(serialize = "ushort")]
    UInt16,
    /// `System.Int32`
    #[strum(serialize = "int")]
    Int32,
    /// `System.UInt32`
    #[strum(serialize = "uint")]
    UInt32,
    /// `System.Int64`
    #[strum(serialize = "long")]
    Int64,
    /// `System.UInt64`
    #[strum(serialize = "ulong")]
    UInt64,
    /// `System.Single`
    #[strum(serialize = "float")]
    Single,
    /// `System.Double`
    #[strum(serialize = "double")]
    Double,
    /// `System.Decimal`
    #[strum(serialize = "decimal")]
    Decimal,
    /// `System.Char`
    #[strum(serialize = "char")]
    Char,
    /// `System.String`
    #[strum(serialize = "string")]
    String,
    /// `System.Object`
    #[strum(serialize = "object")]
    Object,
}

impl PrimitiveType {
    /// The C# keyword for this type.
    #[must_use]
    pub fn alias(self) -> &'static str {
        self.into()
    }
}

/// Structural description of a type, enough to render its source-level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// A type with a keyword alias
    Primitive(PrimitiveType),
    /// A top-level type; an empty namespace renders the bare name
    Named {
        /// Dotted namespace, possibly empty
        namespace: String,
        /// Simple type name
        name: String,
    },
    /// A type nested inside another
    Nested {
        /// The enclosing type
        declaring: Box<TypeDescriptor>,
        /// Simple name of the nested type
        name: String,
    },
    /// Single-dimensional array of the element type
    Array(Box<TypeDescriptor>),
    /// Managed reference to the element type
    ByRef(Box<TypeDescriptor>),
    /// Generic instantiation
    Generic {
        /// Full metadata name of the definition, e.g. ``System.Collections.Generic.Dictionary`2``
        /// or ``Outer+Inner`1``
        definition: String,
        /// Type arguments, in order
        arguments: Vec<TypeDescriptor>,
    },
}

/// Renders the C# display name of `ty`.
#[must_use]
pub fn format(ty: &TypeDescriptor) -> String {
    match ty {
        TypeDescriptor::Primitive(primitive) => primitive.alias().to_string(),
        TypeDescriptor::ByRef(element) => format(element),
        TypeDescriptor::Array(element) => format!("{}[]", format(element)),
        TypeDescriptor::Generic {
            definition,
            arguments,
        } => {
            let base = definition
                .split('`')
                .next()
                .unwrap_or(definition)
                .replace('+', ".");
            let arguments = arguments.iter().map(format).collect::<Vec<_>>().join(", ");
            format!("{base}<{arguments}>")
        }
        TypeDescriptor::Nested { declaring, name } => format!("{}.{name}", format(declaring)),
        TypeDescriptor::Named { namespace, name } if namespace.is_empty() => name.clone(),
        TypeDescriptor::Named { namespace, name } => format!("{namespace}.{name}"),
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self))
    }
}
