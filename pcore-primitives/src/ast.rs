//! Parser collaborator contract.
//!
//! The loaders never parse source text themselves. They hand it to a
//! [`Parser`] and inspect the resulting [`Program`]: a flat list of top-level
//! definitions plus the statements that make up the program body. Closures
//! and attribute values stay opaque to the loaders.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value as Literal;

use crate::Result;

/// Parses declarative-language source text.
pub trait Parser {
    /// Parses a complete source file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the text is not valid source.
    fn parse_program(&self, source: &str, origin: &Path) -> Result<Program>;

    /// Parses a standalone type expression such as `String[1]`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the text is not a type expression.
    fn parse_type(&self, source: &str, origin: &Path) -> Result<TypeExpr>;
}

/// Parse result for one source file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Top-level definitions in source order.
    pub definitions: Vec<Definition>,
    /// Top-level statements in source order.
    pub body: Vec<Statement>,
}

impl Program {
    /// Returns the body statements that are not no-ops.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.body
            .iter()
            .filter(|statement| !matches!(statement, Statement::Nop))
    }

    /// Returns `true` when the body consists of nothing but the definition at `index`.
    #[must_use]
    pub fn is_sole_definition(&self, index: usize) -> bool {
        let mut statements = self.statements();
        matches!(statements.next(), Some(Statement::Definition(found)) if *found == index)
            && statements.next().is_none()
    }
}

/// Top-level definition produced by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    /// `function name(...) { ... }`
    Function {
        /// Declared name, as written.
        name: String,
        /// Parameters and body.
        closure: Closure,
    },
    /// `plan name(...) { ... }`
    Plan {
        /// Declared name, as written.
        name: String,
        /// Parameters and body.
        closure: Closure,
    },
    /// `type Name = <type expression>`
    TypeAlias {
        /// Declared name, as written.
        name: String,
        /// Aliased expression.
        type_expr: TypeExpr,
    },
    /// `type Name inherits Parent { ... }`
    TypeDefinition {
        /// Declared name, as written.
        name: String,
        /// Optional parent type name.
        parent: Option<String>,
        /// Declared attributes.
        attributes: BTreeMap<String, TypeExpr>,
    },
    /// Any other named definition (classes, defined types, nodes).
    Other {
        /// Definition keyword.
        keyword: String,
        /// Declared name, as written.
        name: String,
    },
}

impl Definition {
    /// Returns the declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Function { name, .. }
            | Self::Plan { name, .. }
            | Self::TypeAlias { name, .. }
            | Self::TypeDefinition { name, .. }
            | Self::Other { name, .. } => name,
        }
    }
}

/// Top-level statement produced by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Reference to `Program::definitions[index]`.
    Definition(usize),
    /// Method call on a qualified reference, e.g. `Foo::Bar.new({...})`,
    /// with its literal argument.
    Call {
        /// Receiver reference, as written.
        receiver: String,
        /// Called method.
        method: String,
        /// Literal argument value.
        arguments: Literal,
    },
    /// Any other expression, kept as source text.
    Expression(String),
    /// Empty statement.
    Nop,
}

/// Parameters and opaque body of a function or plan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Closure {
    /// Declared parameters.
    pub parameters: Vec<Parameter>,
    /// Declared return type.
    pub return_type: Option<TypeExpr>,
    /// Body source text.
    pub body: String,
}

/// Closure parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    /// Parameter name without sigil.
    pub name: String,
    /// Declared type.
    pub type_expr: Option<TypeExpr>,
}

/// Parsed type expression.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// Named type with optional parameters, e.g. `Integer` or `String[1]`.
    Reference {
        /// Referenced type name, as written.
        name: String,
        /// Type parameters.
        args: Vec<TypeExpr>,
    },
    /// `Object[{ ... }]`
    Object {
        /// Optional parent type name.
        parent: Option<String>,
        /// Declared attributes.
        attributes: BTreeMap<String, TypeExpr>,
    },
    /// `TypeSet[{ types => { ... } }]`
    TypeSet {
        /// Member types keyed by their unqualified name.
        types: BTreeMap<String, TypeExpr>,
    },
    /// Literal parameter value.
    Literal(Literal),
}

impl TypeExpr {
    /// Creates an unparameterized reference.
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference {
            name: name.into(),
            args: Vec::new(),
        }
    }
}
