//! Raw backend expressions.
//!
//! An [`Expression`] marks a value that must reach the backend verbatim, as
//! opposed to an ordinary value which a query-building layer escapes.

use std::fmt;
use std::sync::Arc;

/// Immutable raw expression.
///
/// Cloning shares the underlying text, so a wrapped expression and its clones
/// are the same instance as far as [`Expression::ptr_eq`] is concerned.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Expression(Arc<str>);

impl Expression {
    /// Create a new expression holding `raw`.
    #[must_use]
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    /// The raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two expressions are the same instance.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&&*self.0).finish()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversion into an [`Expression`].
pub trait IntoExpression {
    /// Perform the conversion.
    fn into_expression(self) -> Expression;
}

impl IntoExpression for Expression {
    fn into_expression(self) -> Expression {
        self
    }
}

impl IntoExpression for &Expression {
    fn into_expression(self) -> Expression {
        self.clone()
    }
}

impl IntoExpression for &str {
    fn into_expression(self) -> Expression {
        Expression::new(self)
    }
}

impl IntoExpression for String {
    fn into_expression(self) -> Expression {
        Expression::new(self)
    }
}

/// Mark `value` as a raw expression.
///
/// Already-wrapped expressions are returned as-is, never double-wrapped.
pub fn wrap(value: impl IntoExpression) -> Expression {
    value.into_expression()
}
