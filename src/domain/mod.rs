//! Domain types shared by every storage backend.

pub mod command;
pub mod expression;

pub use command::{Arg, Reply};
pub use expression::{Expression, IntoExpression, wrap};
