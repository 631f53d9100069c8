//! Arguments and replies for the open-ended command escape hatch.

use std::borrow::Cow;

use crate::domain::expression::Expression;

/// A single command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Ordinary value.
    Value(String),
    /// Integer value.
    Int(i64),
    /// Raw expression, passed on verbatim.
    Expr(Expression),
}

impl Arg {
    /// Textual form of the argument as it goes on the wire.
    #[must_use]
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::Value(v) => Cow::Borrowed(v),
            Self::Int(i) => Cow::Owned(i.to_string()),
            Self::Expr(e) => Cow::Borrowed(e.as_str()),
        }
    }

    /// Whether this argument is a raw expression.
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Expr(_))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Value(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Self::Value(v)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Expression> for Arg {
    fn from(v: Expression) -> Self {
        Self::Expr(v)
    }
}

impl From<&Expression> for Arg {
    fn from(v: &Expression) -> Self {
        Self::Expr(v.clone())
    }
}

/// Backend-neutral reply to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No value.
    Nil,
    /// Plain `OK`.
    Okay,
    /// Status line.
    Status(String),
    /// Integer.
    Int(i64),
    /// Binary-safe string.
    Bulk(Vec<u8>),
    /// Ordered collection.
    Array(Vec<Reply>),
    /// Key/value pairs.
    Map(Vec<(Reply, Reply)>),
    /// Floating point number.
    Double(f64),
    /// Boolean.
    Bool(bool),
}

impl Reply {
    /// The reply as text, for bulk strings holding UTF-8 and status lines.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bulk(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Status(s) => Some(s),
            Self::Okay => Some("OK"),
            _ => None,
        }
    }

    /// The reply as an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether the reply is nil.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

impl From<Option<String>> for Reply {
    fn from(v: Option<String>) -> Self {
        v.map_or(Self::Nil, |s| Self::Bulk(s.into_bytes()))
    }
}

impl From<Vec<String>> for Reply {
    fn from(v: Vec<String>) -> Self {
        Self::Array(v.into_iter().map(|s| Self::Bulk(s.into_bytes())).collect())
    }
}

#[cfg(feature = "redis")]
impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        use redis::Value;

        match value {
            Value::Nil => Self::Nil,
            Value::Okay => Self::Okay,
            Value::Int(i) => Self::Int(i),
            Value::BulkString(bytes) => Self::Bulk(bytes),
            Value::SimpleString(s) => Self::Status(s),
            Value::Array(items) | Value::Set(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            Value::Map(pairs) => Self::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Self::from(k), Self::from(v)))
                    .collect(),
            ),
            Value::Double(d) => Self::Double(d),
            Value::Boolean(b) => Self::Bool(b),
            other => Self::Status(format!("{other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expression::wrap;

    #[test]
    fn test_arg_conversions() {
        assert_eq!(Arg::from("key").as_str(), "key");
        assert_eq!(Arg::from(-7).as_str(), "-7");

        let raw = Arg::from(wrap("+inf"));
        assert!(raw.is_expression());
        assert_eq!(raw.as_str(), "+inf");
        assert!(!Arg::from("+inf").is_expression());
    }

    #[test]
    fn test_reply_accessors() {
        assert_eq!(Reply::from(Some("v".to_string())).as_str(), Some("v"));
        assert!(Reply::from(None::<String>).is_nil());
        assert_eq!(Reply::Int(3).as_int(), Some(3));
        assert_eq!(Reply::Okay.as_str(), Some("OK"));
        assert_eq!(Reply::Bulk(vec![0xff]).as_str(), None);
    }
}
