//! Callable signature descriptions.
//!
//! Signatures are written in a small arrow DSL:
//!
//! ```
//! use backwater::effect::dependency::{Signature, ValueKind};
//!
//! let sig: Signature = "(name: string, times: number) => string".parse().unwrap();
//! assert_eq!(sig.arity(), 2);
//! assert_eq!(sig.returns(), ValueKind::String);
//! assert_eq!(sig.to_string(), "(name: string, times: number) => string");
//! ```
//!
//! Parameter names are optional and ignored when comparing signatures. The
//! kinds `any` and `unknown` match every other kind.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Runtime shape of a value crossing a dependency call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ValueKind {
    /// Matches every kind.
    Any,
    /// `string`
    String,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `null`
    Null,
    /// `T[]` or `array`
    Array,
    /// `object`
    Object,
    /// `void`
    Void,
}

impl ValueKind {
    /// The kind of a JSON value.
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Returns true if a value of kind `other` satisfies `self`.
    pub fn accepts(self, other: ValueKind) -> bool {
        self == ValueKind::Any || other == ValueKind::Any || self == other
    }

    fn parse(word: &str) -> Option<ValueKind> {
        let word = word.trim();
        if word.ends_with("[]") || (word.starts_with("Array<") && word.ends_with('>')) {
            return Some(ValueKind::Array);
        }
        let kind = match word {
            "any" | "unknown" => ValueKind::Any,
            "string" => ValueKind::String,
            "number" => ValueKind::Number,
            "boolean" => ValueKind::Boolean,
            "null" | "undefined" => ValueKind::Null,
            "array" => ValueKind::Array,
            "object" => ValueKind::Object,
            "void" => ValueKind::Void,
            _ => return None,
        };
        Some(kind)
    }

    fn as_str(self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Void => "void",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for ValueKind {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        use proptest::prelude::*;
        prop_oneof![
            Just(ValueKind::Any),
            Just(ValueKind::String),
            Just(ValueKind::Number),
            Just(ValueKind::Boolean),
            Just(ValueKind::Null),
            Just(ValueKind::Array),
            Just(ValueKind::Object),
            Just(ValueKind::Void),
        ]
        .boxed()
    }
}

/// One parameter of a [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    /// Parameter name, if one was written.
    pub name: Option<String>,
    /// Expected kind.
    pub kind: ValueKind,
}

/// A callable shape: parameter kinds and a return kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    params: Vec<Param>,
    returns: ValueKind,
}

impl Signature {
    /// Build a signature from unnamed parameter kinds.
    pub fn new(params: impl IntoIterator<Item = ValueKind>, returns: ValueKind) -> Self {
        Signature {
            params: params
                .into_iter()
                .map(|kind| Param { name: None, kind })
                .collect(),
            returns,
        }
    }

    /// The parameters, in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The return kind.
    pub fn returns(&self) -> ValueKind {
        self.returns
    }

    /// Returns true if a callable with this signature can stand in for
    /// `expected`: same arity, and every parameter and the return kind accept
    /// each other.
    pub fn satisfies(&self, expected: &Signature) -> bool {
        self.arity() == expected.arity()
            && self.returns.accepts(expected.returns)
            && self
                .params
                .iter()
                .zip(&expected.params)
                .all(|(have, want)| have.kind.accepts(want.kind))
    }

    /// Returns true if `args` fit the parameter kinds.
    pub fn accepts_args(&self, args: &[Value]) -> bool {
        args.len() == self.arity()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.kind.accepts(ValueKind::of(arg)))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &param.name {
                Some(name) => write!(f, "{}: {}", name, param.kind)?,
                None => write!(f, "{}", param.kind)?,
            }
        }
        write!(f, ") => {}", self.returns)
    }
}

/// A signature string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParseError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid signature '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for SignatureParseError {}

impl FromStr for Signature {
    type Err = SignatureParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason| SignatureParseError {
            input: input.to_string(),
            reason,
        };

        let (params, returns) = input.split_once("=>").ok_or_else(|| fail("missing '=>'"))?;
        let params = params
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| fail("parameters must be wrapped in parentheses"))?;
        let returns = ValueKind::parse(returns).ok_or_else(|| fail("unknown return type"))?;

        let params = params
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty())
            .map(|param| {
                let (name, kind) = match param.split_once(':') {
                    Some((name, kind)) => {
                        (Some(name.trim().trim_end_matches('?').to_string()), kind)
                    }
                    None => (None, param),
                };
                let kind = ValueKind::parse(kind).ok_or_else(|| fail("unknown parameter type"))?;
                Ok::<_, SignatureParseError>(Param { name, kind })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Signature { params, returns })
    }
}

impl TryFrom<&str> for Signature {
    type Error = SignatureParseError;

    fn try_from(input: &str) -> Result<Self, Self::Error> {
        input.parse()
    }
}
