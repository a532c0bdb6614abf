//! # Predicate AST
//!
//! A small composable filter over leaf documents. Field tests nest under
//! `and`/`or`/`not` to any depth.
//!
//! JSON form (externally tagged):
//!
//! ```json
//! {"and": [
//!     {"field": {"path": "customer_id", "op": "eq", "value": "c2"}},
//!     {"not": {"field": {"path": ["items", 0, "qty"], "op": "lt", "value": 1}}}
//! ]}
//! ```
//!
//! A field path that does not resolve inside the document makes the field
//! test false. It never raises.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;

use super::compare::{compare_values, values_equal};

/// One step into a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// Steps into `value`.
    ///
    /// A key addresses an array element when it is a plain decimal index, and
    /// an index addresses an object member named by its decimal form.
    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Key(key), Value::Array(items)) => {
                array_index(key).and_then(|i| items.get(i))
            }
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
            (PathSegment::Index(i), Value::Object(map)) => map.get(&i.to_string()),
            _ => None,
        }
    }
}

/// Digits only: `"+1"` and `""` are never indices
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Path to a value inside a leaf document. Empty addresses the whole leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldPathRepr", into = "Vec<PathSegment>")]
pub struct FieldPath(Vec<PathSegment>);

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldPathRepr {
    Dotted(String),
    Segments(Vec<PathSegment>),
}

impl From<FieldPathRepr> for FieldPath {
    fn from(repr: FieldPathRepr) -> Self {
        match repr {
            FieldPathRepr::Dotted(s) => FieldPath::parse(&s),
            FieldPathRepr::Segments(segments) => FieldPath(segments),
        }
    }
}

impl From<FieldPath> for Vec<PathSegment> {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

impl FieldPath {
    /// Parses `"items.0.sku"`.
    ///
    /// Every part is kept as written, so `"by_month.01"` reaches the key
    /// `"01"`; a numeric part still indexes into an array. Keys containing
    /// `.` need the segment form instead.
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return FieldPath(Vec::new());
        }
        FieldPath(
            dotted
                .split('.')
                .map(|part| PathSegment::Key(part.to_string()))
                .collect(),
        )
    }

    /// Path of object keys, taken literally
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(keys.into_iter().map(|k| PathSegment::Key(k.into())).collect())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Follows the path through `document`
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(document, |current, segment| segment.step(current))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::parse(dotted)
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        FieldPath(segments)
    }
}

/// Field test operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    /// Field value is one of the literal array's elements
    In,
    /// Field array holds the literal, or field string holds it as a substring
    Contains,
    /// Field string matches the literal regex
    Matches,
    /// Path resolves; literal ignored
    Exists,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::In => "in",
            CompareOp::Contains => "contains",
            CompareOp::Matches => "matches",
            CompareOp::Exists => "exists",
        }
    }
}

/// `path op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub path: FieldPath,
    pub op: CompareOp,
    #[serde(default)]
    pub value: Value,
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every document
    All,
    Field(FieldPredicate),
    /// True when every child is; empty is true
    And(Vec<Predicate>),
    /// True when any child is; empty is false
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn field(path: impl Into<FieldPath>, op: CompareOp, value: Value) -> Self {
        Predicate::Field(FieldPredicate {
            path: path.into(),
            op,
            value,
        })
    }

    pub fn eq(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Eq, value)
    }

    pub fn ne(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Ne, value)
    }

    pub fn gt(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Gt, value)
    }

    pub fn gte(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Gte, value)
    }

    pub fn lt(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Lt, value)
    }

    pub fn lte(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Lte, value)
    }

    pub fn in_list(path: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        Self::field(path, CompareOp::In, Value::Array(values))
    }

    pub fn contains(path: impl Into<FieldPath>, value: Value) -> Self {
        Self::field(path, CompareOp::Contains, value)
    }

    pub fn matches(path: impl Into<FieldPath>, pattern: &str) -> Self {
        Self::field(path, CompareOp::Matches, Value::String(pattern.to_string()))
    }

    pub fn exists(path: impl Into<FieldPath>) -> Self {
        Self::field(path, CompareOp::Exists, Value::Null)
    }

    pub fn all_of(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn any_of(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    pub fn negate(child: Predicate) -> Self {
        Predicate::Not(Box::new(child))
    }

    /// Checks literals and compiles patterns.
    ///
    /// `in` needs an array literal; `matches` needs a valid regex string.
    pub fn compile(&self) -> Result<CompiledPredicate, ValidationError> {
        Ok(CompiledPredicate {
            root: Compiled::build(self)?,
        })
    }
}

/// A predicate whose literals have been checked, ready to evaluate
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    root: Compiled,
}

impl CompiledPredicate {
    pub fn matches(&self, document: &Value) -> bool {
        self.root.eval(document)
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    All,
    Field { path: FieldPath, test: FieldTest },
    And(Vec<Compiled>),
    Or(Vec<Compiled>),
    Not(Box<Compiled>),
}

#[derive(Debug, Clone)]
enum FieldTest {
    Eq(Value),
    Ne(Value),
    Order(CompareOp, Value),
    In(Vec<Value>),
    Contains(Value),
    Matches(Regex),
    Exists,
}

impl Compiled {
    fn build(predicate: &Predicate) -> Result<Self, ValidationError> {
        Ok(match predicate {
            Predicate::All => Compiled::All,
            Predicate::Field(field) => Compiled::Field {
                path: field.path.clone(),
                test: FieldTest::build(field.op, &field.value)?,
            },
            Predicate::And(children) => Compiled::And(
                children
                    .iter()
                    .map(Compiled::build)
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Or(children) => Compiled::Or(
                children
                    .iter()
                    .map(Compiled::build)
                    .collect::<Result<_, _>>()?,
            ),
            Predicate::Not(child) => Compiled::Not(Box::new(Compiled::build(child)?)),
        })
    }

    fn eval(&self, document: &Value) -> bool {
        match self {
            Compiled::All => true,
            Compiled::Field { path, test } => match path.resolve(document) {
                Some(actual) => test.eval(actual),
                None => false,
            },
            Compiled::And(children) => children.iter().all(|c| c.eval(document)),
            Compiled::Or(children) => children.iter().any(|c| c.eval(document)),
            Compiled::Not(child) => !child.eval(document),
        }
    }
}

impl FieldTest {
    fn build(op: CompareOp, literal: &Value) -> Result<Self, ValidationError> {
        Ok(match op {
            CompareOp::Eq => FieldTest::Eq(literal.clone()),
            CompareOp::Ne => FieldTest::Ne(literal.clone()),
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                FieldTest::Order(op, literal.clone())
            }
            CompareOp::In => match literal {
                Value::Array(items) => FieldTest::In(items.clone()),
                _ => {
                    return Err(ValidationError::Predicate(
                        "\"in\" requires an array literal".to_string(),
                    ))
                }
            },
            CompareOp::Contains => FieldTest::Contains(literal.clone()),
            CompareOp::Matches => {
                let pattern = literal.as_str().ok_or_else(|| {
                    ValidationError::Predicate("\"matches\" requires a string pattern".to_string())
                })?;
                let regex = Regex::new(pattern).map_err(|e| {
                    ValidationError::Predicate(format!("invalid pattern {:?}: {}", pattern, e))
                })?;
                FieldTest::Matches(regex)
            }
            CompareOp::Exists => FieldTest::Exists,
        })
    }

    fn eval(&self, actual: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            FieldTest::Eq(expected) => values_equal(actual, expected),
            FieldTest::Ne(expected) => !values_equal(actual, expected),
            FieldTest::Order(op, bound) => match (op, compare_values(actual, bound)) {
                (CompareOp::Gt, Some(Greater)) => true,
                (CompareOp::Gte, Some(Greater | Equal)) => true,
                (CompareOp::Lt, Some(Less)) => true,
                (CompareOp::Lte, Some(Less | Equal)) => true,
                _ => false,
            },
            FieldTest::In(options) => options.iter().any(|o| values_equal(actual, o)),
            FieldTest::Contains(needle) => match (actual, needle) {
                (Value::Array(items), _) => items.iter().any(|i| values_equal(i, needle)),
                (Value::String(haystack), Value::String(sub)) => haystack.contains(sub.as_str()),
                _ => false,
            },
            FieldTest::Matches(regex) => actual.as_str().map_or(false, |s| regex.is_match(s)),
            FieldTest::Exists => true,
        }
    }
}
