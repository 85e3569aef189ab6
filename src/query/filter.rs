//! # Filtering Primitives
//!
//! This module provides the building blocks used to describe which documents of a
//! collection a query should return.
//!
//! The filtering logic is built on four core concepts:
//!
//! -   _Value_: the unit of data.
//!     A wrapper ([`Value`]) that allows heterogeneous types (Integers, Floats, Strings,
//!     Booleans, Timestamps, Points) to be compared uniformly against document fields.
//!
//! -   _Operation_ ([`Op`]): the logical predicate.
//!     An [`Op`] defines *how* to compare data: equality (`Eq`), inequality (`Neq`),
//!     array membership (`ArrayContains`), prefix search (`Search`) or an exclusive
//!     range (`Between`).
//!
//! -   _Expression_ ([`Expr`]): the single constraint.
//!     An expression binds a [`Field`] to an [`Op`], asserting a rule for that field
//!     (e.g. *"city == tokyo"*).
//!
//! -   _Filter_ ([`Filter`]): the conjunction of expressions.
//!     Expressions are kept in the order supplied by the caller, since the query
//!     composer folds them left to right.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};

use crate::types;

/// Floating point value type alias
pub type Float = f64;
/// Integer value type alias
pub type Integer = i64;
/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;
/// Literal type alias
pub type Text = String;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OpError {
    /// The value type does not support the requested operation (e.g. ordering on booleans).
    #[error("unsupported operation")]
    UnsupportedOperation,

    /// Occurs when constructing a [`Range`] where `min >= max`.
    #[error("empty range")]
    EmptyRange,
}

/// A wrapper enum to allow heterogeneous values to be compared
/// against document fields.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    Integer(Integer),
    Float(Float),
    Text(Text),
    Boolean(bool),
    Timestamp(Timestamp),
    GeoPoint(types::GeoPoint),
}

impl Value {
    /// Representation of the value inside a stored document.
    ///
    /// Timestamps are stored as RFC 3339 strings in UTC with millisecond precision,
    /// so their lexical order matches their chronological order.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Text(v) => serde_json::Value::from(v.as_str()),
            Self::Boolean(v) => serde_json::Value::from(*v),
            Self::Timestamp(v) => {
                serde_json::Value::from(v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::GeoPoint(p) => serde_json::json!({
                "latitude": p.latitude,
                "longitude": p.longitude,
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Value::Timestamp(t)
    }
}

impl From<types::GeoPoint> for Value {
    fn from(p: types::GeoPoint) -> Self {
        Value::GeoPoint(p)
    }
}

/// A trait that indicates which [`Op`]s are supported by a value.
///
/// By default, all operations are unsupported (`false`).
/// These checks are performed at **runtime**, when an [`Expr`] is built.
pub trait IsSupportedOp {
    fn support_eq(&self) -> bool {
        false
    }
    fn support_ordering(&self) -> bool {
        false
    }
    fn support_contains(&self) -> bool {
        false
    }
}

impl IsSupportedOp for Value {
    fn support_eq(&self) -> bool {
        true
    }

    fn support_ordering(&self) -> bool {
        match self {
            Self::Integer(_) | Self::Float(_) | Self::Text(_) | Self::Timestamp(_) => true,
            Self::Boolean(_) | Self::GeoPoint(_) => false,
        }
    }

    fn support_contains(&self) -> bool {
        true
    }
}

/// Exclusive range `(min, max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T> Range<T>
where
    T: PartialOrd,
{
    pub fn try_new(min: T, max: T) -> Result<Self, OpError> {
        // an exclusive range with equal bounds can't hold any value
        if min.partial_cmp(&max) != Some(std::cmp::Ordering::Less) {
            return Err(OpError::EmptyRange);
        }
        Ok(Self { min, max })
    }
}

/// A validated document field path, possibly dotted (`address.city`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field(String);

impl Field {
    pub fn try_new(v: impl Into<String>) -> Result<Self, super::Error> {
        let v = v.into();
        if v.is_empty() || v.split('.').any(str::is_empty) {
            return Err(super::Error::BadField { field: v });
        }
        Ok(Self(v))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents the logical operator to apply to a field for filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Equal
    Eq(Value),
    /// Not equal
    Neq(Value),
    /// The field is an array holding the value
    ArrayContains(Value),
    /// The field is a text starting with the given prefix
    Search(Text),
    /// Strictly between the two bounds
    Between(Range<Value>),
}

impl Op {
    pub fn is_supported_op(&self) -> bool {
        match self {
            Op::Eq(v) => v.support_eq(),
            Op::Neq(v) => v.support_eq(),
            Op::ArrayContains(v) => v.support_contains(),
            Op::Search(_) => true,
            Op::Between(range) => range.min.support_ordering() && range.max.support_ordering(),
        }
    }
}

/// A single constraint over a document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Field, Op);

impl Expr {
    pub fn try_new(field: &str, op: Op) -> Result<Self, super::Error> {
        let field = Field::try_new(field)?;
        if !op.is_supported_op() {
            return Err(OpError::UnsupportedOperation.into());
        }
        Ok(Self(field, op))
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Result<Self, super::Error> {
        Self::try_new(field, Op::Eq(value.into()))
    }

    pub fn neq(field: &str, value: impl Into<Value>) -> Result<Self, super::Error> {
        Self::try_new(field, Op::Neq(value.into()))
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Result<Self, super::Error> {
        Self::try_new(field, Op::ArrayContains(value.into()))
    }

    pub fn search(field: &str, prefix: impl Into<Text>) -> Result<Self, super::Error> {
        Self::try_new(field, Op::Search(prefix.into()))
    }

    pub fn between(
        field: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Result<Self, super::Error> {
        Self::try_new(field, Op::Between(Range::try_new(min.into(), max.into())?))
    }

    /// Matches timestamps falling inside the calendar `date`, evaluated in the
    /// provided UTC `offset`.
    pub fn within_day(
        field: &str,
        date: NaiveDate,
        offset: FixedOffset,
    ) -> Result<Self, super::Error> {
        let start = date.and_hms_opt(0, 0, 0).ok_or(super::Error::BadDate(date))?;
        let end = start
            .checked_add_days(Days::new(1))
            .ok_or(super::Error::BadDate(date))?;

        let start = offset
            .from_local_datetime(&start)
            .single()
            .ok_or(super::Error::BadDate(date))?;
        let end = offset
            .from_local_datetime(&end)
            .single()
            .ok_or(super::Error::BadDate(date))?;

        Self::between(field, start.with_timezone(&Utc), end.with_timezone(&Utc))
    }

    pub fn field(&self) -> &Field {
        &self.0
    }

    pub fn op(&self) -> &Op {
        &self.1
    }

    pub fn is_search(&self) -> bool {
        matches!(self.1, Op::Search(_))
    }

    pub fn into_parts(self) -> (Field, Op) {
        (self.0, self.1)
    }
}

/// Conjunction of expressions, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    exprs: Vec<Expr>,
}

impl Filter {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self { exprs }
    }

    /// Creates an empty filter, matching every document.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, expr: Expr) -> Self {
        self.exprs.push(expr);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Returns true if at least one expression is a prefix search
    pub fn has_search(&self) -> bool {
        self.exprs.iter().any(Expr::is_search)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.exprs.iter()
    }
}

impl From<Vec<Expr>> for Filter {
    fn from(exprs: Vec<Expr>) -> Self {
        Self::new(exprs)
    }
}

impl IntoIterator for Filter {
    type Item = Expr;
    type IntoIter = std::vec::IntoIter<Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.exprs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.exprs.iter()
    }
}

/// Requested result ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: Field,
    pub descending: bool,
}

impl Sort {
    pub fn try_new(field: &str, descending: bool) -> Result<Self, super::Error> {
        Ok(Self {
            field: Field::try_new(field)?,
            descending,
        })
    }

    pub fn asc(field: &str) -> Result<Self, super::Error> {
        Self::try_new(field, false)
    }

    pub fn desc(field: &str) -> Result<Self, super::Error> {
        Self::try_new(field, true)
    }
}
