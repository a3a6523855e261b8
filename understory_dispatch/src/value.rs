// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subject data: values, records, attribute paths, and the [`Subject`] lookup trait.
//!
//! ## Overview
//!
//! A subject is anything that can answer "what is the value of attribute `name`?".
//! [`Record`] is the built-in subject type; toolkits can implement [`Subject`] for their
//! own objects and only hand out [`Value`]s for the attributes a pattern looks at.
//!
//! Nested attributes are always read through [`Value::Record`].

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use ordered_float::OrderedFloat;

/// A concrete attribute value.
///
/// Values are totally ordered and hashable so that any of them can key a branch of the
/// decision tree. Floats use [`OrderedFloat`], so `NaN` equals itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    /// An explicit null. Present, but carrying nothing.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number with a total order.
    Float(OrderedFloat<f64>),
    /// A string.
    Str(String),
    /// Opaque identity of an application object. Two handles are equal only if the ids are.
    Handle(u64),
    /// A nested record, compared deeply.
    Record(Record),
}

impl Value {
    /// Returns the nested record, if this value is one.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Resolve a relative path inside this value.
    ///
    /// An empty path resolves to `self`. Any segment that is absent, or that would have to
    /// look inside a non-record value, resolves to `None`.
    pub fn resolve(&self, segments: &[String]) -> Option<&Self> {
        let mut cur = self;
        for seg in segments {
            cur = cur.as_record()?.get(seg)?;
        }
        Some(cur)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(OrderedFloat(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}

/// A string-keyed map of values; the default [`Subject`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder form of [`Record::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set an attribute, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// True if the attribute is present (even if it is [`Value::Null`]).
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of top-level attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over top-level attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Attribute lookup on the object being classified.
///
/// Only top-level attributes go through this trait; anything below them is read from
/// [`Value::Record`]. Returning `None` means the attribute is absent, which is distinct
/// from being present with [`Value::Null`].
pub trait Subject {
    /// Returns the value of the top-level attribute `name`, if present.
    fn attr(&self, name: &str) -> Option<&Value>;
}

impl Subject for Record {
    #[inline]
    fn attr(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<S: Subject + ?Sized> Subject for &S {
    #[inline]
    fn attr(&self, name: &str) -> Option<&Value> {
        (**self).attr(name)
    }
}

/// Read `path` from `subject`.
pub(crate) fn resolve<'a, S: Subject + ?Sized>(subject: &'a S, path: &AttrPath) -> Option<&'a Value> {
    let (first, rest) = path.0.split_first()?;
    subject.attr(first)?.resolve(rest)
}

/// A sequence of nested attribute names, e.g. `a.b` for `subject.a.b`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrPath(Vec<String>);

impl AttrPath {
    /// The empty path, naming the subject itself.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// The individual attribute names, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extend this path by one attribute name.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// True if `self` is `other` or an ancestor of it.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// True if `self` is a proper ancestor of `other`.
    pub fn is_strict_prefix_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(seg)?;
        }
        Ok(())
    }
}

impl From<&str> for AttrPath {
    fn from(name: &str) -> Self {
        Self(alloc::vec![name.into()])
    }
}

impl From<String> for AttrPath {
    fn from(name: String) -> Self {
        Self(alloc::vec![name])
    }
}

impl<const N: usize> From<[&str; N]> for AttrPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| String::from(*s)).collect())
    }
}

impl From<Vec<String>> for AttrPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn nested() -> Record {
        Record::new()
            .with("a", Record::new().with("b", 1).with("c", Value::Null))
            .with("d", "text")
    }

    #[test]
    fn resolve_walks_nested_records() {
        let r = nested();
        assert_eq!(resolve(&r, &AttrPath::from(["a", "b"])), Some(&Value::Int(1)));
        assert_eq!(resolve(&r, &AttrPath::from(["a", "c"])), Some(&Value::Null));
        assert_eq!(resolve(&r, &AttrPath::from("d")), Some(&Value::from("text")));
    }

    #[test]
    fn resolve_fails_through_scalars_and_gaps() {
        let r = nested();
        assert_eq!(resolve(&r, &AttrPath::from(["d", "x"])), None);
        assert_eq!(resolve(&r, &AttrPath::from(["a", "z"])), None);
        assert_eq!(resolve(&r, &AttrPath::from("z")), None);
        assert_eq!(resolve(&r, &AttrPath::root()), None);
    }

    #[test]
    fn records_compare_deeply() {
        assert_eq!(Value::from(nested()), Value::from(nested()));
        let other = nested().with("d", "other");
        assert_ne!(Value::from(nested()), Value::from(other));
    }

    #[test]
    fn handles_compare_by_identity() {
        assert_eq!(Value::Handle(7), Value::Handle(7));
        assert_ne!(Value::Handle(7), Value::Handle(8));
        assert_ne!(Value::Handle(7), Value::Int(7));
    }

    #[test]
    fn float_nan_is_a_usable_key() {
        let nan = Value::from(f64::NAN);
        assert_eq!(nan, Value::from(f64::NAN));
    }

    #[test]
    fn path_prefixes() {
        let a = AttrPath::from("a");
        let ab = AttrPath::from(["a", "b"]);
        assert!(a.is_prefix_of(&ab));
        assert!(a.is_strict_prefix_of(&ab));
        assert!(ab.is_prefix_of(&ab));
        assert!(!ab.is_strict_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert_eq!(a.child("b"), ab);
    }

    #[test]
    fn path_display() {
        assert_eq!(AttrPath::from(["a", "b", "c"]).to_string(), "a.b.c");
        assert_eq!(AttrPath::root().to_string(), "(root)");
    }
}
