//! Dynamic value model for reactive data bags.
//!
//! Components carry arbitrarily-shaped data, so the store operates on a small
//! dynamic `Value` type rather than user structs. Lists and maps share their
//! interior through `Rc`, which gives them the identity semantics the
//! observable layer needs: two clones of the same map alias one allocation,
//! and `Value::same` compares that allocation, not the contents.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Shared map storage.
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// Shared list storage.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A dynamically-typed value.
///
/// `Map` and `List` are the "plain object/array" shapes the observable store
/// wraps; everything else is a scalar with no per-property observation model.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(ListRef),
    Map(MapRef),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, I>(pairs: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map: BTreeMap<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        Value::Map(Rc::new(RefCell::new(map)))
    }

    /// Build an empty map value.
    pub fn empty_map() -> Value {
        Value::Map(Rc::new(RefCell::new(BTreeMap::new())))
    }

    /// Build a list value.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Identity comparison with `Object.is`-style semantics:
    /// scalars compare by value (floats by bit pattern, so NaN equals
    /// itself and +0.0 differs from -0.0), lists and maps by allocation
    /// identity. Cross-variant comparisons are always false.
    pub fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
            (Value::Map(x), Value::Map(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// True for the shapes the observable store can wrap.
    pub fn is_wrappable(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness, used by conditional-rendering idioms: `Null`, `false`,
    /// `0`, `0.0`, and the empty string are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    /// String coercion used when a non-string child ends up in a tree as
    /// text. Lists join with commas, maps render opaquely.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                let items = items.borrow();
                let mut first = true;
                for item in items.iter() {
                    if !first {
                        write!(f, ",")?;
                    }
                    first = false;
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "[object]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => write!(f, "List(len={})", items.borrow().len()),
            Value::Map(m) => write!(f, "Map(len={})", m.borrow().len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_scalars() {
        assert!(Value::same(&Value::Int(3), &Value::Int(3)));
        assert!(!Value::same(&Value::Int(3), &Value::Int(4)));
        assert!(!Value::same(&Value::Int(3), &Value::Float(3.0)));
        assert!(Value::same(&Value::from("a"), &Value::from("a")));
        assert!(Value::same(
            &Value::Float(f64::NAN),
            &Value::Float(f64::NAN)
        ));
        assert!(!Value::same(&Value::Float(0.0), &Value::Float(-0.0)));
    }

    #[test]
    fn test_same_identity_for_maps() {
        let a = Value::map([("x", Value::Int(1))]);
        let b = a.clone();
        let c = Value::map([("x", Value::Int(1))]);
        assert!(Value::same(&a, &b));
        assert!(!Value::same(&a, &c));
    }

    #[test]
    fn test_display_coercion() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(
            Value::list([Value::Int(1), Value::Int(2)]).to_string(),
            "1,2"
        );
    }

    #[test]
    fn test_truthy() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("x").truthy());
        assert!(Value::empty_map().truthy());
    }
}
