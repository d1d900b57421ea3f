//! Scalar values, result rows and write results shared by every backend.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A raw scalar as stored in (or bound to) a column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Returns true if this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as an integer, coercing numeric text.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value as a float, coercing integers and numeric text.
    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            Self::Real(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Type-coercing equality used for identity matching.
    ///
    /// Identifiers cross a text/number boundary (URL path segments versus
    /// stored integers), so `Integer(3)`, `Real(3.0)` and `Text("3")` are all
    /// equal here. Two text values compare exactly. `Null` only equals `Null`.
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (a, b) => match (a.as_real(), b.as_real()) {
                #[allow(clippy::float_cmp)]
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Converts numeric text to an integer, leaving everything else as is.
    ///
    /// Backends with strict column typing use this on identity parameters.
    #[must_use]
    pub fn coerce_identity(self) -> Self {
        if let Self::Text(s) = &self
            && let Ok(id) = s.trim().parse::<i64>()
        {
            return Self::Integer(id);
        }
        self
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<rust_decimal::Decimal> for Value {
    fn from(v: rust_decimal::Decimal) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        v.to_f64().map_or(Self::Null, Self::Real)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

macro_rules! value_from_id {
    ($($id:ty),*) => {
        $(
            impl From<$id> for Value {
                fn from(id: $id) -> Self {
                    Self::Integer(id.as_i64())
                }
            }
        )*
    };
}

value_from_id!(
    profile_shop_core::UserId,
    profile_shop_core::ProductId,
    profile_shop_core::OrderId
);

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
        }
    }
}

/// Build a `Vec<Value>` from heterogeneous expressions.
///
/// ```rust
/// # use profile_shop_db::{params, Value};
/// let p = params!["admin", 88.0, 100_i64, None::<String>];
/// assert_eq!(p[0], Value::Text("admin".to_owned()));
/// assert_eq!(p[3], Value::Null);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// A result row: column names paired with raw values, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Create a row from column/value pairs.
    #[must_use]
    pub const fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Get a value by column name. Missing columns read as `Null`.
    #[must_use]
    pub fn get(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map_or(&NULL, |(_, value)| value)
    }

    /// Set a column, appending it if absent.
    pub fn set(&mut self, column: &str, value: Value) {
        if let Some(slot) = self.columns.iter_mut().find(|(name, _)| name == column) {
            slot.1 = value;
        } else {
            self.columns.push((column.to_owned(), value));
        }
    }

    /// Returns true if the row has the named column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// Text content of a column, if it holds text.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).as_text()
    }

    /// Integer content of a column (numeric text is coerced).
    #[must_use]
    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).as_integer()
    }

    /// Float content of a column (integers are widened).
    #[must_use]
    pub fn real(&self, column: &str) -> Option<f64> {
        self.get(column).as_real()
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over column/value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    /// Identity assigned by an insert, or 0.
    pub inserted_id: i64,
    /// Number of rows the statement changed.
    pub affected: u64,
}

impl RunResult {
    /// Zero-effect sentinel. Zero means "no effect", not success or failure.
    pub const NONE: Self = Self {
        inserted_id: 0,
        affected: 0,
    };

    /// Result of a write that changed `affected` rows without inserting.
    #[must_use]
    pub const fn changed(affected: u64) -> Self {
        Self {
            inserted_id: 0,
            affected,
        }
    }

    /// Result of a single-row insert.
    #[must_use]
    pub const fn inserted(id: i64) -> Self {
        Self {
            inserted_id: id,
            affected: 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_eq_crosses_text_number_boundary() {
        assert!(Value::Integer(5).loose_eq(&Value::Text("5".to_owned())));
        assert!(Value::Text("5".to_owned()).loose_eq(&Value::Integer(5)));
        assert!(Value::Real(5.0).loose_eq(&Value::Integer(5)));
        assert!(!Value::Integer(5).loose_eq(&Value::Text("05x".to_owned())));
        assert!(!Value::Integer(5).loose_eq(&Value::Null));
        assert!(Value::Null.loose_eq(&Value::Null));
    }

    #[test]
    fn test_loose_eq_text_is_exact() {
        assert!(!Value::Text("5".to_owned()).loose_eq(&Value::Text("5.0".to_owned())));
        assert!(Value::Text("admin".to_owned()).loose_eq(&Value::Text("admin".to_owned())));
    }

    #[test]
    fn test_strict_eq_does_not_coerce() {
        assert_ne!(Value::Integer(5), Value::Text("5".to_owned()));
    }

    #[test]
    fn test_coerce_identity() {
        assert_eq!(
            Value::Text(" 7".to_owned()).coerce_identity(),
            Value::Integer(7)
        );
        assert_eq!(
            Value::Text("seven".to_owned()).coerce_identity(),
            Value::Text("seven".to_owned())
        );
        assert_eq!(Value::Real(1.5).coerce_identity(), Value::Real(1.5));
    }

    #[test]
    fn test_params_macro() {
        let p = params!["a", 2_i64, 3.5, None::<i64>, profile_shop_core::UserId::new(9)];
        assert_eq!(
            p,
            vec![
                Value::Text("a".to_owned()),
                Value::Integer(2),
                Value::Real(3.5),
                Value::Null,
                Value::Integer(9),
            ]
        );
        assert!(params![].is_empty());
    }

    #[test]
    fn test_row_lookup_and_set() {
        let mut row = Row::new(vec![
            ("id".to_owned(), Value::Integer(1)),
            ("username".to_owned(), Value::from("admin")),
        ]);
        assert_eq!(row.integer("id"), Some(1));
        assert_eq!(row.text("username"), Some("admin"));
        assert!(row.get("missing").is_null());

        row.set("username", Value::from("root"));
        row.set("role", Value::from("admin"));
        assert_eq!(row.text("username"), Some("root"));
        assert_eq!(
            row.column_names().collect::<Vec<_>>(),
            ["id", "username", "role"]
        );
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(vec![
            ("id".to_owned(), Value::Integer(1)),
            ("price".to_owned(), Value::Real(88.0)),
            ("doc_url".to_owned(), Value::Null),
        ]);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 1, "price": 88.0, "doc_url": null})
        );
    }
}
