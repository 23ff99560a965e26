//! Composable read requests.

use serde_json::Value;

/// A single filter predicate on a read request.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`; a null value means `column IS NULL`
    Eq { column: String, value: Value },
    /// `column >= value`
    Gte { column: String, value: f64 },
    /// `column < value`
    Lt { column: String, value: f64 },
    /// Case-insensitive substring match
    Contains { column: String, needle: String },
    /// Logical OR of the inner predicates
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn gte(column: impl Into<String>, value: f64) -> Self {
        Predicate::Gte {
            column: column.into(),
            value,
        }
    }

    pub fn lt(column: impl Into<String>, value: f64) -> Self {
        Predicate::Lt {
            column: column.into(),
            value,
        }
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: column.into(),
            needle: needle.into(),
        }
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }

    /// Evaluate against an in-memory record.
    ///
    /// Mirrors the store semantics: comparisons against missing or null
    /// columns are false.
    pub fn matches(&self, record: &super::Record) -> bool {
        match self {
            Predicate::Eq { column, value } => match record.get(column) {
                Some(found) if value.is_null() => found.is_null(),
                Some(found) => json_eq(found, value),
                None => value.is_null(),
            },
            Predicate::Gte { column, value } => record
                .get(column)
                .and_then(Value::as_f64)
                .is_some_and(|n| n >= *value),
            Predicate::Lt { column, value } => record
                .get(column)
                .and_then(Value::as_f64)
                .is_some_and(|n| n < *value),
            Predicate::Contains { column, needle } => record
                .get(column)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Predicate::Or(inner) => inner.iter().any(|p| p.matches(record)),
        }
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// How a joined table relates to the base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// Base row holds `foreign_key` pointing at the joined row's `id`.
    /// Embedded as a single object or null.
    BelongsTo { foreign_key: String },
    /// Joined rows hold `foreign_key` pointing at the base row's `id`.
    /// Embedded as an array.
    HasMany { foreign_key: String },
}

/// Eager-loaded related table, embedded under the table's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub relation: Relation,
}

/// Result ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read request against one table. All filters are conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    /// Selected columns; empty means all
    pub columns: Vec<String>,
    pub filters: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub order: Option<Order>,
}

impl TableQuery {
    /// Start a request that selects every column of `table`.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            joins: Vec::new(),
            order: None,
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Embed the row of `table` referenced by this table's `foreign_key`.
    pub fn join_one(mut self, table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.joins.push(Join {
            table: table.into(),
            relation: Relation::BelongsTo {
                foreign_key: foreign_key.into(),
            },
        });
        self
    }

    /// Embed the rows of `table` whose `foreign_key` references this row.
    pub fn join_many(mut self, table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.joins.push(Join {
            table: table.into(),
            relation: Relation::HasMany {
                foreign_key: foreign_key.into(),
            },
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Shorthand for `filter(eq("id", id))`.
    pub fn by_id(self, id: &str) -> Self {
        self.filter(Predicate::eq("id", id))
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> super::super::Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_builder() {
        let query = TableQuery::from("medical_records")
            .filter(Predicate::eq("patient_id", "p-1"))
            .order_by("date", false);

        assert_eq!(query.table, "medical_records");
        assert!(query.columns.is_empty());
        assert_eq!(query.filters.len(), 1);
        assert_eq!(
            query.order,
            Some(Order {
                column: "date".into(),
                ascending: false
            })
        );
    }

    #[test]
    fn test_matches_contains_case_insensitive() {
        let row = record(json!({"name": "Labrador", "breed": null}));
        assert!(Predicate::contains("name", "lab").matches(&row));
        assert!(!Predicate::contains("breed", "lab").matches(&row));
        assert!(Predicate::any(vec![
            Predicate::contains("breed", "lab"),
            Predicate::contains("name", "LAB"),
        ])
        .matches(&row));
    }

    #[test]
    fn test_matches_range() {
        let row = record(json!({"age": 3}));
        assert!(Predicate::gte("age", 3.0).matches(&row));
        assert!(!Predicate::lt("age", 3.0).matches(&row));
        assert!(Predicate::eq("age", 3.0).matches(&row));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(2.5), "2.5");
    }
}
