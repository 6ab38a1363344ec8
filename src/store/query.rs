use serde_json::Value;
use std::cmp::Ordering;

use super::Record;

/// Exact-match equality on a named field. A missing field compares equal to `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field).unwrap_or(&Value::Null) == &self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Filter, sort and limit options for `get_all` and `subscribe`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|filter| filter.matches(record))
    }

    /// Applies filters, then a stable sort, then the limit.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut matched: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                let left = a.get(&sort.field).unwrap_or(&Value::Null);
                let right = b.get(&sort.field).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }

    /// Filters as a single JSON object, for containment queries.
    pub fn filter_object(&self) -> Value {
        let mut object = serde_json::Map::new();
        for filter in &self.filters {
            object.insert(filter.field.clone(), filter.value.clone());
        }
        Value::Object(object)
    }
}

// null < bool < number < string < array < object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used for sorting.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = a.as_f64().unwrap_or(0.0);
                    let y = b.as_f64().unwrap_or(0.0);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    #[test]
    fn test_missing_field_matches_null_filter() {
        let filter = Filter::eq("parentId", Value::Null);
        assert!(filter.matches(&record(json!({"id": "a"}))));
        assert!(filter.matches(&record(json!({"id": "a", "parentId": null}))));
        assert!(!filter.matches(&record(json!({"id": "a", "parentId": "b"}))));
    }

    #[test]
    fn test_apply_filters_sorts_and_limits() {
        let records = vec![
            record(json!({"id": "1", "recipientId": "m1", "createdAt": 10})),
            record(json!({"id": "2", "recipientId": "m2", "createdAt": 30})),
            record(json!({"id": "3", "recipientId": "m1", "createdAt": 20})),
            record(json!({"id": "4", "recipientId": "m1", "createdAt": 5})),
        ];

        let query = Query::new()
            .filter("recipientId", "m1")
            .sort_by("createdAt", SortDirection::Descending)
            .limit(2);

        let ids: Vec<_> = query
            .apply(records)
            .into_iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_compare_values_orders_numbers_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(1)), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &json!(0)), Ordering::Less);
    }

    #[test]
    fn test_filter_object_collects_fields() {
        let query = Query::new().filter("eventId", "t1").filter("status", "active");
        assert_eq!(
            query.filter_object(),
            json!({"eventId": "t1", "status": "active"})
        );
    }
}
