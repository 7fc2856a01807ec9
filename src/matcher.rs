//! Query predicate matcher for record filtering.
//!
//! A small MongoDB-flavored matcher used by the transform engine's `filter`
//! stage and by [`FakeDataService`](crate::testing::FakeDataService) to
//! evaluate query filters. Supported syntax:
//!
//! - implicit equality: `{"year": 1977}`
//! - comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - membership: `$in`, `$nin`
//! - presence: `$exists`
//! - pattern: `$regex` (on strings)
//! - combinators: `$and`, `$or` (arrays of sub-filters)
//!
//! Field keys are dot paths resolved with [`crate::path`]. An empty filter
//! matches every record.

use crate::path;
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluate `filter` against `record`.
///
/// Unknown `$` operators and structurally invalid clauses evaluate to
/// `false` rather than erroring, matching permissive query-matcher
/// behavior.
pub fn matches(record: &Value, filter: &Value) -> bool {
    let Value::Object(clauses) = filter else {
        return true;
    };
    clauses.iter().all(|(key, condition)| match key.as_str() {
        "$and" => condition
            .as_array()
            .is_some_and(|subs| subs.iter().all(|sub| matches(record, sub))),
        "$or" => condition
            .as_array()
            .is_some_and(|subs| subs.iter().any(|sub| matches(record, sub))),
        field => matches_field(path::get(record, field), condition),
    })
}

fn matches_field(value: Option<&Value>, condition: &Value) -> bool {
    // An object whose keys all start with '$' is an operator clause;
    // anything else is compared for plain equality.
    if let Value::Object(ops) = condition {
        if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) {
            return ops.iter().all(|(op, operand)| apply_op(value, op, operand));
        }
    }
    value == Some(condition)
}

fn apply_op(value: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$exists" => {
            let wanted = operand.as_bool().unwrap_or(true);
            value.is_some() == wanted
        }
        "$eq" => value == Some(operand),
        "$ne" => value != Some(operand),
        "$in" => operand
            .as_array()
            .is_some_and(|opts| value.is_some_and(|v| opts.contains(v))),
        "$nin" => operand
            .as_array()
            .is_some_and(|opts| !value.is_some_and(|v| opts.contains(v))),
        "$gt" => compare(value, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            compare(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => compare(value, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            compare(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "$regex" => match (value.and_then(Value::as_str), operand.as_str()) {
            (Some(s), Some(pattern)) => regex::Regex::new(pattern)
                .map(|re| re.is_match(s))
                .unwrap_or(false),
            _ => false,
        },
        _ => false,
    }
}

/// Order two values when they share a comparable type (numbers compare as
/// f64, strings lexicographically). Mixed or non-ordered types compare as
/// `None`, which fails every range operator.
fn compare(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (value?, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_dot_paths() {
        let record = json!({"name": "Oslo", "properties": {"country": "NO"}});
        assert!(matches(&record, &json!({"name": "Oslo"})));
        assert!(matches(&record, &json!({"properties.country": "NO"})));
        assert!(!matches(&record, &json!({"properties.country": "SE"})));
    }

    #[test]
    fn range_operators_on_numbers() {
        let record = json!({"year": 1975});
        assert!(matches(&record, &json!({"year": {"$gte": 1970, "$lt": 1980}})));
        assert!(!matches(&record, &json!({"year": {"$gt": 1975}})));
        assert!(matches(&record, &json!({"year": {"$lte": 1975}})));
    }

    #[test]
    fn and_or_combinators() {
        let record = json!({"year": 1975, "kind": "lp"});
        let filter = json!({"$and": [{"year": {"$gte": 1970}}, {"year": {"$lt": 1980}}]});
        assert!(matches(&record, &filter));
        let filter = json!({"$or": [{"kind": "single"}, {"kind": "lp"}]});
        assert!(matches(&record, &filter));
        let filter = json!({"$or": [{"kind": "single"}, {"year": 1999}]});
        assert!(!matches(&record, &filter));
    }

    #[test]
    fn membership_presence_and_regex() {
        let record = json!({"tag": "beta", "score": 3});
        assert!(matches(&record, &json!({"tag": {"$in": ["alpha", "beta"]}})));
        assert!(matches(&record, &json!({"tag": {"$nin": ["gamma"]}})));
        assert!(matches(&record, &json!({"missing": {"$exists": false}})));
        assert!(matches(&record, &json!({"tag": {"$regex": "^be"}})));
        assert!(!matches(&record, &json!({"tag": {"$regex": "^ga"}})));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&json!({"a": 1}), &json!({})));
    }
}
