//! Typed comparisons over runtime values.
//!
//! The left operand's kind selects the evaluator: integers, text, ordered
//! lists, or keyed maps (insertion ordered). Each kind has a fixed operator
//! catalogue; an operator outside it is an error, never a silent `false`.

use std::fmt;

use serde::{Deserialize, Serialize};

use navgraph_core::error::{NavError, Result};

/// A runtime value a condition can branch on.
///
/// Equality ignores map insertion order: two maps are equal when they hold
/// the same keys with equal values.
#[derive(Debug, Clone)]
pub enum ConditionValue {
    Integer(i64),
    Text(String),
    List(Vec<ConditionValue>),
    /// Keyed map in insertion order.
    Map(Vec<(String, ConditionValue)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Text,
    List,
    Map,
}

impl ValueKind {
    pub const ALL: [ValueKind; 4] = [
        ValueKind::Integer,
        ValueKind::Text,
        ValueKind::List,
        ValueKind::Map,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        }
    }

    /// Parse a kind name as used by authoring tools.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "number" => Some(ValueKind::Integer),
            "text" | "string" | "str" => Some(ValueKind::Text),
            "list" | "array" => Some(ValueKind::List),
            "map" | "dict" | "object" => Some(ValueKind::Map),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConditionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ConditionValue::Integer(_) => ValueKind::Integer,
            ConditionValue::Text(_) => ValueKind::Text,
            ConditionValue::List(_) => ValueKind::List,
            ConditionValue::Map(_) => ValueKind::Map,
        }
    }

    pub fn map<K: Into<String>>(entries: Vec<(K, ConditionValue)>) -> Self {
        ConditionValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl PartialEq for ConditionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConditionValue::Integer(a), ConditionValue::Integer(b)) => a == b,
            (ConditionValue::Text(a), ConditionValue::Text(b)) => a == b,
            (ConditionValue::List(a), ConditionValue::List(b)) => a == b,
            (ConditionValue::Map(a), ConditionValue::Map(b)) => map_eq(a, b),
            _ => false,
        }
    }
}

fn map_eq(a: &[(String, ConditionValue)], b: &[(String, ConditionValue)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
}

impl From<i64> for ConditionValue {
    fn from(v: i64) -> Self {
        ConditionValue::Integer(v)
    }
}

impl From<&str> for ConditionValue {
    fn from(v: &str) -> Self {
        ConditionValue::Text(v.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(v: String) -> Self {
        ConditionValue::Text(v)
    }
}

impl<T: Into<ConditionValue>> From<Vec<T>> for ConditionValue {
    fn from(items: Vec<T>) -> Self {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for ConditionValue {
    type Error = NavError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        match value {
            Value::Number(n) => n.as_i64().map(ConditionValue::Integer).ok_or_else(|| {
                NavError::InvalidOperand {
                    kind: "number".into(),
                    operator: "-".into(),
                    message: format!("{n} is not an integer"),
                }
            }),
            Value::String(s) => Ok(ConditionValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(ConditionValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(ConditionValue::List),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| ConditionValue::try_from(v).map(|v| (k, v)))
                .collect::<Result<Vec<_>>>()
                .map(ConditionValue::Map),
            other => Err(NavError::InvalidOperand {
                kind: "json".into(),
                operator: "-".into(),
                message: format!("unsupported value: {other}"),
            }),
        }
    }
}

/// Every comparison operator known to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equals,
    Contains,
    DoesNotContain,
    IndexOf,
    ContainsKey,
    ContainsValue,
    LacksKey,
    LacksValue,
    IndexOfKey,
}

impl Operator {
    /// Canonical operator name.
    pub fn name(self) -> &'static str {
        match self {
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Equals => "==",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "does_not_contain",
            Operator::IndexOf => "index_of",
            Operator::ContainsKey => "contains_key",
            Operator::ContainsValue => "contains_value",
            Operator::LacksKey => "lacks_key",
            Operator::LacksValue => "lacks_value",
            Operator::IndexOfKey => "index_of_key",
        }
    }

    /// Parse an operator name. Hyphens and spaces are accepted in place of
    /// underscores ("does-not-contain", "index of key").
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        let op = match normalized.as_str() {
            ">" | "gt" => Operator::GreaterThan,
            "<" | "lt" => Operator::LessThan,
            ">=" | "gte" => Operator::GreaterOrEqual,
            "<=" | "lte" => Operator::LessOrEqual,
            "==" | "eq" | "equals" => Operator::Equals,
            "contains" => Operator::Contains,
            "does_not_contain" | "not_contains" => Operator::DoesNotContain,
            "index_of" => Operator::IndexOf,
            "contains_key" => Operator::ContainsKey,
            "contains_value" => Operator::ContainsValue,
            "lacks_key" => Operator::LacksKey,
            "lacks_value" => Operator::LacksValue,
            "index_of_key" => Operator::IndexOfKey,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Bool,
    Integer,
}

/// Catalogue entry describing one operator for authoring tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorInfo {
    pub operator: Operator,
    pub name: &'static str,
    pub label: &'static str,
    pub result: ResultKind,
}

const fn info(operator: Operator, name: &'static str, label: &'static str, result: ResultKind) -> OperatorInfo {
    OperatorInfo {
        operator,
        name,
        label,
        result,
    }
}

const INTEGER_OPERATORS: &[OperatorInfo] = &[
    info(Operator::GreaterThan, ">", "greater than", ResultKind::Bool),
    info(Operator::LessThan, "<", "less than", ResultKind::Bool),
    info(Operator::GreaterOrEqual, ">=", "greater than or equal to", ResultKind::Bool),
    info(Operator::LessOrEqual, "<=", "less than or equal to", ResultKind::Bool),
    info(Operator::Equals, "==", "equals", ResultKind::Bool),
];

const TEXT_OPERATORS: &[OperatorInfo] = &[
    info(Operator::Equals, "==", "equals", ResultKind::Bool),
    info(Operator::Contains, "contains", "contains", ResultKind::Bool),
    info(Operator::DoesNotContain, "does_not_contain", "does not contain", ResultKind::Bool),
];

const LIST_OPERATORS: &[OperatorInfo] = &[
    info(Operator::Equals, "==", "equals", ResultKind::Bool),
    info(Operator::Contains, "contains", "contains item", ResultKind::Bool),
    info(Operator::DoesNotContain, "does_not_contain", "does not contain item", ResultKind::Bool),
    info(Operator::IndexOf, "index_of", "index of item", ResultKind::Integer),
];

const MAP_OPERATORS: &[OperatorInfo] = &[
    info(Operator::Equals, "==", "equals", ResultKind::Bool),
    info(Operator::ContainsKey, "contains_key", "has key", ResultKind::Bool),
    info(Operator::ContainsValue, "contains_value", "has value", ResultKind::Bool),
    info(Operator::LacksKey, "lacks_key", "lacks key", ResultKind::Bool),
    info(Operator::LacksValue, "lacks_value", "lacks value", ResultKind::Bool),
    info(Operator::IndexOfKey, "index_of_key", "position of key", ResultKind::Integer),
];

/// Operators a value kind supports, in display order.
pub fn supported_operators(kind: ValueKind) -> &'static [OperatorInfo] {
    match kind {
        ValueKind::Integer => INTEGER_OPERATORS,
        ValueKind::Text => TEXT_OPERATORS,
        ValueKind::List => LIST_OPERATORS,
        ValueKind::Map => MAP_OPERATORS,
    }
}

/// Result of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvalResult {
    Bool(bool),
    Integer(i64),
}

impl EvalResult {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            EvalResult::Bool(b) => Some(b),
            EvalResult::Integer(_) => None,
        }
    }

    pub fn as_integer(self) -> Option<i64> {
        match self {
            EvalResult::Integer(i) => Some(i),
            EvalResult::Bool(_) => None,
        }
    }
}

impl From<bool> for EvalResult {
    fn from(b: bool) -> Self {
        EvalResult::Bool(b)
    }
}

/// Compare `left` against `right` using an operator given by name.
pub fn evaluate(left: &ConditionValue, right: &ConditionValue, operator: &str) -> Result<EvalResult> {
    let op = Operator::parse(operator).ok_or_else(|| unsupported(left.kind(), operator))?;
    evaluate_op(left, right, op)
}

/// Compare `left` against `right`, dispatching on the kind of `left`.
pub fn evaluate_op(left: &ConditionValue, right: &ConditionValue, op: Operator) -> Result<EvalResult> {
    let kind = left.kind();
    if !supported_operators(kind).iter().any(|i| i.operator == op) {
        return Err(unsupported(kind, op.name()));
    }

    match left {
        ConditionValue::Integer(l) => eval_integer(*l, right, op),
        ConditionValue::Text(l) => eval_text(l, right, op),
        ConditionValue::List(items) => eval_list(items, right, op),
        ConditionValue::Map(entries) => eval_map(entries, right, op),
    }
}

fn eval_integer(left: i64, right: &ConditionValue, op: Operator) -> Result<EvalResult> {
    let right = match right {
        ConditionValue::Integer(r) => *r,
        // Authoring tools commonly send numbers as text.
        ConditionValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(ValueKind::Integer, op, format!("'{s}' is not an integer")))?,
        other => {
            return Err(invalid(
                ValueKind::Integer,
                op,
                format!("cannot compare integer with {}", other.kind()),
            ))
        }
    };

    let result = match op {
        Operator::GreaterThan => left > right,
        Operator::LessThan => left < right,
        Operator::GreaterOrEqual => left >= right,
        Operator::LessOrEqual => left <= right,
        Operator::Equals => left == right,
        _ => return Err(unsupported(ValueKind::Integer, op.name())),
    };
    Ok(result.into())
}

fn eval_text(left: &str, right: &ConditionValue, op: Operator) -> Result<EvalResult> {
    let right = match right {
        ConditionValue::Text(s) => s.as_str(),
        other => {
            return Err(invalid(
                ValueKind::Text,
                op,
                format!("expected text operand, got {}", other.kind()),
            ))
        }
    };

    let result = match op {
        Operator::Equals => left == right,
        Operator::Contains => left.contains(right),
        Operator::DoesNotContain => !left.contains(right),
        _ => return Err(unsupported(ValueKind::Text, op.name())),
    };
    Ok(result.into())
}

fn eval_list(items: &[ConditionValue], right: &ConditionValue, op: Operator) -> Result<EvalResult> {
    let result = match op {
        Operator::Equals => EvalResult::Bool(matches!(right, ConditionValue::List(r) if r == items)),
        Operator::Contains => EvalResult::Bool(items.contains(right)),
        Operator::DoesNotContain => EvalResult::Bool(!items.contains(right)),
        Operator::IndexOf => EvalResult::Integer(position(items.iter().position(|i| i == right))),
        _ => return Err(unsupported(ValueKind::List, op.name())),
    };
    Ok(result)
}

fn eval_map(
    entries: &[(String, ConditionValue)],
    right: &ConditionValue,
    op: Operator,
) -> Result<EvalResult> {
    let has_value = || entries.iter().any(|(_, v)| v == right);

    let result = match op {
        Operator::Equals => EvalResult::Bool(matches!(right, ConditionValue::Map(r) if map_eq(entries, r))),
        Operator::ContainsKey => {
            let k = map_key(right, op)?;
            EvalResult::Bool(entries.iter().any(|(ek, _)| ek == k))
        }
        Operator::LacksKey => {
            let k = map_key(right, op)?;
            EvalResult::Bool(!entries.iter().any(|(ek, _)| ek == k))
        }
        Operator::ContainsValue => EvalResult::Bool(has_value()),
        Operator::LacksValue => EvalResult::Bool(!has_value()),
        Operator::IndexOfKey => {
            let k = map_key(right, op)?;
            EvalResult::Integer(position(entries.iter().position(|(ek, _)| ek == k)))
        }
        _ => return Err(unsupported(ValueKind::Map, op.name())),
    };
    Ok(result)
}

fn map_key(right: &ConditionValue, op: Operator) -> Result<&str> {
    match right {
        ConditionValue::Text(k) => Ok(k.as_str()),
        other => Err(invalid(
            ValueKind::Map,
            op,
            format!("map keys are text, got {}", other.kind()),
        )),
    }
}

fn position(found: Option<usize>) -> i64 {
    found.map(|i| i as i64).unwrap_or(-1)
}

fn unsupported(kind: ValueKind, operator: &str) -> NavError {
    NavError::UnsupportedOperator {
        kind: kind.to_string(),
        operator: operator.to_string(),
    }
}

fn invalid(kind: ValueKind, op: Operator, message: String) -> NavError {
    NavError::InvalidOperand {
        kind: kind.to_string(),
        operator: op.name().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> ConditionValue {
        ConditionValue::from(s)
    }

    fn int(n: i64) -> ConditionValue {
        ConditionValue::Integer(n)
    }

    #[test]
    fn test_integer_comparisons() {
        let five = ConditionValue::Integer(5);
        assert_eq!(evaluate(&five, &int(3), ">").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&five, &int(5), "<").unwrap(), EvalResult::Bool(false));
        assert_eq!(evaluate(&five, &int(5), ">=").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&five, &int(6), "<=").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&five, &text("5"), "==").unwrap(), EvalResult::Bool(true));
    }

    #[test]
    fn test_integer_rejects_non_numeric_operand() {
        let err = evaluate(&ConditionValue::Integer(1), &text("abc"), ">").unwrap_err();
        assert!(matches!(err, NavError::InvalidOperand { .. }));
    }

    #[test]
    fn test_text_operators() {
        let title = text("Live TV Guide");
        assert!(evaluate(&title, &text("Guide"), "contains").unwrap().as_bool().unwrap());
        assert!(evaluate(&title, &text("Movies"), "does-not-contain").unwrap().as_bool().unwrap());
        assert!(!evaluate(&title, &text("live tv guide"), "==").unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_list_contains_and_index_of() {
        let list = ConditionValue::from(vec!["a", "b", "c"]);
        assert_eq!(evaluate(&list, &text("b"), "contains").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&list, &text("z"), "does_not_contain").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&list, &text("c"), "index_of").unwrap(), EvalResult::Integer(2));
        assert_eq!(evaluate(&list, &text("z"), "index_of").unwrap(), EvalResult::Integer(-1));
        assert_eq!(
            evaluate(&list, &ConditionValue::from(vec!["a", "b", "c"]), "==").unwrap(),
            EvalResult::Bool(true)
        );
    }

    #[test]
    fn test_map_operators() {
        let map = ConditionValue::map(vec![("x", ConditionValue::Integer(1)), ("y", ConditionValue::Integer(2))]);
        assert_eq!(evaluate(&map, &text("x"), "contains_key").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&map, &text("z"), "lacks_key").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&map, &int(2), "contains_value").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&map, &int(3), "lacks_value").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&map, &text("y"), "index_of_key").unwrap(), EvalResult::Integer(1));
    }

    #[test]
    fn test_map_equality_ignores_insertion_order() {
        let left = ConditionValue::try_from(json!({"a": 1, "b": 2})).unwrap();
        let reordered = ConditionValue::try_from(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(evaluate(&left, &reordered, "==").unwrap(), EvalResult::Bool(true));
        // Order still defines key positions.
        assert_eq!(evaluate(&left, &text("b"), "index_of_key").unwrap(), EvalResult::Integer(1));
        assert_eq!(evaluate(&reordered, &text("b"), "index_of_key").unwrap(), EvalResult::Integer(0));

        let other = ConditionValue::try_from(json!({"a": 1, "b": 3})).unwrap();
        assert_eq!(evaluate(&left, &other, "==").unwrap(), EvalResult::Bool(false));
        let shorter = ConditionValue::try_from(json!({"a": 1})).unwrap();
        assert_eq!(evaluate(&left, &shorter, "==").unwrap(), EvalResult::Bool(false));
    }

    #[test]
    fn test_nested_maps_compare_by_content() {
        let list = ConditionValue::try_from(json!([{"id": 7, "name": "guide"}, "tail"])).unwrap();
        let needle = ConditionValue::try_from(json!({"name": "guide", "id": 7})).unwrap();
        assert_eq!(evaluate(&list, &needle, "contains").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&list, &needle, "index_of").unwrap(), EvalResult::Integer(0));
        let reordered = ConditionValue::try_from(json!([{"name": "guide", "id": 7}, "tail"])).unwrap();
        assert_eq!(evaluate(&list, &reordered, "==").unwrap(), EvalResult::Bool(true));

        let outer = ConditionValue::try_from(json!({"tile": {"x": 1, "y": 2}})).unwrap();
        let value = ConditionValue::try_from(json!({"y": 2, "x": 1})).unwrap();
        assert_eq!(evaluate(&outer, &value, "contains_value").unwrap(), EvalResult::Bool(true));
        assert_eq!(evaluate(&outer, &value, "lacks_value").unwrap(), EvalResult::Bool(false));
    }

    #[test]
    fn test_index_of_key_absent() {
        let map = ConditionValue::map(vec![("x", ConditionValue::Integer(1))]);
        assert_eq!(evaluate(&map, &text("y"), "index_of_key").unwrap(), EvalResult::Integer(-1));
    }

    #[test]
    fn test_unsupported_operator_names_kind_and_operator() {
        let err = evaluate(&text("abc"), &text("a"), ">").unwrap_err();
        match err {
            NavError::UnsupportedOperator { kind, operator } => {
                assert_eq!(kind, "text");
                assert_eq!(operator, ">");
            }
            other => panic!("expected UnsupportedOperator, got {other:?}"),
        }

        let err = evaluate(&ConditionValue::Integer(1), &int(1), "starts_with").unwrap_err();
        assert!(matches!(err, NavError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_from_json_preserves_key_order() {
        let value = ConditionValue::try_from(json!({"zeta": 1, "alpha": 2})).unwrap();
        assert_eq!(evaluate(&value, &text("zeta"), "index_of_key").unwrap(), EvalResult::Integer(0));
        assert!(ConditionValue::try_from(json!(1.5)).is_err());
        assert!(ConditionValue::try_from(json!(null)).is_err());
    }

    #[test]
    fn test_catalogue() {
        let list_ops = supported_operators(ValueKind::List);
        assert_eq!(list_ops.len(), 4);
        let index_of = list_ops.iter().find(|i| i.operator == Operator::IndexOf).unwrap();
        assert_eq!(index_of.result, ResultKind::Integer);
        assert_eq!(supported_operators(ValueKind::Integer).len(), 5);
        assert_eq!(supported_operators(ValueKind::Map).len(), 6);
        assert_eq!(ValueKind::parse("dict"), Some(ValueKind::Map));
    }
}
