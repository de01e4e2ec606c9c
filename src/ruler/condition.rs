// Single comparator/path/value predicate and its evaluation
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::attributes::AttributeMap;

/// Test kinds understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    In,
    NotIn,
    Matches,
    NotMatches,
    Exists,
    NotExists,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Contains => "contains",
            Self::NotContains => "ncontains",
            Self::In => "in",
            Self::NotIn => "nin",
            Self::Matches => "matches",
            Self::NotMatches => "nmatches",
            Self::Exists => "exists",
            Self::NotExists => "nexists",
        }
    }

    /// Result when the attribute is absent from the fact base
    fn on_missing(&self) -> bool {
        matches!(
            self,
            Self::Neq | Self::NotContains | Self::NotIn | Self::NotMatches | Self::NotExists
        )
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" | "equals" => Ok(Self::Eq),
            "neq" | "not_equals" => Ok(Self::Neq),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "contains" => Ok(Self::Contains),
            "ncontains" => Ok(Self::NotContains),
            "in" => Ok(Self::In),
            "nin" => Ok(Self::NotIn),
            "matches" => Ok(Self::Matches),
            "nmatches" => Ok(Self::NotMatches),
            "exists" => Ok(Self::Exists),
            "nexists" => Ok(Self::NotExists),
            other => Err(format!("unknown comparator '{}'", other)),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of one rule inside an engine document
#[derive(Debug, Deserialize)]
pub(crate) struct RuleSpec {
    pub comparator: String,
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

/// Expected operand, prepared once at compile time
#[derive(Debug, Clone)]
enum Operand {
    None,
    Text(String),
    List(Vec<String>),
    Pattern(Regex),
}

/// Compiled predicate over one attribute
#[derive(Debug, Clone)]
pub struct Condition {
    comparator: Comparator,
    path: String,
    operand: Operand,
}

impl Condition {
    pub(crate) fn compile(spec: RuleSpec) -> Result<Self, String> {
        let comparator: Comparator = spec.comparator.parse()?;
        let path = spec.path;

        let operand = match comparator {
            Comparator::Exists | Comparator::NotExists => Operand::None,
            Comparator::In | Comparator::NotIn => match &spec.value {
                Value::Array(items) => Operand::List(
                    items
                        .iter()
                        .map(|item| {
                            scalar_text(item).map(Cow::into_owned).ok_or_else(|| {
                                format!("'{}' on '{}' expects a list of scalars", comparator, path)
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                _ => {
                    return Err(format!("'{}' on '{}' expects a list value", comparator, path));
                }
            },
            Comparator::Matches | Comparator::NotMatches => {
                let pattern = spec.value.as_str().ok_or_else(|| {
                    format!("'{}' on '{}' expects a string pattern", comparator, path)
                })?;
                let regex = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern for '{}': {}", path, e))?;
                Operand::Pattern(regex)
            }
            _ => {
                let text = scalar_text(&spec.value).ok_or_else(|| {
                    format!("'{}' on '{}' expects a scalar value", comparator, path)
                })?;
                Operand::Text(text.into_owned())
            }
        };

        Ok(Self {
            comparator,
            path,
            operand,
        })
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Test the condition against a fact base
    pub fn test(&self, facts: &AttributeMap) -> Result<bool, String> {
        let fact = match facts.get(&self.path) {
            Some(fact) => fact,
            None => return Ok(self.comparator.on_missing()),
        };

        let actual = scalar_text(fact)
            .ok_or_else(|| format!("attribute '{}' is not a scalar", self.path))?;
        let actual: &str = &actual;

        let result = match (&self.comparator, &self.operand) {
            (Comparator::Exists, _) => true,
            (Comparator::NotExists, _) => false,
            (Comparator::Eq, Operand::Text(expected)) => actual == expected,
            (Comparator::Neq, Operand::Text(expected)) => actual != expected,
            (Comparator::Gt, Operand::Text(expected)) => compare(actual, expected).is_gt(),
            (Comparator::Gte, Operand::Text(expected)) => compare(actual, expected).is_ge(),
            (Comparator::Lt, Operand::Text(expected)) => compare(actual, expected).is_lt(),
            (Comparator::Lte, Operand::Text(expected)) => compare(actual, expected).is_le(),
            (Comparator::Contains, Operand::Text(expected)) => actual.contains(expected.as_str()),
            (Comparator::NotContains, Operand::Text(expected)) => {
                !actual.contains(expected.as_str())
            }
            (Comparator::In, Operand::List(items)) => items.iter().any(|item| item == actual),
            (Comparator::NotIn, Operand::List(items)) => !items.iter().any(|item| item == actual),
            (Comparator::Matches, Operand::Pattern(regex)) => regex.is_match(actual),
            (Comparator::NotMatches, Operand::Pattern(regex)) => !regex.is_match(actual),
            (comparator, _) => {
                return Err(format!(
                    "operand mismatch for '{}' on '{}'",
                    comparator, self.path
                ));
            }
        };

        Ok(result)
    }
}

/// String rendering of a scalar JSON value
fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Numeric ordering when both sides are finite numbers, lexicographic otherwise
fn compare(actual: &str, expected: &str) -> Ordering {
    match (finite_number(actual), finite_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or_else(|| actual.cmp(expected)),
        _ => actual.cmp(expected),
    }
}

// f64 parsing also accepts "NaN", "inf" and "infinity"
fn finite_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::HashMapExt;
    use serde_json::json;

    fn condition(comparator: &str, path: &str, value: Value) -> Condition {
        Condition::compile(RuleSpec {
            comparator: comparator.to_string(),
            path: path.to_string(),
            value,
        })
        .unwrap()
    }

    fn facts() -> AttributeMap {
        let mut facts = AttributeMap::new();
        facts.insert("ContainerImage".to_string(), json!("redis:6"));
        facts.insert("NetworkPrivatePort".to_string(), json!("6379"));
        facts.insert("NetworkPublicPort".to_string(), json!("80"));
        facts
    }

    #[test]
    fn test_equality() {
        let facts = facts();
        assert!(condition("eq", "ContainerImage", json!("redis:6")).test(&facts).unwrap());
        assert!(condition("equals", "ContainerImage", json!("redis:6")).test(&facts).unwrap());
        assert!(!condition("eq", "ContainerImage", json!("postgres:13")).test(&facts).unwrap());
        assert!(condition("neq", "ContainerImage", json!("postgres:13")).test(&facts).unwrap());
    }

    #[test]
    fn test_numeric_value_matches_string_fact() {
        let facts = facts();
        assert!(condition("eq", "NetworkPrivatePort", json!(6379)).test(&facts).unwrap());
    }

    #[test]
    fn test_ordering_is_numeric_for_numbers() {
        let facts = facts();
        // "80" < "6379" lexicographically would be false
        assert!(condition("lt", "NetworkPublicPort", json!(6379)).test(&facts).unwrap());
        assert!(condition("gte", "NetworkPrivatePort", json!("6379")).test(&facts).unwrap());
        assert!(!condition("gt", "NetworkPrivatePort", json!("6379")).test(&facts).unwrap());
    }

    #[test]
    fn test_non_finite_text_orders_lexicographically() {
        let mut facts = facts();
        facts.insert("ContainerLabel-version".to_string(), json!("NaN"));
        facts.insert("ContainerLabel-limit".to_string(), json!("inf"));

        let check = |comparator: &str, path: &str| {
            condition(comparator, path, json!("5")).test(&facts).unwrap()
        };

        // "NaN" > "5" as text
        assert!(check("gte", "ContainerLabel-version"));
        assert!(check("gt", "ContainerLabel-version"));
        assert!(!check("lte", "ContainerLabel-version"));
        assert!(!check("lt", "ContainerLabel-version"));
        assert!(!check("eq", "ContainerLabel-version"));

        assert!(check("gt", "ContainerLabel-limit"));
        assert!(!check("lte", "ContainerLabel-limit"));
    }

    #[test]
    fn test_contains_membership_and_regex() {
        let facts = facts();
        assert!(condition("contains", "ContainerImage", json!("redis")).test(&facts).unwrap());
        assert!(condition("ncontains", "ContainerImage", json!("mysql")).test(&facts).unwrap());
        assert!(condition("in", "NetworkPrivatePort", json!([6379, "6380"]))
            .test(&facts)
            .unwrap());
        assert!(condition("nin", "NetworkPrivatePort", json!(["5432"]))
            .test(&facts)
            .unwrap());
        assert!(condition("matches", "ContainerImage", json!(r"^redis(:\d+)?$"))
            .test(&facts)
            .unwrap());
        assert!(!condition("nmatches", "ContainerImage", json!("^redis"))
            .test(&facts)
            .unwrap());
    }

    #[test]
    fn test_missing_attribute() {
        let facts = facts();
        assert!(!condition("eq", "ContainerLabel-app", json!("x")).test(&facts).unwrap());
        assert!(condition("neq", "ContainerLabel-app", json!("x")).test(&facts).unwrap());
        assert!(!condition("exists", "ContainerLabel-app", Value::Null).test(&facts).unwrap());
        assert!(condition("nexists", "ContainerLabel-app", Value::Null).test(&facts).unwrap());
        assert!(condition("exists", "ContainerImage", Value::Null).test(&facts).unwrap());
    }

    #[test]
    fn test_rejected_rules() {
        let compile = |comparator: &str, value: Value| {
            Condition::compile(RuleSpec {
                comparator: comparator.to_string(),
                path: "ContainerImage".to_string(),
                value,
            })
        };

        assert!(compile("approximately", json!("redis"))
            .unwrap_err()
            .contains("unknown comparator"));
        assert!(compile("matches", json!("(unclosed")).is_err());
        assert!(compile("in", json!("redis")).is_err());
        assert!(compile("eq", json!({"nested": true})).is_err());
        assert!(compile("eq", Value::Null).is_err());
    }

    #[test]
    fn test_non_scalar_fact_is_an_error() {
        let mut facts = AttributeMap::new();
        facts.insert("ContainerImage".to_string(), json!(["redis"]));
        let result = condition("eq", "ContainerImage", json!("redis")).test(&facts);
        assert!(result.is_err());
    }
}
