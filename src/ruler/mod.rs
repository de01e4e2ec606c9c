//! Rule engine
//!
//! Rulesets are compiled into an engine expression and evaluated against a
//! projected attribute map. The filter only talks to the [`RuleEngine`] trait;
//! [`Ruler`] is the built-in implementation.
//!
//! Compilation happens in two steps: the ruleset's rule list is serialized into
//! the engine's JSON document form (an array of `comparator`/`path`/`value`
//! objects), then the engine parses that document into conditions. All
//! conditions of an expression must hold for it to match.

mod condition;

pub use condition::{Comparator, Condition};

use crate::attributes::AttributeMap;
use crate::error::{Result, ServiceRulesError};
use crate::signatures::DiscoveryRuleset;
use condition::RuleSpec;
use serde_json::Value;

/// Narrow interface between the filter and an evaluation engine
pub trait RuleEngine: Send + Sync {
    type Expression;

    /// Turn a ruleset into an evaluable expression
    fn compile(&self, ruleset: &DiscoveryRuleset) -> Result<Self::Expression>;

    /// Test an expression against a fact base
    fn evaluate(&self, expression: &Self::Expression, facts: &AttributeMap) -> Result<bool>;
}

/// Compiled conjunction of conditions
#[derive(Debug, Clone)]
pub struct Expression {
    ruleset: String,
    conditions: Vec<Condition>,
}

impl Expression {
    /// Parse an engine document
    pub fn from_document(ruleset: &str, document: Value) -> Result<Self> {
        let evaluation_error = |message: String| ServiceRulesError::Evaluation {
            ruleset: ruleset.to_string(),
            message,
        };

        let specs: Vec<RuleSpec> =
            serde_json::from_value(document).map_err(|e| evaluation_error(e.to_string()))?;

        let conditions = specs
            .into_iter()
            .map(Condition::compile)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(evaluation_error)?;

        Ok(Self {
            ruleset: ruleset.to_string(),
            conditions,
        })
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// An empty expression matches every instance
    pub fn test(&self, facts: &AttributeMap) -> Result<bool> {
        for condition in &self.conditions {
            let passed = condition
                .test(facts)
                .map_err(|message| ServiceRulesError::Evaluation {
                    ruleset: self.ruleset.clone(),
                    message,
                })?;
            if !passed {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Built-in comparator engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Ruler;

impl Ruler {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEngine for Ruler {
    type Expression = Expression;

    fn compile(&self, ruleset: &DiscoveryRuleset) -> Result<Expression> {
        let document =
            serde_json::to_value(&ruleset.rules).map_err(|e| ServiceRulesError::RuleCompilation {
                ruleset: ruleset.name.clone(),
                source: e,
            })?;

        Expression::from_document(&ruleset.name, document)
    }

    fn evaluate(&self, expression: &Expression, facts: &AttributeMap) -> Result<bool> {
        expression.test(facts)
    }
}
