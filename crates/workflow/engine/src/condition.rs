//! Branch condition evaluation for Decision nodes
//!
//! Predicates are evaluated against the instance's string context.
//! It is a deliberately small language: equality, inequality, numeric
//! comparison, and bare boolean variables. Evaluation is pure; it never
//! mutates the context or produces side effects.

use limsflow_types::WorkflowNode;
use std::collections::HashMap;

/// Evaluates Decision predicates against an instance context
#[derive(Clone, Debug, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Pick the branch label for a Decision node: conditions are tried
    /// in authored order and the first whose predicate holds wins.
    /// Returns `None` when no predicate matches.
    pub fn select_branch<'a>(
        &self,
        node: &'a WorkflowNode,
        context: &HashMap<String, String>,
    ) -> Option<&'a str> {
        node.conditions
            .iter()
            .find(|c| self.evaluate(&c.predicate, context))
            .map(|c| c.target_label.as_str())
    }

    /// Evaluate a single predicate.
    ///
    /// Supported forms:
    /// - `key == value`
    /// - `key != value` (true when the key is absent)
    /// - `key >= n`, `key > n`, `key <= n`, `key < n` (numeric)
    /// - `key` (bare variable, true for "true" or "1")
    /// - the literal `true`
    pub fn evaluate(&self, predicate: &str, context: &HashMap<String, String>) -> bool {
        let predicate = predicate.trim();

        if predicate == "true" {
            return true;
        }

        if let Some((key, value)) = predicate.split_once("==") {
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            return context.get(key).map(|actual| actual == value).unwrap_or(false);
        }

        if let Some((key, value)) = predicate.split_once("!=") {
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            // Absent key is unequal to any value.
            return context.get(key).map(|actual| actual != value).unwrap_or(true);
        }

        // Order matters: check the two-character operators before their
        // one-character prefixes.
        for (op, cmp) in [
            (">=", Ordering::GreaterEq),
            ("<=", Ordering::LessEq),
            (">", Ordering::Greater),
            ("<", Ordering::Less),
        ] {
            if let Some((key, value)) = predicate.split_once(op) {
                return self.compare_numeric(key.trim(), value.trim(), cmp, context);
            }
        }

        // Bare boolean variable.
        context
            .get(predicate)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }

    fn compare_numeric(
        &self,
        key: &str,
        value: &str,
        cmp: Ordering,
        context: &HashMap<String, String>,
    ) -> bool {
        let (Some(actual), Ok(threshold)) = (context.get(key), value.parse::<f64>()) else {
            return false;
        };
        let Ok(actual) = actual.parse::<f64>() else {
            return false;
        };
        match cmp {
            Ordering::GreaterEq => actual >= threshold,
            Ordering::LessEq => actual <= threshold,
            Ordering::Greater => actual > threshold,
            Ordering::Less => actual < threshold,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Ordering {
    GreaterEq,
    LessEq,
    Greater,
    Less,
}

#[cfg(test)]
mod tests {
    use super::*;
    use limsflow_types::WorkflowNode;

    fn ctx(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality() {
        let eval = ConditionEvaluator::new();
        let context = ctx(&[("status", "pass")]);
        assert!(eval.evaluate("status == pass", &context));
        assert!(eval.evaluate("status == \"pass\"", &context));
        assert!(!eval.evaluate("status == fail", &context));
        assert!(!eval.evaluate("missing == pass", &context));
    }

    #[test]
    fn test_inequality_with_absent_key() {
        let eval = ConditionEvaluator::new();
        let context = ctx(&[("status", "pass")]);
        assert!(eval.evaluate("status != fail", &context));
        assert!(!eval.evaluate("status != pass", &context));
        assert!(eval.evaluate("missing != anything", &context));
    }

    #[test]
    fn test_numeric_comparisons() {
        let eval = ConditionEvaluator::new();
        let context = ctx(&[("purity", "99.2")]);
        assert!(eval.evaluate("purity >= 98", &context));
        assert!(eval.evaluate("purity > 99", &context));
        assert!(eval.evaluate("purity <= 100", &context));
        assert!(!eval.evaluate("purity < 99", &context));
        assert!(!eval.evaluate("purity >= not_a_number", &context));
    }

    #[test]
    fn test_bare_boolean_and_literal() {
        let eval = ConditionEvaluator::new();
        let context = ctx(&[("expedited", "true"), ("flagged", "0")]);
        assert!(eval.evaluate("expedited", &context));
        assert!(!eval.evaluate("flagged", &context));
        assert!(!eval.evaluate("missing", &context));
        assert!(eval.evaluate("true", &ctx(&[])));
    }

    #[test]
    fn test_first_matching_branch_wins() {
        let eval = ConditionEvaluator::new();
        let node = WorkflowNode::decision("route", "Route")
            .with_condition("score >= 90", "auto-release")
            .with_condition("score >= 60", "review")
            .with_condition("true", "reject");

        assert_eq!(
            eval.select_branch(&node, &ctx(&[("score", "95")])),
            Some("auto-release")
        );
        assert_eq!(
            eval.select_branch(&node, &ctx(&[("score", "70")])),
            Some("review")
        );
        assert_eq!(
            eval.select_branch(&node, &ctx(&[("score", "10")])),
            Some("reject")
        );
    }

    #[test]
    fn test_no_branch_matches() {
        let eval = ConditionEvaluator::new();
        let node = WorkflowNode::decision("route", "Route")
            .with_condition("status == pass", "ship")
            .with_condition("status == fail", "retest");
        assert_eq!(eval.select_branch(&node, &ctx(&[("status", "hold")])), None);
        assert_eq!(eval.select_branch(&node, &ctx(&[])), None);
    }
}
