//! Permission evaluation.
//!
//! A pure function from (access level, operation, context, rules) to a
//! verdict: no hidden state, no I/O, identical inputs always produce the
//! same output. Operations are classified into read/write/admin categories
//! lexically, by the verbs appearing in the operation name, so new resource
//! types are covered without per-resource tables.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Coarse capability tier bound to a credential and copied into sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    /// Read-category operations only.
    #[default]
    ReadOnly,
    /// Read and write categories.
    ReadWrite,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::ReadOnly => "read-only",
            AccessLevel::ReadWrite => "read-write",
        }
    }
}

/// Lexical category of an operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationCategory {
    Read,
    Write,
    Admin,
    /// No known verb found. Always denied.
    Unknown,
}

const READ_VERBS: &[&str] = &["get", "list", "read", "view", "status"];
const WRITE_VERBS: &[&str] = &[
    "create", "add", "update", "edit", "delete", "remove", "post", "put",
];
const ADMIN_VERBS: &[&str] = &["restart", "backup", "restore", "config", "system"];

/// Classify an operation by the verbs in its name.
///
/// When verbs from several categories appear (e.g. `get_system_status`),
/// the most privileged category wins. An ambiguous name can only require
/// more privilege, never less.
pub fn classify(operation: &str) -> OperationCategory {
    let op = operation.to_ascii_lowercase();
    if ADMIN_VERBS.iter().any(|v| op.contains(v)) {
        OperationCategory::Admin
    } else if WRITE_VERBS.iter().any(|v| op.contains(v)) {
        OperationCategory::Write
    } else if READ_VERBS.iter().any(|v| op.contains(v)) {
        OperationCategory::Read
    } else {
        OperationCategory::Unknown
    }
}

/// Comparison operator for a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
    Regex,
}

/// A single contextual condition attached to a permission rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Context attribute the condition inspects.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: String,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate against the request context. A missing attribute or an
    /// invalid regex pattern fails the condition (fail-closed).
    fn holds(&self, context: &RequestContext) -> bool {
        let Some(actual) = context.attributes.get(&self.field) else {
            return false;
        };
        match self.operator {
            ConditionOperator::Equals => actual == &self.value,
            ConditionOperator::StartsWith => actual.starts_with(&self.value),
            ConditionOperator::EndsWith => actual.ends_with(&self.value),
            ConditionOperator::Contains => actual.contains(&self.value),
            ConditionOperator::Regex => Regex::new(&self.value)
                .map(|re| re.is_match(actual))
                .unwrap_or(false),
        }
    }
}

/// Declarative grant: resource (exact name or `*`), a set of operation
/// names (or `*`), and optional conditions that must all hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub resource: String,
    pub actions: HashSet<String>,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

impl PermissionRule {
    pub fn new<I, S>(resource: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource: resource.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Resource match AND action match AND every condition true.
    fn matches(&self, operation: &str, context: Option<&RequestContext>) -> bool {
        let resource_ok = self.resource == "*"
            || context.map(|c| c.resource == self.resource).unwrap_or(false);
        if !resource_ok {
            return false;
        }

        let action_ok = self.actions.contains("*") || self.actions.contains(operation);
        if !action_ok {
            return false;
        }

        if self.conditions.is_empty() {
            return true;
        }
        match context {
            Some(ctx) => self.conditions.iter().all(|c| c.holds(ctx)),
            None => false,
        }
    }
}

/// Contextual facts about the request under evaluation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Resource the operation targets, e.g. `domain` or `mailbox`.
    pub resource: String,
    pub attributes: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a permission evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    fn denied(reason: impl Into<String>) -> Self {
        Verdict::Denied {
            reason: reason.into(),
        }
    }
}

/// Decide whether `level` may perform `operation`.
///
/// Category gate first: `read-only` passes read operations, `read-write`
/// passes read and write, admin operations pass only through an explicit
/// rule that lists them. When `rules` is non-empty it further narrows the
/// read/write categories: absence of a matching rule denies.
pub fn evaluate(
    level: AccessLevel,
    operation: &str,
    context: Option<&RequestContext>,
    rules: &[PermissionRule],
) -> Verdict {
    let category = classify(operation);

    match category {
        OperationCategory::Unknown => {
            Verdict::denied(format!("operation '{}' has no recognized category", operation))
        }
        OperationCategory::Admin => {
            // No access level implies admin; the rule is the grant.
            if rules.iter().any(|r| r.matches(operation, context)) {
                Verdict::Allowed
            } else {
                Verdict::denied(format!(
                    "admin operation '{}' requires an explicit rule",
                    operation
                ))
            }
        }
        OperationCategory::Write if level != AccessLevel::ReadWrite => Verdict::denied(format!(
            "operation '{}' requires read-write access, session is {}",
            operation,
            level.as_str()
        )),
        OperationCategory::Read | OperationCategory::Write => {
            if rules.is_empty() || rules.iter().any(|r| r.matches(operation, context)) {
                Verdict::Allowed
            } else {
                Verdict::denied(format!("no permission rule matches '{}'", operation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(classify("list"), OperationCategory::Read);
        assert_eq!(classify("get_domain"), OperationCategory::Read);
        assert_eq!(classify("mailbox_status"), OperationCategory::Read);
        assert_eq!(classify("delete_alias"), OperationCategory::Write);
        assert_eq!(classify("update"), OperationCategory::Write);
        assert_eq!(classify("restart"), OperationCategory::Admin);
        assert_eq!(classify("backup_all"), OperationCategory::Admin);
        assert_eq!(classify("frobnicate"), OperationCategory::Unknown);
    }

    #[test]
    fn test_most_privileged_category_wins() {
        // Both "get" (read) and "system" (admin) appear; admin wins.
        assert_eq!(classify("get_system_status"), OperationCategory::Admin);
        // "view" (read) and "edit" (write); write wins.
        assert_eq!(classify("view_and_edit"), OperationCategory::Write);
    }

    #[test]
    fn test_access_level_gate() {
        assert!(evaluate(AccessLevel::ReadOnly, "list", None, &[]).is_allowed());
        assert!(!evaluate(AccessLevel::ReadOnly, "delete", None, &[]).is_allowed());
        assert!(evaluate(AccessLevel::ReadWrite, "delete", None, &[]).is_allowed());
        assert!(!evaluate(AccessLevel::ReadWrite, "restart", None, &[]).is_allowed());
    }

    #[test]
    fn test_admin_requires_explicit_rule() {
        let rules = vec![PermissionRule::new("*", ["restart"])];
        assert!(evaluate(AccessLevel::ReadWrite, "restart", None, &rules).is_allowed());
        // A different admin operation is still denied.
        assert!(!evaluate(AccessLevel::ReadWrite, "backup", None, &rules).is_allowed());
    }

    #[test]
    fn test_admin_rule_is_the_grant_for_any_level() {
        // Neither access level implies admin, so the explicit rule alone
        // decides: a read-only session with a matching rule passes, and
        // without one even read-write is denied.
        let rules = vec![PermissionRule::new("*", ["restart"])];
        assert!(evaluate(AccessLevel::ReadOnly, "restart", None, &rules).is_allowed());
        assert!(!evaluate(AccessLevel::ReadOnly, "restart", None, &[]).is_allowed());
        assert!(!evaluate(AccessLevel::ReadWrite, "restart", None, &[]).is_allowed());
        // The rule does not leak into the write category for read-only.
        let write_rule = vec![PermissionRule::new("*", ["update"])];
        assert!(!evaluate(AccessLevel::ReadOnly, "update", None, &write_rule).is_allowed());
    }

    #[test]
    fn test_deny_by_default_with_rules() {
        let rules = vec![PermissionRule::new("domain", ["list"])];
        let domain = RequestContext::new("domain");
        let mailbox = RequestContext::new("mailbox");

        assert!(evaluate(AccessLevel::ReadOnly, "list", Some(&domain), &rules).is_allowed());
        assert!(!evaluate(AccessLevel::ReadOnly, "list", Some(&mailbox), &rules).is_allowed());
        assert!(!evaluate(AccessLevel::ReadOnly, "get", Some(&domain), &rules).is_allowed());
    }

    #[test]
    fn test_wildcard_resource_and_action() {
        let rules = vec![PermissionRule::new("*", ["*"])];
        assert!(evaluate(AccessLevel::ReadWrite, "update", None, &rules).is_allowed());
        // The wildcard rule also satisfies the explicit-rule requirement for
        // admin operations.
        assert!(evaluate(AccessLevel::ReadWrite, "restart", None, &rules).is_allowed());
        // The level gate still applies underneath the rules.
        assert!(!evaluate(AccessLevel::ReadOnly, "update", None, &rules).is_allowed());
    }

    #[test]
    fn test_condition_operators() {
        let ctx = RequestContext::new("domain").with_attribute("name", "mail.example.com");

        let holds = |op, value: &str| {
            RuleCondition::new("name", op, value).holds(&ctx)
        };
        assert!(holds(ConditionOperator::Equals, "mail.example.com"));
        assert!(!holds(ConditionOperator::Equals, "mail.example.org"));
        assert!(holds(ConditionOperator::StartsWith, "mail."));
        assert!(holds(ConditionOperator::EndsWith, ".example.com"));
        assert!(holds(ConditionOperator::Contains, "example"));
        assert!(holds(ConditionOperator::Regex, r"^mail\..+\.com$"));
        assert!(!holds(ConditionOperator::Regex, r"^smtp\."));
    }

    #[test]
    fn test_invalid_regex_fails_closed() {
        let ctx = RequestContext::new("domain").with_attribute("name", "example.com");
        assert!(!RuleCondition::new("name", ConditionOperator::Regex, "(unclosed").holds(&ctx));
    }

    #[test]
    fn test_missing_attribute_fails_condition() {
        let ctx = RequestContext::new("domain");
        assert!(!RuleCondition::new("name", ConditionOperator::Equals, "x").holds(&ctx));
    }

    #[test]
    fn test_conditions_require_context() {
        let rule = PermissionRule::new("*", ["list"]).with_condition(RuleCondition::new(
            "name",
            ConditionOperator::EndsWith,
            ".example.com",
        ));
        // Conditions cannot be satisfied without a context.
        assert!(!evaluate(AccessLevel::ReadOnly, "list", None, &[rule.clone()]).is_allowed());

        let good = RequestContext::new("domain").with_attribute("name", "mail.example.com");
        assert!(evaluate(AccessLevel::ReadOnly, "list", Some(&good), &[rule.clone()]).is_allowed());

        let bad = RequestContext::new("domain").with_attribute("name", "mail.example.org");
        assert!(!evaluate(AccessLevel::ReadOnly, "list", Some(&bad), &[rule]).is_allowed());
    }

    #[test]
    fn test_unknown_operation_denied() {
        let rules = vec![PermissionRule::new("*", ["*"])];
        assert!(!evaluate(AccessLevel::ReadWrite, "frobnicate", None, &rules).is_allowed());
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let rules = vec![PermissionRule::new("domain", ["list", "get"])];
        let ctx = RequestContext::new("domain");
        let first = evaluate(AccessLevel::ReadOnly, "list", Some(&ctx), &rules);
        for _ in 0..10 {
            assert_eq!(first, evaluate(AccessLevel::ReadOnly, "list", Some(&ctx), &rules));
        }
    }
}
