use indexmap::IndexMap;
use serde::Deserialize;

/// One conditional routing directive, evaluated against an inbound request in
/// declaration order. The first rule whose `when` predicates all match wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRule {
    #[serde(default)]
    pub when: RoutingPredicate,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub config: IndexMap<String, ConfigPatchNode>,
}

/// ANDed predicate set. A predicate that is absent matches anything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RoutingPredicate {
    pub system_regex: Option<String>,
    pub user_regex: Option<String>,
    pub model_regex: Option<String>,
    pub has_tool: Option<String>,
    pub header: IndexMap<String, String>,
}

/// A node in a (possibly nested) config patch tree, e.g. `reasoning.effort`.
///
/// Variant order matters: a map with exactly `{value, when}` is a conditional
/// leaf; any other map is a nested branch; anything else is a bare leaf value
/// that is always applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConfigPatchNode {
    Conditional(ConditionalEntry),
    Branch(IndexMap<String, ConfigPatchNode>),
    Bare(serde_json::Value),
}

/// A config leaf whose application is gated on the current value at that path.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalEntry {
    pub value: serde_json::Value,
    pub when: WhenCondition,
}

/// Exactly one of these is expected to be set by config authors; `evaluate`
/// ANDs whichever are present so a malformed config fails closed rather than
/// panicking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WhenCondition {
    pub current_in: Option<Vec<serde_json::Value>>,
    pub current_not_in: Option<Vec<serde_json::Value>>,
    pub current_equals: Option<serde_json::Value>,
    pub current_not_equals: Option<serde_json::Value>,
}

impl WhenCondition {
    /// Evaluates this condition against the current value at the patch target
    /// path. A missing path is represented as `serde_json::Value::Null`.
    pub fn evaluate(&self, current: &serde_json::Value) -> bool {
        let mut matched = true;

        if let Some(list) = &self.current_in {
            matched &= list.contains(current);
        }
        if let Some(list) = &self.current_not_in {
            matched &= !list.contains(current);
        }
        if let Some(expected) = &self.current_equals {
            matched &= current == expected;
        }
        if let Some(expected) = &self.current_not_equals {
            matched &= current != expected;
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[test]
    fn conditional_leaf_parses_distinctly_from_branch() {
        let yaml = indoc! {r#"
            reasoning:
              effort:
                value: medium
                when:
                  current_in: [null, low, minimum]
        "#};

        let config: IndexMap<String, ConfigPatchNode> = serde_yaml::from_str(yaml).unwrap();
        let ConfigPatchNode::Branch(reasoning) = &config["reasoning"] else {
            panic!("expected a branch node");
        };
        let ConfigPatchNode::Conditional(entry) = &reasoning["effort"] else {
            panic!("expected a conditional leaf");
        };

        assert_eq!(entry.value, json!("medium"));
        assert!(entry.when.evaluate(&serde_json::Value::Null));
        assert!(!entry.when.evaluate(&json!("high")));
    }

    #[test]
    fn bare_leaf_is_always_applied() {
        let yaml = "model: gpt-5\n";
        let config: IndexMap<String, ConfigPatchNode> = serde_yaml::from_str(yaml).unwrap();
        let ConfigPatchNode::Bare(value) = &config["model"] else {
            panic!("expected a bare leaf");
        };
        assert_eq!(value, &json!("gpt-5"));
    }

    #[test]
    fn null_in_list_matches_absent_value() {
        let cond = WhenCondition {
            current_in: Some(vec![serde_json::Value::Null, json!("low")]),
            ..Default::default()
        };

        assert!(cond.evaluate(&serde_json::Value::Null));
        assert!(cond.evaluate(&json!("low")));
        assert!(!cond.evaluate(&json!("high")));
    }
}
