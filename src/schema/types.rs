//! Node type definitions and declarative completion rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A named topic schema collected during the dialogue (e.g. "Income").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    /// Node name, used as the key in snapshots and the frontier.
    pub name: String,
    /// Short description surfaced to advisors.
    pub description: String,
    /// Declared fields in presentation order.
    pub fields: Vec<FieldDef>,
    /// Minimal-completion rule.
    pub spec: CollectionSpec,
}

/// A single field on a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: String,
    /// Mapping-valued field whose entries accumulate across turns.
    #[serde(default)]
    pub portfolio: bool,
}

/// Declarative minimal-completion rule for a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Every one of these must be answered.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// At least one of these must be answered (ignored when empty).
    #[serde(default)]
    pub require_any_of: Vec<String>,
    /// Extra requirements triggered by already-answered values.
    #[serde(default)]
    pub conditional_rules: Vec<ConditionalRule>,
    /// Follow-up subfields for portfolio entries. Never block completion.
    #[serde(default)]
    pub detail_subfields: Vec<DetailRequirement>,
}

/// `if <if_field> <operator> <expected> then require <then_require>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub if_field: String,
    pub operator: Operator,
    pub expected: Value,
    pub then_require: Vec<String>,
}

/// Detail subfields expected on each entry of a portfolio field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRequirement {
    pub portfolio_field: String,
    pub subfields: Vec<DetailSubfield>,
}

/// One subfield of a portfolio entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailSubfield {
    pub name: String,
    pub description: String,
    /// Entry keys this subfield applies to; `None` means every entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<Vec<String>>,
}

/// Comparison operators usable in conditional rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "truthy")]
    Truthy,
}

impl Operator {
    /// Wire representation of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Truthy => "truthy",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            "in" => Ok(Operator::In),
            "not_in" => Ok(Operator::NotIn),
            "truthy" => Ok(Operator::Truthy),
            other => Err(format!("Unknown operator: {}", other)),
        }
    }
}

impl FieldDef {
    /// Plain scalar or list field.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            portfolio: false,
        }
    }

    /// Mapping-valued field (entry key to amount or entry details).
    pub fn portfolio(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            portfolio: true,
            ..Self::new(name, description)
        }
    }
}

impl DetailSubfield {
    /// Subfield that applies to every portfolio entry.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            applies_to: None,
        }
    }

    /// Restrict the subfield to the given entry keys.
    pub fn only_for(mut self, keys: &[&str]) -> Self {
        self.applies_to = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Whether this subfield is expected on the entry with `entry_key`.
    pub fn applies(&self, entry_key: &str) -> bool {
        match &self.applies_to {
            Some(keys) if !keys.is_empty() => keys.iter().any(|k| k == entry_key),
            _ => true,
        }
    }
}

impl CollectionSpec {
    /// Spec requiring every listed field.
    pub fn required(fields: &[&str]) -> Self {
        Self {
            required_fields: to_strings(fields),
            ..Self::default()
        }
    }

    /// Spec requiring at least one of the listed fields.
    pub fn any_of(fields: &[&str]) -> Self {
        Self {
            require_any_of: to_strings(fields),
            ..Self::default()
        }
    }

    /// Add a conditional rule.
    pub fn with_rule(
        mut self,
        if_field: &str,
        operator: Operator,
        expected: Value,
        then_require: &[&str],
    ) -> Self {
        self.conditional_rules.push(ConditionalRule {
            if_field: if_field.to_string(),
            operator,
            expected,
            then_require: to_strings(then_require),
        });
        self
    }

    /// Declare detail subfields for a portfolio field.
    pub fn with_details(mut self, portfolio_field: &str, subfields: Vec<DetailSubfield>) -> Self {
        self.detail_subfields.push(DetailRequirement {
            portfolio_field: portfolio_field.to_string(),
            subfields,
        });
        self
    }

    /// Field the dialogue should ask first when no explicit field is given.
    pub fn first_field(&self) -> Option<&str> {
        self.required_fields
            .first()
            .or_else(|| self.require_any_of.first())
            .map(String::as_str)
    }
}

impl NodeType {
    /// Create a node type.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        fields: Vec<FieldDef>,
        spec: CollectionSpec,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields,
            spec,
        }
    }

    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is a declared field of this node.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Description of a field or dotted detail path, if known.
    pub fn describe(&self, path: &str) -> Option<&str> {
        let mut parts = path.splitn(3, '.');
        let head = parts.next()?;
        match (parts.next(), parts.next()) {
            (Some(_entry), Some(sub)) => self
                .spec
                .detail_subfields
                .iter()
                .filter(|d| d.portfolio_field == head)
                .flat_map(|d| d.subfields.iter())
                .find(|s| s.name == sub)
                .map(|s| s.description.as_str()),
            _ => self.field(head).map(|f| f.description.as_str()),
        }
    }

    /// Field asked first when an advisor targets the node without a field.
    pub fn default_question_field(&self) -> Option<&str> {
        self.spec
            .first_field()
            .or_else(|| self.fields.first().map(|f| f.name.as_str()))
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
