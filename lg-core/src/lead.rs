use crate::error::{LeadError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Fields consulted, in priority order, when a lead is referenced by identifier.
pub const SOFT_KEY_FIELDS: [&str; 3] = ["name", "email", "company"];

/// Ordered, unique field names shared by every lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(Vec<String>);

impl Template {
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for (idx, field) in fields.into_iter().enumerate() {
            let field = field.into().trim().to_string();
            if field.is_empty() {
                return Err(LeadError::BlankField(idx + 1));
            }
            if out.contains(&field) {
                return Err(LeadError::DuplicateField(field));
            }
            out.push(field);
        }
        if out.is_empty() {
            return Err(LeadError::EmptyTemplate);
        }
        Ok(Self(out))
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One lead record: field name to cell value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lead(IndexMap<String, String>);

impl Lead {
    pub fn new(fields: IndexMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Overwrites an existing field in place or appends a new one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.0
    }

    pub fn matches_soft_key(&self, identifier: &str) -> bool {
        SOFT_KEY_FIELDS
            .iter()
            .any(|field| self.get(field) == Some(identifier))
    }

    /// Dedup identity. Template fields come first in template order, then any extra
    /// fields in insertion order.
    pub fn canonical_key(&self, template: Option<&Template>) -> String {
        let pair = |(k, v): (&String, &String)| {
            serde_json::Value::Array(vec![k.as_str().into(), v.as_str().into()])
        };
        let pairs: Vec<serde_json::Value> = match template {
            Some(template) => template
                .fields()
                .iter()
                .filter_map(|f| self.0.get_key_value(f))
                .chain(
                    self.0
                        .iter()
                        .filter(|(k, _)| !template.fields().contains(k)),
                )
                .map(pair)
                .collect(),
            None => self.0.iter().map(pair).collect(),
        };
        serde_json::Value::Array(pairs).to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Lead {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Maps positional cell rows onto the template. Missing cells become empty strings and
/// cells past the last template column are dropped.
pub fn rows_to_leads(template: &Template, rows: &[Vec<String>]) -> Vec<Lead> {
    rows.iter()
        .map(|row| {
            template
                .fields()
                .iter()
                .enumerate()
                .map(|(idx, field)| (field.clone(), row.get(idx).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}
