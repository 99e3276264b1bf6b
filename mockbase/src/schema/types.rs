use crate::record::Record;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// One resource definition file: schema, relationships, bookkeeping and seeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub has_one: Vec<String>,
    #[serde(default)]
    pub has_many: Vec<String>,
    /// Last id handed out for this resource.
    #[serde(default)]
    pub current_id: u64,
    #[serde(default)]
    pub seeds: Vec<Record>,
}

/// Definition of a single column.
///
/// Besides the declared attributes, a column carries the compiled form of its
/// pattern and the set of values currently in use when it is unique. Both are
/// runtime state and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub unique: bool,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub regexp_pattern: Option<String>,
    #[serde(skip)]
    pub(crate) compiled_pattern: Option<Regex>,
    #[serde(skip)]
    pub(crate) unique_values: HashSet<String>,
}

/// Column type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Number,
    String,
    Array,
    Object,
    #[serde(untagged)]
    Unsupported(std::string::String),
}

impl ColumnType {
    pub const SUPPORTED: [&'static str; 5] = ["boolean", "number", "string", "array", "object"];

    pub fn name(&self) -> &str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Array => "array",
            ColumnType::Object => "object",
            ColumnType::Unsupported(name) => name,
        }
    }
}

// Definition files may write `"regexp_pattern": ""` to mean "no pattern".
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}
