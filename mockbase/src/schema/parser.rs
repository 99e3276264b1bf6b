use crate::error::{MockbaseError, Result};
use super::types::ResourceDefinition;
use std::path::Path;

/// Serialization format of a definition file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Json,
    Yaml,
}

impl DefinitionFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(DefinitionFormat::Json),
            Some("yaml") | Some("yml") => Some(DefinitionFormat::Yaml),
            _ => None,
        }
    }
}

/// Parse a definition file, returning it together with the format it was written in
pub fn parse_definition(path: &Path) -> Result<(ResourceDefinition, DefinitionFormat)> {
    let format = DefinitionFormat::from_path(path).ok_or_else(|| {
        MockbaseError::Schema(format!(
            "unsupported definition file extension: {}",
            path.display()
        ))
    })?;
    let content = std::fs::read_to_string(path)?;
    let definition = parse_definition_str(&content, format).map_err(|e| {
        MockbaseError::Schema(format!("{}: {e}", path.display()))
    })?;
    Ok((definition, format))
}

/// Parse a definition from a string in the given format
pub fn parse_definition_str(content: &str, format: DefinitionFormat) -> Result<ResourceDefinition> {
    let definition = match format {
        DefinitionFormat::Json => serde_json::from_str(content)?,
        DefinitionFormat::Yaml => serde_yaml::from_str(content)?,
    };
    Ok(definition)
}

/// Render a definition in the given format
pub fn encode_definition(definition: &ResourceDefinition, format: DefinitionFormat) -> Result<String> {
    Ok(match format {
        DefinitionFormat::Json => serde_json::to_string_pretty(definition)?,
        DefinitionFormat::Yaml => serde_yaml::to_string(definition)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    const USERS_JSON: &str = r#"{
        "resource_name": "users",
        "columns": [
            { "name": "id", "type": "number" },
            { "name": "name", "type": "string", "regexp_pattern": "[A-z]|[0-9]", "unique": true },
            { "name": "phone", "type": "string", "regexp_pattern": "" },
            { "name": "age", "type": "number" }
        ],
        "has_many": ["books"],
        "has_one": ["avatars"],
        "current_id": 1,
        "seeds": [ { "id": 1, "name": "Frank", "phone": "13213213213", "age": 22 } ]
    }"#;

    #[test]
    fn test_parse_json_definition() {
        let def = parse_definition_str(USERS_JSON, DefinitionFormat::Json).unwrap();
        assert_eq!(def.resource_name, "users");
        assert_eq!(def.columns.len(), 4);
        assert_eq!(def.columns[1].column_type, Some(ColumnType::String));
        assert!(def.columns[1].unique);
        assert_eq!(def.columns[1].regexp_pattern.as_deref(), Some("[A-z]|[0-9]"));
        assert_eq!(def.columns[2].regexp_pattern, None);
        assert_eq!(def.has_many, vec!["books"]);
        assert_eq!(def.current_id, 1);
        assert_eq!(def.seeds[0].id().unwrap(), 1);
    }

    #[test]
    fn test_parse_yaml_definition() {
        let yaml = r#"
resource_name: books
columns:
  - { name: id, type: number }
  - { name: title, type: string }
  - { name: user_id, type: number }
current_id: 1
seeds:
  - { id: 1, title: The Little Prince, user_id: 1 }
"#;
        let def = parse_definition_str(yaml, DefinitionFormat::Yaml).unwrap();
        assert_eq!(def.resource_name, "books");
        assert!(def.has_one.is_empty());
        assert_eq!(def.seeds.len(), 1);
    }

    #[test]
    fn test_unsupported_type_still_parses() {
        let json = r#"{ "resource_name": "x", "columns": [ { "name": "id", "type": "date" } ] }"#;
        let def = parse_definition_str(json, DefinitionFormat::Json).unwrap();
        assert_eq!(
            def.columns[0].column_type,
            Some(ColumnType::Unsupported("date".into()))
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DefinitionFormat::from_path(Path::new("api/users.yml")),
            Some(DefinitionFormat::Yaml)
        );
        assert_eq!(DefinitionFormat::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn test_encode_round_trip() {
        let def = parse_definition_str(USERS_JSON, DefinitionFormat::Json).unwrap();
        let encoded = encode_definition(&def, DefinitionFormat::Yaml).unwrap();
        let again = parse_definition_str(&encoded, DefinitionFormat::Yaml).unwrap();
        assert_eq!(
            encode_definition(&again, DefinitionFormat::Json).unwrap(),
            encode_definition(&def, DefinitionFormat::Json).unwrap()
        );
    }
}
