mod column;
mod parser;
mod types;

pub use column::RecordLookup;
pub use parser::{encode_definition, parse_definition, parse_definition_str, DefinitionFormat};
pub use types::{ColumnSchema, ColumnType, ResourceDefinition};
