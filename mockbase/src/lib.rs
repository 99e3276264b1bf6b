pub mod error;
pub mod inflection;
pub mod record;
pub mod relationship;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use error::{MockbaseError, Result};
pub use record::{Record, Value, ID_COLUMN};
pub use relationship::RelationshipResolver;
pub use schema::{ColumnSchema, ColumnType, DefinitionFormat, ResourceDefinition};
pub use snapshot::SnapshotWorker;
pub use store::{DefinitionSource, Registry, Resource, ResourceStore};
