//! The schema catalog: a declarative, immutable description of one or
//! more SQL schemas consumed by the matcher and validator.
//!
//! The catalog is the single source of truth for table resolution. It is
//! never mutated during a parse or match; embedders may share one catalog
//! across any number of concurrent queries.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::HostType;

/// Ordered column name → host type mapping for one table.
///
/// Declaration order is semantic: `SELECT *` expands columns in this
/// order.
pub type TableColumns = IndexMap<String, HostType>;

/// A multi-schema catalog with a nominated default schema.
///
/// Wire format:
///
/// ```json
/// {
///   "defaultSchema": "public",
///   "schemas": {
///     "public": {
///       "users": { "id": "number", "name": "string" }
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCatalog {
    /// Schema applied to unqualified table references.
    pub default_schema: String,
    /// Schema name → table name → column map.
    pub schemas: IndexMap<String, IndexMap<String, TableColumns>>,
}

impl SchemaCatalog {
    /// Creates an empty catalog with the given default schema.
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            schemas: IndexMap::new(),
        }
    }

    /// Adds a table to a schema, creating the schema on first use.
    /// Builder-style; later calls with the same table name replace it.
    pub fn with_table<'a>(
        mut self,
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = (&'a str, HostType)>,
    ) -> Self {
        let cols: TableColumns = columns
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect();
        self.schemas
            .entry(schema.into())
            .or_default()
            .insert(table.into(), cols);
        self
    }

    /// Looks up a table by optional schema qualifier, falling back to the
    /// default schema.
    ///
    /// The error messages are fixed templates; validator output quotes
    /// them verbatim.
    pub(crate) fn resolve_table(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<&TableColumns, String> {
        match schema {
            Some(schema_name) => {
                let tables = self
                    .schemas
                    .get(schema_name)
                    .ok_or_else(|| format!("Schema '{schema_name}' not found"))?;
                tables
                    .get(table)
                    .ok_or_else(|| format!("Table '{table}' not found in schema '{schema_name}'"))
            }
            None => {
                let default = &self.default_schema;
                let tables = self
                    .schemas
                    .get(default)
                    .ok_or_else(|| format!("Schema '{default}' not found"))?;
                tables.get(table).ok_or_else(|| {
                    format!("Table '{table}' not found in default schema '{default}'")
                })
            }
        }
    }

    /// Whether the catalog declares the named schema.
    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.contains_key(schema)
    }
}
