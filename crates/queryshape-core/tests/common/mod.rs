//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use queryshape_core::{ColumnShape, HostType, RowShape, SchemaCatalog};

/// The two-table catalog used across the end-to-end scenarios:
/// `users` and `posts` in the default `public` schema.
pub fn fixture_catalog() -> SchemaCatalog {
    SchemaCatalog::new("public")
        .with_table(
            "public",
            "users",
            [
                ("id", HostType::Number),
                ("name", HostType::String),
                ("email", HostType::String),
                ("role", HostType::string_union(["admin", "user"])),
                ("is_active", HostType::Boolean),
                ("deleted_at", HostType::nullable(HostType::String)),
            ],
        )
        .with_table(
            "public",
            "posts",
            [
                ("id", HostType::Number),
                ("author_id", HostType::Number),
                ("title", HostType::String),
                ("views", HostType::Number),
                ("status", HostType::string_union(["draft", "published"])),
            ],
        )
}

/// Asserts a shape resolved and returns `(alias, type)` pairs in order,
/// panicking on any inline error marker.
pub fn resolved_columns(shape: &RowShape) -> Vec<(&str, &HostType)> {
    let columns = shape
        .columns()
        .unwrap_or_else(|| panic!("expected resolved columns, got {shape:?}"));
    columns
        .iter()
        .map(|(alias, column)| match column {
            ColumnShape::Type(ty) => (alias.as_str(), ty),
            ColumnShape::Error(message) => {
                panic!("unexpected error marker under '{alias}': {message}")
            }
        })
        .collect()
}
