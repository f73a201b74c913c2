//! Automatic schema synchronization
//!
//! Catalog declarations sync to the database at startup:
//! 1. **CREATE TABLE IF NOT EXISTS** for every declared model
//! 2. **ADD COLUMN IF NOT EXISTS** for declared columns missing from an existing table
//! 3. **Verify**: introspect again; a declared column still missing is fatal
//!
//! Type changes and column removal are never automated.

use crate::schema::{
    Catalog, ColumnDefinition, ModelSchema, SchemaDiff, SchemaDrift, SchemaIntrospector,
};
use crate::{Error, Result};
use sqlx::PgPool;
use tracing::{debug, info, warn};

pub struct SchemaSync;

impl SchemaSync {
    /// Create the table if needed and add any missing columns
    pub async fn sync_model(pool: &PgPool, schema: &ModelSchema) -> Result<()> {
        sqlx::query(&schema.create_table_sql()).execute(pool).await?;

        let actual = SchemaIntrospector::introspect_table(pool, &schema.name).await?;
        let drift = SchemaDiff::compare(schema, &actual);

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", schema.name);
            return Ok(());
        }

        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                }
                SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. \
                         Manual migration required.",
                        table, column, expected, actual
                    );
                }
                SchemaDrift::UndeclaredColumn { table, column } => {
                    info!("Column {}.{} is not declared and will be ignored", table, column);
                }
            }
        }

        Ok(())
    }

    /// Add a missing column via ALTER TABLE
    async fn add_column(pool: &PgPool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            table,
            column.name,
            column.pg_type.sql()
        );

        if column.primary_key {
            warn!(
                "Cannot add PRIMARY KEY column {}.{} to an existing table. \
                 Column will be created without PRIMARY KEY constraint.",
                table, column.name
            );
        }

        // Existing rows need a value before NOT NULL can hold
        match (&column.default_value, column.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT value. Column will be nullable.",
                table, column.name
            ),
            (None, false) => {}
        }

        if column.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(target) = &column.references {
            sql.push_str(&format!(" REFERENCES {}({})", target, column.reference_key));
            if column.cascade {
                sql.push_str(" ON DELETE CASCADE");
            }
        }

        info!("Adding column: {}.{} ({})", table, column.name, column.pg_type.sql());
        sqlx::query(&sql).execute(pool).await?;
        Ok(())
    }

    /// Sync every catalog model, owners before owned
    pub async fn sync_catalog(pool: &PgPool, catalog: &Catalog) -> Result<()> {
        for schema in catalog.models() {
            Self::sync_model(pool, schema).await?;
        }
        info!("Schema sync complete for {} models", catalog.models().len());
        Ok(())
    }

    /// Fail when any declared column is absent from the live database
    pub async fn verify_catalog(pool: &PgPool, catalog: &Catalog) -> Result<()> {
        let mut missing = Vec::new();

        for schema in catalog.models() {
            let actual = SchemaIntrospector::introspect_table(pool, &schema.name).await?;
            for change in SchemaDiff::compare(schema, &actual) {
                match change {
                    SchemaDrift::MissingColumn { table, column } => {
                        missing.push(format!("{}.{}", table, column.name));
                    }
                    SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                        warn!("{}.{} is {} (declared {})", table, column, actual, expected);
                    }
                    SchemaDrift::UndeclaredColumn { .. } => {}
                }
            }
        }

        if !missing.is_empty() {
            return Err(Error::Schema(format!(
                "declared columns missing from database: {}",
                missing.join(", ")
            )));
        }

        info!("Verified {} model tables against the catalog", catalog.models().len());
        Ok(())
    }
}
