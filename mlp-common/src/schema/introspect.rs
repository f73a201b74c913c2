//! Live schema introspection and drift detection
//!
//! Reads `information_schema.columns` (plus a `pg_constraint` join for
//! foreign keys) and compares the result with the declared catalog.
//! Nothing here is cached: every call queries the database again.

use serde::Serialize;
use sqlx::{PgPool, Row};

use super::{ColumnDefinition, ModelSchema, PgType};
use crate::{Error, Result};

/// Column query: declared order, with the foreign key target table if any
const COLUMNS_QUERY: &str = r#"
    SELECT c.column_name::text AS column_name,
           c.data_type::text AS data_type,
           c.udt_name::text AS udt_name,
           (c.is_nullable = 'YES') AS nullable,
           fk.fk_table
    FROM information_schema.columns c
    LEFT JOIN (
        SELECT a.attname::text AS column_name,
               target.relname::text AS fk_table
        FROM pg_constraint con
        JOIN pg_class source ON source.oid = con.conrelid
        JOIN pg_class target ON target.oid = con.confrelid
        JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY (con.conkey)
        WHERE con.contype = 'f'
          AND source.relname = $1
          AND source.relnamespace = current_schema()::regnamespace
    ) fk ON fk.column_name = c.column_name
    WHERE c.table_schema = current_schema()
      AND c.table_name = $1
    ORDER BY c.ordinal_position
"#;

/// Actual column from database introspection
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectedColumn {
    pub column_name: String,
    /// `information_schema` type name, e.g. "timestamp without time zone"
    pub data_type: String,
    /// Underlying type name, e.g. "timestamp"
    pub udt_name: String,
    pub nullable: bool,
    /// Table referenced by a foreign key on this column
    pub fk_table: Option<String>,
}

impl IntrospectedColumn {
    pub fn pg_type(&self) -> Option<PgType> {
        PgType::from_information_schema(&self.data_type)
            .or_else(|| PgType::from_information_schema(&self.udt_name))
    }
}

/// Schema introspection - read actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read the columns of `table_name`
    ///
    /// Fails with [`Error::Schema`] when the table yields zero columns
    /// (missing table or no privileges).
    pub async fn introspect_table(
        pool: &PgPool,
        table_name: &str,
    ) -> Result<Vec<IntrospectedColumn>> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(table_name)
            .fetch_all(pool)
            .await?;

        if rows.is_empty() {
            return Err(Error::Schema(format!("table '{}' has no columns", table_name)));
        }

        let columns = rows
            .iter()
            .map(|row| {
                Ok(IntrospectedColumn {
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    udt_name: row.try_get("udt_name")?,
                    nullable: row.try_get("nullable")?,
                    fk_table: row.try_get("fk_table")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        Ok(columns)
    }
}

/// Schema drift detected between declared and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    /// Declared column missing from database
    MissingColumn { table: String, column: ColumnDefinition },
    /// Column type differs from the declaration (cannot auto-fix)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Column present in database but not declared; ignored by queries
    UndeclaredColumn { table: String, column: String },
}

/// Schema comparison - detect drift between declared and actual
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare a declared model with its introspected columns
    pub fn compare(schema: &ModelSchema, actual: &[IntrospectedColumn]) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected in &schema.columns {
            match actual.iter().find(|c| c.column_name == expected.name) {
                Some(found) => {
                    let compatible = found
                        .pg_type()
                        .map(|ty| expected.pg_type.compatible_with(ty))
                        .unwrap_or(false);
                    if !compatible {
                        drift.push(SchemaDrift::TypeMismatch {
                            table: schema.name.clone(),
                            column: expected.name.clone(),
                            expected: expected.pg_type.sql().to_string(),
                            actual: found.data_type.clone(),
                        });
                    }
                }
                None => drift.push(SchemaDrift::MissingColumn {
                    table: schema.name.clone(),
                    column: expected.clone(),
                }),
            }
        }

        for found in actual {
            if !schema.has_column(&found.column_name) {
                drift.push(SchemaDrift::UndeclaredColumn {
                    table: schema.name.clone(),
                    column: found.column_name.clone(),
                });
            }
        }

        drift
    }
}
