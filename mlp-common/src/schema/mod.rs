//! Declarative model schemas
//!
//! Every table the service exposes is declared once, in [`catalog`]. The
//! declaration drives table creation, query building, value sanitizing,
//! request validation and route generation. [`introspect`] reads the live
//! database only to verify that it still matches the declarations.
//!
//! # Usage
//!
//! ```rust,ignore
//! let schema = catalog::CATALOG.get("surveyors").unwrap();
//! let mut model = Model::new(schema);
//! model.set_value("last_name", json!("Wheeler"))?;
//! let stmt = QueryBuilder::new(schema).insert(&model);
//! ```

pub mod catalog;
pub mod introspect;

pub use catalog::{Catalog, ImageState, CATALOG};
pub use introspect::{IntrospectedColumn, SchemaDiff, SchemaDrift, SchemaIntrospector};

use serde::Serialize;

/// PostgreSQL column types understood by the sanitizer and query builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PgType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Boolean,
    Text,
    Varchar,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Json,
    Jsonb,
}

impl PgType {
    /// Type name used in DDL and in `$n::<type>` placeholder casts
    pub fn sql(&self) -> &'static str {
        match self {
            PgType::SmallInt => "smallint",
            PgType::Integer => "integer",
            PgType::BigInt => "bigint",
            PgType::Real => "real",
            PgType::Double => "double precision",
            PgType::Numeric => "numeric",
            PgType::Boolean => "boolean",
            PgType::Text => "text",
            PgType::Varchar => "varchar",
            PgType::Date => "date",
            PgType::Time => "time",
            PgType::Timestamp => "timestamp",
            PgType::TimestampTz => "timestamptz",
            PgType::Json => "json",
            PgType::Jsonb => "jsonb",
        }
    }

    /// Map an `information_schema.columns.data_type` value to a known type
    pub fn from_information_schema(data_type: &str) -> Option<PgType> {
        let ty = match data_type.to_ascii_lowercase().as_str() {
            "smallint" | "int2" => PgType::SmallInt,
            "integer" | "int" | "int4" | "serial" => PgType::Integer,
            "bigint" | "int8" | "bigserial" => PgType::BigInt,
            "real" | "float4" => PgType::Real,
            "double precision" | "float8" => PgType::Double,
            "numeric" | "decimal" => PgType::Numeric,
            "boolean" | "bool" => PgType::Boolean,
            "text" => PgType::Text,
            "character varying" | "varchar" | "character" | "char" => PgType::Varchar,
            "date" => PgType::Date,
            "time without time zone" | "time" => PgType::Time,
            "timestamp without time zone" | "timestamp" => PgType::Timestamp,
            "timestamp with time zone" | "timestamptz" => PgType::TimestampTz,
            "json" => PgType::Json,
            "jsonb" => PgType::Jsonb,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, PgType::SmallInt | PgType::Integer | PgType::BigInt)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PgType::Real | PgType::Double | PgType::Numeric)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PgType::Text | PgType::Varchar)
    }

    /// Text and varchar are interchangeable for drift purposes
    pub fn compatible_with(&self, other: PgType) -> bool {
        *self == other || (self.is_text() && other.is_text())
    }
}

/// How a model's rows relate to the shared linkage tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Hierarchical entity; `id` is the id of its row in `nodes`
    Node,
    /// File record; `id` is drawn from `files_id_seq` and listed in the `files` view
    File,
    /// Plain lookup/reference row with its own serial id
    Reference,
}

/// Column definition with SQL constraints and form metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// Human readable label for forms
    pub label: String,
    /// PostgreSQL type
    pub pg_type: PgType,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// Created as `serial` (database supplies the value)
    pub serial: bool,
    /// Value supplied by the database DEFAULT; never written by inserts
    pub generated: bool,
    /// DEFAULT expression
    pub default_value: Option<String>,
    /// Foreign key target table
    pub references: Option<String>,
    /// Foreign key target column (`id` unless set otherwise)
    pub reference_key: String,
    /// ON DELETE CASCADE for the foreign key
    pub cascade: bool,
    /// Maintained by the query builder with `NOW()`
    pub timestamp: bool,
    /// Permitted values for text columns
    pub choices: Option<Vec<String>>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, pg_type: PgType) -> Self {
        let name = name.into();
        let label = default_label(&name);
        Self {
            name,
            label,
            pg_type,
            not_null: false,
            primary_key: false,
            unique: false,
            serial: false,
            generated: false,
            default_value: None,
            references: None,
            reference_key: "id".to_string(),
            cascade: false,
            timestamp: false,
            choices: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Create as `serial`; inserts never supply it
    pub fn serial(mut self) -> Self {
        self.serial = true;
        self.generated = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// DEFAULT expression that always supplies the value (e.g. `nextval(...)`)
    pub fn generated(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self.generated = true;
        self
    }

    /// Foreign key to `table(id)`
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    /// Foreign key to `table(key)`
    pub fn references_key(mut self, table: impl Into<String>, key: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self.reference_key = key.into();
        self
    }

    pub fn on_delete_cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    /// Restrict a text column to a fixed set of values
    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    /// `created_at`/`updated_at` style column maintained with `NOW()`
    pub fn managed_timestamp(mut self) -> Self {
        self.timestamp = true;
        self.not_null = true;
        self.default_value = Some("NOW()".to_string());
        self
    }

    /// Column fragment for CREATE TABLE / ADD COLUMN
    pub fn ddl(&self) -> String {
        let mut sql = format!(
            "{} {}",
            self.name,
            if self.serial { "serial" } else { self.pg_type.sql() }
        );
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(table) = &self.references {
            sql.push_str(&format!(" REFERENCES {}({})", table, self.reference_key));
            if self.cascade {
                sql.push_str(" ON DELETE CASCADE");
            }
        }
        sql
    }

    /// True when a null value for this column must be rejected before writing.
    /// Primary keys are always supplied by the database or the node insert.
    pub fn required(&self) -> bool {
        self.not_null
            && !self.primary_key
            && !self.generated
            && !self.timestamp
            && self.default_value.is_none()
    }
}

/// "given_names" -> "Given Names"
fn default_label(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declared schema for one model table
#[derive(Debug, Clone)]
pub struct ModelSchema {
    /// Table name; also the route segment and the node/file type name
    pub name: String,
    /// Human readable label
    pub label: String,
    pub kind: ModelKind,
    /// Model types permitted as owner (empty = root / unowned)
    pub owners: Vec<String>,
    /// Columns in table order
    pub columns: Vec<ColumnDefinition>,
}

impl ModelSchema {
    /// Start a schema with the id column appropriate for `kind`
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: ModelKind) -> Self {
        let id = match kind {
            ModelKind::Node => ColumnDefinition::new("id", PgType::Integer)
                .label("ID")
                .primary_key()
                .references("nodes")
                .on_delete_cascade(),
            ModelKind::File => ColumnDefinition::new("id", PgType::Integer)
                .label("ID")
                .primary_key()
                .generated("nextval('files_id_seq')"),
            ModelKind::Reference => ColumnDefinition::new("id", PgType::Integer)
                .label("ID")
                .primary_key()
                .serial(),
        };
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            owners: Vec::new(),
            columns: vec![id],
        }
    }

    /// Declare permitted owner types and add the owner columns
    pub fn owned_by(mut self, owners: &[&str]) -> Self {
        self.owners = owners.iter().map(|o| o.to_string()).collect();
        self.columns.push(
            ColumnDefinition::new("owner_id", PgType::Integer)
                .label("Owner")
                .not_null()
                .references("nodes"),
        );
        if self.kind == ModelKind::File {
            self.columns.push(
                ColumnDefinition::new("owner_type", PgType::Varchar)
                    .label("Owner Type")
                    .not_null()
                    .choices(owners),
            );
        }
        self
    }

    /// Append a column
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Append the shared file columns
    pub fn file_columns(self) -> Self {
        self.column(ColumnDefinition::new("filename", PgType::Text).not_null())
            .column(
                ColumnDefinition::new("fs_path", PgType::Text)
                    .label("File Path")
                    .not_null()
                    .unique(),
            )
            .column(ColumnDefinition::new("mimetype", PgType::Varchar).label("MIME Type"))
            .column(ColumnDefinition::new("file_size", PgType::BigInt))
    }

    /// Append `created_at` and `updated_at`
    pub fn timestamps(self) -> Self {
        self.column(ColumnDefinition::new("created_at", PgType::Timestamp).managed_timestamp())
            .column(ColumnDefinition::new("updated_at", PgType::Timestamp).managed_timestamp())
    }

    /// Look up a declared column
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn is_node(&self) -> bool {
        self.kind == ModelKind::Node
    }

    pub fn is_owned(&self) -> bool {
        !self.owners.is_empty()
    }

    pub fn accepts_owner(&self, owner_type: &str) -> bool {
        self.owners.iter().any(|o| o == owner_type)
    }

    /// Columns written by insert/update: everything not generated and not a managed timestamp
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| !c.generated && !c.timestamp)
    }

    /// CREATE TABLE IF NOT EXISTS statement
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> =
            self.columns.iter().map(|c| format!("    {}", c.ddl())).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            columns.join(",\n")
        )
    }
}
