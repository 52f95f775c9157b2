//! DDL text generation for template tables.

use crate::config::SqlStorageConfig;
use crate::executor::ForeignKeyRef;
use ontosync_model::{CustomField, FieldType, StorageCardinality};

/// Type of the primary key column and of every column referencing one.
pub const ID_COLUMN_TYPE: &str = "VARCHAR(255)";

/// Physical column of a generated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub references: Option<ForeignKeyRef>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            unique: false,
            primary_key: false,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, target: Option<ForeignKeyRef>) -> Self {
        self.references = target;
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.data_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else {
            if self.not_null {
                sql.push_str(" NOT NULL");
            }
            if self.unique {
                sql.push_str(" UNIQUE");
            }
        }
        if let Some(target) = &self.references {
            sql.push_str(&format!(
                " REFERENCES {} ({})",
                quote_ident(&target.table),
                quote_ident(&target.column)
            ));
        }
        sql
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column name of a custom field.
pub fn column_name(field_code: &str) -> String {
    field_code.to_lowercase()
}

/// Physical type of a custom field.
pub fn column_type(field: &CustomField, config: &SqlStorageConfig) -> String {
    if field.cardinality == StorageCardinality::List {
        return "JSONB".to_string();
    }
    match field.field_type {
        FieldType::String => format!(
            "VARCHAR({})",
            field.max_length.unwrap_or(config.default_string_length)
        ),
        FieldType::TextArea | FieldType::Binary => "TEXT".to_string(),
        FieldType::Long => "BIGINT".to_string(),
        FieldType::Double => "NUMERIC(23,12)".to_string(),
        FieldType::Date => "TIMESTAMP".to_string(),
        FieldType::Boolean => "BOOLEAN".to_string(),
        FieldType::Entity => ID_COLUMN_TYPE.to_string(),
    }
}

/// Column definition of a custom field. Identifier fields become a
/// non-nullable unique key.
pub fn field_column(
    field: &CustomField,
    config: &SqlStorageConfig,
    reference: Option<ForeignKeyRef>,
) -> ColumnSpec {
    let mut column = ColumnSpec::new(column_name(&field.code), column_type(field, config));
    if field.identifier {
        column = column.not_null().unique();
    }
    if field.field_type == FieldType::Entity && field.cardinality == StorageCardinality::Single {
        column = column.references(reference);
    }
    column
}

pub fn create_table(table: &str, columns: &[ColumnSpec]) -> String {
    let columns: Vec<String> = columns.iter().map(ColumnSpec::to_sql).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        columns.join(", ")
    )
}

pub fn add_column(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        column.to_sql()
    )
}

pub fn drop_column(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
        quote_ident(table),
        quote_ident(column)
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

/// Canonical form used to compare declared and introspected types.
pub fn normalize_type(data_type: &str) -> String {
    data_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
