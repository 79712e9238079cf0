//! Checked and unchecked table identifiers.
//!
//! A caller-supplied table name starts out as an [`UncheckedTableName`] and
//! must never reach SQL text in that form. The only way to obtain a
//! [`TableName`] is [`UncheckedTableName::validate`], which confirms the
//! table exists in the backend's catalog. Writers accept nothing else.
//!
//! Validation is advisory: a table dropped after validation surfaces as a
//! database error on the next write.

use crate::backend::Catalog;
use crate::error::{StoreError, StoreResult};
use pgstash_core::DEFAULT_SCHEMA;
use std::fmt;

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A caller-supplied, untrusted table name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UncheckedTableName {
    schema: String,
    name: String,
}

impl UncheckedTableName {
    /// A table in the default (`public`) schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_schema(DEFAULT_SCHEMA, name)
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Promote to a [`TableName`] if the catalog knows the table.
    pub async fn validate(self, catalog: &dyn Catalog) -> StoreResult<TableName> {
        if catalog.table_exists(&self).await? {
            Ok(TableName {
                schema: self.schema,
                name: self.name,
            })
        } else {
            tracing::debug!(schema = %self.schema, table = %self.name, "Table not found in catalog");
            Err(self.into_error())
        }
    }

    /// Whether both parts are plain identifiers: ASCII letters, digits and
    /// underscores, not starting with a digit, at most 63 bytes.
    ///
    /// Table creation runs DDL before the table can be found in the catalog,
    /// so it requires this stricter form.
    pub fn is_plain_identifier(&self) -> bool {
        is_plain_identifier(&self.schema) && is_plain_identifier(&self.name)
    }

    pub(crate) fn into_error(self) -> StoreError {
        StoreError::InvalidTableName(self.to_string())
    }

    /// Quoted `"schema"."table"` form for DDL on a plain identifier.
    pub(crate) fn quoted_for_ddl(&self) -> Option<String> {
        self.is_plain_identifier()
            .then(|| qualified(&self.schema, &self.name))
    }
}

impl fmt::Debug for UncheckedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UncheckedTableName({self})")
    }
}

impl fmt::Display for UncheckedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A table name confirmed to exist in the backend's catalog.
///
/// Has no public constructor; see [`UncheckedTableName::validate`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: String,
    name: String,
}

impl TableName {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Double-quoted, schema-qualified identifier for embedding in SQL text.
    pub fn quoted(&self) -> String {
        qualified(&self.schema, &self.name)
    }

    /// Demote back to an unchecked name, e.g. to revalidate.
    pub fn to_unchecked(&self) -> UncheckedTableName {
        UncheckedTableName::with_schema(self.schema.clone(), self.name.clone())
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({self})")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}

/// Quote an identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    ident.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
