//! Schema reconciliation for the `users` table
//!
//! A missing table is always created. An existing table is compared column by
//! column against the model:
//!
//! - a column with an incompatible type is a [`DbError::Schema`], never altered
//! - a missing column that can be added without touching existing rows is
//!   planned as `ALTER TABLE ... ADD COLUMN`
//! - a missing unique index on `email` is planned as `ADD UNIQUE INDEX`
//! - `createdAt`/`updatedAt`, as left by earlier deployments of the service,
//!   are accepted as the timestamp columns and queried under those names
//!
//! Planned alterations only run when the caller opts in; otherwise they are
//! reported as a schema error so the operator can migrate explicitly.

use sqlx::MySqlPool;

use super::{DbError, DbResult};

pub const USERS_TABLE: &str = "users";

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        email VARCHAR(255) NOT NULL,
        created_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
        updated_at DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
        UNIQUE KEY users_email_unique (email)
    ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4
"#;

const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

const INTEGER_TYPES: &[&str] = &["bigint", "int", "mediumint", "smallint"];
const TEXT_TYPES: &[&str] = &["varchar", "char", "text", "tinytext", "mediumtext"];
const TIME_TYPES: &[&str] = &["datetime", "timestamp"];

/// Expected shape of one column.
#[derive(Debug)]
struct ColumnSpec {
    name: &'static str,
    /// Acceptable `information_schema.COLUMNS.DATA_TYPE` values
    types: &'static [&'static str],
    /// Definition for `ADD COLUMN`, `None` if the column cannot be added to
    /// a populated table
    add_definition: Option<&'static str>,
    /// Spelling used by tables created before this service owned the schema
    legacy_name: Option<&'static str>,
}

const USER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "id",
        types: INTEGER_TYPES,
        add_definition: None,
        legacy_name: None,
    },
    ColumnSpec {
        name: "name",
        types: TEXT_TYPES,
        add_definition: Some("VARCHAR(255) NOT NULL DEFAULT ''"),
        legacy_name: None,
    },
    ColumnSpec {
        name: "email",
        types: TEXT_TYPES,
        add_definition: None,
        legacy_name: None,
    },
    ColumnSpec {
        name: CREATED_AT,
        types: TIME_TYPES,
        add_definition: Some("DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)"),
        legacy_name: Some("createdAt"),
    },
    ColumnSpec {
        name: UPDATED_AT,
        types: TIME_TYPES,
        add_definition: Some("DATETIME(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)"),
        legacy_name: Some("updatedAt"),
    },
];

/// Physical names of the timestamp columns in the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created: &'static str,
    pub updated: &'static str,
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self {
            created: CREATED_AT,
            updated: UPDATED_AT,
        }
    }
}

/// Result of comparing the live table against the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub alterations: Vec<Alteration>,
    pub timestamps: TimestampColumns,
}

/// A column as reported by `information_schema`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExistingColumn {
    pub column_name: String,
    pub data_type: String,
}

/// A non-destructive change to the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alteration {
    AddColumn {
        column: &'static str,
        definition: &'static str,
    },
    AddEmailUniqueIndex,
}

impl Alteration {
    pub fn sql(&self) -> String {
        match self {
            Self::AddColumn { column, definition } => {
                format!("ALTER TABLE {USERS_TABLE} ADD COLUMN {column} {definition}")
            }
            Self::AddEmailUniqueIndex => {
                format!("ALTER TABLE {USERS_TABLE} ADD UNIQUE INDEX users_email_unique (email)")
            }
        }
    }
}

/// Compare the live table against the model.
///
/// Returns the alterations needed and the timestamp column names to query
/// through, or a schema error when the mismatch cannot be fixed without
/// losing or inventing data.
pub fn plan(existing: &[ExistingColumn], email_unique: bool) -> DbResult<SchemaPlan> {
    let mut alterations = Vec::new();
    let mut timestamps = TimestampColumns::default();

    for spec in USER_COLUMNS {
        // The legacy spelling wins when both exist: it is NOT NULL without a
        // default, so inserts must go through it
        let found = spec
            .legacy_name
            .and_then(|legacy| find_column(existing, legacy).map(|c| (legacy, c)))
            .or_else(|| find_column(existing, spec.name).map(|c| (spec.name, c)));

        match (found, spec.add_definition) {
            (Some((name, column)), _) => {
                let data_type = column.data_type.to_ascii_lowercase();
                if !spec.types.contains(&data_type.as_str()) {
                    return Err(DbError::schema(format!(
                        "column `{}` has type `{}`, expected one of {:?}",
                        name, data_type, spec.types
                    )));
                }
                match spec.name {
                    CREATED_AT => timestamps.created = name,
                    UPDATED_AT => timestamps.updated = name,
                    _ => {}
                }
            }
            (None, Some(definition)) => alterations.push(Alteration::AddColumn {
                column: spec.name,
                definition,
            }),
            (None, None) => {
                return Err(DbError::schema(format!(
                    "column `{}` is missing and cannot be added to existing rows",
                    spec.name
                )));
            }
        }
    }

    if !email_unique {
        alterations.push(Alteration::AddEmailUniqueIndex);
    }

    Ok(SchemaPlan {
        alterations,
        timestamps,
    })
}

fn find_column<'a>(existing: &'a [ExistingColumn], name: &str) -> Option<&'a ExistingColumn> {
    existing
        .iter()
        .find(|c| c.column_name.eq_ignore_ascii_case(name))
}

/// Bring the `users` table in line with the model.
///
/// With `allow_alter` false, any planned alteration is reported as a schema
/// error instead of being applied. Returns the timestamp column names the
/// data queries must use.
pub async fn reconcile(pool: &MySqlPool, allow_alter: bool) -> DbResult<TimestampColumns> {
    sqlx::query(CREATE_USERS_TABLE)
        .execute(pool)
        .await
        .map_err(schema_failure)?;

    let existing = existing_columns(pool).await?;
    let email_unique = has_unique_email(pool).await?;
    let SchemaPlan {
        alterations,
        timestamps,
    } = plan(&existing, email_unique)?;

    if timestamps != TimestampColumns::default() {
        tracing::info!(
            table = USERS_TABLE,
            created = timestamps.created,
            updated = timestamps.updated,
            "using legacy timestamp columns"
        );
    }

    if alterations.is_empty() {
        tracing::debug!(table = USERS_TABLE, "schema up to date");
        return Ok(timestamps);
    }

    if !allow_alter {
        let pending: Vec<String> = alterations.iter().map(Alteration::sql).collect();
        return Err(DbError::schema(format!(
            "{} table needs alteration, enable schema alteration to apply: {}",
            USERS_TABLE,
            pending.join("; ")
        )));
    }

    for alteration in &alterations {
        let sql = alteration.sql();
        tracing::info!(table = USERS_TABLE, %sql, "altering table");
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(schema_failure)?;
    }

    tracing::info!(
        table = USERS_TABLE,
        count = alterations.len(),
        "schema alterations applied"
    );
    Ok(timestamps)
}

async fn existing_columns(pool: &MySqlPool) -> DbResult<Vec<ExistingColumn>> {
    sqlx::query_as::<_, ExistingColumn>(
        r#"
        SELECT
            CAST(COLUMN_NAME AS CHAR) AS column_name,
            CAST(DATA_TYPE AS CHAR) AS data_type
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        "#,
    )
    .bind(USERS_TABLE)
    .fetch_all(pool)
    .await
    .map_err(schema_failure)
}

/// True when a single-column unique index covers `email`.
async fn has_unique_email(pool: &MySqlPool) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT INDEX_NAME
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND NON_UNIQUE = 0
            GROUP BY INDEX_NAME
            HAVING COUNT(*) = 1 AND MAX(CAST(COLUMN_NAME AS CHAR)) = 'email'
        ) AS email_indexes
        "#,
    )
    .bind(USERS_TABLE)
    .fetch_one(pool)
    .await
    .map_err(schema_failure)?;

    Ok(count > 0)
}

/// Transport failures stay connection errors; anything else is a schema error.
fn schema_failure(err: sqlx::Error) -> DbError {
    match DbError::classify(err) {
        DbError::Query(e) => DbError::schema(e.to_string()),
        DbError::Conflict(message) => DbError::schema(message),
        other => other,
    }
}
