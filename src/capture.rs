//! Snapshot Capture Module
//!
//! Reads every table and view from a live database into a `DatabaseSnapshot`.
//! Failures reading one entity are recorded on that entity and capture moves
//! on; only a failing catalog query aborts the whole capture.

use crate::error::{entity_read_error, AppError, AppResult};
use crate::snapshot::{DatabaseSnapshot, FieldValue, InclusionFilter, Row, RowContent, TableSnapshot};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_types::Type;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// A table or view as listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub schema: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Quoted `"schema"."name"` identifier safe to splice into SQL
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// What the capture step needs from a database
#[allow(async_fn_in_trait)]
pub trait EntitySource {
    /// Tables in catalog order
    async fn list_tables(&self) -> AppResult<Vec<EntityRef>>;

    /// Views in catalog order
    async fn list_views(&self) -> AppResult<Vec<EntityRef>>;

    async fn row_count(&self, entity: &EntityRef) -> AppResult<i64>;

    /// Every row of the entity, in any order
    async fn read_rows(&self, entity: &EntityRef) -> AppResult<Vec<Row>>;
}

/// Capture all tables then all views from `source`
pub async fn capture_snapshot<S: EntitySource>(
    source: &S,
    filter: &InclusionFilter,
    cancel: &CancellationToken,
) -> AppResult<DatabaseSnapshot> {
    let captured_at = Utc::now();

    let tables = source.list_tables().await?;
    let tables = capture_entities(source, &tables, filter, cancel).await?;

    let views = source.list_views().await?;
    let views = capture_entities(source, &views, filter, cancel).await?;

    let snapshot = DatabaseSnapshot::new(captured_at, tables, views);

    debug!(
        "Captured snapshot with {} tables, {} views (checksum {})",
        snapshot.tables.len(),
        snapshot.views.len(),
        snapshot.checksum
    );

    Ok(snapshot)
}

async fn capture_entities<S: EntitySource>(
    source: &S,
    entities: &[EntityRef],
    filter: &InclusionFilter,
    cancel: &CancellationToken,
) -> AppResult<Vec<TableSnapshot>> {
    let mut captured = Vec::with_capacity(entities.len());

    for entity in entities {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        captured.push(capture_entity(source, entity, filter).await);
    }

    Ok(captured)
}

async fn capture_entity<S: EntitySource>(source: &S, entity: &EntityRef, filter: &InclusionFilter) -> TableSnapshot {
    let included = filter.is_included(&entity.name);

    let declared_count = match source.row_count(entity).await {
        Ok(count) => count,
        Err(e) => {
            warn!("Error: {}", e);
            let rows = if included {
                RowContent::Unreadable(e.to_string())
            } else {
                RowContent::Excluded
            };
            return TableSnapshot::new(entity.name.clone(), None, rows);
        }
    };

    let rows = if !included {
        RowContent::Excluded
    } else {
        match source.read_rows(entity).await {
            Ok(mut rows) => {
                rows.sort();
                RowContent::Rows(rows)
            }
            Err(e) => {
                warn!("Error: {}", e);
                RowContent::Unreadable(e.to_string())
            }
        }
    };

    TableSnapshot::new(entity.name.clone(), Some(declared_count), rows)
}

/// How a column is fetched and decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    /// NUMERIC, fetched as text
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    /// Anything without a native mapping, fetched as text
    Other,
}

impl ColumnKind {
    pub fn from_type(ty: &Type) -> Self {
        if ty.schema() != "pg_catalog" {
            return ColumnKind::Other;
        }
        match ty.name() {
            "bool" => ColumnKind::Bool,
            "int2" => ColumnKind::Int2,
            "int4" => ColumnKind::Int4,
            "int8" => ColumnKind::Int8,
            "oid" => ColumnKind::Oid,
            "float4" => ColumnKind::Float4,
            "float8" => ColumnKind::Float8,
            "numeric" => ColumnKind::Decimal,
            "text" | "varchar" | "bpchar" | "name" => ColumnKind::Text,
            "bytea" => ColumnKind::Bytes,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            "timestamp" => ColumnKind::Timestamp,
            "timestamptz" => ColumnKind::TimestampTz,
            "uuid" => ColumnKind::Uuid,
            "json" | "jsonb" => ColumnKind::Json,
            _ => ColumnKind::Other,
        }
    }

    fn fetched_as_text(&self) -> bool {
        matches!(self, ColumnKind::Decimal | ColumnKind::Other)
    }

    /// Select-list expression for a column of this kind
    pub fn projection(&self, column: &str) -> String {
        if self.fetched_as_text() {
            format!("{}::text", quote_ident(column))
        } else {
            quote_ident(column)
        }
    }

    fn decode(&self, row: &tokio_postgres::Row, idx: usize) -> Result<FieldValue, tokio_postgres::Error> {
        let value = match self {
            ColumnKind::Bool => row.try_get::<_, Option<bool>>(idx)?.map(FieldValue::Bool),
            ColumnKind::Int2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| FieldValue::Int(v.into())),
            ColumnKind::Int4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| FieldValue::Int(v.into())),
            ColumnKind::Int8 => row.try_get::<_, Option<i64>>(idx)?.map(FieldValue::Int),
            ColumnKind::Oid => row.try_get::<_, Option<u32>>(idx)?.map(|v| FieldValue::Int(v.into())),
            ColumnKind::Float4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| FieldValue::Float(v.into())),
            ColumnKind::Float8 => row.try_get::<_, Option<f64>>(idx)?.map(FieldValue::Float),
            ColumnKind::Decimal => row.try_get::<_, Option<String>>(idx)?.map(FieldValue::Decimal),
            ColumnKind::Text | ColumnKind::Other => row.try_get::<_, Option<String>>(idx)?.map(FieldValue::Text),
            ColumnKind::Bytes => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(FieldValue::Bytes),
            ColumnKind::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.map(FieldValue::Date),
            ColumnKind::Time => row.try_get::<_, Option<NaiveTime>>(idx)?.map(FieldValue::Time),
            ColumnKind::Timestamp => row.try_get::<_, Option<NaiveDateTime>>(idx)?.map(FieldValue::Timestamp),
            ColumnKind::TimestampTz => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.map(FieldValue::TimestampTz),
            ColumnKind::Uuid => row.try_get::<_, Option<Uuid>>(idx)?.map(FieldValue::Uuid),
            ColumnKind::Json => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(|v| FieldValue::Json(v.to_string())),
        };
        Ok(value.unwrap_or(FieldValue::Null))
    }
}

/// Entity source backed by a pooled PostgreSQL client
pub struct PostgresSource {
    client: deadpool_postgres::Client,
}

impl PostgresSource {
    pub fn new(client: deadpool_postgres::Client) -> Self {
        Self { client }
    }

    async fn list(&self, query: &str) -> AppResult<Vec<EntityRef>> {
        let rows = self.client.query(query, &[]).await?;

        rows.iter()
            .map(|row| -> AppResult<EntityRef> {
                Ok(EntityRef::new(row.try_get::<_, String>(0)?, row.try_get::<_, String>(1)?))
            })
            .collect()
    }

    async fn count_rows(&self, entity: &EntityRef) -> Result<i64, tokio_postgres::Error> {
        let query = format!("SELECT count(*) FROM {}", entity.qualified());
        let row = self.client.query_one(query.as_str(), &[]).await?;
        row.try_get::<_, i64>(0)
    }

    async fn fetch_rows(&self, entity: &EntityRef) -> Result<Vec<Row>, tokio_postgres::Error> {
        // Prepare first to learn column types, then cast what we cannot decode natively
        let probe = self
            .client
            .prepare(format!("SELECT * FROM {}", entity.qualified()).as_str())
            .await?;

        let kinds: Vec<ColumnKind> = probe.columns().iter().map(|c| ColumnKind::from_type(c.type_())).collect();
        let projection = probe
            .columns()
            .iter()
            .zip(&kinds)
            .map(|(column, kind)| kind.projection(column.name()))
            .collect::<Vec<_>>()
            .join(", ");

        let query = format!("SELECT {} FROM {}", projection, entity.qualified());
        let rows = self.client.query(query.as_str(), &[]).await?;

        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let fields = kinds
                .iter()
                .enumerate()
                .map(|(idx, kind)| kind.decode(row, idx))
                .collect::<Result<Vec<_>, _>>()?;
            decoded.push(Row::new(fields));
        }

        Ok(decoded)
    }
}

impl EntitySource for PostgresSource {
    async fn list_tables(&self) -> AppResult<Vec<EntityRef>> {
        let query = r#"
            SELECT schemaname::text, tablename::text
            FROM pg_catalog.pg_tables
            WHERE schemaname NOT IN ('pg_catalog', 'information_schema')
            ORDER BY schemaname, tablename
        "#;
        self.list(query).await
    }

    async fn list_views(&self) -> AppResult<Vec<EntityRef>> {
        let query = r#"
            SELECT schemaname::text, viewname::text
            FROM pg_catalog.pg_views
            WHERE schemaname NOT IN ('pg_catalog', 'information_schema')
            ORDER BY schemaname, viewname
        "#;
        self.list(query).await
    }

    async fn row_count(&self, entity: &EntityRef) -> AppResult<i64> {
        self.count_rows(entity)
            .await
            .map_err(|e| entity_read_error(entity.qualified(), e.to_string()))
    }

    async fn read_rows(&self, entity: &EntityRef) -> AppResult<Vec<Row>> {
        self.fetch_rows(entity)
            .await
            .map_err(|e| entity_read_error(entity.qualified(), e.to_string()))
    }
}
