//! Live catalog introspection.
//!
//! Reconstructs the defining operation of every user-visible object from
//! `pg_catalog`, together with the `pg_depend` relation the resolver
//! orders by. Each object comes back as a loose key→value row; turning a
//! row into an [`Operation`](crate::op::Operation) goes through the same
//! `from_fields` path the snippet parser uses.

use std::collections::{BTreeSet, HashMap};

use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ident::Oid;
use crate::op::OpKind;
use crate::value::{FieldMap, Value};
use crate::version::ServerVersion;

/// Everything the dump pipeline needs, fetched up front: one row per
/// object and the parent relation between their identities. Pure data;
/// the resolver and serializer never touch the database.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// One `(kind, fields)` row per reconstructed object, grouped by kind
    /// in creation-friendly order (schemas, enums, tables, ...).
    pub rows: Vec<(OpKind, FieldMap)>,
    /// Identity → parent identities, as reported by `pg_depend`.
    pub deps: HashMap<Oid, BTreeSet<Oid>>,
}

impl CatalogSnapshot {
    /// Identities of every row that carries one.
    #[must_use]
    pub fn oids(&self) -> Vec<Oid> {
        self.rows
            .iter()
            .filter_map(|(_, map)| {
                map.get("oid")
                    .and_then(Value::as_int)
                    .and_then(|i| u32::try_from(i).ok())
                    .map(Oid)
            })
            .collect()
    }
}

const SCHEMAS: &str = "\
SELECT n.oid::int8 AS oid, n.nspname AS name, \
       obj_description(n.oid, 'pg_namespace') AS comment \
FROM pg_catalog.pg_namespace n \
WHERE n.nspname !~ '^pg_' \
  AND n.nspname NOT IN ('information_schema', 'public') \
ORDER BY n.nspname";

const ENUMS: &str = "\
SELECT t.oid::int8 AS oid, n.nspname AS namespace, t.typname AS name, \
       obj_description(t.oid, 'pg_type') AS comment \
FROM pg_catalog.pg_type t \
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
WHERE t.typtype = 'e' \
  AND n.nspname !~ '^pg_' AND n.nspname <> 'information_schema' \
ORDER BY n.nspname, t.typname";

const ENUM_LABELS: &str = "\
SELECT e.enumlabel AS label \
FROM pg_catalog.pg_enum e \
WHERE e.enumtypid::int8 = $1 \
ORDER BY e.enumsortorder";

const TABLES: &str = "\
SELECT c.oid::int8 AS oid, n.nspname AS namespace, c.relname AS name, \
       obj_description(c.oid, 'pg_class') AS comment \
FROM pg_catalog.pg_class c \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
WHERE c.relkind = 'r' \
  AND n.nspname !~ '^pg_' AND n.nspname <> 'information_schema' \
ORDER BY n.nspname, c.relname";

const COLUMNS: &str = "\
SELECT a.attname AS name, \
       pg_catalog.format_type(a.atttypid, a.atttypmod) AS type, \
       a.attnotnull AS not_null, \
       pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS default_expr \
FROM pg_catalog.pg_attribute a \
LEFT JOIN pg_catalog.pg_attrdef d \
       ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
WHERE a.attrelid::int8 = $1 AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attnum";

const PRIMARY_KEY: &str = "\
SELECT a.attname AS name \
FROM pg_catalog.pg_index i \
JOIN pg_catalog.pg_attribute a \
  ON a.attrelid = i.indrelid AND a.attnum = ANY (i.indkey) \
WHERE i.indrelid::int8 = $1 AND i.indisprimary \
ORDER BY array_position(i.indkey::int2[], a.attnum)";

const VIEWS: &str = "\
SELECT c.oid::int8 AS oid, n.nspname AS namespace, c.relname AS name, \
       pg_catalog.pg_get_viewdef(c.oid, true) AS query, \
       obj_description(c.oid, 'pg_class') AS comment \
FROM pg_catalog.pg_class c \
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
WHERE c.relkind = 'v' \
  AND n.nspname !~ '^pg_' AND n.nspname <> 'information_schema' \
ORDER BY n.nspname, c.relname";

const FUNCTIONS: &str = "\
SELECT p.oid::int8 AS oid, n.nspname AS namespace, p.proname AS name, \
       pg_catalog.pg_get_function_identity_arguments(p.oid) AS args, \
       pg_catalog.pg_get_function_result(p.oid) AS returns, \
       l.lanname AS language, p.prosrc AS body, \
       obj_description(p.oid, 'pg_proc') AS comment \
FROM pg_catalog.pg_proc p \
JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace \
JOIN pg_catalog.pg_language l ON l.oid = p.prolang \
WHERE p.prokind = 'f' AND l.lanname NOT IN ('internal', 'c') \
  AND n.nspname !~ '^pg_' AND n.nspname <> 'information_schema' \
ORDER BY n.nspname, p.proname, args";

const INDEXES: &str = "\
SELECT c.oid::int8 AS oid, c.relname AS name, \
       tn.nspname AS table_namespace, t.relname AS table_name, \
       i.indexrelid::int8 AS indexrelid, i.indnatts::int4 AS natts, \
       i.indisunique AS is_unique, am.amname AS method, \
       obj_description(c.oid, 'pg_class') AS comment \
FROM pg_catalog.pg_index i \
JOIN pg_catalog.pg_class c ON c.oid = i.indexrelid \
JOIN pg_catalog.pg_class t ON t.oid = i.indrelid \
JOIN pg_catalog.pg_namespace tn ON tn.oid = t.relnamespace \
JOIN pg_catalog.pg_am am ON am.oid = c.relam \
WHERE NOT i.indisprimary AND t.relkind = 'r' \
  AND tn.nspname !~ '^pg_' AND tn.nspname <> 'information_schema' \
ORDER BY tn.nspname, t.relname, c.relname";

const INDEX_COLUMNS: &str = "\
SELECT pg_catalog.pg_get_indexdef($1::int8::oid, k.n, true) AS expr \
FROM generate_series(1, $2::int4) AS k(n)";

const TRIGGERS: &str = "\
SELECT t.oid::int8 AS oid, t.tgname AS name, \
       tn.nspname AS table_namespace, c.relname AS table_name, \
       t.tgtype::int4 AS tgtype, \
       pn.nspname AS function_namespace, p.proname AS function_name, \
       pg_catalog.pg_get_expr(t.tgqual, t.tgrelid) AS when_clause \
FROM pg_catalog.pg_trigger t \
JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid \
JOIN pg_catalog.pg_namespace tn ON tn.oid = c.relnamespace \
JOIN pg_catalog.pg_proc p ON p.oid = t.tgfoid \
JOIN pg_catalog.pg_namespace pn ON pn.oid = p.pronamespace \
WHERE NOT t.tgisinternal \
  AND tn.nspname !~ '^pg_' AND tn.nspname <> 'information_schema' \
ORDER BY tn.nspname, c.relname, t.tgname";

const DEPENDS: &str = "\
SELECT d.objid::int8 AS child, d.refobjid::int8 AS parent \
FROM pg_catalog.pg_depend d \
WHERE d.deptype IN ('n', 'a') \
  AND d.objid::int8 = ANY($1) \
  AND d.refobjid::int8 = ANY($1)";

// Views reach their referenced tables through their rewrite rule, not
// through a direct pg_depend edge.
const VIEW_DEPENDS: &str = "\
SELECT r.ev_class::int8 AS child, d.refobjid::int8 AS parent \
FROM pg_catalog.pg_depend d \
JOIN pg_catalog.pg_rewrite r ON r.oid = d.objid \
WHERE d.classid = 'pg_catalog.pg_rewrite'::regclass \
  AND r.ev_class::int8 = ANY($1) \
  AND d.refobjid::int8 = ANY($1)";

// pg_trigger.tgtype bits.
const TRIGGER_ROW: i32 = 1 << 0;
const TRIGGER_BEFORE: i32 = 1 << 1;
const TRIGGER_INSERT: i32 = 1 << 2;
const TRIGGER_DELETE: i32 = 1 << 3;
const TRIGGER_UPDATE: i32 = 1 << 4;
const TRIGGER_TRUNCATE: i32 = 1 << 5;
const TRIGGER_INSTEAD: i32 = 1 << 6;

/// Decodes a `tgtype` bitmask into timing, events and row-level flag.
fn trigger_shape(tgtype: i32) -> (&'static str, Vec<String>, bool) {
    let timing = if tgtype & TRIGGER_INSTEAD != 0 {
        "instead of"
    } else if tgtype & TRIGGER_BEFORE != 0 {
        "before"
    } else {
        "after"
    };
    let mut events = Vec::new();
    for (bit, event) in [
        (TRIGGER_DELETE, "delete"),
        (TRIGGER_INSERT, "insert"),
        (TRIGGER_TRUNCATE, "truncate"),
        (TRIGGER_UPDATE, "update"),
    ] {
        if tgtype & bit != 0 {
            events.push(event.to_string());
        }
    }
    (timing, events, tgtype & TRIGGER_ROW != 0)
}

fn object_row(oid: i64, name: String, comment: Option<String>) -> FieldMap {
    let mut map = FieldMap::new()
        .with("name", Value::text(name))
        .with("oid", Value::Int(oid));
    if let Some(comment) = comment {
        map.insert("comment", Value::text(comment));
    }
    map
}

/// Live-database catalog access over a sqlx connection pool.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Wraps a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The connected server's version, from `SHOW server_version_num`.
    pub async fn server_version(&self) -> Result<ServerVersion> {
        let row = sqlx::query("SHOW server_version_num")
            .fetch_one(&self.pool)
            .await?;
        let raw: String = row.try_get(0)?;
        match ServerVersion::parse(&raw) {
            Some(version) => Ok(version),
            None => {
                warn!(raw = %raw, "Unrecognized server version, assuming PostgreSQL 12");
                Ok(ServerVersion::V12)
            }
        }
    }

    /// Gathers every user-visible object and the dependency relation
    /// between them, in one pass.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let mut rows = Vec::new();
        self.schemas(&mut rows).await?;
        self.enums(&mut rows).await?;
        self.tables(&mut rows).await?;
        self.functions(&mut rows).await?;
        self.views(&mut rows).await?;
        self.indexes(&mut rows).await?;
        self.triggers(&mut rows).await?;

        let mut snapshot = CatalogSnapshot {
            rows,
            deps: HashMap::new(),
        };
        snapshot.deps = self.dependencies(&snapshot.oids()).await?;
        debug!(
            objects = snapshot.rows.len(),
            edges = snapshot.deps.values().map(BTreeSet::len).sum::<usize>(),
            "Gathered catalog snapshot"
        );
        Ok(snapshot)
    }

    /// Parent dependencies for a set of known identities, from `pg_depend`.
    pub async fn dependencies(&self, oids: &[Oid]) -> Result<HashMap<Oid, BTreeSet<Oid>>> {
        let ids: Vec<i64> = oids.iter().map(|o| i64::from(o.0)).collect();
        let mut deps: HashMap<Oid, BTreeSet<Oid>> = HashMap::new();
        for query in [DEPENDS, VIEW_DEPENDS] {
            for row in sqlx::query(query).bind(&ids).fetch_all(&self.pool).await? {
                let child: i64 = row.try_get("child")?;
                let parent: i64 = row.try_get("parent")?;
                if child == parent {
                    continue;
                }
                if let (Ok(child), Ok(parent)) = (u32::try_from(child), u32::try_from(parent)) {
                    deps.entry(Oid(child)).or_default().insert(Oid(parent));
                }
            }
        }
        Ok(deps)
    }

    async fn schemas(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(SCHEMAS).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let name: String = row.try_get("name")?;
            let comment: Option<String> = row.try_get("comment")?;
            rows.push((OpKind::CreateSchema, object_row(oid, name, comment)));
        }
        Ok(())
    }

    async fn enums(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(ENUMS).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let namespace: String = row.try_get("namespace")?;
            let name: String = row.try_get("name")?;
            let comment: Option<String> = row.try_get("comment")?;

            let mut labels = Vec::new();
            for label_row in sqlx::query(ENUM_LABELS)
                .bind(oid)
                .fetch_all(&self.pool)
                .await?
            {
                labels.push(label_row.try_get::<String, _>("label")?);
            }

            let mut map = object_row(oid, format!("{namespace}.{name}"), comment);
            map.insert("values", Value::texts(labels));
            rows.push((OpKind::CreateEnum, map));
        }
        Ok(())
    }

    async fn tables(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(TABLES).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let namespace: String = row.try_get("namespace")?;
            let name: String = row.try_get("name")?;
            let comment: Option<String> = row.try_get("comment")?;

            let mut columns = Vec::new();
            for column in sqlx::query(COLUMNS).bind(oid).fetch_all(&self.pool).await? {
                let mut record = FieldMap::new()
                    .with("name", Value::text(column.try_get::<String, _>("name")?))
                    .with("type", Value::text(column.try_get::<String, _>("type")?));
                if column.try_get::<bool, _>("not_null")? {
                    record.insert("null", Value::Bool(false));
                }
                if let Some(default) = column.try_get::<Option<String>, _>("default_expr")? {
                    record.insert("default", Value::text(default));
                }
                columns.push(Value::Map(record));
            }

            let mut primary_key = Vec::new();
            for key in sqlx::query(PRIMARY_KEY)
                .bind(oid)
                .fetch_all(&self.pool)
                .await?
            {
                primary_key.push(key.try_get::<String, _>("name")?);
            }

            let mut map = object_row(oid, format!("{namespace}.{name}"), comment);
            map.insert("columns", Value::List(columns));
            if !primary_key.is_empty() {
                map.insert("primary_key", Value::texts(primary_key));
            }
            rows.push((OpKind::CreateTable, map));
        }
        Ok(())
    }

    async fn views(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(VIEWS).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let namespace: String = row.try_get("namespace")?;
            let name: String = row.try_get("name")?;
            let query: String = row.try_get("query")?;
            let comment: Option<String> = row.try_get("comment")?;

            let mut map = object_row(oid, format!("{namespace}.{name}"), comment);
            // pg_get_viewdef appends a trailing semicolon.
            map.insert(
                "query",
                Value::text(query.trim_end().trim_end_matches(';').trim_end()),
            );
            rows.push((OpKind::CreateView, map));
        }
        Ok(())
    }

    async fn functions(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(FUNCTIONS).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let namespace: String = row.try_get("namespace")?;
            let name: String = row.try_get("name")?;
            let args: String = row.try_get("args")?;
            let returns: String = row.try_get("returns")?;
            let language: String = row.try_get("language")?;
            let body: String = row.try_get("body")?;
            let comment: Option<String> = row.try_get("comment")?;

            let mut map = object_row(oid, format!("{namespace}.{name}({args})"), comment);
            map.insert("returns", Value::text(returns));
            map.insert("language", Value::text(language));
            map.insert("body", Value::text(body.trim_matches('\n')));
            rows.push((OpKind::CreateFunction, map));
        }
        Ok(())
    }

    async fn indexes(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(INDEXES).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let name: String = row.try_get("name")?;
            let table_namespace: String = row.try_get("table_namespace")?;
            let table_name: String = row.try_get("table_name")?;
            let indexrelid: i64 = row.try_get("indexrelid")?;
            let natts: i32 = row.try_get("natts")?;
            let is_unique: bool = row.try_get("is_unique")?;
            let method: String = row.try_get("method")?;
            let comment: Option<String> = row.try_get("comment")?;

            let mut columns = Vec::new();
            for column in sqlx::query(INDEX_COLUMNS)
                .bind(indexrelid)
                .bind(natts)
                .fetch_all(&self.pool)
                .await?
            {
                columns.push(column.try_get::<String, _>("expr")?);
            }

            let mut map = FieldMap::new()
                .with(
                    "table",
                    Value::text(format!("{table_namespace}.{table_name}")),
                )
                .with("columns", Value::texts(columns))
                .with("name", Value::text(name))
                .with("oid", Value::Int(oid));
            if is_unique {
                map.insert("unique", Value::Bool(true));
            }
            if method != "btree" {
                map.insert("method", Value::text(method));
            }
            if let Some(comment) = comment {
                map.insert("comment", Value::text(comment));
            }
            rows.push((OpKind::CreateIndex, map));
        }
        Ok(())
    }

    async fn triggers(&self, rows: &mut Vec<(OpKind, FieldMap)>) -> Result<()> {
        for row in sqlx::query(TRIGGERS).fetch_all(&self.pool).await? {
            let oid: i64 = row.try_get("oid")?;
            let name: String = row.try_get("name")?;
            let table_namespace: String = row.try_get("table_namespace")?;
            let table_name: String = row.try_get("table_name")?;
            let tgtype: i32 = row.try_get("tgtype")?;
            let function_namespace: String = row.try_get("function_namespace")?;
            let function_name: String = row.try_get("function_name")?;
            let when_clause: Option<String> = row.try_get("when_clause")?;

            let (timing, events, for_each_row) = trigger_shape(tgtype);
            let mut map = FieldMap::new()
                .with(
                    "table",
                    Value::text(format!("{table_namespace}.{table_name}")),
                )
                .with("name", Value::text(name))
                .with("oid", Value::Int(oid))
                .with("timing", Value::text(timing))
                .with("events", Value::texts(events))
                .with(
                    "function",
                    Value::text(format!("{function_namespace}.{function_name}")),
                );
            if !for_each_row {
                map.insert("for_each_row", Value::Bool(false));
            }
            if let Some(when) = when_clause {
                map.insert("when", Value::text(when));
            }
            rows.push((OpKind::CreateTrigger, map));
        }
        Ok(())
    }
}
