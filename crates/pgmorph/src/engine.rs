//! Applies and rolls back operation batches against a live database.
//!
//! Execution is sequential and fail-fast: each operation is validated,
//! rendered against the connected server's version and executed before the
//! next is considered. Transaction boundaries, retries and pooling policy
//! belong to the caller.

use sqlx::postgres::PgPool;
use sqlx::{Executor, Row};
use tracing::{debug, info};

use crate::catalog::PgCatalog;
use crate::error::{Error, Result};
use crate::ident::Oid;
use crate::op::{OpKind, Operation};
use crate::resolve::Identify;
use crate::version::ServerVersion;

/// Renders forward SQL for a batch, in order, without touching a database.
/// No-ops at the target version are skipped.
pub fn forward_sql(ops: &[Operation], target: ServerVersion) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    for op in ops {
        let validated = op.clone().validated()?;
        if let Some(sql) = validated.render(target)? {
            statements.push(sql);
        }
    }
    Ok(statements)
}

/// Renders rollback SQL for a batch: each operation's inverse, the batch
/// in reverse order. Every inversion is attempted even after one fails, so
/// the error carries the full set of irreversibility reasons.
pub fn rollback_sql(ops: &[Operation], target: ServerVersion) -> Result<Vec<String>> {
    let mut reasons = Vec::new();
    let mut inverses = Vec::new();
    for op in ops.iter().rev() {
        let validated = op.clone().validated()?;
        match validated.invert() {
            Ok(Some(inverse)) => inverses.push(inverse),
            Ok(None) => {}
            Err(Error::Irreversible(more)) => reasons.extend(more),
            Err(other) => return Err(other),
        }
    }
    if !reasons.is_empty() {
        return Err(Error::Irreversible(reasons));
    }
    let mut statements = Vec::new();
    for inverse in &inverses {
        if let Some(sql) = inverse.render(target)? {
            statements.push(sql);
        }
    }
    Ok(statements)
}

/// Executes operation batches against a database.
pub struct Engine {
    pool: PgPool,
    dry_run: bool,
}

impl Engine {
    /// Creates an engine over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// The connected server's version.
    pub async fn server_version(&self) -> Result<ServerVersion> {
        PgCatalog::new(self.pool.clone()).server_version().await
    }

    /// Validates, renders and executes each operation in order, recording
    /// the catalog identity of newly created objects.
    pub async fn apply(&self, ops: &mut [Operation]) -> Result<()> {
        let target = self.server_version().await?;
        for op in ops.iter_mut() {
            let validated = op.clone().validated()?;
            let Some(sql) = validated.render(target)? else {
                debug!(operation = %op.label(), "No-op at this target, skipping");
                continue;
            };

            info!(operation = %op.label(), "Applying operation");
            debug!(sql = %sql, "Executing SQL");
            if self.dry_run {
                println!("{sql};");
                continue;
            }
            // Simple-query protocol: comment statements may ride along.
            self.pool.execute(sql.as_str()).await?;

            if let Some(oid) = self.created_oid(op).await? {
                debug!(operation = %op.label(), oid = oid.0, "Recorded catalog identity");
                if let Some(common) = op.common_mut() {
                    common.oid = Some(oid);
                }
            }
        }
        Ok(())
    }

    /// Computes every operation's inverse, then executes the inverses in
    /// reverse batch order. Nothing is executed if any inversion fails.
    pub async fn rollback(&self, ops: &[Operation]) -> Result<()> {
        let target = self.server_version().await?;
        let statements = rollback_sql(ops, target)?;
        for sql in &statements {
            info!(sql = %sql, "Rolling back");
            if self.dry_run {
                println!("{sql};");
                continue;
            }
            self.pool.execute(sql.as_str()).await?;
        }
        Ok(())
    }

    /// Looks up the identity a create operation just registered, through
    /// the name-to-oid cast the object class supports.
    async fn created_oid(&self, op: &Operation) -> Result<Option<Oid>> {
        let Some(common) = op.common() else {
            return Ok(None);
        };
        if common.name.is_empty() {
            return Ok(None);
        }
        let caster = match op.kind() {
            OpKind::CreateSchema => "to_regnamespace",
            OpKind::CreateTable | OpKind::CreateView | OpKind::CreateIndex => "to_regclass",
            OpKind::CreateFunction => "to_regprocedure",
            OpKind::CreateEnum => "to_regtype",
            _ => return Ok(None),
        };
        let query = format!("SELECT {caster}($1)::oid::int8");
        let row = sqlx::query(&query)
            .bind(common.name.sql())
            .fetch_one(&self.pool)
            .await?;
        let oid: Option<i64> = row.try_get(0)?;
        Ok(oid.and_then(|i| u32::try_from(i).ok()).map(Oid))
    }
}

#[cfg(test)]
mod tests {
    use crate::ident::QualifiedName;
    use crate::invert::ReasonKind;
    use crate::op::{AlterEnum, ColumnDef, CreateSchema, CreateTable, DropTable, RawSql};

    use super::*;

    fn batch() -> Vec<Operation> {
        vec![
            Operation::CreateSchema(CreateSchema::new("app")),
            Operation::CreateTable(
                CreateTable::new(QualifiedName::parse("app.users"))
                    .column(ColumnDef::new("id", "bigint").not_null())
                    .primary_key(["id"]),
            ),
        ]
    }

    #[test]
    fn test_forward_sql_in_batch_order() {
        let statements = forward_sql(&batch(), ServerVersion::V14).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE SCHEMA"));
        assert!(statements[1].starts_with("CREATE TABLE"));
    }

    #[test]
    fn test_rollback_sql_reverses_batch_order() {
        let statements = rollback_sql(&batch(), ServerVersion::V14).unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("DROP TABLE"), "{statements:?}");
        assert!(statements[1].starts_with("DROP SCHEMA"), "{statements:?}");
    }

    #[test]
    fn test_rollback_sql_collects_every_reason() {
        let ops = vec![
            Operation::AlterEnum(AlterEnum::add_value(
                QualifiedName::parse("public.user_status"),
                "suspended",
            )),
            Operation::RawSql(RawSql::new("ANALYZE")),
        ];
        let err = rollback_sql(&ops, ServerVersion::V14).unwrap_err();
        let reasons = err.reasons();
        assert_eq!(reasons.len(), 2);
        // Reverse batch order: the raw statement's reason comes first.
        assert_eq!(reasons[0].kind, ReasonKind::MissingPreviousValueShadow);
        assert_eq!(reasons[1].kind, ReasonKind::StructurallyOneWay);
    }

    #[test]
    fn test_forward_sql_skips_version_marked_noop() {
        let mut schema = CreateSchema::new("app");
        schema.common.version = Some(ServerVersion::V16);
        let ops = vec![Operation::CreateSchema(schema)];
        assert!(forward_sql(&ops, ServerVersion::V14).unwrap().is_empty());
        assert_eq!(forward_sql(&ops, ServerVersion::V16).unwrap().len(), 1);
    }

    #[test]
    fn test_rollback_sql_fails_fast_on_invalid_operation() {
        let ops = vec![Operation::DropTable(DropTable::new(QualifiedName::local("")))];
        assert!(matches!(
            rollback_sql(&ops, ServerVersion::V14),
            Err(Error::Validation(_))
        ));
    }
}
