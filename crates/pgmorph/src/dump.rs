//! Dependency-ordered canonical schema dumps.
//!
//! A dump reconstructs one operation per catalog row, orders the batch so
//! every referenced object precedes its dependents, and renders the result
//! in canonical snippet form. Identical catalogs produce byte-identical
//! dumps, so two dumps diff cleanly and a dump replays in one pass.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::catalog::{CatalogSnapshot, PgCatalog};
use crate::error::Result;
use crate::op::Operation;
use crate::resolve::resolve;
use crate::snippet;

/// Reconstructs and validates one operation per snapshot row, ordered so
/// every referenced object precedes its dependents. Pure, no I/O.
pub fn snapshot_operations(snapshot: &CatalogSnapshot) -> Result<Vec<Operation>> {
    let mut ops = Vec::with_capacity(snapshot.rows.len());
    for (kind, fields) in &snapshot.rows {
        let op = Operation::from_fields(*kind, fields);
        ops.push(op.validated()?.into_inner());
    }
    resolve(ops, &snapshot.deps)
}

/// Renders an already-fetched snapshot in canonical snippet form.
pub fn dump_snapshot(snapshot: &CatalogSnapshot) -> Result<String> {
    Ok(snippet::render(&snapshot_operations(snapshot)?))
}

/// Gathers a live database's snapshot into an ordered operation batch.
pub async fn database_operations(pool: &PgPool) -> Result<Vec<Operation>> {
    let catalog = PgCatalog::new(pool.clone());
    let snapshot = catalog.snapshot().await?;
    info!(objects = snapshot.rows.len(), "Dumping schema");
    snapshot_operations(&snapshot)
}

/// Gathers a live database's snapshot and renders it.
pub async fn dump_database(pool: &PgPool) -> Result<String> {
    Ok(snippet::render(&database_operations(pool).await?))
}
