//! Reversible PostgreSQL schema operations.
//!
//! `pgmorph` models schema-altering commands as structured, validated,
//! serializable and, where possible, automatically reversible units:
//! - Operations are validated declaratively before any SQL is produced
//! - Inversion either yields a logical inverse or explains precisely why
//!   none exists, with categorized reasons
//! - Catalog dumps are dependency-ordered and byte-deterministic, so they
//!   diff cleanly and replay in one pass
//!
//! # Architecture
//!
//! The engine consists of several components:
//!
//! - **Operations** - One struct per schema-change kind (`CreateTable`,
//!   `AlterTable`, `CreateIndex`, ...), sharing common fields by embedding
//!   [`fields::OpCommon`]
//! - **Inversion** - Per-kind logical inverses with a closed taxonomy of
//!   irreversibility reasons
//! - **Resolver** - Pure topological ordering over catalog-reported
//!   dependencies
//! - **Snippet** - Deterministic textual serialization and its parser
//! - **Catalog / Engine** - `pg_catalog` introspection and sequential
//!   execution over sqlx
//!
//! # Example
//!
//! ```rust,ignore
//! use pgmorph::prelude::*;
//!
//! let op = Operation::CreateTable(
//!     CreateTable::new(QualifiedName::parse("app.users"))
//!         .column(ColumnDef::new("id", "bigint").not_null())
//!         .column(ColumnDef::new("email", "text"))
//!         .primary_key(["id"]),
//! );
//!
//! let validated = op.validated()?;
//! let forward = validated.render(ServerVersion::V16)?;
//! let inverse = validated.invert()?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Dump a live schema as dependency-ordered canonical snippets
//! pgmorph dump
//!
//! # Print forward SQL for a snippet file
//! pgmorph sql schema.pgm
//!
//! # Print rollback SQL (or the reasons none exists)
//! pgmorph rollback-sql schema.pgm
//!
//! # Validate a snippet file
//! pgmorph check schema.pgm
//! ```

pub mod catalog;
pub mod dump;
pub mod engine;
pub mod error;
pub mod fields;
pub mod ident;
pub mod invert;
pub mod op;
pub mod quote;
pub mod resolve;
pub mod snippet;
pub mod validate;
pub mod value;
pub mod version;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{CatalogSnapshot, PgCatalog};
    pub use crate::dump::{database_operations, dump_database, dump_snapshot, snapshot_operations};
    pub use crate::engine::{forward_sql, rollback_sql, Engine};
    pub use crate::error::{Error, Result};
    pub use crate::fields::{Force, OpCommon, Tracked};
    pub use crate::ident::{Oid, QualifiedName};
    pub use crate::invert::{Reason, ReasonKind};
    pub use crate::op::{
        AlterEnum, AlterTable, ColumnChanges, ColumnDef, CreateEnum, CreateFunction, CreateIndex,
        CreateSchema, CreateTable, CreateTrigger, CreateView, DropEnum, DropFunction, DropIndex,
        DropSchema, DropTable, DropTrigger, DropView, OpKind, Operation, RawSql, RenameTable,
        TableAction, Validated, ValidateConstraint,
    };
    pub use crate::resolve::{resolve, Identify};
    pub use crate::validate::FieldError;
    pub use crate::value::{FieldMap, Value};
    pub use crate::version::ServerVersion;
}
