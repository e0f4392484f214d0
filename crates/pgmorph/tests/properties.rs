//! Cross-component properties of the operation engine.
//!
//! These tests exercise the resolver, the inversion protocol and the
//! canonical serializer together: topological correctness and stability,
//! invert-invert equivalence, reason aggregation across compound
//! operations, and snippet round-trips.

use std::collections::{BTreeSet, HashMap};

use pgmorph::prelude::*;
use pgmorph::snippet;

fn with_oid(mut op: Operation, oid: u32) -> Operation {
    if let Some(common) = op.common_mut() {
        common.oid = Some(Oid(oid));
    }
    op
}

fn schema(oid: u32, name: &str) -> Operation {
    with_oid(Operation::CreateSchema(CreateSchema::new(name)), oid)
}

fn table(oid: u32, name: &str) -> Operation {
    with_oid(
        Operation::CreateTable(
            CreateTable::new(QualifiedName::parse(name))
                .column(ColumnDef::new("id", "bigint").not_null())
                .primary_key(["id"]),
        ),
        oid,
    )
}

fn function(oid: u32, name: &str) -> Operation {
    with_oid(
        Operation::CreateFunction(CreateFunction::new(
            QualifiedName::parse(name),
            "trigger",
            "plpgsql",
            "BEGIN RETURN NEW; END;",
        )),
        oid,
    )
}

fn deps(edges: &[(u32, &[u32])]) -> HashMap<Oid, BTreeSet<Oid>> {
    edges
        .iter()
        .map(|(child, parents)| (Oid(*child), parents.iter().map(|p| Oid(*p)).collect()))
        .collect()
}

fn labels(ops: &[Operation]) -> Vec<String> {
    ops.iter().map(Identify::label).collect()
}

// =========================================================================
// Resolver: topological correctness and stability
// =========================================================================

#[test]
fn test_resolver_chain_scenario() {
    // table <- function <- trigger-ish chain: 1 <- 2 <- 3.
    let items = vec![
        table(1, "app.users"),
        function(2, "app.touch()"),
        table(3, "app.audit"),
    ];
    let deps = deps(&[(2, &[1]), (3, &[2])]);

    let resolved = resolve(items, &deps).unwrap();
    assert_eq!(
        labels(&resolved),
        vec![
            "create_table app.users",
            "create_function app.touch()",
            "create_table app.audit",
        ]
    );
}

#[test]
fn test_resolver_independents_keep_input_order() {
    let items = vec![table(1, "app.b"), table(2, "app.a")];
    let resolved = resolve(items, &HashMap::new()).unwrap();
    assert_eq!(labels(&resolved), vec!["create_table app.b", "create_table app.a"]);
}

#[test]
fn test_resolver_parent_precedes_child_under_permutation() {
    let build = |order: &[u32]| -> Vec<Operation> {
        order
            .iter()
            .map(|oid| match oid {
                1 => schema(1, "app"),
                2 => table(2, "app.users"),
                _ => function(3, "app.touch()"),
            })
            .collect()
    };
    let relation = deps(&[(2, &[1]), (3, &[1, 2])]);

    for order in [
        [1, 2, 3],
        [1, 3, 2],
        [2, 1, 3],
        [2, 3, 1],
        [3, 1, 2],
        [3, 2, 1],
    ] {
        let resolved = resolve(build(&order), &relation).unwrap();
        let position = |label: &str| {
            labels(&resolved)
                .iter()
                .position(|l| l == label)
                .unwrap()
        };
        assert!(position("create_schema app") < position("create_table app.users"));
        assert!(position("create_table app.users") < position("create_function app.touch()"));
    }
}

#[test]
fn test_resolver_rejects_cyclic_relation() {
    let items = vec![table(1, "app.a"), table(2, "app.b")];
    let relation = deps(&[(1, &[2]), (2, &[1])]);
    assert!(matches!(
        resolve(items, &relation),
        Err(Error::CycleDetected { .. })
    ));
}

// =========================================================================
// Inversion: invert-invert equivalence and reason aggregation
// =========================================================================

#[test]
fn test_invert_invert_renders_identically() {
    let cases = vec![
        Operation::RenameTable(RenameTable::new(
            QualifiedName::parse("app.users"),
            QualifiedName::parse("app.accounts"),
        )),
        Operation::CreateView(
            CreateView::new(QualifiedName::parse("app.v"), "SELECT 2")
                .or_replace(Some("SELECT 1".to_string())),
        ),
        Operation::AlterTable(
            AlterTable::new(QualifiedName::parse("app.users")).action(TableAction::AlterColumn {
                name: "id".to_string(),
                changes: ColumnChanges::new().set_type(Tracked::with_previous(
                    "bigint".to_string(),
                    "integer".to_string(),
                )),
            }),
        ),
        Operation::RawSql(RawSql::new("GRANT SELECT ON app.users TO reporting")
            .down("REVOKE SELECT ON app.users FROM reporting")),
    ];

    for op in cases {
        let validated = op.validated().unwrap();
        let inverse = validated.invert().unwrap().unwrap();
        let back = inverse.invert().unwrap().unwrap();
        assert_eq!(
            back.render(ServerVersion::V16).unwrap(),
            validated.render(ServerVersion::V16).unwrap(),
        );
    }
}

#[test]
fn test_compound_inversion_unions_reasons() {
    // One invertible facet, two irreversible ones: the failure carries
    // both reasons, not just the first.
    let op = Operation::AlterTable(
        AlterTable::new(QualifiedName::parse("app.users"))
            .action(TableAction::AddColumn {
                column: ColumnDef::new("active", "boolean"),
            })
            .action(TableAction::DropColumn {
                name: "legacy".to_string(),
                from_column: None,
            })
            .action(TableAction::AlterColumn {
                name: "id".to_string(),
                changes: ColumnChanges::new().set_type(Tracked::new("bigint".to_string())),
            }),
    );
    let err = op.validated().unwrap().invert().unwrap_err();
    let reasons = err.reasons();
    assert_eq!(reasons.len(), 2);
    assert!(reasons.iter().any(|r| r.mentions("legacy")));
    assert!(reasons.iter().any(|r| r.mentions("type")));
}

#[test]
fn test_comment_change_without_shadow_mentions_comment() {
    let op = Operation::AlterTable(
        AlterTable::new(QualifiedName::parse("app.users"))
            .set_comment(Tracked::new(Some("people".to_string()))),
    );
    let err = op.validated().unwrap().invert().unwrap_err();
    assert!(err.reasons().iter().any(|r| r.mentions("comment")));
    assert_eq!(
        err.reasons()[0].kind,
        ReasonKind::MissingPreviousValueShadow
    );
}

#[test]
fn test_cascade_always_irreversible() {
    // Full shadow state is present; the cascade flag alone blocks it.
    let mut drop = DropTable::new(QualifiedName::parse("app.users"));
    drop.from_columns = Some(vec![ColumnDef::new("id", "bigint").not_null()]);
    drop.from_primary_key = Some(vec!["id".to_string()]);
    drop.common.force = Force::Cascade;

    let err = Operation::DropTable(drop)
        .validated()
        .unwrap()
        .invert()
        .unwrap_err();
    assert!(err.reasons().iter().any(|r| r.mentions("cascade")));
    assert_eq!(err.reasons()[0].kind, ReasonKind::DestructiveFlagUsed);
}

#[test]
fn test_validate_constraint_inverts_to_nothing() {
    let op = Operation::ValidateConstraint(ValidateConstraint::new(
        QualifiedName::parse("app.users"),
        "users_email_check",
    ));
    assert!(op.validated().unwrap().invert().unwrap().is_none());
}

// =========================================================================
// Canonical serializer: round-trips
// =========================================================================

#[test]
fn test_snippet_round_trip_preserves_rendering() {
    let ops = vec![
        schema(0, "app"),
        Operation::CreateEnum(CreateEnum::new(
            QualifiedName::parse("app.user_status"),
            ["pending", "active", "banned"],
        )),
        table(0, "app.users"),
        Operation::CreateIndex(
            CreateIndex::new(QualifiedName::parse("app.users"), ["email"]).unique(),
        ),
        Operation::CreateView(CreateView::new(
            QualifiedName::parse("app.active_users"),
            "SELECT *\nFROM app.users\nWHERE active",
        )),
        function(0, "app.touch()"),
    ];

    let text = snippet::render(&ops);
    let parsed = snippet::parse(&text).unwrap();
    assert_eq!(parsed.len(), ops.len());

    for (original, reparsed) in ops.iter().zip(&parsed) {
        let a = original.clone().validated().unwrap();
        let b = reparsed.clone().validated().unwrap();
        assert_eq!(
            a.render(ServerVersion::V16).unwrap(),
            b.render(ServerVersion::V16).unwrap(),
        );
    }

    // Byte-stable: re-rendering the parsed batch reproduces the text.
    assert_eq!(snippet::render(&parsed), text);
}

#[test]
fn test_dump_pipeline_end_to_end() {
    // A hand-built snapshot: rows arrive in catalog order (tables before
    // the schema that owns them), the dump reorders and round-trips.
    let column = FieldMap::new()
        .with("name", Value::text("id"))
        .with("type", Value::text("bigint"))
        .with("null", Value::Bool(false));
    let snapshot = CatalogSnapshot {
        rows: vec![
            (
                OpKind::CreateTable,
                FieldMap::new()
                    .with("name", Value::text("app.users"))
                    .with("oid", Value::Int(20))
                    .with("columns", Value::List(vec![Value::Map(column)]))
                    .with("primary_key", Value::texts(["id"])),
            ),
            (
                OpKind::CreateSchema,
                FieldMap::new()
                    .with("name", Value::text("app"))
                    .with("oid", Value::Int(10)),
            ),
        ],
        deps: [(Oid(20), BTreeSet::from([Oid(10)]))].into_iter().collect(),
    };

    let text = dump_snapshot(&snapshot).unwrap();
    assert!(text.starts_with("create_schema \"app\""), "{text}");

    let ops = snippet::parse(&text).unwrap();
    let statements = forward_sql(&ops, ServerVersion::V16).unwrap();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("CREATE SCHEMA app"));
    assert!(statements[1].starts_with("CREATE TABLE app.users"));
}
