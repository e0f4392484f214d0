//! The canonical snippet form.
//!
//! One operation per logical line: the kind keyword, positional arguments,
//! then `key: value` pairs. Table kinds may open a brace block of
//! sub-entries (columns, actions). Long or multi-line text values are
//! emitted as squiggly heredocs whose bodies follow the line that declared
//! them, so SQL queries and function bodies stay readable.
//!
//! Writing then parsing a snippet reconstructs operations that render the
//! same SQL; the writer emits canonical field order and omitted defaults,
//! which is what makes catalog dumps diffable.

mod parse;
mod write;

pub use parse::parse;
pub use write::render;

use crate::value::Value;

/// One logical snippet line: keyword, arguments, optional sub-entries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub(crate) keyword: String,
    pub(crate) args: Vec<Arg>,
    pub(crate) block: Vec<Line>,
}

/// One argument on a line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    /// Bound to a field by position, per the kind's descriptor. The writer
    /// records the field name as a formatting hint; the parser leaves it
    /// empty and binds by position alone.
    Positional(String, Value),
    /// Bound to a field by (possibly aliased) key.
    Keyed(String, Value),
}

/// Field names whose heredoc marker reads `SQL` instead of `TEXT`.
pub(crate) fn is_sql_key(key: &str) -> bool {
    matches!(
        key,
        "query"
            | "from_query"
            | "body"
            | "from_body"
            | "up"
            | "down"
            | "from_statement"
            | "when"
            | "default"
            | "from_default"
    )
}

#[cfg(test)]
mod tests {
    use crate::ident::QualifiedName;
    use crate::op::{
        AlterTable, ColumnDef, CreateFunction, CreateIndex, CreateTable, CreateView, DropTable,
        Operation, RawSql, TableAction,
    };

    use super::{parse, render};

    fn round_trip(op: Operation) -> Operation {
        let text = render(std::slice::from_ref(&op));
        let mut back = parse(&text).expect(&text);
        assert_eq!(back.len(), 1, "{text}");
        back.remove(0)
    }

    #[test]
    fn test_create_table_block_round_trip() {
        let op = Operation::CreateTable(
            CreateTable::new(QualifiedName::parse("public.users"))
                .column(ColumnDef::new("id", "bigint").not_null())
                .column(ColumnDef::new("email", "text").default_expr("''"))
                .primary_key(["id"]),
        );
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_create_table_snippet_shape() {
        let op = Operation::CreateTable(
            CreateTable::new(QualifiedName::parse("public.users"))
                .column(ColumnDef::new("id", "bigint").not_null())
                .primary_key(["id"]),
        );
        let text = render(std::slice::from_ref(&op));
        assert_eq!(
            text,
            "create_table \"public.users\" {\n  column \"id\", type: \"bigint\", null: false\n  primary_key [\"id\"]\n}\n"
        );
    }

    #[test]
    fn test_alter_table_actions_round_trip() {
        let op = Operation::AlterTable(
            AlterTable::new(QualifiedName::parse("public.users"))
                .action(TableAction::AddColumn {
                    column: ColumnDef::new("active", "boolean").not_null(),
                })
                .action(TableAction::RenameColumn {
                    name: "mail".to_string(),
                    new_name: "email".to_string(),
                }),
        );
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_multiline_query_uses_heredoc() {
        let op = Operation::CreateView(CreateView::new(
            QualifiedName::parse("public.active_users"),
            "SELECT *\nFROM users\nWHERE active",
        ));
        let text = render(std::slice::from_ref(&op));
        assert!(text.contains("query: <<~SQL"), "{text}");
        assert!(text.contains("FROM users\n"), "{text}");
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_heredoc_marker_escalates_on_collision() {
        let body = "SQL\nSELECT 1";
        let op = Operation::RawSql(RawSql::new(body));
        let text = render(std::slice::from_ref(&op));
        assert!(text.contains("<<~SQL_"), "{text}");
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_embedded_quotes_use_raw_string() {
        let op = Operation::RawSql(RawSql::new(r#"SELECT '"'"#));
        let text = render(std::slice::from_ref(&op));
        assert!(text.contains("r#\""), "{text}");
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_drop_table_shadow_records_round_trip() {
        let mut op = DropTable::new(QualifiedName::parse("public.users"));
        op.from_columns = Some(vec![
            ColumnDef::new("id", "bigint").not_null(),
            ColumnDef::new("email", "text"),
        ]);
        op.from_primary_key = Some(vec!["id".to_string()]);
        let op = Operation::DropTable(op);
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_two_heredocs_on_one_line() {
        let op = Operation::RawSql(
            RawSql::new("GRANT SELECT\nON users TO reporting")
                .down("REVOKE SELECT\nON users FROM reporting"),
        );
        assert_eq!(round_trip(op.clone()), op);
    }

    #[test]
    fn test_index_and_function_round_trip() {
        let index = Operation::CreateIndex(
            CreateIndex::new(QualifiedName::parse("public.users"), ["email"]).unique(),
        );
        assert_eq!(round_trip(index.clone()), index);

        let function = Operation::CreateFunction(CreateFunction::new(
            QualifiedName::parse("public.touch()"),
            "trigger",
            "plpgsql",
            "BEGIN\n  NEW.updated_at = now();\n  RETURN NEW;\nEND;",
        ));
        assert_eq!(round_trip(function.clone()), function);
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "# catalog dump\n\ncreate_schema \"app\"\n\n# done\n";
        let ops = parse(text).unwrap();
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_multiple_operations_round_trip() {
        let ops = vec![
            Operation::CreateSchema(crate::op::CreateSchema::new("app")),
            Operation::CreateTable(
                CreateTable::new(QualifiedName::parse("app.users"))
                    .column(ColumnDef::new("id", "bigint").not_null())
                    .primary_key(["id"]),
            ),
        ];
        let text = render(&ops);
        assert_eq!(parse(&text).unwrap(), ops);
    }
}
