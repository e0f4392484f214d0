//! Snippet writer: operations to canonical text.

use crate::op::{OpKind, Operation};
use crate::value::{FieldMap, Value};

use super::{is_sql_key, Arg, Line};

/// Renders operations in canonical snippet form, one per logical line,
/// separated by blank lines. The output is deterministic: identical
/// operations always produce byte-identical text.
#[must_use]
pub fn render(ops: &[Operation]) -> String {
    let mut out = String::new();
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        emit(&encode(op), 0, &mut out);
    }
    out
}

/// Keys pulled out of the header into the brace block, per kind.
fn block_keys(kind: OpKind) -> &'static [&'static str] {
    match kind {
        OpKind::CreateTable => &["columns", "primary_key"],
        OpKind::AlterTable => &["actions", "set_comment", "from_comment"],
        _ => &[],
    }
}

fn encode(op: &Operation) -> Line {
    let kind = op.kind();
    let desc = kind.descriptor();
    let fields = op.to_fields();
    let blocked = block_keys(kind);

    let mut args = Vec::new();
    let mut positional_keys = Vec::new();
    for key in desc.positional {
        // Positionals bind by position; stop at the first gap.
        let Some(value) = fields.get(key) else { break };
        args.push(Arg::Positional((*key).to_string(), value.clone()));
        positional_keys.push(*key);
    }
    for (key, value) in fields.iter() {
        if positional_keys.contains(&key) || blocked.contains(&key) {
            continue;
        }
        args.push(Arg::Keyed(key.to_string(), value.clone()));
    }

    let block = match kind {
        OpKind::CreateTable => {
            let mut block: Vec<Line> = fields
                .get_maps("columns")
                .into_iter()
                .map(|column| record_line("column", column))
                .collect();
            if let Some(pk) = fields.get("primary_key") {
                block.push(Line {
                    keyword: "primary_key".to_string(),
                    args: vec![Arg::Positional("primary_key".to_string(), pk.clone())],
                    block: Vec::new(),
                });
            }
            block
        }
        OpKind::AlterTable => {
            let mut block: Vec<Line> = fields
                .get_maps("actions")
                .into_iter()
                .map(action_line)
                .collect();
            if let Some(set) = fields.get("set_comment") {
                let mut args = vec![Arg::Positional("set_comment".to_string(), set.clone())];
                if let Some(from) = fields.get("from_comment") {
                    args.push(Arg::Keyed("from".to_string(), from.clone()));
                }
                block.push(Line {
                    keyword: "set_comment".to_string(),
                    args,
                    block: Vec::new(),
                });
            }
            block
        }
        _ => Vec::new(),
    };

    Line {
        keyword: desc.keyword.to_string(),
        args,
        block,
    }
}

/// A record sub-entry: the `name` field positional, the rest keyed in
/// record order.
fn record_line(keyword: &str, record: &FieldMap) -> Line {
    let mut args = Vec::new();
    if let Some(name) = record.get("name") {
        args.push(Arg::Positional("name".to_string(), name.clone()));
    }
    for (key, value) in record.iter() {
        if key == "name" {
            continue;
        }
        args.push(Arg::Keyed(key.to_string(), value.clone()));
    }
    Line {
        keyword: keyword.to_string(),
        args,
        block: Vec::new(),
    }
}

/// An alter-table action: its discriminator becomes the sub-entry keyword.
fn action_line(record: &FieldMap) -> Line {
    let keyword = record.get_text("action").unwrap_or("add_column").to_string();
    let mut args = Vec::new();
    if let Some(name) = record.get("name") {
        args.push(Arg::Positional("name".to_string(), name.clone()));
    }
    for (key, value) in record.iter() {
        if key == "action" || key == "name" {
            continue;
        }
        args.push(Arg::Keyed(key.to_string(), value.clone()));
    }
    Line {
        keyword,
        args,
        block: Vec::new(),
    }
}

fn emit(line: &Line, indent: usize, out: &mut String) {
    let mut heredocs: Vec<(String, String)> = Vec::new();
    let pad = "  ".repeat(indent);

    out.push_str(&pad);
    out.push_str(&line.keyword);
    for (i, arg) in line.args.iter().enumerate() {
        out.push_str(if i == 0 { " " } else { ", " });
        match arg {
            Arg::Positional(field, value) => {
                let hint = if field.is_empty() { None } else { Some(field.as_str()) };
                let text = format_value(value, hint, Some(&mut heredocs));
                out.push_str(&text);
            }
            Arg::Keyed(key, value) => {
                out.push_str(key);
                out.push_str(": ");
                let text = format_value(value, Some(key), Some(&mut heredocs));
                out.push_str(&text);
            }
        }
    }
    if !line.block.is_empty() {
        out.push_str(" {");
    }
    out.push('\n');

    // Heredoc bodies follow the line that declared them, in declaration
    // order, each closed by its marker on a line of its own.
    for (marker, body) in heredocs {
        for body_line in body.lines() {
            out.push_str(body_line);
            out.push('\n');
        }
        out.push_str(&marker);
        out.push('\n');
    }

    for sub in &line.block {
        emit(sub, indent + 1, out);
    }
    if !line.block.is_empty() {
        out.push_str(&pad);
        out.push_str("}\n");
    }
}

/// Text long enough (or multi-line) to deserve a heredoc.
fn wants_heredoc(text: &str) -> bool {
    text.contains('\n') || text.len() > 60
}

fn format_value(
    value: &Value,
    key: Option<&str>,
    heredocs: Option<&mut Vec<(String, String)>>,
) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Text(text) => format_text(text, key, heredocs),
        Value::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| format_value(item, None, None))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Map(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", format_value(v, Some(k), None)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn format_text(
    text: &str,
    key: Option<&str>,
    heredocs: Option<&mut Vec<(String, String)>>,
) -> String {
    if let Some(heredocs) = heredocs {
        if wants_heredoc(text) {
            let marker = pick_marker(key, text, heredocs);
            heredocs.push((marker.clone(), text.to_string()));
            return format!("<<~{marker}");
        }
    }
    if text.contains('"') || text.contains('\\') || text.contains('\n') {
        if text.contains('\n') {
            // No heredoc available in this position; fall back to escapes.
            return format!(
                "\"{}\"",
                text.replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t")
            );
        }
        let mut hashes = 1;
        while text.contains(&format!("\"{}", "#".repeat(hashes))) {
            hashes += 1;
        }
        let guard = "#".repeat(hashes);
        return format!("r{guard}\"{text}\"{guard}");
    }
    format!("\"{text}\"")
}

/// Picks a heredoc marker that neither collides with a body line nor with
/// another marker already pending on the same snippet line.
fn pick_marker(key: Option<&str>, body: &str, pending: &[(String, String)]) -> String {
    let mut marker = if key.is_some_and(is_sql_key) {
        "SQL".to_string()
    } else {
        "TEXT".to_string()
    };
    let collides = |candidate: &str, pending: &[(String, String)]| {
        pending.iter().any(|(m, _)| m == candidate)
            || body.lines().any(|l| l.trim() == candidate)
    };
    while collides(&marker, pending) {
        marker.push('_');
    }
    marker
}
