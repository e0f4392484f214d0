//! Snippet parser: canonical text back to operations.
//!
//! Parsing is loose on fields (unknown keys are dropped, aliases resolve,
//! missing fields default) but strict on syntax: malformed lines fail with
//! the offending line number.

use crate::error::{Error, Result};
use crate::fields::FieldType;
use crate::op::{OpKind, Operation};
use crate::value::{FieldMap, Value};

use super::{Arg, Line};

/// Parses snippet text into operations, in input order. The result is
/// unvalidated; callers decide when to check rules.
pub fn parse(text: &str) -> Result<Vec<Operation>> {
    let mut reader = LineReader::new(text);
    let mut ops = Vec::new();
    while let Some((lineno, raw)) = reader.next_content() {
        let line = parse_entry(lineno, raw, &mut reader, true)?;
        ops.push(to_operation(&line, lineno)?);
    }
    Ok(ops)
}

struct LineReader<'a> {
    lines: Vec<&'a str>,
    at: usize,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            at: 0,
        }
    }

    /// The next physical line, one-based. Heredoc bodies read here so that
    /// `#` inside a body stays literal.
    fn next_raw(&mut self) -> Option<(usize, &'a str)> {
        let line = self.lines.get(self.at)?;
        self.at += 1;
        Some((self.at, line))
    }

    /// The next line that is neither blank nor a `#` comment.
    fn next_content(&mut self) -> Option<(usize, &'a str)> {
        loop {
            let (lineno, line) = self.next_raw()?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some((lineno, line));
        }
    }
}

fn parse_entry(
    lineno: usize,
    raw: &str,
    reader: &mut LineReader<'_>,
    allow_block: bool,
) -> Result<Line> {
    let mut scan = Scan {
        line: raw.trim(),
        pos: 0,
        lineno,
    };
    let keyword = scan.ident();
    if keyword.is_empty() {
        return Err(scan.err("expected an operation keyword"));
    }

    let mut args = Vec::new();
    let mut pending: Vec<(String, usize)> = Vec::new();
    let mut has_block = false;
    scan.skip_ws();
    while !scan.done() {
        if scan.eat('{') {
            scan.skip_ws();
            if !scan.done() {
                return Err(scan.err("expected end of line after '{'"));
            }
            has_block = true;
            break;
        }
        args.push(parse_arg(&mut scan, &mut pending, args.len())?);
        scan.skip_ws();
        if scan.done() || scan.peek() == Some('{') {
            continue;
        }
        if !scan.eat(',') {
            return Err(scan.err("expected ',' between arguments"));
        }
        scan.skip_ws();
    }

    for (marker, index) in pending {
        let body = read_heredoc_body(reader, &marker, lineno)?;
        match &mut args[index] {
            Arg::Positional(_, value) | Arg::Keyed(_, value) => *value = Value::Text(body),
        }
    }

    let mut block = Vec::new();
    if has_block {
        if !allow_block {
            return Err(Error::Snippet {
                line: lineno,
                message: "sub-entries cannot open blocks".to_string(),
            });
        }
        loop {
            let Some((sub_no, sub_raw)) = reader.next_content() else {
                return Err(Error::Snippet {
                    line: lineno,
                    message: "unclosed '{' block".to_string(),
                });
            };
            if sub_raw.trim() == "}" {
                break;
            }
            block.push(parse_entry(sub_no, sub_raw, reader, false)?);
        }
    }

    Ok(Line {
        keyword,
        args,
        block,
    })
}

/// Reads body lines until the marker, then strips the common indentation,
/// squiggly-heredoc style.
fn read_heredoc_body(reader: &mut LineReader<'_>, marker: &str, start: usize) -> Result<String> {
    let mut lines: Vec<&str> = Vec::new();
    loop {
        let Some((_, line)) = reader.next_raw() else {
            return Err(Error::Snippet {
                line: start,
                message: format!("unterminated heredoc '{marker}'"),
            });
        };
        if line.trim() == marker {
            break;
        }
        lines.push(line);
    }
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let stripped: Vec<&str> = lines
        .iter()
        .map(|l| if l.len() >= indent { &l[indent..] } else { "" })
        .collect();
    Ok(stripped.join("\n"))
}

fn parse_arg(scan: &mut Scan<'_>, pending: &mut Vec<(String, usize)>, index: usize) -> Result<Arg> {
    let save = scan.pos;
    if matches!(scan.peek(), Some(c) if c.is_ascii_lowercase() || c == '_') {
        let key = scan.ident();
        scan.skip_ws();
        if scan.eat(':') {
            scan.skip_ws();
            let value = parse_top_value(scan, pending, index)?;
            return Ok(Arg::Keyed(key, value));
        }
        // Not `key:`; re-read as a bare value (true/false or raw string).
        scan.pos = save;
    }
    Ok(Arg::Positional(
        String::new(),
        parse_top_value(scan, pending, index)?,
    ))
}

/// A value in argument position; the only place a heredoc may appear.
fn parse_top_value(
    scan: &mut Scan<'_>,
    pending: &mut Vec<(String, usize)>,
    index: usize,
) -> Result<Value> {
    if scan.rest().starts_with("<<~") {
        scan.pos += 3;
        let start = scan.pos;
        while matches!(scan.peek(), Some(c) if c.is_ascii_uppercase() || c == '_') {
            scan.bump();
        }
        let marker = scan.line[start..scan.pos].to_string();
        if marker.is_empty() {
            return Err(scan.err("expected a heredoc marker after '<<~'"));
        }
        pending.push((marker, index));
        // Placeholder; the body replaces it once read.
        return Ok(Value::Text(String::new()));
    }
    parse_value(scan)
}

fn parse_value(scan: &mut Scan<'_>) -> Result<Value> {
    match scan.peek() {
        Some('"') => Ok(Value::Text(parse_quoted(scan)?)),
        Some('r') if scan.rest().starts_with("r\"") || scan.rest().starts_with("r#") => {
            Ok(Value::Text(parse_raw(scan)?))
        }
        Some('[') => parse_list(scan),
        Some('{') => parse_map(scan),
        Some(c) if c == '-' || c.is_ascii_digit() => parse_int(scan),
        Some(c) if c.is_ascii_lowercase() => {
            let word = scan.ident();
            match word.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(scan.err(format!("unexpected bare word '{word}'"))),
            }
        }
        _ => Err(scan.err("expected a value")),
    }
}

fn parse_quoted(scan: &mut Scan<'_>) -> Result<String> {
    scan.bump();
    let mut out = String::new();
    loop {
        match scan.bump() {
            None => return Err(scan.err("unterminated string")),
            Some('"') => return Ok(out),
            Some('\\') => match scan.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c @ ('"' | '\\')) => out.push(c),
                _ => return Err(scan.err("unknown escape in string")),
            },
            Some(c) => out.push(c),
        }
    }
}

fn parse_raw(scan: &mut Scan<'_>) -> Result<String> {
    scan.bump();
    let mut hashes = 0;
    while scan.eat('#') {
        hashes += 1;
    }
    if !scan.eat('"') {
        return Err(scan.err("malformed raw string"));
    }
    let closer = format!("\"{}", "#".repeat(hashes));
    match scan.rest().find(&closer) {
        Some(at) => {
            let text = scan.rest()[..at].to_string();
            scan.pos += at + closer.len();
            Ok(text)
        }
        None => Err(scan.err("unterminated raw string")),
    }
}

fn parse_int(scan: &mut Scan<'_>) -> Result<Value> {
    let start = scan.pos;
    scan.eat('-');
    while matches!(scan.peek(), Some(c) if c.is_ascii_digit()) {
        scan.bump();
    }
    scan.line[start..scan.pos]
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| scan.err("malformed integer"))
}

fn parse_list(scan: &mut Scan<'_>) -> Result<Value> {
    scan.bump();
    let mut items = Vec::new();
    scan.skip_ws();
    if scan.eat(']') {
        return Ok(Value::List(items));
    }
    loop {
        scan.skip_ws();
        items.push(parse_value(scan)?);
        scan.skip_ws();
        if scan.eat(']') {
            return Ok(Value::List(items));
        }
        if !scan.eat(',') {
            return Err(scan.err("expected ',' or ']' in list"));
        }
    }
}

fn parse_map(scan: &mut Scan<'_>) -> Result<Value> {
    scan.bump();
    let mut map = FieldMap::new();
    scan.skip_ws();
    if scan.eat('}') {
        return Ok(Value::Map(map));
    }
    loop {
        scan.skip_ws();
        let key = scan.ident();
        if key.is_empty() {
            return Err(scan.err("expected a key in map"));
        }
        scan.skip_ws();
        if !scan.eat(':') {
            return Err(scan.err("expected ':' after map key"));
        }
        scan.skip_ws();
        map.insert(key, parse_value(scan)?);
        scan.skip_ws();
        if scan.eat('}') {
            return Ok(Value::Map(map));
        }
        if !scan.eat(',') {
            return Err(scan.err("expected ',' or '}' in map"));
        }
    }
}

struct Scan<'a> {
    line: &'a str,
    pos: usize,
    lineno: usize,
}

impl Scan<'_> {
    fn rest(&self) -> &str {
        &self.line[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn done(&self) -> bool {
        self.rest().is_empty()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            self.bump();
        }
        self.line[start..self.pos].to_string()
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Snippet {
            line: self.lineno,
            message: message.into(),
        }
    }
}

fn to_operation(line: &Line, lineno: usize) -> Result<Operation> {
    let Some(kind) = OpKind::from_keyword(&line.keyword) else {
        return Err(Error::Snippet {
            line: lineno,
            message: format!("unknown operation '{}'", line.keyword),
        });
    };
    let desc = kind.descriptor();
    let mut map = FieldMap::new();
    let mut position = 0usize;
    for arg in &line.args {
        match arg {
            Arg::Positional(_, value) => {
                let Some(key) = desc.positional.get(position) else {
                    return Err(Error::Snippet {
                        line: lineno,
                        message: format!(
                            "'{}' takes at most {} positional arguments",
                            line.keyword,
                            desc.positional.len()
                        ),
                    });
                };
                position += 1;
                let ftype = desc.field(key).map_or(FieldType::Text, |d| d.ftype);
                map.insert(*key, ftype.canonicalize(value.clone()));
            }
            Arg::Keyed(key, value) => {
                // Keys no descriptor declares are dropped, not errors.
                if let Some(field) = desc.resolve_key(key) {
                    map.insert(field.name, field.ftype.canonicalize(value.clone()));
                }
            }
        }
    }

    match kind {
        OpKind::CreateTable => assemble_table_block(&mut map, &line.block, lineno)?,
        OpKind::AlterTable => assemble_alter_block(&mut map, &line.block, lineno)?,
        _ if !line.block.is_empty() => {
            return Err(Error::Snippet {
                line: lineno,
                message: format!("'{}' does not take a block", line.keyword),
            });
        }
        _ => {}
    }

    Ok(Operation::from_fields(kind, &map))
}

fn record_fields(sub: &Line) -> FieldMap {
    let mut record = FieldMap::new();
    for arg in &sub.args {
        match arg {
            Arg::Positional(_, value) => record.insert("name", value.clone()),
            Arg::Keyed(key, value) => record.insert(key.clone(), value.clone()),
        }
    }
    record
}

fn assemble_table_block(map: &mut FieldMap, block: &[Line], lineno: usize) -> Result<()> {
    let mut columns = Vec::new();
    for sub in block {
        match sub.keyword.as_str() {
            "column" => columns.push(Value::Map(record_fields(sub))),
            "primary_key" => {
                if let Some(Arg::Positional(_, value)) = sub.args.first() {
                    map.insert("primary_key", FieldType::TextList.canonicalize(value.clone()));
                }
            }
            other => {
                return Err(Error::Snippet {
                    line: lineno,
                    message: format!("unexpected entry '{other}' in create_table block"),
                })
            }
        }
    }
    if !columns.is_empty() {
        map.insert("columns", Value::List(columns));
    }
    Ok(())
}

fn assemble_alter_block(map: &mut FieldMap, block: &[Line], lineno: usize) -> Result<()> {
    let mut actions = Vec::new();
    for sub in block {
        match sub.keyword.as_str() {
            "add_column" | "drop_column" | "alter_column" | "rename_column" => {
                let mut record = FieldMap::new().with("action", Value::text(sub.keyword.clone()));
                for arg in &sub.args {
                    match arg {
                        Arg::Positional(_, value) => record.insert("name", value.clone()),
                        Arg::Keyed(key, value) => record.insert(key.clone(), value.clone()),
                    }
                }
                actions.push(Value::Map(record));
            }
            "set_comment" => {
                for arg in &sub.args {
                    match arg {
                        Arg::Positional(_, value) => map.insert("set_comment", value.clone()),
                        Arg::Keyed(key, value) if key == "from" => {
                            map.insert("from_comment", value.clone());
                        }
                        Arg::Keyed(..) => {}
                    }
                }
            }
            other => {
                return Err(Error::Snippet {
                    line: lineno,
                    message: format!("unexpected entry '{other}' in alter_table block"),
                })
            }
        }
    }
    if !actions.is_empty() {
        map.insert("actions", Value::List(actions));
    }
    Ok(())
}
