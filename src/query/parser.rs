//! Query parser
//!
//! Turns a query string into a protocol `Command`.

use crate::error::{GardenError, Result};
use crate::protocol::Command;
use crate::storage::Record;

use super::Condition;

/// Parse one query
///
/// ```text
/// insert <table> <object>
/// select <table> where <condition>
/// update <table> set <object> where <condition>
/// delete <table> where <condition>
/// create index <table> <index_name> on <field> [<field> ...]
/// flush <table>
/// ping
/// ```
pub fn parse(query: &str) -> Result<Command> {
    let (word, rest) = next_word(query);
    if word.is_empty() {
        return Err(GardenError::Query("empty query".to_string()));
    }

    match word.to_ascii_lowercase().as_str() {
        "insert" => {
            let (table, rest) = take_table(rest, "insert")?;
            let record = parse_object(rest)?;
            Ok(Command::Insert { table, record })
        }
        "select" => {
            let (table, rest) = take_table(rest, "select")?;
            let condition = take_where(rest)?;
            Ok(Command::Select { table, condition })
        }
        "update" => {
            let (table, rest) = take_table(rest, "update")?;
            let rest = expect_keyword(rest, "set")?;
            let (patch, condition) = split_update(rest)?;
            Ok(Command::Update {
                table,
                condition,
                patch,
            })
        }
        "delete" => {
            let (table, rest) = take_table(rest, "delete")?;
            let condition = take_where(rest)?;
            Ok(Command::Delete { table, condition })
        }
        "create" => {
            let rest = expect_keyword(rest, "index")?;
            let (table, rest) = take_table(rest, "create index")?;
            let (name, rest) = next_word(rest);
            if name.is_empty() {
                return Err(GardenError::Query("create index: missing index name".to_string()));
            }
            let rest = expect_keyword(rest, "on")?;

            let fields: Vec<String> = rest
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|f| !f.is_empty())
                .map(|f| unquote(f).to_string())
                .collect();
            if fields.is_empty() {
                return Err(GardenError::Query("create index: no fields given".to_string()));
            }
            Ok(Command::CreateIndex { table, fields })
        }
        "flush" => {
            let (table, rest) = take_table(rest, "flush")?;
            expect_end(rest)?;
            Ok(Command::Flush { table })
        }
        "ping" => {
            expect_end(rest)?;
            Ok(Command::Ping)
        }
        other => Err(GardenError::Query(format!("Unknown command: {}", other))),
    }
}

// =============================================================================
// Token Helpers
// =============================================================================

/// Split off the first whitespace-delimited word
fn next_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn expect_keyword<'a>(s: &'a str, keyword: &str) -> Result<&'a str> {
    let (word, rest) = next_word(s);
    if word.eq_ignore_ascii_case(keyword) {
        Ok(rest)
    } else {
        Err(GardenError::Query(format!(
            "expected `{}`, found `{}`",
            keyword, word
        )))
    }
}

fn expect_end(s: &str) -> Result<()> {
    if s.trim().is_empty() {
        Ok(())
    } else {
        Err(GardenError::Query(format!("unexpected trailing input: {}", s.trim())))
    }
}

fn take_table<'a>(s: &'a str, command: &str) -> Result<(String, &'a str)> {
    let (table, rest) = next_word(s);
    let table = unquote(table);
    if table.is_empty() {
        return Err(GardenError::Query(format!("{}: missing table name", command)));
    }
    Ok((table.to_string(), rest))
}

fn take_where(s: &str) -> Result<Condition> {
    let rest = expect_keyword(s, "where")?;
    Condition::parse(rest)
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'')
}

/// Parse a JSON object, accepting single-quoted strings as a fallback
fn parse_object(text: &str) -> Result<Record> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GardenError::Query("missing JSON object".to_string()));
    }

    match serde_json::from_str::<Record>(text) {
        Ok(record) => Ok(record),
        Err(first) => serde_json::from_str::<Record>(&text.replace('\'', "\""))
            .map_err(|_| GardenError::Query(format!("invalid JSON object: {}", first))),
    }
}

/// Split `<object> where <condition>`
///
/// The object may itself contain the word "where", so candidates are tried
/// from the last one backwards until both halves parse.
fn split_update(s: &str) -> Result<(Record, Condition)> {
    let lower = s.to_ascii_lowercase();
    let bytes = lower.as_bytes();

    let candidates: Vec<usize> = lower.match_indices("where").map(|(i, _)| i).collect();
    for &i in candidates.iter().rev() {
        let end = i + "where".len();
        let starts_word = i == 0 || bytes[i - 1].is_ascii_whitespace() || bytes[i - 1] == b'}';
        let ends_word = end == bytes.len() || bytes[end].is_ascii_whitespace();
        if !(starts_word && ends_word) {
            continue;
        }

        if let (Ok(patch), Ok(condition)) = (parse_object(&s[..i]), Condition::parse(&s[end..])) {
            return Ok((patch, condition));
        }
    }

    Err(GardenError::Query(
        "update expects `set <object> where <condition>`".to_string(),
    ))
}
