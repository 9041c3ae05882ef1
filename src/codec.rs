/*
 * This file is part of ThinkFan UI.
 *
 * Copyright (C) 2025 ThinkFan UI contributors
 *
 * ThinkFan UI is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ThinkFan UI is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ThinkFan UI. If not, see <https://www.gnu.org/licenses/>.
 */

//! Reading and writing the `levels:` section of thinkfan.conf.
//!
//! Only the subset of YAML thinkfan configurations use is understood: block
//! sequences, flow sequences and simple `key: value` mappings. Everything
//! outside the `levels:` block is carried through a rewrite line by line.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::level::{Level, MAX_NUMERIC_LEVEL};
use crate::model::{default_ranges, CurveSet, TempRange, DEFAULT_CURVE, TEMP_MAX, TEMP_MIN};
use crate::privilege::PrivilegedWriter;
use crate::sensors::SensorChannel;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/thinkfan.conf";

const LEVELS_KEY: &str = "levels:";
const DISENGAGED_SENTINEL: i64 = 127;
// upper_limit entries equal to this mean "no bound"
const NO_UPPER_BOUND: i64 = 120;
const ENTRY_INDENT: &str = "  ";

const CAUTION_COMMENT: &[&str] = &[
    "# CAUTION: level 127 (\"disengaged\") releases the fan from the",
    "# embedded controller's speed limit. The fan may spin faster than",
    "# its rating and the firmware stops reporting a reliable level.",
    "# Keep the lower limit of this entry well above normal load.",
];

const SYNTHESIZED_HEADER: &[&str] = &[
    "# thinkfan configuration written by ThinkFan UI.",
    "# The sensor and fan entries below are placeholders: adjust them to",
    "# match this machine before enabling the thinkfan service.",
    "",
    "sensors:",
    "  - hwmon: /sys/class/hwmon/hwmon0/temp1_input",
    "",
    "fans:",
    "  - tpacpi: /proc/acpi/ibm/fan",
    "",
];

fn syntax(line: usize, reason: impl Into<String>) -> AppError {
    AppError::ConfigSyntax { line, reason: reason.into() }
}

// ============================================================================
// Flow values
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

struct FlowParser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

fn parse_flow(src: &str, line: usize) -> Result<Value> {
    let mut p = FlowParser { chars: src.chars().collect(), pos: 0, line };
    p.skip_ws();
    let value = p.value()?;
    p.skip_ws();
    if p.pos < p.chars.len() {
        return Err(syntax(line, format!("unexpected '{}' after value", p.chars[p.pos])));
    }
    Ok(value)
}

impl FlowParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some('[') => self.list(),
            Some(q @ ('"' | '\'')) => self.quoted(q),
            Some(']' | ',') | None => Err(syntax(self.line, "missing value")),
            Some(_) => self.plain(),
        }
    }

    fn list(&mut self) -> Result<Value> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Value::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::List(items)),
                None => return Err(syntax(self.line, "unbalanced '['")),
                Some(c) => return Err(syntax(self.line, format!("expected ',' or ']' but found '{}'", c))),
            }
        }
    }

    fn quoted(&mut self, quote: char) -> Result<Value> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(syntax(self.line, "unterminated string")),
                Some('\\') if quote == '"' => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(syntax(self.line, "unterminated string")),
                },
                Some(c) if c == quote => return Ok(Value::Str(out)),
                Some(c) => out.push(c),
            }
        }
    }

    fn plain(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if !matches!(c, ',' | ']' | '[')) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let text = text.trim();
        if text.is_empty() {
            return Err(syntax(self.line, "missing value"));
        }
        Ok(match text.parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(text.to_string()),
        })
    }
}

// ============================================================================
// Line helpers
// ============================================================================

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Cuts a trailing `# comment` that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_ws = true;
    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == '#' && prev_ws {
            return &line[..i];
        }
        prev_ws = c.is_whitespace();
    }
    line
}

/// Open minus closed brackets outside of quoted strings.
fn bracket_balance(text: &str) -> i32 {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut balance = 0;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' => balance += 1,
            ']' => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// Joins continuation lines until the brackets opened on `start` close.
fn gather_flow(lines: &[&str], start: usize, first: &str, end: usize) -> Result<(String, usize)> {
    let mut text = first.to_string();
    let mut balance = bracket_balance(&text);
    let mut idx = start + 1;
    while balance > 0 && idx < end {
        text.push(' ');
        text.push_str(strip_comment(lines[idx]).trim());
        balance = bracket_balance(&text);
        idx += 1;
    }
    match balance {
        0 => Ok((text, idx)),
        b if b > 0 => Err(syntax(start + 1, "unbalanced '['")),
        _ => Err(syntax(start + 1, "unbalanced ']'")),
    }
}

fn check_indentation(lines: &[&str]) -> Result<()> {
    for (i, line) in lines.iter().enumerate() {
        if line.chars().take_while(|c| c.is_whitespace()).any(|c| c == '\t') {
            return Err(syntax(i + 1, "tab character in indentation"));
        }
    }
    Ok(())
}

fn find_levels_key(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|l| l.starts_with(LEVELS_KEY))
}

fn inline_value<'a>(key_line: &'a str) -> &'a str {
    strip_comment(key_line)[LEVELS_KEY.len()..].trim()
}

/// First line after the levels block.
///
/// The block runs up to the next top-level key but stops after its last
/// indented or `-` line, so column-0 comments in between stay with the tail.
fn block_end(lines: &[&str], from: usize) -> usize {
    let next_key = lines
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, l)| {
            !l.trim().is_empty() && !l.starts_with(' ') && !l.starts_with('#') && !l.starts_with('-')
        })
        .map(|(i, _)| i)
        .unwrap_or(lines.len());
    lines[from.min(next_key)..next_key]
        .iter()
        .rposition(|l| !l.trim().is_empty() && (l.starts_with(' ') || l.starts_with('-')))
        .map(|i| from + i + 1)
        .unwrap_or(from.min(next_key))
}

/// Whether `text` leaves a `[` or `{` open. Mismatched closers and
/// unterminated quoted strings are errors.
fn flow_open(text: &str, line: usize) -> Result<bool> {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut token_start = true;
    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if token_start => quote = Some(c),
            '[' | '{' => stack.push(c),
            ']' | '}' => {
                let open = if c == ']' { '[' } else { '{' };
                if stack.pop() != Some(open) {
                    return Err(syntax(line, format!("unbalanced '{}'", c)));
                }
            }
            _ => {}
        }
        token_start = matches!(c, '[' | '{' | ',' | ':') || (c.is_whitespace() && token_start);
    }
    if quote.is_some() {
        return Err(syntax(line, "unterminated string"));
    }
    Ok(!stack.is_empty())
}

/// Checks the document structure of `lines[from..to]`, the parts outside
/// the levels block.
fn check_structure(lines: &[&str], from: usize, to: usize) -> Result<()> {
    let mut idx = from;
    while idx < to {
        let raw = lines[idx];
        let line_no = idx + 1;
        let content = strip_comment(raw).trim();
        idx += 1;
        if content.is_empty() {
            continue;
        }
        let mut value = content;
        while let Some(rest) = value.strip_prefix('-').filter(|r| r.is_empty() || r.starts_with(' ')) {
            value = rest.trim_start();
        }
        if looks_like_key(value) {
            value = value.split_once(':').map_or("", |(_, v)| v.trim());
        } else if indent_of(raw) == 0 && !content.starts_with('-') {
            return Err(syntax(line_no, format!("expected 'key: value', found '{}'", content)));
        }
        match value.chars().next() {
            Some(open @ ('[' | '{')) => {
                let mut text = value.to_string();
                while flow_open(&text, line_no)? {
                    if idx >= to {
                        return Err(syntax(line_no, format!("unbalanced '{}'", open)));
                    }
                    text.push(' ');
                    text.push_str(strip_comment(lines[idx]).trim());
                    idx += 1;
                }
            }
            Some('"' | '\'') => {
                flow_open(value, line_no)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// `(key line, end)` of the levels block, if the document has one.
fn levels_span(lines: &[&str]) -> Option<(usize, usize)> {
    let key = find_levels_key(lines)?;
    let inline = inline_value(lines[key]);
    let start = if inline.starts_with('[') {
        gather_flow(lines, key, inline, lines.len()).map(|(_, next)| next).unwrap_or(key + 1)
    } else {
        key + 1
    };
    Some((key, block_end(lines, start)))
}

fn marker_name(comment: &str) -> Option<String> {
    let name = comment.strip_prefix('#')?.trim_start().strip_prefix("curve:")?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn looks_like_key(text: &str) -> bool {
    match text.split_once(':') {
        Some((k, v)) => {
            !k.is_empty()
                && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                && (v.is_empty() || v.starts_with(' '))
        }
        None => false,
    }
}

fn split_key_value(content: &str, line: usize) -> Result<(String, Option<String>)> {
    if !looks_like_key(content) {
        return Err(syntax(line, format!("expected 'key: value', found '{}'", content)));
    }
    let (k, v) = content.split_once(':').unwrap_or((content, ""));
    let v = v.trim();
    Ok((k.to_string(), (!v.is_empty()).then(|| v.to_string())))
}

// ============================================================================
// Level encoding
// ============================================================================

fn decode_level(value: &Value) -> Option<Level> {
    match value {
        Value::Int(DISENGAGED_SENTINEL) => Some(Level::Disengaged),
        Value::Int(n) if (0..=MAX_NUMERIC_LEVEL as i64).contains(n) => Some(Level::Numeric(*n as u8)),
        Value::Int(n) => Some(Level::Custom(n.to_string())),
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            let lower = trimmed.to_ascii_lowercase();
            let bare = lower.strip_prefix("level ").map(str::trim).unwrap_or(&lower);
            match bare {
                "auto" => Some(Level::Auto),
                "disengaged" => Some(Level::Disengaged),
                other => match other.parse::<u8>() {
                    Ok(n) if n <= MAX_NUMERIC_LEVEL => Some(Level::Numeric(n)),
                    _ => Some(Level::Custom(trimmed.to_string())),
                },
            }
        }
        Value::List(_) => None,
    }
}

/// On-disk form of a level; `Disengaged` is always the sentinel `127`.
pub fn encode_level(level: &Level) -> String {
    match level {
        Level::Numeric(n) => n.to_string(),
        Level::Disengaged => DISENGAGED_SENTINEL.to_string(),
        Level::Auto => "\"level auto\"".to_string(),
        Level::Custom(s) if s.trim().parse::<i64>().is_ok() => s.trim().to_string(),
        Level::Custom(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

fn to_temp(n: i64) -> Option<u8> {
    (TEMP_MIN as i64..=TEMP_MAX as i64).contains(&n).then_some(n as u8)
}

fn decode_temp(value: &Value) -> Option<u8> {
    match value {
        Value::Int(n) => to_temp(*n),
        Value::Str(s) => s.trim().parse::<i64>().ok().and_then(to_temp),
        Value::List(_) => None,
    }
}

fn first_limit(value: &Value, accept: impl Fn(i64) -> bool) -> Option<u8> {
    let items = match value {
        Value::List(items) => items.as_slice(),
        scalar => std::slice::from_ref(scalar),
    };
    items
        .iter()
        .filter_map(|v| match v {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<i64>().ok(),
            Value::List(_) => None,
        })
        .find(|n| accept(*n))
        .and_then(to_temp)
}

// ============================================================================
// Parsing
// ============================================================================

struct LevelsReader<'a> {
    lines: &'a [&'a str],
    curve: String,
    set: CurveSet,
}

impl<'a> LevelsReader<'a> {
    fn apply_marker(&mut self, comment: &str) {
        if let Some(name) = marker_name(comment) {
            self.set.ensure(&name);
            self.curve = name;
        }
    }

    /// `levels: [[...], ...]` on the key line. Returns the first line after it.
    fn read_inline(&mut self, key: usize) -> Result<usize> {
        let inline = inline_value(self.lines[key]);
        if inline.is_empty() {
            return Ok(key + 1);
        }
        if !inline.starts_with('[') {
            return Err(syntax(key + 1, "'levels' must be a list"));
        }
        let (text, next) = gather_flow(self.lines, key, inline, self.lines.len())?;
        match parse_flow(&text, key + 1)? {
            Value::List(items) => {
                for item in items {
                    self.push_triple(item, key + 1);
                }
            }
            _ => return Err(syntax(key + 1, "'levels' must be a list")),
        }
        Ok(next)
    }

    fn read_block(&mut self, start: usize, end: usize) -> Result<()> {
        let mut idx = start;
        while idx < end {
            let raw = self.lines[idx];
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                idx += 1;
                continue;
            }
            if trimmed.starts_with('#') {
                self.apply_marker(trimmed);
                idx += 1;
                continue;
            }
            let line_no = idx + 1;
            let content = strip_comment(raw).trim();
            let rest = match content.strip_prefix('-') {
                Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
                _ => return Err(syntax(line_no, "expected a list entry starting with '- '")),
            };
            let entry_indent = indent_of(raw);

            if rest.starts_with('[') {
                let (text, next) = gather_flow(self.lines, idx, rest, end)?;
                let value = parse_flow(&text, line_no)?;
                self.push_triple(value, line_no);
                idx = next;
            } else if rest.is_empty() || looks_like_key(rest) {
                let (fields, next) = self.read_mapping(idx, rest, entry_indent, end)?;
                self.push_mapping(&fields, line_no);
                idx = next;
            } else {
                debug!(line = line_no, entry = rest, "ignoring scalar levels entry");
                idx += 1;
            }
        }
        Ok(())
    }

    fn read_mapping(
        &self,
        idx: usize,
        first: &str,
        entry_indent: usize,
        end: usize,
    ) -> Result<(Vec<(String, Value)>, usize)> {
        let mut fields = Vec::new();
        let mut next = idx + 1;
        if !first.is_empty() {
            next = self.read_field(idx, first, entry_indent + 2, end, &mut fields)?;
        }
        while next < end {
            let raw = self.lines[next];
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                next += 1;
                continue;
            }
            if trimmed.starts_with('#') {
                if marker_name(trimmed).is_some() {
                    break;
                }
                next += 1;
                continue;
            }
            let indent = indent_of(raw);
            if indent <= entry_indent {
                break;
            }
            let content = strip_comment(raw).trim();
            if content.starts_with('-') {
                return Err(syntax(next + 1, "unexpected list item inside a levels entry"));
            }
            next = self.read_field(next, content, indent, end, &mut fields)?;
        }
        Ok((fields, next))
    }

    fn read_field(
        &self,
        idx: usize,
        content: &str,
        key_indent: usize,
        end: usize,
        fields: &mut Vec<(String, Value)>,
    ) -> Result<usize> {
        let (key, value) = split_key_value(content, idx + 1)?;
        match value {
            Some(v) if v.starts_with('[') => {
                let (text, next) = gather_flow(self.lines, idx, &v, end)?;
                fields.push((key, parse_flow(&text, idx + 1)?));
                Ok(next)
            }
            Some(v) => {
                fields.push((key, parse_flow(&v, idx + 1)?));
                Ok(idx + 1)
            }
            None => {
                // block sequence of scalars below the key
                let mut items = Vec::new();
                let mut j = idx + 1;
                while j < end {
                    let raw = self.lines[j];
                    let trimmed = raw.trim();
                    if trimmed.is_empty() || (trimmed.starts_with('#') && marker_name(trimmed).is_none()) {
                        j += 1;
                        continue;
                    }
                    let content = strip_comment(raw).trim();
                    if indent_of(raw) < key_indent || !content.starts_with('-') {
                        break;
                    }
                    items.push(parse_flow(content[1..].trim(), j + 1)?);
                    j += 1;
                }
                fields.push((key, Value::List(items)));
                Ok(j)
            }
        }
    }

    fn push_triple(&mut self, value: Value, line: usize) {
        let Value::List(items) = value else {
            debug!(line, "levels entry is not a list");
            return;
        };
        if items.len() != 3 {
            debug!(line, len = items.len(), "levels entry is not a [level, min, max] triple");
            return;
        }
        match (decode_level(&items[0]), decode_temp(&items[1]), decode_temp(&items[2])) {
            (Some(level), Some(min), Some(max)) => {
                self.set.push(&self.curve, TempRange::new(min, max, level));
            }
            _ => debug!(line, "dropping incomplete levels entry"),
        }
    }

    fn push_mapping(&mut self, fields: &[(String, Value)], line: usize) {
        let field = |name: &str| fields.iter().find(|(k, _)| k == name).map(|(_, v)| v);
        let level = field("speed").and_then(decode_level);
        let min = field("lower_limit").and_then(|v| first_limit(v, |n| n != 0));
        let max = field("upper_limit").and_then(|v| first_limit(v, |n| n != NO_UPPER_BOUND));
        match (level, min, max) {
            (Some(level), Some(min), Some(max)) => {
                self.set.push(&self.curve, TempRange::new(min, max, level));
            }
            _ => debug!(line, "skipping levels entry without usable speed/limits"),
        }
    }
}

/// Parses a thinkfan configuration into curves.
///
/// A document without a `levels:` key yields an empty set. Entries that are
/// incomplete are dropped; malformed syntax is an error.
pub fn parse(text: &str) -> Result<CurveSet> {
    let lines: Vec<&str> = text.lines().collect();
    check_indentation(&lines)?;
    let Some(key) = find_levels_key(&lines) else {
        check_structure(&lines, 0, lines.len())?;
        return Ok(CurveSet::new());
    };
    check_structure(&lines, 0, key)?;
    let mut reader = LevelsReader { lines: &lines, curve: DEFAULT_CURVE.to_string(), set: CurveSet::new() };
    let start = reader.read_inline(key)?;
    let end = block_end(&lines, start);
    reader.read_block(start, end)?;
    check_structure(&lines, end, lines.len())?;
    Ok(reader.set)
}

/// Reads and parses `path`. A missing or unreadable file is an empty set.
pub fn load_file(path: &Path) -> Result<CurveSet> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let set = parse(&text)?;
            info!(path = %path.display(), curves = set.len(), "loaded fan curves");
            Ok(set)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "thinkfan configuration not found");
            Ok(CurveSet::new())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read thinkfan configuration");
            Ok(CurveSet::new())
        }
    }
}

/// Current file content for a read-modify-write save, if any.
pub fn read_existing(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

// ============================================================================
// Serialization
// ============================================================================

fn push_line(out: &mut String, line: &str) {
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Renders `set` into a configuration document.
///
/// Lines of `existing` outside its levels block are kept verbatim (trailing
/// whitespace trimmed). Without an existing document a placeholder header
/// is written.
pub fn serialize(set: &CurveSet, existing: Option<&str>) -> String {
    let mut out = String::new();
    let mut tail: Vec<&str> = Vec::new();

    match existing {
        Some(text) => {
            let lines: Vec<&str> = text.lines().collect();
            match levels_span(&lines) {
                Some((key, end)) => {
                    lines[..key].iter().for_each(|l| push_line(&mut out, l));
                    tail.extend_from_slice(&lines[end..]);
                }
                None => {
                    lines.iter().for_each(|l| push_line(&mut out, l));
                    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                        out.push('\n');
                    }
                }
            }
        }
        None => SYNTHESIZED_HEADER.iter().for_each(|l| push_line(&mut out, l)),
    }

    out.push_str(LEVELS_KEY);
    out.push('\n');

    // an empty curve only survives a reload through its marker
    let with_markers =
        set.len() > 1 || set.keys().any(|k| k != DEFAULT_CURVE) || set.iter().any(|(_, r)| r.is_empty());
    let mut cautioned = false;
    for (name, ranges) in set.iter() {
        if with_markers {
            push_line(&mut out, &format!("{}# curve: {}", ENTRY_INDENT, name));
        }
        let mut sorted: Vec<&TempRange> = ranges.iter().collect();
        sorted.sort_by_key(|r| r.min_temp);
        for r in sorted {
            if r.level == Level::Disengaged && !cautioned {
                for c in CAUTION_COMMENT {
                    push_line(&mut out, &format!("{}{}", ENTRY_INDENT, c));
                }
                cautioned = true;
            }
            push_line(
                &mut out,
                &format!("{}- [{}, {}, {}]", ENTRY_INDENT, encode_level(&r.level), r.min_temp, r.max_temp),
            );
        }
    }

    if !tail.is_empty() {
        out.push('\n');
        let first = tail.iter().position(|l| !l.trim().is_empty()).unwrap_or(tail.len());
        tail[first..].iter().for_each(|l| push_line(&mut out, l));
    }
    out
}

/// Builds a fresh configuration for the selected sensors, with one default
/// curve per sensor label.
pub fn generate(channels: &[SensorChannel], fan_path: &Path) -> String {
    let mut by_device: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for ch in channels {
        by_device.entry(ch.device.as_str()).or_default().push(ch.label.as_str());
    }

    let mut header = String::new();
    push_line(&mut header, "# thinkfan configuration generated by ThinkFan UI.");
    push_line(&mut header, "");
    push_line(&mut header, "sensors:");
    for (device, labels) in &by_device {
        push_line(&mut header, &format!("  - chip: {}", device));
        let ids: Vec<String> = labels.iter().map(|l| format!("\"{}\"", l.replace('"', "\\\""))).collect();
        push_line(&mut header, &format!("    ids: [{}]", ids.join(", ")));
    }
    push_line(&mut header, "");
    push_line(&mut header, "fans:");
    push_line(&mut header, &format!("  - tpacpi: {}", fan_path.display()));
    push_line(&mut header, "");

    let mut set = CurveSet::new();
    for ch in channels {
        set.insert(ch.label.clone(), default_ranges());
    }
    if set.is_empty() {
        set.insert(DEFAULT_CURVE, default_ranges());
    }
    serialize(&set, Some(&header))
}

/// Hands the document to the privileged writer. Never touches the model.
pub fn save_via_helper(writer: &dyn PrivilegedWriter, path: &Path, text: &str) -> Result<()> {
    writer.write_privileged(path, text)?;
    info!(path = %path.display(), bytes = text.len(), "saved thinkfan configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurveModel, TempRange};
    use crate::privilege::MockPrivilegedWriter;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
# thinkfan config for a T480
sensors:
  - hwmon: /sys/class/hwmon/hwmon3/temp1_input   # CPU

fans:
  - tpacpi: /proc/acpi/ibm/fan

levels:
  - [0, 0, 55]
  - [2, 50, 65]
  - [127, 80, 120]
";

    fn default_set() -> CurveSet {
        CurveModel::new().to_curve_set()
    }

    #[test]
    fn test_parse_simple_triples() {
        let set = parse(SAMPLE).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec![DEFAULT_CURVE]);
        assert_eq!(
            set.sorted_triples(DEFAULT_CURVE),
            vec![
                (0, 55, Level::Numeric(0)),
                (50, 65, Level::Numeric(2)),
                (80, 120, Level::Disengaged),
            ]
        );
    }

    #[test]
    fn test_parse_without_levels_is_empty() {
        let set = parse("sensors:\n  - hwmon: /x\n").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_parse_structured_blocks() {
        let text = "\
levels:
  - speed: 0
    upper_limit: [50, 55]
  - speed: 3
    lower_limit: [0, 48]
    upper_limit: [120, 62]
  - speed: 127
    lower_limit:
      - 70
    upper_limit:
      - 120
  - speed: \"level auto\"
    lower_limit: [45]
    upper_limit: [60]
";
        let set = parse(text).unwrap();
        assert_eq!(
            set.sorted_triples(DEFAULT_CURVE),
            vec![(45, 60, Level::Auto), (48, 62, Level::Numeric(3))]
        );
    }

    #[test]
    fn test_parse_inline_flow_levels() {
        let text = "levels: [[0, 0, 55],\n  [7, 50, 120]]\nfans:\n  - tpacpi: /proc/acpi/ibm/fan\n";
        let set = parse(text).unwrap();
        assert_eq!(
            set.sorted_triples(DEFAULT_CURVE),
            vec![(0, 55, Level::Numeric(0)), (50, 120, Level::Numeric(7))]
        );
    }

    #[test]
    fn test_parse_multiline_flow_entry() {
        let text = "levels:\n  - [1,\n     40,\n     60]\n";
        let set = parse(text).unwrap();
        assert_eq!(set.sorted_triples(DEFAULT_CURVE), vec![(40, 60, Level::Numeric(1))]);
    }

    #[test]
    fn test_parse_drops_incomplete_entries() {
        let text = "levels:\n  - [0, 0]\n  - [1, 10, 20, 30]\n  - [\"\", 1, 2]\n  - [2, 130, 140]\n  - [3, 60, 70]\n  - just-a-scalar\n";
        let set = parse(text).unwrap();
        assert_eq!(set.sorted_triples(DEFAULT_CURVE), vec![(60, 70, Level::Numeric(3))]);
    }

    #[test]
    fn test_parse_symbolic_and_custom_levels() {
        let text = "levels:\n  - [\"level auto\", 0, 40]\n  - [\"level disengaged\", 40, 60]\n  - [255, 60, 80]\n  - [\"level full-speed\", 80, 120]\n";
        let set = parse(text).unwrap();
        assert_eq!(
            set.sorted_triples(DEFAULT_CURVE),
            vec![
                (0, 40, Level::Auto),
                (40, 60, Level::Disengaged),
                (60, 80, Level::Custom("255".into())),
                (80, 120, Level::Custom("level full-speed".into())),
            ]
        );
    }

    #[test]
    fn test_only_127_maps_to_symbolic_level() {
        for n in [8i64, 100, 126, 128, 255] {
            assert_eq!(decode_level(&Value::Int(n)), Some(Level::Custom(n.to_string())));
        }
        assert_eq!(decode_level(&Value::Int(127)), Some(Level::Disengaged));
        assert_eq!(encode_level(&Level::Disengaged), "127");
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        let unbalanced = "levels:\n  - [0, 0, 55\n";
        match parse(unbalanced) {
            Err(AppError::ConfigSyntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(matches!(parse("levels:\n\t- [0, 0, 55]\n"), Err(AppError::ConfigSyntax { .. })));
        assert!(matches!(parse("levels: 5\n"), Err(AppError::ConfigSyntax { .. })));
        assert!(matches!(parse("levels:\n  - [\"auto, 0, 55]\n"), Err(AppError::ConfigSyntax { .. })));
        assert!(matches!(parse("levels:\n  oops: 1\n"), Err(AppError::ConfigSyntax { .. })));
    }

    #[test]
    fn test_parse_reports_malformed_header() {
        let open_list = "sensors: [ /sys/class/hwmon/hwmon3/temp1_input\nfans:\n  - tpacpi: /proc/acpi/ibm/fan\nlevels:\n  - [0, 0, 55]\n";
        match parse(open_list) {
            Err(AppError::ConfigSyntax { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {:?}", other),
        }
        let open_quote = "fans:\n  - tpacpi: \"/proc/acpi/ibm/fan\nlevels:\n  - [0, 0, 55]\n";
        match parse(open_quote) {
            Err(AppError::ConfigSyntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
        let bad_tail = "levels:\n  - [0, 0, 55]\nfans:\n  - tpacpi: [/proc/acpi/ibm/fan\n";
        assert!(matches!(parse(bad_tail), Err(AppError::ConfigSyntax { line: 4, .. })));
        assert!(matches!(parse("just some words\n"), Err(AppError::ConfigSyntax { line: 1, .. })));
    }

    #[test]
    fn test_parse_accepts_quoted_and_flow_header_values() {
        let text = "sensors:\n  - chip: coretemp-isa-0000\n    ids: [\"Package id 0\", Core 0]\n  - name: it's fine\nfans:\n  - tpacpi: '/proc/acpi/ibm/fan'\nlevels:\n  - [0, 0, 55]\n";
        assert_eq!(parse(text).unwrap().sorted_triples(DEFAULT_CURVE), vec![(0, 55, Level::Numeric(0))]);
    }

    #[test]
    fn test_parse_curve_markers() {
        let text = "levels:\n  - [0, 0, 50]\n  # curve: Tctl\n  - [1, 0, 60]\n  # curve: Composite\n";
        let set = parse(text).unwrap();
        assert_eq!(set.keys().cloned().collect::<Vec<_>>(), vec!["Composite", DEFAULT_CURVE, "Tctl"]);
        assert_eq!(set.sorted_triples("Tctl"), vec![(0, 60, Level::Numeric(1))]);
        assert!(set.get("Composite").unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_default() {
        let set = default_set();
        let text = serialize(&set, None);
        let back = parse(&text).unwrap();
        assert_eq!(back.sorted_triples(DEFAULT_CURVE), set.sorted_triples(DEFAULT_CURVE));
    }

    #[test]
    fn test_round_trip_multi_curve_with_custom_levels() {
        let mut set = CurveSet::new();
        set.insert("Package id 0", default_ranges());
        set.insert(
            "Composite",
            vec![
                TempRange::new(0, 40, Level::Auto),
                TempRange::new(35, 60, Level::Custom("level full-speed".into())),
                TempRange::new(55, 120, Level::Custom("200".into())),
            ],
        );
        set.insert("empty", Vec::new());
        let back = parse(&serialize(&set, Some(SAMPLE))).unwrap();
        for key in set.keys() {
            assert_eq!(back.sorted_triples(key), set.sorted_triples(key), "curve {}", key);
        }
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn test_serialize_preserves_header_verbatim() {
        let text = serialize(&default_set(), Some(SAMPLE));
        let header_end = SAMPLE.find("levels:").unwrap();
        assert!(text.starts_with(&SAMPLE[..header_end]));
        assert_eq!(text.matches("levels:").count(), 1);
    }

    #[test]
    fn test_serialize_keeps_trailing_sections() {
        let existing = "sensors:\n  - hwmon: /a   \nlevels:\n  - [0, 0, 50]\n\n# tail comment\nfans:\n  - tpacpi: /proc/acpi/ibm/fan\n";
        let text = serialize(&default_set(), Some(existing));
        assert!(text.starts_with("sensors:\n  - hwmon: /a\nlevels:\n"));
        assert!(text.ends_with("fans:\n  - tpacpi: /proc/acpi/ibm/fan\n"));
        assert!(!text.contains("[0, 0, 50]"));
    }

    #[test]
    fn test_serialize_keeps_column_zero_comments_after_levels() {
        let existing = "sensors:\n  - hwmon: /a\nlevels:\n  - [0, 0, 55]\n\n# fan declarations follow\nfans:\n  - tpacpi: /proc/acpi/ibm/fan\n# end of file\n";
        let text = serialize(&parse(existing).unwrap(), Some(existing));
        assert_eq!(text, existing);

        let trailing = "levels:\n  - [0, 0, 55]\n# closing remark\n";
        let text = serialize(&parse(trailing).unwrap(), Some(trailing));
        assert!(text.ends_with("  - [0, 0, 55]\n\n# closing remark\n"));
        assert_eq!(serialize(&parse(&text).unwrap(), Some(&text)), text);
    }

    #[test]
    fn test_round_trip_empty_default_curve() {
        let mut set = CurveSet::new();
        set.insert(DEFAULT_CURVE, Vec::new());
        let text = serialize(&set, Some("levels:\n"));
        let back = parse(&text).unwrap();
        assert_eq!(back.len(), 1);
        assert!(back.get(DEFAULT_CURVE).unwrap().is_empty());
    }

    #[test]
    fn test_serialize_synthesizes_header() {
        let text = serialize(&default_set(), None);
        assert!(text.contains("sensors:"));
        assert!(text.contains("tpacpi: /proc/acpi/ibm/fan"));
        assert!(text.contains("levels:\n"));
    }

    #[test]
    fn test_serialize_orders_by_min_temp() {
        let mut set = CurveSet::new();
        set.insert(
            DEFAULT_CURVE,
            vec![TempRange::new(60, 80, Level::Numeric(5)), TempRange::new(0, 60, Level::Numeric(1))],
        );
        let text = serialize(&set, Some("levels:\n"));
        let first = text.find("[1, 0, 60]").unwrap();
        let second = text.find("[5, 60, 80]").unwrap();
        assert!(first < second);
        assert!(!text.contains("# curve:"));
    }

    #[test]
    fn test_caution_comment_inserted_once_before_first_sentinel() {
        let mut set = CurveSet::new();
        set.insert(
            DEFAULT_CURVE,
            vec![
                TempRange::new(0, 60, Level::Numeric(1)),
                TempRange::new(60, 90, Level::Disengaged),
                TempRange::new(85, 120, Level::Disengaged),
            ],
        );
        let text = serialize(&set, None);
        assert_eq!(text.matches(CAUTION_COMMENT[0]).count(), 1);
        let caution = text.find(CAUTION_COMMENT[0]).unwrap();
        let first_sentinel = text.find("- [127,").unwrap();
        let last_caution_line = text.find(CAUTION_COMMENT[CAUTION_COMMENT.len() - 1]).unwrap();
        assert!(caution < first_sentinel);
        assert!(last_caution_line < first_sentinel);
        assert!(text.find("[1, 0, 60]").unwrap() < caution);
    }

    #[test]
    fn test_serialize_output_reparses_after_second_save() {
        let first = serialize(&default_set(), Some(SAMPLE));
        let second = serialize(&parse(&first).unwrap(), Some(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_auto_and_quoted_custom() {
        assert_eq!(encode_level(&Level::Auto), "\"level auto\"");
        assert_eq!(encode_level(&Level::Custom("say \"hi\"".into())), "\"say \\\"hi\\\"\"");
        assert_eq!(
            decode_level(&parse_flow("\"say \\\"hi\\\"\"", 1).unwrap()),
            Some(Level::Custom("say \"hi\"".into()))
        );
    }

    #[test]
    fn test_strip_comment_respects_quotes() {
        assert_eq!(strip_comment("  - [0, 0, 55] # x"), "  - [0, 0, 55] ");
        assert_eq!(strip_comment("  - [\"a # b\", 1, 2]"), "  - [\"a # b\", 1, 2]");
        assert_eq!(strip_comment("key#notcomment"), "key#notcomment");
    }

    #[test]
    fn test_load_file_missing_is_empty() {
        let set = load_file(Path::new("/nonexistent/dir/thinkfan.conf")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_file_reads_tempfile() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();
        let set = load_file(file.path()).unwrap();
        assert_eq!(set.sorted_triples(DEFAULT_CURVE).len(), 3);
    }

    #[test]
    fn test_generate_one_curve_per_sensor() {
        let channels = vec![
            SensorChannel { device: "coretemp-isa-0000".into(), label: "Package id 0".into(), channel: 1 },
            SensorChannel { device: "nvme-pci-0400".into(), label: "Composite".into(), channel: 1 },
        ];
        let text = generate(&channels, Path::new("/proc/acpi/ibm/fan"));
        assert!(text.contains("  - chip: coretemp-isa-0000\n    ids: [\"Package id 0\"]"));
        assert!(text.contains("tpacpi: /proc/acpi/ibm/fan"));
        let set = parse(&text).unwrap();
        assert_eq!(set.keys().cloned().collect::<Vec<_>>(), vec!["Composite", "Package id 0"]);
        assert_eq!(set.sorted_triples("Composite").len(), 5);
    }

    #[test]
    fn test_save_via_helper_reports_helper_failure() {
        let mut writer = MockPrivilegedWriter::new();
        writer
            .expect_write_privileged()
            .times(1)
            .returning(|_, _| Err(AppError::HelperFailed { code: 126, stderr: "dismissed".into() }));
        let err = save_via_helper(&writer, &PathBuf::from(DEFAULT_CONFIG_PATH), "levels:\n").unwrap_err();
        assert!(err.to_string().contains("dismissed"));
    }

    #[test]
    fn test_save_via_helper_passes_path_and_text() {
        let mut writer = MockPrivilegedWriter::new();
        writer
            .expect_write_privileged()
            .withf(|p, t| p == Path::new(DEFAULT_CONFIG_PATH) && t.starts_with("levels:"))
            .times(1)
            .returning(|_, _| Ok(()));
        assert!(save_via_helper(&writer, Path::new(DEFAULT_CONFIG_PATH), "levels:\n").is_ok());
    }
}
