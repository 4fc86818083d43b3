//! Template bank: loads `(EventId, EventTemplate)` pairs and parses raw log
//! lines into `(event_id, params)` events, falling back to unknown lines when
//! nothing matches.

use hashbrown::HashMap;
use regex::Regex;

use crate::error::{Error, Result};

/// A single wildcard marker recognized in a template pattern.
const WILDCARDS: [&str; 2] = ["<*>", "[*]"];

/// An immutable `(event_id, pattern)` pair compiled into an anchored regex.
#[derive(Debug, Clone)]
pub struct Template {
    event_id: u32,
    pattern: String,
    arity: usize,
    regex: Regex,
}

impl Template {
    /// The event id this template represents.
    #[must_use]
    pub fn event_id(&self) -> u32 {
        self.event_id
    }

    /// The original pattern text, wildcards included.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of wildcard slots in the pattern.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    fn compile(event_id: u32, pattern: &str) -> Result<Self> {
        let (regex_src, arity) = compile_wildcard_pattern(pattern);
        let regex = Regex::new(&regex_src)
            .map_err(|e| Error::InvalidTemplateBank(format!("bad pattern {pattern:?}: {e}")))?;
        Ok(Template {
            event_id,
            pattern: pattern.to_string(),
            arity,
            regex,
        })
    }
}

/// Build an anchored, non-greedy regex from a wildcard pattern, returning the
/// regex source and the arity (wildcard count).
fn compile_wildcard_pattern(pattern: &str) -> (String, usize) {
    let mut out = String::from("^");
    let mut rest = pattern;
    let mut arity = 0usize;
    'outer: while !rest.is_empty() {
        for marker in WILDCARDS {
            if let Some(tail) = rest.strip_prefix(marker) {
                out.push_str("(.+?)");
                arity += 1;
                rest = tail;
                continue 'outer;
            }
        }
        let ch = rest.chars().next().unwrap();
        out.push_str(&regex::escape(&ch.to_string()));
        rest = &rest[ch.len_utf8()..];
    }
    out.push('$');
    (out, arity)
}

/// Render a template's wildcard markers by substituting `params` left to
/// right; markers beyond the supplied params are left literal.
#[must_use]
pub fn render_template(pattern: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(pattern.len() + params.iter().map(String::len).sum::<usize>());
    let mut rest = pattern;
    let mut next_param = params.iter();
    'outer: while !rest.is_empty() {
        for marker in WILDCARDS {
            if let Some(tail) = rest.strip_prefix(marker) {
                match next_param.next() {
                    Some(p) => out.push_str(p),
                    None => out.push_str(marker),
                }
                rest = tail;
                continue 'outer;
            }
        }
        let ch = rest.chars().next().unwrap();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Whether a parsed input row matched a template or fell through as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Row matched a template; carries the index into the batch's `events` vector.
    Known(usize),
    /// Row matched no template; carries the index into the batch's `unknown_lines` vector.
    Unknown(usize),
}

/// A read-only, loaded set of templates, sorted ascending by arity (most
/// specific templates tried first) and, within equal arity, by event id.
#[derive(Debug, Clone, Default)]
pub struct Bank {
    templates: Vec<Template>,
    by_id: HashMap<u32, usize>,
}

impl Bank {
    /// An empty bank: every line parses as unknown.
    #[must_use]
    pub fn empty() -> Self {
        Bank::default()
    }

    /// Look up a template by event id.
    #[must_use]
    pub fn get(&self, event_id: u32) -> Option<&Template> {
        self.by_id.get(&event_id).map(|&i| &self.templates[i])
    }

    /// Iterate templates in their matching (arity-ascending) order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether this bank has no templates loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load a CSV-like text table with (at minimum) `EventId` and
    /// `EventTemplate` columns. Extra columns are ignored; rows with a
    /// missing or empty template are skipped.
    pub fn load_from_text(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::InvalidTemplateBank("empty template bank".into()))?;
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let id_col = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case("EventId"))
            .ok_or_else(|| Error::InvalidTemplateBank("missing EventId column".into()))?;
        let tpl_col = columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case("EventTemplate"))
            .ok_or_else(|| Error::InvalidTemplateBank("missing EventTemplate column".into()))?;

        let mut templates = Vec::new();
        for row in lines {
            if row.trim().is_empty() {
                continue;
            }
            let fields = split_csv_row(row);
            let Some(id_field) = fields.get(id_col) else {
                continue;
            };
            let Some(tpl_field) = fields.get(tpl_col) else {
                continue;
            };
            let tpl_field = tpl_field.trim();
            if tpl_field.is_empty() {
                continue;
            }
            let event_id = parse_event_id(id_field.trim())?;
            templates.push(Template::compile(event_id, tpl_field)?);
        }

        // Ascending by arity so the most specific (fewest-wildcard) templates
        // are tried first; ties broken by event id for determinism.
        templates.sort_by(|a, b| a.arity.cmp(&b.arity).then(a.event_id.cmp(&b.event_id)));

        let mut by_id = HashMap::with_capacity(templates.len());
        for (i, t) in templates.iter().enumerate() {
            by_id.insert(t.event_id, i);
        }

        Ok(Bank { templates, by_id })
    }

    /// Parse a batch of raw (already newline-stripped) lines into events,
    /// unknown lines, and the per-row interleaving mask, all in input order.
    #[must_use]
    pub fn parse_lines(
        &self,
        lines: &[String],
    ) -> (Vec<(u32, Vec<String>)>, Vec<String>, Vec<RowKind>) {
        let mut events = Vec::new();
        let mut unknown = Vec::new();
        let mut row_kinds = Vec::with_capacity(lines.len());

        for line in lines {
            match self.match_line(line) {
                Some((event_id, params)) => {
                    row_kinds.push(RowKind::Known(events.len()));
                    events.push((event_id, params));
                }
                None => {
                    row_kinds.push(RowKind::Unknown(unknown.len()));
                    unknown.push(line.clone());
                }
            }
        }

        (events, unknown, row_kinds)
    }

    fn match_line(&self, line: &str) -> Option<(u32, Vec<String>)> {
        for t in &self.templates {
            if let Some(caps) = t.regex.captures(line) {
                let params = (1..caps.len())
                    .map(|i| caps.get(i).map_or("", |m| m.as_str()).trim().to_string())
                    .collect();
                return Some((t.event_id, params));
            }
        }
        None
    }
}

/// Parse an `EventId` field of the form `"E<decimal>"`, bare decimal, or
/// `"0x<hex>"`.
fn parse_event_id(field: &str) -> Result<u32> {
    let bad = || Error::InvalidTemplateBank(format!("invalid EventId {field:?}"));
    if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).map_err(|_| bad());
    }
    if let Some(dec) = field.strip_prefix('E').or_else(|| field.strip_prefix('e')) {
        return dec.parse().map_err(|_| bad());
    }
    field.parse().map_err(|_| bad())
}

/// Minimal CSV-row splitter: comma-separated, with `"..."` quoting and `""`
/// escaping a literal quote. Good enough for the template bank's simple
/// two-or-three column tables; not a general CSV parser.
fn split_csv_row(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = row.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut cur));
            }
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}
