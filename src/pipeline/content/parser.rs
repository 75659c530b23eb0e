//! Deterministic parsing of raw generation output.
//!
//! Each document kind resolves once to an ordered list of strategies. The
//! first strategy that accepts the text wins; if none does, the kind decides
//! whether that is an error (intake JSON) or cannot happen (prescriptions end
//! in the always-accepting raw fallback).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{ContentQuality, DocumentKind, Language};

use super::language::{parse_medicine_field, MedicineField};
use super::prompt::section_languages;
use super::ParseError;

static NEWLINE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*(?:\r\n|\r|\n|\\r\\n|\\n|\\r)(?:[ \t]*(?:\r\n|\r|\n|\\r\\n|\\n|\\r))*[ \t]*")
        .unwrap()
});

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```(?:json|JSON)?[ \t]*\r?\n?(.*?)\s*```\s*$").unwrap());

static SECTION_FENCES: LazyLock<BTreeMap<Language, Regex>> = LazyLock::new(|| {
    Language::ALL
        .iter()
        .map(|lang| {
            let tag = lang.fence_tag();
            let pattern = format!(r"(?s)<<<BEGIN_{tag}>>>(.*?)<<<END_{tag}>>>");
            (*lang, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Whole per-language text plus the medicine entries found in it.
///
/// Only prescription sections carry entries. Names may repeat; order follows
/// the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Section {
    pub text: String,
    pub entries: Vec<MedicineEntry>,
}

impl Section {
    fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedContent {
    pub title: String,
    pub sections: BTreeMap<Language, Section>,
}

impl ParsedContent {
    /// Text of one language section; empty when the section is empty.
    pub fn text(&self, lang: Language) -> &str {
        self.sections.get(&lang).map(|s| s.text.as_str()).unwrap_or("")
    }

    /// Guarantee an entry for every requested language.
    fn ensure_languages(mut self, langs: &[Language]) -> Self {
        for lang in langs {
            self.sections.entry(*lang).or_default();
        }
        self
    }
}

/// One parsing strategy. `attempt` never panics and never errors; it either
/// accepts the text or declines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    StrictJson,
    DelimitedSections,
    RawFallback,
}

impl ParseStrategy {
    pub fn attempt(&self, text: &str, target: Language) -> Option<ParsedContent> {
        let langs = section_languages(target);
        let parsed = match self {
            ParseStrategy::StrictJson => parse_strict_json(text, target)?,
            ParseStrategy::DelimitedSections => parse_delimited(text, &langs)?,
            ParseStrategy::RawFallback => parse_raw(text),
        };
        Some(parsed.ensure_languages(&langs))
    }
}

/// Strategy list for a document kind.
pub fn contract_for(kind: DocumentKind) -> &'static [ParseStrategy] {
    match kind {
        DocumentKind::Intake => &[ParseStrategy::StrictJson],
        DocumentKind::Prescription => &[ParseStrategy::DelimitedSections, ParseStrategy::RawFallback],
    }
}

/// Parsed content plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub content: ParsedContent,
    pub strategy: ParseStrategy,
    pub quality: ContentQuality,
}

/// Run the contract for `kind` against raw generation output.
pub fn parse_response(
    kind: DocumentKind,
    target: Language,
    text: &str,
) -> Result<ParseOutcome, ParseError> {
    for strategy in contract_for(kind) {
        if let Some(content) = strategy.attempt(text, target) {
            let quality = match strategy {
                ParseStrategy::RawFallback => ContentQuality::Degraded,
                _ => ContentQuality::Complete,
            };
            if quality == ContentQuality::Degraded {
                tracing::warn!(
                    kind = %kind,
                    response_len = text.len(),
                    "Section fences missing, keeping whole response as Korean text"
                );
            }
            return Ok(ParseOutcome {
                content,
                strategy: *strategy,
                quality,
            });
        }
    }

    Err(ParseError::MalformedJson(json_error_detail(text)))
}

fn json_error_detail(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(unfence(text)) {
        Ok(_) => "no strategy accepted the response".to_string(),
        Err(e) => e.to_string(),
    }
}

/// Strip one surrounding ```json fence if present.
fn unfence(text: &str) -> &str {
    JSON_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// Collapse literal and escaped newline runs into one space.
pub fn collapse_newlines(text: &str) -> String {
    NEWLINE_RUN.replace_all(text, " ").trim().to_string()
}

fn json_text(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_strict_json(text: &str, target: Language) -> Option<ParsedContent> {
    let value: serde_json::Value = serde_json::from_str(unfence(text)).ok()?;

    let title = json_text(&value, "title").trim().to_string();
    let content = collapse_newlines(&json_text(&value, "content"));
    let korean = collapse_newlines(&json_text(&value, "koreanContent"));

    let mut sections = BTreeMap::new();
    if target.is_korean() {
        let text = if korean.is_empty() { content } else { korean };
        sections.insert(Language::Korean, Section::from_text(text));
    } else {
        sections.insert(target, Section::from_text(content));
        sections.insert(Language::Korean, Section::from_text(korean));
    }

    Some(ParsedContent { title, sections })
}

fn parse_delimited(text: &str, langs: &[Language]) -> Option<ParsedContent> {
    let mut sections = BTreeMap::new();
    for lang in langs {
        let body = SECTION_FENCES
            .get(lang)?
            .captures(text)?
            .get(1)?
            .as_str()
            .trim();
        sections.insert(
            *lang,
            Section {
                text: body.to_string(),
                entries: split_medicine_entries(body, *lang),
            },
        );
    }

    Some(ParsedContent {
        title: String::new(),
        sections,
    })
}

fn parse_raw(text: &str) -> ParsedContent {
    let mut sections = BTreeMap::new();
    sections.insert(Language::Korean, Section::from_text(text.trim()));
    ParsedContent {
        title: String::new(),
        sections,
    }
}

// ───────────────────────────────────────────
// Medicine entries
// ───────────────────────────────────────────

/// One medicine explanation inside a language section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MedicineEntry {
    pub name: String,
    /// Recognised fields in the order they appear.
    pub fields: Vec<(MedicineField, String)>,
    /// Everything below the name line, as written.
    pub body: String,
}

impl MedicineEntry {
    pub fn field(&self, field: MedicineField) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, body)| body.as_str())
    }
}

/// Split a section into medicine entries.
///
/// Unindented lines are either a field heading (`Usage:`) or a new entry
/// name. An unknown `Name:` line starts a new entry once the current one has
/// fields. Indented lines extend the current field. Stray text before the
/// first name lands in an unnamed entry so nothing is dropped.
pub fn split_medicine_entries(text: &str, lang: Language) -> Vec<MedicineEntry> {
    let mut entries: Vec<MedicineEntry> = Vec::new();
    let mut body_lines: Vec<Vec<&str>> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indented = line.starts_with('\t') || line.starts_with(' ');
        let trimmed = line.trim();

        if entries.is_empty() {
            entries.push(MedicineEntry::default());
            body_lines.push(Vec::new());
            if !indented && heading_of(trimmed, lang).is_none() {
                if let Some(entry) = entries.last_mut() {
                    entry.name = entry_name(trimmed);
                }
                continue;
            }
        }

        let (Some(entry), Some(lines)) = (entries.last_mut(), body_lines.last_mut()) else {
            continue;
        };

        if indented {
            lines.push(line);
            append_to_field(entry, trimmed);
            continue;
        }

        if let Some((field, inline)) = heading_of(trimmed, lang) {
            lines.push(line);
            entry.fields.push((field, inline.to_string()));
            continue;
        }

        if (trimmed.ends_with(':') || trimmed.ends_with('：')) && entry.fields.is_empty() {
            tracing::warn!(
                line_len = trimmed.len(),
                "Unrecognised heading before any field, kept as body text"
            );
            lines.push(line);
            continue;
        }

        entries.push(MedicineEntry {
            name: entry_name(trimmed),
            ..Default::default()
        });
        body_lines.push(Vec::new());
    }

    for (entry, lines) in entries.iter_mut().zip(body_lines) {
        entry.body = lines.join("\n");
    }
    entries
}

/// Recognise `Heading:` or `Heading: inline text`.
fn heading_of(line: &str, lang: Language) -> Option<(MedicineField, &str)> {
    if let Some(field) = parse_medicine_field(line, lang) {
        return Some((field, ""));
    }
    let split = line.find([':', '：'])?;
    let (head, rest) = line.split_at(split);
    let field = parse_medicine_field(head, lang)?;
    let rest = rest.trim_start_matches([':', '：']).trim();
    Some((field, rest))
}

fn append_to_field(entry: &mut MedicineEntry, text: &str) {
    match entry.fields.last_mut() {
        Some((_, body)) if body.is_empty() => body.push_str(text),
        Some((_, body)) => {
            body.push('\n');
            body.push_str(text);
        }
        None => {}
    }
}

/// Name line without a trailing colon or surrounding brackets.
fn entry_name(line: &str) -> String {
    let trimmed = line.trim().trim_end_matches([':', '：']).trim();
    trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
