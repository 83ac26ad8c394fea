//! Deterministic rule-based extractor
//!
//! Works without network access. Fields are taken from labeled lines first
//! (`Location: Main Street, Zurich`), then from patterns anywhere in the
//! text for dates, times and licence plates. A field that neither finds is
//! reported as unknown.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PortError};
use domain_intake::normalize::collapse_whitespace;
use domain_intake::{ClaimSchema, DocumentExtractor, Extraction, FieldKind, FieldSpec, SourceValues};

/// Characters of text used as a description when none is labeled
const DESCRIPTION_CHARS: usize = 200;

static LABELED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z][A-Za-z /_()-]{0,40}?)\s*:\s*(.+?)\s*$").expect("valid regex"));
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(20\d{2}-\d{2}-\d{2}|\d{1,2}[./]\d{1,2}[./]20\d{2})\b").expect("valid regex"));
static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}:\d{2})\b").expect("valid regex"));
static PLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{2}[\s-]?\d{3,6})\b").expect("valid regex"));
static NO_INJURIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no injur|no one was (hurt|injured)|nobody was (hurt|injured)|without injur|not injured|uninjured)")
        .expect("valid regex")
});
static INJURY_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\binjur").expect("valid regex"));

/// Label phrases that introduce each built-in field
fn aliases(field: &str) -> &'static [&'static str] {
    match field {
        "date" => &["date of incident", "incident date", "date of accident", "date"],
        "time" => &["time of incident", "time"],
        "location" => &["location", "place", "address"],
        "other_vehicle_involved" => &["other vehicle involved", "other vehicle", "third party vehicle"],
        "other_vehicle_plate" => &["other vehicle plate", "licence plate", "license plate", "plate", "registration"],
        "injuries" => &["injuries", "injury", "injured"],
        "description" => &["description", "narrative", "summary", "details"],
        "estimated_damage_cost" => &["estimated damage cost", "estimated damage", "damage cost", "damage"],
        _ => &[],
    }
}

/// A `label: value` line
#[derive(Debug)]
struct LabeledLine {
    label: String,
    value: String,
}

fn labeled_lines(text: &str) -> Vec<LabeledLine> {
    text.lines()
        .filter_map(|line| LABELED_LINE.captures(line))
        .map(|caps| LabeledLine {
            label: caps[1].to_lowercase().replace('_', " ").trim().to_string(),
            value: caps[2].to_string(),
        })
        .collect()
}

/// Heuristic extractor for offline runs and as a fallback
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts every schema field; unknown fields map to `None`
    pub fn extract_values(&self, text: &str, schema: &ClaimSchema) -> SourceValues {
        let lines = labeled_lines(text);
        let mut values = SourceValues::new();

        for spec in &schema.fields {
            let value = from_labels(spec, &lines).or_else(|| from_patterns(spec, text));
            values.insert(spec.name.clone(), value);
        }

        if schema.contains("other_vehicle_involved") && values.get("other_vehicle_involved") == Some(&None) {
            let plate_seen = PLATE.is_match(text);
            if plate_seen {
                values.insert("other_vehicle_involved".to_string(), Some("yes".to_string()));
            }
        }
        values
    }
}

/// Value of the best labeled line for a field
///
/// An exact label match wins over a label that merely contains an alias.
/// For shaped kinds, a line whose value does not carry the shape is skipped.
fn from_labels(spec: &FieldSpec, lines: &[LabeledLine]) -> Option<String> {
    let label = spec.label();
    let mut phrases: Vec<&str> = aliases(&spec.name).to_vec();
    if !phrases.contains(&label.as_str()) {
        phrases.push(&label);
    }

    let exact = lines.iter().filter(|l| phrases.contains(&l.label.as_str()));
    let partial = lines
        .iter()
        .filter(|l| !phrases.contains(&l.label.as_str()))
        .filter(|l| phrases.iter().any(|p| contains_phrase(&l.label, p)));

    exact.chain(partial).find_map(|line| shaped_value(spec.kind, &line.value))
}

fn contains_phrase(label: &str, phrase: &str) -> bool {
    label
        .match_indices(phrase)
        .any(|(start, _)| {
            let end = start + phrase.len();
            let before = label[..start].chars().next_back();
            let after = label[end..].chars().next();
            !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
        })
}

fn shaped_value(kind: FieldKind, raw: &str) -> Option<String> {
    let value = collapse_whitespace(raw);
    match kind {
        FieldKind::Text => Some(value).filter(|v| !v.is_empty()),
        FieldKind::Date => first_match(&DATE, &value).or_else(|| kind.canonicalize(&value).map(|_| value.clone())),
        FieldKind::Time => first_match(&TIME, &value),
        FieldKind::Plate => first_match(&PLATE, &value).or_else(|| kind.canonicalize(&value).map(|_| value.clone())),
        FieldKind::Boolean | FieldKind::Amount => kind.canonicalize(&value).map(|_| value),
    }
}

fn from_patterns(spec: &FieldSpec, text: &str) -> Option<String> {
    match (spec.name.as_str(), spec.kind) {
        (_, FieldKind::Date) => first_match(&DATE, text),
        (_, FieldKind::Time) => first_match(&TIME, text),
        (_, FieldKind::Plate) => first_match(&PLATE, text),
        ("injuries", _) => {
            if NO_INJURIES.is_match(text) {
                Some("none".to_string())
            } else if INJURY_MENTION.is_match(text) {
                Some("minor".to_string())
            } else {
                None
            }
        }
        ("description", _) => {
            let collapsed = collapse_whitespace(text);
            let snippet: String = collapsed.chars().take(DESCRIPTION_CHARS).collect();
            Some(snippet).filter(|s| !s.is_empty())
        }
        _ => None,
    }
}

fn first_match(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl DomainPort for RuleBasedExtractor {}

#[async_trait]
impl DocumentExtractor for RuleBasedExtractor {
    fn name(&self) -> &str {
        "rule_based"
    }

    #[instrument(skip(self, text, schema), fields(claim_type = %schema.claim_type))]
    async fn extract(&self, text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError> {
        let values = self.extract_values(text, schema);
        let extraction = Extraction::new(self.name(), values);
        debug!(known = extraction.known_count(), "rule-based extraction complete");
        Ok(extraction)
    }
}
