//! Operator answer interpretation

use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::normalize::{collapse_whitespace, is_placeholder, FieldKind};
use crate::schema::FieldSpec;

const DOCUMENT_WORDS: &[&str] = &["report", "document", "doc", "police"];
const USER_WORDS: &[&str] = &["mine", "my", "user", "me"];

/// Parses an answer to a missing-field prompt
///
/// Returns `Ok(None)` for an empty or placeholder answer and the canonical
/// value otherwise.
///
/// # Errors
///
/// Returns `IntakeError::MalformedAnswer` if the answer does not have the
/// field's shape.
pub fn parse_answer(spec: &FieldSpec, raw: &str) -> Result<Option<String>, IntakeError> {
    if is_placeholder(raw) {
        return Ok(None);
    }
    spec.kind
        .canonicalize(raw)
        .map(Some)
        .ok_or_else(|| IntakeError::malformed(&spec.name, spec.kind.expected_shape(), raw.trim()))
}

/// Which value the operator settled a conflict with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum ConfirmationChoice {
    /// The operator's own statement
    UserValue(String),
    /// The document's value
    DocumentValue(String),
    /// A new value given in the confirmation answer
    Explicit(String),
}

impl ConfirmationChoice {
    /// The value that becomes the field's resolved value
    pub fn value(&self) -> &str {
        match self {
            ConfirmationChoice::UserValue(v)
            | ConfirmationChoice::DocumentValue(v)
            | ConfirmationChoice::Explicit(v) => v,
        }
    }

    pub fn into_value(self) -> String {
        match self {
            ConfirmationChoice::UserValue(v)
            | ConfirmationChoice::DocumentValue(v)
            | ConfirmationChoice::Explicit(v) => v,
        }
    }

    /// Short source label for the audit trail
    pub fn source(&self) -> &'static str {
        match self {
            ConfirmationChoice::UserValue(_) => "operator statement",
            ConfirmationChoice::DocumentValue(_) => "document",
            ConfirmationChoice::Explicit(_) => "new value",
        }
    }
}

/// Interprets the answer to a conflict confirmation
///
/// A value equal (under the field's normalization) to one of the two sides
/// selects that side. Otherwise a reference to the document ("report",
/// "police", ...) or to the operator's own statement ("mine", "user", ...)
/// selects that side, and anything else is taken as a new explicit value.
/// Returns `Ok(None)` for an empty answer.
///
/// # Errors
///
/// Returns `IntakeError::MalformedAnswer` if a new explicit value does not
/// have the field's shape.
pub fn interpret_confirmation(
    spec: &FieldSpec,
    user_value: &str,
    doc_value: &str,
    raw: &str,
) -> Result<Option<ConfirmationChoice>, IntakeError> {
    if is_placeholder(raw) {
        return Ok(None);
    }
    let kind = spec.kind;

    if kind.values_agree(raw, user_value) {
        return Ok(Some(ConfirmationChoice::UserValue(kind.resolve(user_value))));
    }
    if kind.values_agree(raw, doc_value) {
        return Ok(Some(ConfirmationChoice::DocumentValue(kind.resolve(doc_value))));
    }

    let lowered = collapse_whitespace(raw).to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let names_document = words.iter().any(|w| DOCUMENT_WORDS.contains(w));
    let names_user = words.iter().any(|w| USER_WORDS.contains(w));

    match (names_document, names_user) {
        (true, false) => Ok(Some(ConfirmationChoice::DocumentValue(kind.resolve(doc_value)))),
        (false, true) => Ok(Some(ConfirmationChoice::UserValue(kind.resolve(user_value)))),
        _ => explicit_value(kind, spec, raw).map(|v| Some(ConfirmationChoice::Explicit(v))),
    }
}

fn explicit_value(kind: FieldKind, spec: &FieldSpec, raw: &str) -> Result<String, IntakeError> {
    kind.canonicalize(raw)
        .ok_or_else(|| IntakeError::malformed(&spec.name, kind.expected_shape(), raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> FieldSpec {
        FieldSpec::required("date", FieldKind::Date)
    }

    fn location() -> FieldSpec {
        FieldSpec::required("location", FieldKind::Text)
    }

    #[test]
    fn test_parse_answer_canonicalizes() {
        assert_eq!(parse_answer(&date(), " 12/01/2025 ").unwrap(), Some("2025-01-12".to_string()));
        assert_eq!(parse_answer(&location(), "  Main   Street ").unwrap(), Some("Main Street".to_string()));
    }

    #[test]
    fn test_parse_answer_empty_is_none() {
        assert_eq!(parse_answer(&date(), "").unwrap(), None);
        assert_eq!(parse_answer(&date(), "unknown").unwrap(), None);
    }

    #[test]
    fn test_parse_answer_rejects_wrong_shape() {
        let err = parse_answer(&date(), "18:45").unwrap_err();
        assert!(matches!(err, IntakeError::MalformedAnswer { ref field, .. } if field == "date"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_confirmation_by_value() {
        let choice = interpret_confirmation(&location(), "Zurich", "Zürich", "zurich").unwrap();
        assert_eq!(choice, Some(ConfirmationChoice::UserValue("Zurich".to_string())));

        let choice = interpret_confirmation(&location(), "Zurich", "Zürich", "Zürich").unwrap();
        assert_eq!(choice, Some(ConfirmationChoice::DocumentValue("Zürich".to_string())));
    }

    #[test]
    fn test_confirmation_by_reference() {
        let choice = interpret_confirmation(&location(), "Zurich", "Zürich", "the police report is right").unwrap();
        assert_eq!(choice.unwrap().value(), "Zürich");

        let choice = interpret_confirmation(&location(), "Zurich", "Zürich", "mine").unwrap();
        assert_eq!(choice.unwrap().value(), "Zurich");
    }

    #[test]
    fn test_confirmation_explicit_value_must_parse() {
        let choice = interpret_confirmation(&date(), "2024-01-01", "2024-01-02", "03.01.2024").unwrap();
        assert_eq!(choice, Some(ConfirmationChoice::Explicit("2024-01-03".to_string())));

        let err = interpret_confirmation(&date(), "2024-01-01", "2024-01-02", "last tuesday").unwrap_err();
        assert!(matches!(err, IntakeError::MalformedAnswer { .. }));
    }

    #[test]
    fn test_confirmation_empty_is_none() {
        assert_eq!(interpret_confirmation(&location(), "a", "b", "   ").unwrap(), None);
    }
}
