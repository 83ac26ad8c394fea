//! Per-field resolution state

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::FieldKind;

/// Agreement state of one field across the two sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Neither source has a value
    Missing,
    /// Only the operator supplied a value
    UserOnly,
    /// Only the document supplied a value
    DocOnly,
    /// Both sources agree, or the operator settled a conflict
    Agreed,
    /// Both sources supplied divergent values
    Conflicting,
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldState::Missing => "missing",
            FieldState::UserOnly => "user_only",
            FieldState::DocOnly => "doc_only",
            FieldState::Agreed => "agreed",
            FieldState::Conflicting => "conflicting",
        };
        f.write_str(name)
    }
}

/// One field's values and resolution
///
/// The source slots are written only by the reconciler, and the confirmed
/// value only by the controller. `resolved_value` is derived and is set
/// exactly when the state is `UserOnly`, `DocOnly` or `Agreed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    user_value: Option<String>,
    doc_value: Option<String>,
    confirmed_value: Option<String>,
    resolved_value: Option<String>,
    state: FieldState,
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::missing()
    }
}

impl FieldValue {
    /// A field neither source has supplied
    pub fn missing() -> Self {
        Self {
            user_value: None,
            doc_value: None,
            confirmed_value: None,
            resolved_value: None,
            state: FieldState::Missing,
        }
    }

    pub fn user_value(&self) -> Option<&str> {
        self.user_value.as_deref()
    }

    pub fn doc_value(&self) -> Option<&str> {
        self.doc_value.as_deref()
    }

    /// Value the operator chose for a conflict, if any
    pub fn confirmed_value(&self) -> Option<&str> {
        self.confirmed_value.as_deref()
    }

    pub fn resolved_value(&self) -> Option<&str> {
        self.resolved_value.as_deref()
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Whether the field counts towards completeness
    pub fn is_resolved(&self) -> bool {
        self.resolved_value.is_some()
    }

    /// Writes the operator slot; a changed value reopens a settled conflict
    pub(crate) fn set_user_value(&mut self, raw: String) {
        if self.user_value.as_deref() != Some(raw.as_str()) {
            self.confirmed_value = None;
            self.user_value = Some(raw);
        }
    }

    /// Writes the document slot; a changed value reopens a settled conflict
    pub(crate) fn set_doc_value(&mut self, raw: String) {
        if self.doc_value.as_deref() != Some(raw.as_str()) {
            self.confirmed_value = None;
            self.doc_value = Some(raw);
        }
    }

    /// Records the operator's choice for a conflicting field
    pub(crate) fn confirm(&mut self, value: String) {
        self.confirmed_value = Some(value.clone());
        self.resolved_value = Some(value);
        self.state = FieldState::Agreed;
    }

    /// Recomputes state and resolved value from the source slots
    pub(crate) fn recompute(&mut self, kind: FieldKind) {
        let (state, resolved) = match (&self.user_value, &self.doc_value) {
            (None, None) => (FieldState::Missing, None),
            (Some(user), None) => (FieldState::UserOnly, Some(kind.resolve(user))),
            (None, Some(doc)) => (FieldState::DocOnly, Some(kind.resolve(doc))),
            (Some(user), Some(doc)) => {
                if let Some(confirmed) = &self.confirmed_value {
                    (FieldState::Agreed, Some(confirmed.clone()))
                } else if kind.values_agree(user, doc) {
                    (FieldState::Agreed, Some(kind.resolve(user)))
                } else {
                    (FieldState::Conflicting, None)
                }
            }
        };
        if state != FieldState::Agreed || self.user_value.is_none() || self.doc_value.is_none() {
            self.confirmed_value = None;
        }
        self.state = state;
        self.resolved_value = resolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sources_are_authoritative() {
        let mut field = FieldValue::missing();
        field.set_doc_value("none".to_string());
        field.recompute(FieldKind::Text);

        assert_eq!(field.state(), FieldState::DocOnly);
        assert_eq!(field.resolved_value(), Some("none"));
    }

    #[test]
    fn test_agreement_uses_normalized_comparison() {
        let mut field = FieldValue::missing();
        field.set_user_value("12/01/2025".to_string());
        field.set_doc_value("2025-01-12".to_string());
        field.recompute(FieldKind::Date);

        assert_eq!(field.state(), FieldState::Agreed);
        assert_eq!(field.resolved_value(), Some("2025-01-12"));
    }

    #[test]
    fn test_confirmation_survives_recompute_until_a_slot_changes() {
        let mut field = FieldValue::missing();
        field.set_user_value("Zurich".to_string());
        field.set_doc_value("Zürich".to_string());
        field.recompute(FieldKind::Text);
        assert_eq!(field.state(), FieldState::Conflicting);
        assert_eq!(field.resolved_value(), None);

        field.confirm("Zurich".to_string());
        field.recompute(FieldKind::Text);
        assert_eq!(field.state(), FieldState::Agreed);

        field.set_doc_value("Zürich".to_string());
        field.recompute(FieldKind::Text);
        assert_eq!(field.state(), FieldState::Agreed);

        field.set_doc_value("Basel".to_string());
        field.recompute(FieldKind::Text);
        assert_eq!(field.state(), FieldState::Conflicting);
        assert_eq!(field.confirmed_value(), None);
    }
}
