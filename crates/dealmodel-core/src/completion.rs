//! AI text-completion collaborator boundary.
//!
//! The provider is optional and opaque: prompt text in, free text out.
//! Responses may contain an embedded JSON block of formula suggestions;
//! anything unusable falls back to the deterministic template path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ModelGenResult;

/// Where the derived formulas in a generation run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormulaOrigin {
    /// At least one suggested formula from the completion provider was used.
    AiAssisted,
    /// Deterministic template path only.
    Template,
}

/// The remote text-completion service, consumed as an opaque function.
pub trait CompletionProvider {
    fn complete(&self, prompt: &str) -> ModelGenResult<String>;
}

/// A provider that always declines; forces the template path.
#[derive(Debug, Default)]
pub struct NullCompletionProvider;

impl CompletionProvider for NullCompletionProvider {
    fn complete(&self, _prompt: &str) -> ModelGenResult<String> {
        Err(crate::error::ModelGenError::CompletionError(
            "no completion provider configured".into(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CalculationsEnvelope {
    calculations: BTreeMap<String, CalculationEntry>,
}

#[derive(Debug, Deserialize)]
struct CalculationEntry {
    formula: String,
}

/// Extract `{ "calculations": { <key>: { "formula": ... } } }` from a
/// possibly-prose response. Scans for balanced JSON objects and takes
/// the first one that matches the expected shape. `None` means the
/// response is unusable and the caller should fall back to templates.
pub fn extract_calculations(response: &str) -> Option<BTreeMap<String, String>> {
    for start in response
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .map(|(i, _)| i)
    {
        let Some(end) = matching_brace(&response[start..]) else {
            continue;
        };
        let candidate = &response[start..start + end + 1];
        if let Ok(envelope) = serde_json::from_str::<CalculationsEnvelope>(candidate) {
            let formulas: BTreeMap<String, String> = envelope
                .calculations
                .into_iter()
                .map(|(key, entry)| (key, entry.formula))
                .collect();
            if !formulas.is_empty() {
                return Some(formulas);
            }
        }
    }
    None
}

/// Byte offset of the brace closing the object that opens at byte 0.
/// String-literal aware so braces inside formula text don't miscount.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A usable suggested formula must be formula text, not prose.
pub fn is_plausible_formula(formula: &str) -> bool {
    let trimmed = formula.trim();
    trimmed.starts_with('=') && trimmed.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_bare_json() {
        let response =
            r#"{"calculations": {"equity": {"formula": "=B2*(1-B4/100)"}}}"#;
        let map = extract_calculations(response).unwrap();
        assert_eq!(map["equity"], "=B2*(1-B4/100)");
    }

    #[test]
    fn test_extract_embedded_in_prose() {
        let response = "Sure! Here are the formulas you asked for:\n\n\
            {\"calculations\": {\"equity\": {\"formula\": \"=B2*(1-B4/100)\"}, \
            \"debt_amount\": {\"formula\": \"=B2*B4/100\"}}}\n\nLet me know if you need more.";
        let map = extract_calculations(response).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["debt_amount"], "=B2*B4/100");
    }

    #[test]
    fn test_malformed_json_yields_none() {
        assert_eq!(extract_calculations("{\"calculations\": {"), None);
        assert_eq!(extract_calculations("no json here at all"), None);
    }

    #[test]
    fn test_wrong_shape_yields_none() {
        assert_eq!(
            extract_calculations(r#"{"suggestions": ["=A1+A2"]}"#),
            None
        );
        assert_eq!(extract_calculations(r#"{"calculations": {}}"#), None);
    }

    #[test]
    fn test_skips_leading_non_matching_object() {
        let response = r#"{"note": "context"} and then {"calculations": {"equity": {"formula": "=B2"}}}"#;
        let map = extract_calculations(response).unwrap();
        assert_eq!(map["equity"], "=B2");
    }

    #[test]
    fn test_braces_inside_formula_strings() {
        let response = r#"{"calculations": {"equity": {"formula": "=TEXT(B2,\"{0}\")"}}}"#;
        let map = extract_calculations(response).unwrap();
        assert!(map["equity"].contains("TEXT"));
    }

    #[test]
    fn test_plausible_formula() {
        assert!(is_plausible_formula("=B2*B4/100"));
        assert!(!is_plausible_formula("B2*B4/100"));
        assert!(!is_plausible_formula("="));
        assert!(!is_plausible_formula("use equity = value times ltv"));
    }
}
