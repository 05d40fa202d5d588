//! Candidate verification.
//!
//! Ordered structural, naming, completeness, type-compatibility, and
//! consistency checks over an extracted candidate, short-circuiting on the
//! first failure. Every failure produces a specific, human-readable error
//! string that the refiner receives verbatim on the next attempt.
//!
//! All checks are pure except the type-compatibility sub-check, which
//! delegates to an oracle and is **fail-open**: the sub-check can reject a
//! candidate, but its own failure or an unparsable verdict never blocks one.
//! A verification layer that blocks answers because an advisory helper broke
//! would be more fragile than one that ignores the helper.

use crate::constraints::base_variables;
use crate::extraction::extract_first_json;
use crate::prompt::{self, value_text};
use crate::providers::Oracle;
use crate::{ConversationLogEntry, HeapState, TypeHierarchy, REF_MARKER};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

/// Result of validating one candidate.
#[derive(Debug)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Human-readable failure description; empty when valid.
    pub error: String,
    /// The candidate, unchanged, when it passed every check.
    pub valid_candidate: Option<Value>,
    /// Oracle exchanges performed during validation (type checks). The
    /// caller tags these with the iteration number.
    pub logs: Vec<ConversationLogEntry>,
}

impl ValidationReport {
    fn failure(error: String, logs: Vec<ConversationLogEntry>) -> Self {
        tracing::debug!(error = %error, "candidate failed verification");
        Self {
            is_valid: false,
            error,
            valid_candidate: None,
            logs,
        }
    }

    fn success(candidate: &Value, logs: Vec<ConversationLogEntry>) -> Self {
        Self {
            is_valid: true,
            error: String::new(),
            valid_candidate: Some(candidate.clone()),
            logs,
        }
    }
}

/// Validate a candidate against the constraint set and advisory context.
///
/// `candidate` is `None` when extraction found no JSON in the raw output;
/// `raw_output` is always the full model response, used for error reporting.
/// The heap snapshot accompanies the call for interface symmetry with the
/// generation side; none of the checks consult it.
pub fn validate_candidate(
    candidate: Option<&Value>,
    raw_output: &str,
    constraints: &[String],
    type_hierarchy: Option<&TypeHierarchy>,
    _heap_state: Option<&HeapState>,
    oracle: &dyn Oracle,
) -> ValidationReport {
    let mut logs: Vec<ConversationLogEntry> = Vec::new();

    let Some(candidate) = candidate else {
        return ValidationReport::failure(
            format!("Could not extract valid JSON from solver output: {raw_output}"),
            logs,
        );
    };

    let Some(result) = candidate.get("result") else {
        return ValidationReport::failure(
            "Missing 'result' field in solver output".to_string(),
            logs,
        );
    };
    let parsed = result.as_str().and_then(crate::SatResult::parse);
    if parsed.is_none() {
        return ValidationReport::failure(
            format!("Invalid result value: {}", value_text(result)),
            logs,
        );
    }

    // UNSAT and UNKNOWN carry no valuation; nothing further to check.
    if parsed != Some(crate::SatResult::Sat) {
        return ValidationReport::success(candidate, logs);
    }

    let Some(valuation) = candidate.get("valuation") else {
        return ValidationReport::failure(
            "SAT result missing 'valuation' field".to_string(),
            logs,
        );
    };
    let Some(entries) = valuation.as_array() else {
        return ValidationReport::failure(
            format!("'valuation' should be an array, got {}", json_kind(valuation)),
            logs,
        );
    };
    if entries.is_empty() {
        return ValidationReport::failure("SAT valuation cannot be empty".to_string(), logs);
    }

    let base = base_variables(constraints);

    // Every variable the constraints mention must be assigned.
    let assigned: BTreeSet<&str> = entries
        .iter()
        .filter_map(|entry| entry.get("variable").and_then(Value::as_str))
        .collect();
    let missing: Vec<&str> = base
        .iter()
        .map(String::as_str)
        .filter(|v| !assigned.contains(v))
        .collect();
    if !missing.is_empty() {
        return ValidationReport::failure(
            format!("Valuation missing variables required by constraints: {missing:?}"),
            logs,
        );
    }

    for (idx, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            return ValidationReport::failure(
                format!("Valuation entry {idx} is not an object"),
                logs,
            );
        };

        let Some(variable) = entry.get("variable").and_then(Value::as_str) else {
            return ValidationReport::failure(
                format!("Valuation entry {idx} missing 'variable'"),
                logs,
            );
        };

        if !variable_name_is_legitimate(variable, &base) {
            return ValidationReport::failure(
                format!(
                    "Invalid variable name '{variable}' in entry {idx}. Variable names must appear in constraints or be derivable from them. Do not invent names like 'obj#1', 'obj1', etc."
                ),
                logs,
            );
        }

        // Reference entries must be fully specified.
        let entry_type = entry.get("type");
        let is_null_type = entry_type == Some(&Value::String("null".to_string()));
        if entry_type.is_some() && !is_null_type {
            let missing_fields: Vec<&str> = ["type", "newObject", "trueRef", "reference"]
                .into_iter()
                .filter(|key| !entry.contains_key(*key))
                .collect();
            if !missing_fields.is_empty() {
                return ValidationReport::failure(
                    format!("Valuation entry {idx} missing fields: {missing_fields:?}"),
                    logs,
                );
            }
        }

        // Advisory semantic check, only when a hierarchy description exists
        // for this variable.
        if let (Some(hierarchy), Some(entry_type)) = (type_hierarchy, entry_type) {
            if let Some(info) = hierarchy.get(variable) {
                let (compatible, reason, log_entry) = check_type_compatibility(
                    oracle,
                    variable,
                    &value_text(entry_type),
                    info,
                    constraints,
                );
                logs.push(log_entry);
                if !compatible {
                    return ValidationReport::failure(
                        format!("Type incompatibility for {variable}: {reason}"),
                        logs,
                    );
                }
            }
        }
    }

    // A variable may be assigned null or a concrete reference, never both.
    let mut null_refs: BTreeSet<&str> = BTreeSet::new();
    let mut non_null_refs: BTreeSet<&str> = BTreeSet::new();
    for entry in entries {
        let Some(variable) = entry.get("variable").and_then(Value::as_str) else {
            continue;
        };
        if entry.get("type") == Some(&Value::String("null".to_string())) {
            null_refs.insert(variable);
        } else if matches!(entry.get("reference"), Some(r) if !r.is_null()) {
            non_null_refs.insert(variable);
        }
    }
    let conflicts: Vec<&&str> = null_refs.intersection(&non_null_refs).collect();
    if !conflicts.is_empty() {
        return ValidationReport::failure(
            format!("Conflicting null/non-null assignments for: {conflicts:?}"),
            logs,
        );
    }

    ValidationReport::success(candidate, logs)
}

/// A name is legitimate when it is constraint-derived, or when it is a plain
/// field-value name: not on the invented-name denylist and not carrying the
/// reference marker without being constraint-derived. The denylist is
/// deliberately incomplete; names it misses are accepted permissively.
fn variable_name_is_legitimate(name: &str, base: &BTreeSet<String>) -> bool {
    if base.contains(name) {
        return true;
    }

    let invented = Regex::new(r"(?i)^(?:obj|node|temp|var|item|element)#?\d+$").unwrap();
    if invented.is_match(name) {
        return false;
    }

    // A reference-marked name that the constraints never produced is an
    // invention, however plausible it looks.
    if name.contains(REF_MARKER) {
        return false;
    }

    true
}

/// Delegate one type-compatibility judgment to the oracle.
///
/// Returns `(compatible, reason, log_entry)`. Unparsable verdicts and
/// transport failures both resolve to compatible, with the degraded reason
/// recorded on the log entry.
fn check_type_compatibility(
    oracle: &dyn Oracle,
    variable: &str,
    assigned_type: &str,
    hierarchy_info: &str,
    constraints: &[String],
) -> (bool, String, ConversationLogEntry) {
    let system = prompt::type_check_system_prompt();
    let human = prompt::type_check_human_prompt(variable, assigned_type, hierarchy_info, constraints);

    match oracle.invoke(&system, &human) {
        Ok(response) => {
            let verdict = extract_first_json(&response).map(|(value, _)| value);
            let mut log_entry = ConversationLogEntry {
                agent: "verifier".to_string(),
                stage: "type_check".to_string(),
                system,
                human,
                response,
                error: None,
                iteration: 0,
            };
            match verdict {
                Some(value) if value.get("compatible").is_some() => {
                    let compatible = value["compatible"].as_bool().unwrap_or(false);
                    let reason = value
                        .get("reason")
                        .and_then(Value::as_str)
                        .unwrap_or("No reason provided")
                        .to_string();
                    (compatible, reason, log_entry)
                }
                _ => {
                    let reason = "LLM check inconclusive, assuming compatible".to_string();
                    log_entry.error = Some(reason.clone());
                    (true, reason, log_entry)
                }
            }
        }
        Err(e) => {
            let reason = format!("LLM check failed ({e}), assuming compatible");
            let log_entry = ConversationLogEntry {
                agent: "verifier".to_string(),
                stage: "type_check".to_string(),
                system,
                human,
                response: String::new(),
                error: Some(e.to_string()),
                iteration: 0,
            };
            (true, reason, log_entry)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockOracle;
    use serde_json::json;

    fn constraints() -> Vec<String> {
        vec!["head(ref) != null".to_string()]
    }

    fn validate(candidate: &Value) -> ValidationReport {
        let oracle = MockOracle::always("");
        validate_candidate(Some(candidate), "raw", &constraints(), None, None, &oracle)
    }

    #[test]
    fn denylist_rejects_invented_names_case_insensitively() {
        let base = BTreeSet::new();
        for name in ["obj#1", "obj1", "NODE3", "temp#12", "Var2", "item5", "ELEMENT#9"] {
            assert!(!variable_name_is_legitimate(name, &base), "{name}");
        }
    }

    #[test]
    fn plain_field_names_pass_permissively() {
        let base = BTreeSet::new();
        for name in ["x.len", "count", "head.value", "objCount"] {
            assert!(variable_name_is_legitimate(name, &base), "{name}");
        }
    }

    #[test]
    fn unknown_ref_marked_names_are_rejected() {
        let mut base = BTreeSet::new();
        base.insert("head(ref)".to_string());
        assert!(variable_name_is_legitimate("head(ref)", &base));
        assert!(!variable_name_is_legitimate("ghost(ref)", &base));
    }

    #[test]
    fn result_field_is_required_and_constrained() {
        let report = validate(&json!({"valuation": []}));
        assert!(report.error.contains("Missing 'result' field"));

        let report = validate(&json!({"result": "MAYBE"}));
        assert!(report.error.contains("Invalid result value: MAYBE"));
    }

    #[test]
    fn unsat_and_unknown_need_no_valuation() {
        assert!(validate(&json!({"result": "UNSAT"})).is_valid);
        assert!(validate(&json!({"result": "UNKNOWN", "raw": "cannot tell"})).is_valid);
    }

    #[test]
    fn sat_valuation_shape_is_enforced() {
        let report = validate(&json!({"result": "SAT"}));
        assert!(report.error.contains("missing 'valuation'"));

        let report = validate(&json!({"result": "SAT", "valuation": "not a list"}));
        assert!(report.error.contains("should be an array, got string"));

        let report = validate(&json!({"result": "SAT", "valuation": []}));
        assert!(report.error.contains("cannot be empty"));

        let report = validate(&json!({"result": "SAT", "valuation": [["not", "an", "object"], 3]}));
        assert!(report.error.contains("missing variables required"));
    }

    #[test]
    fn entries_must_name_their_variable() {
        let report = validate(&json!({
            "result": "SAT",
            "valuation": [
                {"variable": "head(ref)", "type": "null"},
                {"type": "null"}
            ]
        }));
        assert!(report.error.contains("entry 1 missing 'variable'"));
    }

    #[test]
    fn reference_entries_must_be_fully_specified() {
        let report = validate(&json!({
            "result": "SAT",
            "valuation": [
                {"variable": "head(ref)", "type": "LNode;", "newObject": true}
            ]
        }));
        assert!(report.error.contains("entry 0 missing fields"));
        assert!(report.error.contains("trueRef"));
        assert!(report.error.contains("reference"));
    }

    #[test]
    fn null_typed_entries_need_no_reference_fields() {
        let report = validate(&json!({
            "result": "SAT",
            "valuation": [{"variable": "head(ref)", "type": "null"}]
        }));
        assert!(report.is_valid, "{}", report.error);
    }

    #[test]
    fn valid_output_is_returned_unchanged() {
        let candidate = json!({
            "result": "SAT",
            "valuation": [
                {"variable": "head(ref)", "type": "LNode;", "newObject": true,
                 "trueRef": false, "reference": 1},
                {"variable": "x.len", "value": 2}
            ],
            "extra": "kept"
        });
        let report = validate(&candidate);
        assert!(report.is_valid, "{}", report.error);
        assert!(report.error.is_empty());
        assert_eq!(report.valid_candidate.as_ref(), Some(&candidate));
    }
}
