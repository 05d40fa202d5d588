//! Wire shapes consumed by the HTTP surface.
//!
//! The response side is `SolveOutcome`, serialized directly; only the
//! request needs its own versioned shape.

use crate::{HeapState, SolveTask, TypeHierarchy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body for a solve call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequestV1 {
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hierarchy: Option<TypeHierarchy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap_state: Option<HeapState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_type_constraints: Option<BTreeMap<String, String>>,
    /// Free-text reference information specific to this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    /// Per-request completion budget override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-request sampling temperature override for the solver role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl SolveRequestV1 {
    /// Combine the request with the service-level default context into the
    /// core solve inputs. Request-specific context follows the default so
    /// the more specific information reads last.
    pub fn to_task(&self, default_context: &str) -> SolveTask {
        let mut context = String::new();
        if !default_context.is_empty() {
            context.push_str(default_context);
        }
        if let Some(source) = self.source_context.as_deref().filter(|s| !s.is_empty()) {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(source);
        }
        SolveTask {
            constraints: self.constraints.clone(),
            type_hierarchy: self.type_hierarchy.clone(),
            heap_state: self.heap_state.clone(),
            parameter_type_constraints: self.parameter_type_constraints.clone(),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_request_parses_with_defaults() {
        let request: SolveRequestV1 =
            serde_json::from_str(r#"{"constraints": ["head(ref) != null"]}"#).unwrap();
        assert_eq!(request.constraints.len(), 1);
        assert!(request.type_hierarchy.is_none());
        assert!(request.heap_state.is_none());
        assert!(request.max_tokens.is_none());
        assert!(request.temperature.is_none());
    }

    #[test]
    fn full_request_round_trips() {
        let json = serde_json::json!({
            "constraints": ["head(ref) != null", "head(ref).next(ref) == null"],
            "type_hierarchy": {"head(ref)": "Type: LNode;"},
            "heap_state": {
                "aliases": {"head(ref)": 1},
                "objects": {"1": {"class": "LNode;", "fields": {"next": null}}}
            },
            "parameter_type_constraints": {"head": "LNode;"},
            "source_context": "linked list",
            "max_tokens": 512,
            "temperature": 0.0
        });
        let request: SolveRequestV1 = serde_json::from_value(json.clone()).unwrap();
        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn task_concatenates_default_and_request_context() {
        let request: SolveRequestV1 = serde_json::from_str(
            r#"{"constraints": [], "source_context": "from request"}"#,
        )
        .unwrap();
        let task = request.to_task("service default");
        assert_eq!(task.context, "service default\n\nfrom request");

        let task = request.to_task("");
        assert_eq!(task.context, "from request");
    }
}
