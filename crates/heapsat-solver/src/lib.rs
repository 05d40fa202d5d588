//! Heapsat Solver: LLM-proposed valuations for symbolic Java heap constraints
//!
//! This crate turns an unreliable, free-text-producing language model into a
//! bounded decision procedure over symbolic constraints collected from Java
//! program states. The model only *proposes*; a deterministic layer extracts,
//! validates, and iteratively repairs its output.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        SOLVE PIPELINE                                │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  constraints ──► ┌────────┐  raw text  ┌───────────┐  candidate      │
//! │  + type info     │ Solver │───────────►│ Extractor │────────┐        │
//! │  + heap state    │ (LLM)  │            └───────────┘        │        │
//! │                  └────────┘                                 ▼        │
//! │                      ▲                              ┌────────────┐   │
//! │                      │ error report                 │  Verifier  │   │
//! │                  ┌───┴────┐                         └────────────┘   │
//! │                  │Refiner │◄───── invalid ────────────────┘          │
//! │                  │ (LLM)  │                                          │
//! │                  └────────┘       valid ──► SAT / UNSAT / UNKNOWN    │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Trust boundary
//! -------------
//! The LLM is **untrusted**: it produces candidate valuations; this crate
//! decides whether to accept them. In other words:
//!
//!   "LLM proposes → Heapsat verifies"
//!
//! The verifier's type-compatibility sub-check is itself LLM-assisted and
//! therefore advisory: it can reject a candidate, but its own failure never
//! blocks one (fail-open).

pub mod constraints;
pub mod extraction;
pub mod orchestration;
pub mod prompt;
pub mod protocol;
pub mod providers;
pub mod verification;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use orchestration::Orchestrator;
pub use protocol::SolveRequestV1;
pub use providers::{FailingOracle, MockOracle, Oracle, OracleError};
pub use verification::{validate_candidate, ValidationReport};

// ============================================================================
// Core Types
// ============================================================================

/// The literal suffix marking a reference-typed program location in a
/// variable path, e.g. `head(ref).next(ref)`. Paths without it denote
/// primitive fields.
pub const REF_MARKER: &str = "(ref)";

/// Satisfiability verdict for one solve invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SatResult {
    #[serde(rename = "SAT")]
    Sat,
    #[serde(rename = "UNSAT")]
    Unsat,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl SatResult {
    /// Parse the wire spelling (`"SAT"` / `"UNSAT"` / `"UNKNOWN"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SAT" => Some(Self::Sat),
            "UNSAT" => Some(Self::Unsat),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Final answer for one solve invocation. Constructed once by the
/// orchestrator and immutable afterwards; serialized directly onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub result: SatResult,
    /// Present for SAT answers: the validated valuation entries, exactly as
    /// the model produced them (the verifier does not mutate valid output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation: Option<Value>,
    /// The raw text of the last solver/refiner response, for debugging.
    pub raw: String,
    /// Number of generation attempts used (1 = success on first try).
    pub iterations: u32,
    /// Last verification error, only when retries exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
}

/// Free-text description of class/interface relationships, keyed by the
/// variable it applies to. Advisory context for the solver and the
/// verifier's type-compatibility check; never validated internally.
pub type TypeHierarchy = BTreeMap<String, String>;

/// Snapshot of reachable heap objects at the symbolic state being solved.
/// Advisory: rendered into prompts, never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeapState {
    /// Variable path → object reference id.
    #[serde(default)]
    pub aliases: BTreeMap<String, Value>,
    /// Object reference id → object structure.
    #[serde(default)]
    pub objects: BTreeMap<String, HeapObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeapObject {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Array contents, when the object is an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Value>,
}

/// Inputs for one solve invocation. All advisory context is passed through
/// to prompts verbatim.
#[derive(Debug, Clone, Default)]
pub struct SolveTask {
    pub constraints: Vec<String>,
    pub type_hierarchy: Option<TypeHierarchy>,
    pub heap_state: Option<HeapState>,
    /// Declared static types of method parameters; runtime types must be
    /// subtypes of these.
    pub parameter_type_constraints: Option<BTreeMap<String, String>>,
    /// Free-text reference information prepended to prompts.
    pub context: String,
}

/// One exchange with an oracle, kept as an ordered audit trail per solve
/// call. Owned by the orchestrator for the duration of one `solve`; replaced
/// wholesale at the next call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationLogEntry {
    /// Which role produced the exchange: `solver`, `refiner`, or `verifier`.
    pub agent: String,
    /// The stage within that role, e.g. `solve`, `refine`, `type_check`.
    pub stage: String,
    pub system: String,
    pub human: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Which attempt this exchange belongs to; tagged by the orchestrator.
    #[serde(default)]
    pub iteration: u32,
}

/// Configuration for the self-correction loop, passed explicitly into the
/// orchestrator rather than read from process-wide state.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum refiner invocations. The solver role runs exactly once per
    /// solve; total attempts = 1 + max_retries.
    pub max_retries: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sat_result_wire_spelling() {
        assert_eq!(SatResult::parse("SAT"), Some(SatResult::Sat));
        assert_eq!(SatResult::parse("UNSAT"), Some(SatResult::Unsat));
        assert_eq!(SatResult::parse("UNKNOWN"), Some(SatResult::Unknown));
        assert_eq!(SatResult::parse("sat"), None);
        assert_eq!(SatResult::parse("MAYBE"), None);

        let json = serde_json::to_string(&SatResult::Sat).unwrap();
        assert_eq!(json, "\"SAT\"");
    }

    #[test]
    fn outcome_serialization_omits_absent_fields() {
        let outcome = SolveOutcome {
            result: SatResult::Unsat,
            valuation: None,
            raw: "reasoning".to_string(),
            iterations: 1,
            verification_error: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "UNSAT");
        assert!(json.get("valuation").is_none());
        assert!(json.get("verification_error").is_none());
    }

    #[test]
    fn heap_state_accepts_partial_objects() {
        let heap: HeapState = serde_json::from_str(
            r#"{"aliases": {"head(ref)": 1}, "objects": {"1": {"class": "LNode;"}}}"#,
        )
        .unwrap();
        assert_eq!(heap.aliases["head(ref)"], serde_json::json!(1));
        assert_eq!(heap.objects["1"].class.as_deref(), Some("LNode;"));
        assert!(heap.objects["1"].fields.is_empty());
    }
}
