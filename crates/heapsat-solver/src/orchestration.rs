//! Self-correction loop: solver → verifier → (refiner → verifier …).
//!
//! The solver role runs exactly once per solve call. Every later attempt is
//! the refiner, seeded with the previous raw output and the verifier's error
//! report; re-running the unconstrained solver from scratch would discard
//! the diagnostic signal already gathered. `max_retries` bounds refiner
//! invocations, so the total attempt count is `1 + max_retries`.
//!
//! `solve` never panics and never returns an error: transport failures are
//! folded into ordinary verification failures, and an exhausted budget
//! yields UNKNOWN with the last error report attached.

use crate::extraction::extract_first_json;
use crate::prompt;
use crate::providers::Oracle;
use crate::verification::validate_candidate;
use crate::{ConversationLogEntry, SatResult, SolveOutcome, SolveTask, SolverConfig};
use serde_json::Value;
use std::sync::Arc;

/// Drives one solve call at a time. Owns the per-call mutable state
/// (iteration counter, raw-output buffer, transcript); nothing is retained
/// across calls except the configuration and the oracles.
pub struct Orchestrator {
    oracle: Arc<dyn Oracle>,
    refiner_oracle: Arc<dyn Oracle>,
    config: SolverConfig,
    transcript: Vec<ConversationLogEntry>,
}

impl Orchestrator {
    /// Use `oracle` for the solver, refiner, and verifier roles alike.
    pub fn new(oracle: Arc<dyn Oracle>, config: SolverConfig) -> Self {
        Self {
            refiner_oracle: Arc::clone(&oracle),
            oracle,
            config,
            transcript: Vec::new(),
        }
    }

    /// Route refinement attempts to a separate oracle. Deployments pin the
    /// refiner to temperature zero: corrections should be deterministic even
    /// when initial generation is allowed to explore.
    pub fn with_refiner_oracle(mut self, refiner: Arc<dyn Oracle>) -> Self {
        self.refiner_oracle = refiner;
        self
    }

    /// The ordered oracle exchanges of the most recent solve call.
    pub fn transcript(&self) -> &[ConversationLogEntry] {
        &self.transcript
    }

    /// Run the self-correction loop until a candidate validates or the retry
    /// budget is exhausted.
    pub fn solve(&mut self, task: &SolveTask) -> SolveOutcome {
        let mut iteration: u32 = 0;
        let mut raw = String::new();
        let mut error_report = String::new();
        self.transcript.clear();

        loop {
            iteration += 1;

            let (candidate, raw_output, mut log_entry) = if iteration == 1 {
                run_solver(self.oracle.as_ref(), task)
            } else {
                run_refiner(self.refiner_oracle.as_ref(), task, &raw, &error_report)
            };
            raw = raw_output;
            log_entry.iteration = iteration;
            self.transcript.push(log_entry);

            let report = validate_candidate(
                candidate.as_ref(),
                &raw,
                &task.constraints,
                task.type_hierarchy.as_ref(),
                task.heap_state.as_ref(),
                self.oracle.as_ref(),
            );
            for mut entry in report.logs {
                entry.iteration = iteration;
                self.transcript.push(entry);
            }

            if report.is_valid {
                let outcome = accepted_outcome(report.valid_candidate, raw, iteration);
                tracing::info!(iterations = iteration, "solve finished");
                return outcome;
            }
            error_report = report.error;

            if iteration > self.config.max_retries {
                tracing::info!(
                    iterations = iteration,
                    error = %error_report,
                    "retry budget exhausted"
                );
                return SolveOutcome {
                    result: SatResult::Unknown,
                    valuation: None,
                    raw,
                    iterations: iteration,
                    verification_error: Some(error_report),
                };
            }
            tracing::debug!(iteration, "retrying with refiner");
        }
    }
}

/// Initial generation attempt.
fn run_solver(
    oracle: &dyn Oracle,
    task: &SolveTask,
) -> (Option<Value>, String, ConversationLogEntry) {
    let system = prompt::solver_system_prompt();
    let human = prompt::solver_human_prompt(task);
    run_role(oracle, "solver", "solve", system, human)
}

/// Refinement attempt, targeting the verifier's reported defect.
fn run_refiner(
    oracle: &dyn Oracle,
    task: &SolveTask,
    previous_raw: &str,
    error_report: &str,
) -> (Option<Value>, String, ConversationLogEntry) {
    let system = prompt::refiner_system_prompt();
    let human = prompt::refiner_human_prompt(task, previous_raw, error_report);
    run_role(oracle, "refiner", "refine", system, human)
}

fn run_role(
    oracle: &dyn Oracle,
    agent: &str,
    stage: &str,
    system: String,
    human: String,
) -> (Option<Value>, String, ConversationLogEntry) {
    match oracle.invoke(&system, &human) {
        Ok(response) => {
            let candidate = extract_first_json(&response).map(|(value, _)| value);
            let log_entry = ConversationLogEntry {
                agent: agent.to_string(),
                stage: stage.to_string(),
                system,
                human,
                response: response.clone(),
                error: None,
                iteration: 0,
            };
            (candidate, response, log_entry)
        }
        Err(e) => {
            // Transport failures become ordinary verification failures: the
            // extraction check rejects the missing candidate and the retry
            // budget applies uniformly.
            let raw = format!("Error during {agent} invocation: {e}");
            let log_entry = ConversationLogEntry {
                agent: agent.to_string(),
                stage: stage.to_string(),
                system,
                human,
                response: String::new(),
                error: Some(e.to_string()),
                iteration: 0,
            };
            (None, raw, log_entry)
        }
    }
}

/// Build the outcome for a validated candidate. The candidate's own `raw`
/// string, when present, wins over the transport raw text (the UNKNOWN
/// convention lets the model attach its explanation there).
fn accepted_outcome(candidate: Option<Value>, raw: String, iterations: u32) -> SolveOutcome {
    let candidate = candidate.unwrap_or(Value::Null);
    let result = candidate
        .get("result")
        .and_then(Value::as_str)
        .and_then(SatResult::parse)
        .unwrap_or(SatResult::Unknown);
    let candidate_raw = candidate
        .get("raw")
        .and_then(Value::as_str)
        .map(str::to_string);
    SolveOutcome {
        result,
        valuation: candidate.get("valuation").cloned(),
        raw: candidate_raw.unwrap_or(raw),
        iterations,
        verification_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockOracle;

    #[test]
    fn accepted_outcome_prefers_candidate_raw() {
        let candidate = serde_json::json!({"result": "UNKNOWN", "raw": "cannot decide"});
        let outcome = accepted_outcome(Some(candidate), "full response".to_string(), 1);
        assert_eq!(outcome.result, SatResult::Unknown);
        assert_eq!(outcome.raw, "cannot decide");
    }

    #[test]
    fn transport_failure_becomes_ordinary_candidate_miss() {
        let oracle = crate::providers::FailingOracle::new("boom");
        let (candidate, raw, log_entry) = run_role(
            &oracle,
            "solver",
            "solve",
            "system".to_string(),
            "human".to_string(),
        );
        assert!(candidate.is_none());
        assert!(raw.contains("Error during solver invocation"));
        assert!(log_entry.error.is_some());
    }

    #[test]
    fn transcript_is_reset_between_calls() {
        let response = r#"{"result": "UNSAT"}"#;
        let mut orchestrator = Orchestrator::new(
            Arc::new(MockOracle::always(response)),
            SolverConfig::default(),
        );
        let task = SolveTask {
            constraints: vec!["head(ref) != null".to_string()],
            ..Default::default()
        };
        orchestrator.solve(&task);
        assert_eq!(orchestrator.transcript().len(), 1);
        orchestrator.solve(&task);
        assert_eq!(orchestrator.transcript().len(), 1);
    }
}
