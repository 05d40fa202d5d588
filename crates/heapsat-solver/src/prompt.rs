//! Prompt construction for the solver, refiner, and type-check roles.
//!
//! Prompt text is peripheral; the *shape* of what gets embedded is not:
//! the verifier's exhaustiveness and naming rules assume the model saw the
//! constraint list verbatim, and the optional context blocks (parameter
//! types, type hierarchy, heap state) are rendered in a fixed order so
//! transcripts stay comparable across runs.

use crate::{HeapState, SolveTask};
use serde_json::Value;

pub fn solver_system_prompt() -> String {
    r#"You are a constraint-solving assistant specialized in reasoning about high-level Java constraints. Your task is to determine satisfiability of the given constraints and propose a candidate valuation.

Use Chain of Thought reasoning:
1) Analyze each constraint carefully.
2) Reason through type compatibility, null conditions, and numeric constraints.
3) Construct a valuation that satisfies all constraints.

Output format:
- SAT: return {"result": "SAT", "valuation": [...]}
- UNSAT: return {"result": "UNSAT"}
- UNKNOWN: return {"result": "UNKNOWN", "raw": "explanation"}

For SAT valuations, each entry should have:
- variable: name (e.g., "head(ref)")
- type: JVM format (e.g., "LNode;", "Ljava/util/ArrayList;")
- newObject: boolean (true if newly created)
- trueRef: boolean (true for symbolic refs, false for concrete addresses)
- reference: unique ID (integer for new objects, null for nulls)

CRITICAL VARIABLE NAMING RULES:
1. ONLY use variable names that appear in the constraints (e.g., 'head(ref)', 'head(ref).next(ref)')
2. NEVER invent new variable names like 'obj#1', 'obj1', 'node1', 'temp', etc.
3. For field access chains, use the exact dot notation from constraints (e.g., 'head(ref).next(ref).next(ref)')
4. If you need to represent an object's fields, describe them as part of the constraint-based variable
5. Each unique variable from constraints gets ONE entry in the valuation

EXAMPLES:
✓ CORRECT: {"variable": "head(ref)", ...}
✓ CORRECT: {"variable": "head(ref).next(ref)", ...}
✗ WRONG: {"variable": "obj#1", ...}
✗ WRONG: {"variable": "node1", ...}
✗ WRONG: {"variable": "temp", ...}

Reasoning is encouraged; you may show your work before the final JSON."#
        .to_string()
}

pub fn refiner_system_prompt() -> String {
    r#"You are a constraint-solving assistant and error corrector. Your task is to fix the errors reported by the Verifier.

Given:
1. The original constraints
2. The previous (incorrect) solution
3. The specific errors that occurred

Please:
1. Understand why the previous solution was wrong.
2. Correct the issues while respecting all original constraints.
3. Return ONLY a valid JSON object (SAT/UNSAT/UNKNOWN) as the final output.

Valuation format for SAT:
Each entry should have: variable, type, newObject, trueRef, reference (for reference variables)
Or: variable, value (for primitive fields)
Keep all values JSON-safe.

CRITICAL VARIABLE NAMING RULES:
1. ONLY use variable names that appear in the constraints (e.g., 'head(ref)', 'head(ref).next(ref)')
2. NEVER invent new variable names like 'obj#1', 'obj1', 'node1', 'temp', etc.
3. For field access chains, use the exact dot notation from constraints
4. Each unique variable from constraints gets ONE entry in the valuation

EXAMPLES:
✓ CORRECT: {"variable": "head(ref)", ...}
✓ CORRECT: {"variable": "head(ref).next(ref)", ...}
✗ WRONG: {"variable": "obj#1", ...}
✗ WRONG: {"variable": "node1", ...}"#
        .to_string()
}

pub fn type_check_system_prompt() -> String {
    r#"You are a Java type system expert. Your task is to verify if a type assignment is compatible with the given type hierarchy and constraints.

Rules:
- Interfaces can be implemented by concrete classes
- Abstract classes can be extended by concrete classes
- Type hierarchy shows inheritance/implementation relationships

Respond with ONLY a JSON object: {"compatible": true/false, "reason": "..."}"#
        .to_string()
}

/// Human prompt for the initial solve attempt.
pub fn solver_human_prompt(task: &SolveTask) -> String {
    let mut prompt = String::new();
    prompt.push_str(&context_block(&task.context));
    prompt.push_str(&parameter_type_block(task));
    prompt.push_str(&type_hierarchy_block(task));
    prompt.push_str(&heap_state_block_detailed(task.heap_state.as_ref()));
    prompt.push_str(&format!(
        "Constraints:\n{}\n\n",
        constraints_block(&task.constraints)
    ));
    prompt.push_str("Please reason through the constraints and provide your answer in JSON format.");
    prompt
}

/// Human prompt for a refinement attempt, carrying the previous raw output
/// and the verifier's error report so the model can target the defect.
pub fn refiner_human_prompt(task: &SolveTask, previous_raw: &str, error_report: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&context_block(&task.context));
    prompt.push_str(&parameter_type_block(task));
    prompt.push_str(&type_hierarchy_block(task));
    prompt.push_str(&heap_state_block_summary(task.heap_state.as_ref()));
    prompt.push_str(&format!(
        "Constraints:\n{}\n\n",
        constraints_block(&task.constraints)
    ));
    prompt.push_str(&format!(
        "Previous (incorrect) solution:\n{previous_raw}\n\n"
    ));
    prompt.push_str(&format!("Errors reported by Verifier:\n{error_report}\n\n"));
    prompt.push_str("Please provide a corrected JSON solution.");
    prompt
}

/// Human prompt for one type-compatibility check.
pub fn type_check_human_prompt(
    variable: &str,
    assigned_type: &str,
    hierarchy_info: &str,
    constraints: &[String],
) -> String {
    format!(
        "Variable: {variable}\nAssigned type: {assigned_type}\nType hierarchy: {hierarchy_info}\n\nRelevant constraints:\n{}\n\nIs this type assignment compatible?",
        constraints_block(constraints)
    )
}

fn constraints_block(constraints: &[String]) -> String {
    constraints
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_block(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("Reference information:\n{context}\n\n")
    }
}

fn parameter_type_block(task: &SolveTask) -> String {
    let Some(params) = task
        .parameter_type_constraints
        .as_ref()
        .filter(|p| !p.is_empty())
    else {
        return String::new();
    };
    let mut block = String::from("Parameter Type Constraints (Implicit):\n");
    block.push_str(
        "These are the declared static types of method parameters. The actual runtime type must be a subtype of the declared type.\n\n",
    );
    for (name, declared) in params {
        block.push_str(&format!("  {name}: declared type is {declared}\n"));
    }
    block.push('\n');
    block.push_str("When constructing the valuation, ensure type compatibility with declared types.\n\n");
    block
}

fn type_hierarchy_block(task: &SolveTask) -> String {
    let Some(hierarchy) = task.type_hierarchy.as_ref().filter(|h| !h.is_empty()) else {
        return String::new();
    };
    let mut block = String::from("Type Hierarchy Information:\n");
    for (variable, info) in hierarchy {
        block.push_str(&format!("\nVariable: {variable}\n{info}\n"));
    }
    block.push('\n');
    block
}

/// Full heap rendering for the solver: aliases plus per-object fields,
/// elements, and length.
fn heap_state_block_detailed(heap: Option<&HeapState>) -> String {
    let Some(heap) = heap else {
        return String::new();
    };
    let mut block = String::from("Heap State Information:\n");
    block.push_str("This shows the current state of reachable objects in the heap.\n\n");

    if !heap.aliases.is_empty() {
        block.push_str("Aliases (variable → object reference):\n");
        for (variable, obj_ref) in &heap.aliases {
            block.push_str(&format!("  {variable} → {}\n", value_text(obj_ref)));
        }
        block.push('\n');
    }

    if !heap.objects.is_empty() {
        block.push_str("Objects (reference → structure):\n");
        for (obj_ref, object) in &heap.objects {
            let class = object.class.as_deref().unwrap_or("Unknown");
            block.push_str(&format!("  {obj_ref}: {class}\n"));
            for (field, value) in &object.fields {
                block.push_str(&format!("    {field}: {}\n", value_text(value)));
            }
            if let Some(elements) = &object.elements {
                block.push_str(&format!("    elements: {}\n", value_text(elements)));
            }
            if let Some(length) = &object.length {
                block.push_str(&format!("    length: {}\n", value_text(length)));
            }
            block.push('\n');
        }
    }
    block
}

/// Compact heap rendering for the refiner: the error report carries the
/// actionable detail, so only aliases and object classes are repeated.
fn heap_state_block_summary(heap: Option<&HeapState>) -> String {
    let Some(heap) = heap else {
        return String::new();
    };
    let mut block = String::from("Heap State Information:\n");
    if !heap.aliases.is_empty() {
        block.push_str("Aliases:\n");
        for (variable, obj_ref) in &heap.aliases {
            block.push_str(&format!("  {variable} → {}\n", value_text(obj_ref)));
        }
        block.push('\n');
    }
    if !heap.objects.is_empty() {
        block.push_str("Objects:\n");
        for (obj_ref, object) in &heap.objects {
            let class = object.class.as_deref().unwrap_or("Unknown");
            block.push_str(&format!("  {obj_ref}: {class}\n"));
        }
        block.push('\n');
    }
    block
}

/// Render a JSON scalar the way it reads in prose: strings bare, everything
/// else in JSON syntax.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
