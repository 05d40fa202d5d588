//! Variable-path analysis over raw constraint strings.
//!
//! Constraints are opaque strings in a small domain grammar
//! (`head(ref) != null`, `head(ref).next(ref) == null`, `x.field > 3`).
//! No parser is built for them; the only structure this module recovers is
//! the set of reference-marked variable paths, which is the ground truth for
//! two verifier rules: every base variable must be assigned, and no assigned
//! name may be invented.

use crate::REF_MARKER;
use regex::Regex;
use std::collections::BTreeSet;

/// Collect the canonical reference-marked variable paths mentioned in
/// `constraints`.
///
/// A token matches when it is an identifier with an optional `(ref)` suffix
/// followed by zero or more `.identifier(ref)` segments, at arbitrary chain
/// depth; only tokens actually containing the marker are retained. Tokens
/// without the marker denote primitive field values and are validated
/// permissively elsewhere, not collected here.
pub fn base_variables(constraints: &[String]) -> BTreeSet<String> {
    let pattern = Regex::new(
        r"\b[a-zA-Z_][a-zA-Z0-9_]*(?:\(ref\))?(?:\.[a-zA-Z_][a-zA-Z0-9_]*\(ref\))*",
    )
    .unwrap();

    let mut variables = BTreeSet::new();
    for constraint in constraints {
        for m in pattern.find_iter(constraint) {
            if m.as_str().contains(REF_MARKER) {
                variables.insert(m.as_str().to_string());
            }
        }
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(constraints: &[&str]) -> Vec<String> {
        let owned: Vec<String> = constraints.iter().map(|s| s.to_string()).collect();
        base_variables(&owned).into_iter().collect()
    }

    #[test]
    fn collects_simple_and_chained_paths() {
        assert_eq!(
            vars(&["head(ref) != null", "head(ref).next(ref) == null"]),
            vec!["head(ref)", "head(ref).next(ref)"],
        );
    }

    #[test]
    fn supports_arbitrary_chain_depth() {
        assert_eq!(
            vars(&["a(ref).b(ref).c(ref) == null"]),
            vec!["a(ref).b(ref).c(ref)"],
        );
    }

    #[test]
    fn ignores_unmarked_tokens() {
        assert!(vars(&["x.field > 3", "count == 2"]).is_empty());
    }

    #[test]
    fn chain_stops_at_unmarked_segment() {
        // `size(ref).count` is a primitive field access on a marked base:
        // only the marked prefix is a base variable.
        assert_eq!(vars(&["size(ref).count == 2"]), vec!["size(ref)"]);
    }

    #[test]
    fn deduplicates_across_constraints() {
        assert_eq!(
            vars(&["head(ref) != null", "head(ref) == head(ref)"]),
            vec!["head(ref)"],
        );
    }
}
