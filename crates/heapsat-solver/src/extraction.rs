//! JSON extraction from free-form model output.
//!
//! Model responses mix reasoning prose, markdown, and the answer object.
//! Naive greedy matching fails in both directions: stray braces in prose
//! (`I use {x} here`) under-match, and a greedy `\{.*\}` swallows everything
//! between the first and last brace. Instead:
//!
//! 1. Prefer fenced code regions (``` with optional `json` tag); they are the
//!    most likely carriers of clean JSON.
//! 2. Within each candidate region, scan left to right and attempt a
//!    position-anchored, non-greedy decode at every `{` or `[`.
//! 3. First successful decode wins; malformed starts are skipped, not fatal.
//!
//! Deterministic and side-effect-free.

use regex::Regex;
use serde_json::Value;

/// Extract the first value decodable as a JSON object or array from `text`.
///
/// Returns the decoded value together with the exact matched substring, or
/// `None` when no candidate region contains decodable JSON. Fenced blocks
/// are scanned in document order; only the first block containing a
/// decodable value is used.
pub fn extract_first_json(text: &str) -> Option<(Value, &str)> {
    for block in candidate_blocks(text) {
        if let Some(found) = scan_block(block) {
            return Some(found);
        }
    }
    None
}

/// Fenced code-block contents when any exist, otherwise the whole text as
/// the single candidate region.
fn candidate_blocks(text: &str) -> Vec<&str> {
    let fence = Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap();
    let blocks: Vec<&str> = fence
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();
    if blocks.is_empty() {
        vec![text]
    } else {
        blocks
    }
}

fn scan_block(block: &str) -> Option<(Value, &str)> {
    for (idx, ch) in block.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&block[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            let end = idx + stream.byte_offset();
            return Some((value, &block[idx..end]));
        }
        // This brace didn't start valid JSON; keep scanning.
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_fenced_block_over_stray_braces() {
        let text = "I use {x} here\n```json\n{\"result\":\"SAT\"}\n```";
        let (value, matched) = extract_first_json(text).unwrap();
        assert_eq!(value, json!({"result": "SAT"}));
        assert_eq!(matched, "{\"result\":\"SAT\"}");
    }

    #[test]
    fn skips_stray_braces_without_fences() {
        let text = "I use {x} in reasoning. Answer: {\"result\": \"SAT\"}";
        let (value, _) = extract_first_json(text).unwrap();
        assert_eq!(value, json!({"result": "SAT"}));
    }

    #[test]
    fn re_extraction_from_matched_substring_is_stable() {
        let text = "noise { bad\n```\n{\"a\": [1, 2], \"b\": {\"c\": null}}\n```\ntrailing";
        let (value, matched) = extract_first_json(text).unwrap();
        let (again, matched_again) = extract_first_json(matched).unwrap();
        assert_eq!(value, again);
        assert_eq!(matched, matched_again);
    }

    #[test]
    fn finds_arrays() {
        let (value, _) = extract_first_json("counts: [1, 2, 3] done").unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn first_decodable_block_wins() {
        let text = "```\nonly prose, no json syntax\n```\n```json\n{\"x\": 1}\n```";
        let (value, _) = extract_first_json(text).unwrap();
        assert_eq!(value, json!({"x": 1}));

        let text = "```json\n{\"first\": true}\n```\n```json\n{\"second\": true}\n```";
        let (value, _) = extract_first_json(text).unwrap();
        assert_eq!(value, json!({"first": true}));
    }

    #[test]
    fn fence_tag_is_case_insensitive_and_optional() {
        let (value, _) = extract_first_json("```JSON\n{\"x\": 1}\n```").unwrap();
        assert_eq!(value, json!({"x": 1}));
        let (value, _) = extract_first_json("```\n{\"x\": 2}\n```").unwrap();
        assert_eq!(value, json!({"x": 2}));
    }

    #[test]
    fn nothing_decodable_yields_none() {
        assert!(extract_first_json("plain prose only").is_none());
        assert!(extract_first_json("unbalanced { brace").is_none());
        assert!(extract_first_json("```\nfenced prose {still} not json\n```").is_none());
    }

    #[test]
    fn scalar_values_are_not_extracted() {
        // Only object/array starts are considered; bare scalars in prose
        // never anchor a decode.
        assert!(extract_first_json("the answer is 42, trust me").is_none());
    }
}
