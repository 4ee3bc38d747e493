//! Post-processing: turn raw classifier text into a `StructuredProfile`.
//!
//! Even when asked for bare JSON, LLMs occasionally wrap the object in
//! ```` ```json ```` fences, prepend a sentence, emit `null` for a category
//! they found nothing for, or add a key that is not part of the contract.
//! These rules fix such quirks deterministically, in this order:
//!
//! 1. Strip invisible Unicode (BOM, zero-width spaces)
//! 2. Strip outer code fences
//! 3. Cut the text down to the outermost `{ … }` object
//! 4. Parse as JSON; anything other than an object is a parse error
//! 5. Drop `null` values so every category falls back to its empty default
//! 6. Drop keys outside the contract (logged)
//! 7. Deserialize into [`StructuredProfile`]
//!
//! Topic bracket normalization is not applied here; the pipeline applies it
//! to every classification result regardless of which classifier produced it.

use crate::error::PipelineError;
use crate::profile::StructuredProfile;
use crate::schema::is_known_key;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Parse a classifier response into a profile.
pub fn parse_profile_response(raw: &str) -> Result<StructuredProfile, PipelineError> {
    let s = remove_invisible_chars(raw);
    let s = strip_code_fences(&s);
    let s = outermost_object(&s);
    if s.trim().is_empty() {
        return Err(PipelineError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(s).map_err(|e| PipelineError::ParseError {
        detail: e.to_string(),
    })?;
    let Value::Object(mut map) = value else {
        return Err(PipelineError::ParseError {
            detail: "response is not a JSON object".to_string(),
        });
    };

    map.retain(|key, value| {
        if value.is_null() {
            return false;
        }
        if !is_known_key(key) {
            warn!("Ignoring unexpected key '{}' in classifier response", key);
            return false;
        }
        true
    });

    serde_json::from_value(Value::Object(map)).map_err(|e| PipelineError::ParseError {
        detail: e.to_string(),
    })
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}'))
        .collect()
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t\r]*(?:\n(.*?))?\r?\n?```\s*$").unwrap());

/// The fenced body, or `""` for a fence with nothing inside.
fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps.get(1).map_or("", |m| m.as_str()).to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 3: Outermost object ─────────────────────────────────────────────────

fn outermost_object(input: &str) -> &str {
    match (input.find('{'), input.rfind('}')) {
        (Some(start), Some(end)) if start < end => &input[start..=end],
        _ => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object() {
        let p = parse_profile_response(r#"{"name":"张三","titles":["教授"]}"#).unwrap();
        assert_eq!(p.name, "张三");
        assert_eq!(p.titles, vec!["教授"]);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"name\":\"李四\",\"teachingStyle\":\"幽默\"}\n```";
        let p = parse_profile_response(raw).unwrap();
        assert_eq!(p.name, "李四");
        assert_eq!(p.teaching_style, "幽默");
    }

    #[test]
    fn leading_prose_is_ignored() {
        let raw = "Here is the profile:\n{\"name\":\"王五\"}\nHope this helps.";
        assert_eq!(parse_profile_response(raw).unwrap().name, "王五");
    }

    #[test]
    fn nulls_fall_back_to_defaults() {
        let raw = r#"{"name":"赵六","achievements":null,"teachingStyle":null}"#;
        let p = parse_profile_response(raw).unwrap();
        assert!(p.achievements.is_empty());
        assert_eq!(p.teaching_style, "");
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let raw = r#"{"name":"钱七","hobbies":["围棋"],"profileImage":"data:x"}"#;
        let p = parse_profile_response(raw).unwrap();
        assert_eq!(p.name, "钱七");
        assert!(p.profile_image.is_none());
    }

    #[test]
    fn empty_text_is_empty_response() {
        assert_eq!(parse_profile_response("  \n"), Err(PipelineError::EmptyResponse));
        assert_eq!(parse_profile_response("\u{FEFF}"), Err(PipelineError::EmptyResponse));
    }

    #[test]
    fn empty_fence_is_empty_response() {
        for raw in ["```json\n```", "```\n\n```", "```json```"] {
            assert_eq!(
                parse_profile_response(raw).unwrap_err(),
                PipelineError::EmptyResponse,
                "{raw:?}"
            );
        }
    }

    #[test]
    fn non_json_is_parse_error() {
        let err = parse_profile_response("I could not find a biography.").unwrap_err();
        assert!(matches!(err, PipelineError::ParseError { .. }));
    }

    #[test]
    fn wrong_shape_is_parse_error() {
        let err = parse_profile_response(r#"{"name":"孙八","titles":"教授"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::ParseError { .. }));
        let err = parse_profile_response("[1, 2]").unwrap_err();
        assert!(matches!(err, PipelineError::ParseError { .. }));
    }

    #[test]
    fn topics_are_not_bracketed_here() {
        let p = parse_profile_response(r#"{"name":"周九","topics":["清史讲座"]}"#).unwrap();
        assert_eq!(p.topics, vec!["清史讲座"]);
    }
}
