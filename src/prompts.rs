//! System prompt for biography classification.
//!
//! The instruction text and the response schema are sent together: the
//! instruction explains the taxonomy and the lossless-categorization policy,
//! the schema pins the exact keys and their types. Callers can replace the
//! instruction via [`crate::config::BioCraftConfig::system_prompt`]; the
//! schema is always appended.

use serde_json::Value;

/// Default instruction for sorting a biography into the fixed categories.
///
/// Used when `BioCraftConfig::system_prompt` is `None`.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a precise document categorization engine.
Your task is to losslessly categorize content from the provided text into structured fields.

Categories:
1. Name (姓名)
2. Titles (职称头衔)
3. Career (从业经历)
4. Education (教育经历)
5. Research Direction (研究方向)
6. Main Topics (主讲课题)
7. Teaching Style (授课风格)
8. Research Achievements (研究成果)
9. Teaching Experience (授课经历) - Include specific teaching history, training experience. IMPORTANT: Any content related to "serving clients" (服务客户) or "serving enterprises" (服务企业) MUST be included in this category.
10. Other Content (其他内容) - ANYTHING that does not fit into categories 1-9 or 11.
11. Teaching Images (授课图片)

CRITICAL RULES:
1. PRESERVE CONTENT: Do not rewrite, summarize, or delete details. Extract the text exactly as found in the document. Do not "polish" the language unless correcting obvious scanning errors.
2. CATEGORIZE STRICTLY: Place content into the most appropriate category.
3. UNMATCHED CONTENT: If content does not fit specific categories, it MUST go into "Other Content". Do not discard any text.
4. MAIN TOPICS: Extract each topic as a separate string item."#;

/// Output-format rules appended after the instruction.
const OUTPUT_RULES: &str = r#"OUTPUT FORMAT:
Respond with a single JSON object and nothing else: no prose, no code fences.
The object MUST contain every key of the schema below, even when the document has no matching content.
Use an empty array for a list category with no content and an empty string for a text category with no content.
Do not add keys that are not in the schema."#;

/// Assemble the full system prompt: instruction, output rules, JSON schema.
pub fn build_system_prompt(instruction: &str, schema: &Value) -> String {
    let schema_text =
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!("{}\n\n{}\n\nJSON schema:\n{}", instruction.trim(), OUTPUT_RULES, schema_text)
}
