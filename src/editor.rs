//! In-place edits to a completed profile.
//!
//! The editor works on free text as a user types it: list categories take one
//! item per line, the text category and the name take a single block. An edit
//! replaces exactly the addressed field and nothing else.

use crate::error::BioCraftError;
use crate::pipeline::encode;
use crate::profile::{FieldKey, StructuredProfile};
use crate::schema::FieldKind;

/// Split multi-line input into list items: one item per line, trimmed, blank
/// lines dropped. Line order is preserved.
pub fn parse_list_input(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shape a single text block: surrounding whitespace trimmed.
pub fn parse_text_input(text: &str) -> String {
    text.trim().to_string()
}

/// Render a field back to the editable text form `apply_edit` accepts.
pub fn field_as_input(profile: &StructuredProfile, key: FieldKey) -> String {
    match key {
        FieldKey::Name => profile.name.clone(),
        FieldKey::Category(category) => match profile.field(category) {
            crate::profile::FieldValue::List(items) => items.join("\n"),
            crate::profile::FieldValue::Text(text) => text.to_string(),
        },
    }
}

/// Replace the value of `key` with `input`, shaped by the field's kind.
pub fn apply_edit(
    profile: &mut StructuredProfile,
    key: FieldKey,
    input: &str,
) -> Result<(), BioCraftError> {
    match key {
        FieldKey::Name => {
            let name = parse_text_input(input);
            if name.is_empty() {
                return Err(BioCraftError::EmptyName);
            }
            profile.name = name;
        }
        FieldKey::Category(category) => match category.kind() {
            FieldKind::List => {
                if let Some(list) = profile.list_mut(category) {
                    *list = parse_list_input(input);
                }
            }
            FieldKind::Text => {
                if let Some(text) = profile.text_mut(category) {
                    *text = parse_text_input(input);
                }
            }
        },
    }
    Ok(())
}

/// Attach a portrait, validating that the bytes are a PNG or JPEG image.
pub fn attach_image(profile: &mut StructuredProfile, bytes: &[u8]) -> Result<(), BioCraftError> {
    let data_url = encode::to_data_url(bytes)?;
    profile.profile_image = Some(data_url);
    Ok(())
}
