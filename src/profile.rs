//! The structured biography produced by classification.

use crate::schema::{Category, FieldKind, NAME_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opening bracket used for topic titles.
pub const TOPIC_OPEN: char = '《';
/// Closing bracket used for topic titles.
pub const TOPIC_CLOSE: char = '》';

/// A classified biography.
///
/// Every category is always present: list categories default to an empty
/// vector and the text category to an empty string, so consumers never need
/// to special-case a missing key. `profile_image` is not part of the
/// classification contract; it is attached by the user after completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredProfile {
    pub name: String,
    pub titles: Vec<String>,
    pub career: Vec<String>,
    pub education: Vec<String>,
    pub research_direction: Vec<String>,
    pub topics: Vec<String>,
    pub teaching_style: String,
    pub achievements: Vec<String>,
    pub teaching_experience: Vec<String>,
    pub other_content: Vec<String>,
    pub teaching_images: Vec<String>,
    /// Portrait as a `data:image/...;base64,` URL, shown beside the titles block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// Borrowed view of one category's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    List(&'a [String]),
    Text(&'a str),
}

impl FieldValue<'_> {
    /// Empty list or empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Text(text) => text.is_empty(),
        }
    }
}

impl StructuredProfile {
    /// Read a category's value.
    pub fn field(&self, category: Category) -> FieldValue<'_> {
        match category {
            Category::TeachingStyle => FieldValue::Text(&self.teaching_style),
            list => FieldValue::List(
                self.list(list)
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
            ),
        }
    }

    fn list(&self, category: Category) -> Option<&Vec<String>> {
        let list = match category {
            Category::Titles => &self.titles,
            Category::Career => &self.career,
            Category::Education => &self.education,
            Category::ResearchDirection => &self.research_direction,
            Category::Topics => &self.topics,
            Category::Achievements => &self.achievements,
            Category::TeachingExperience => &self.teaching_experience,
            Category::OtherContent => &self.other_content,
            Category::TeachingImages => &self.teaching_images,
            Category::TeachingStyle => return None,
        };
        Some(list)
    }

    /// Mutable access to a list category; `None` for the text category.
    pub fn list_mut(&mut self, category: Category) -> Option<&mut Vec<String>> {
        let list = match category {
            Category::Titles => &mut self.titles,
            Category::Career => &mut self.career,
            Category::Education => &mut self.education,
            Category::ResearchDirection => &mut self.research_direction,
            Category::Topics => &mut self.topics,
            Category::Achievements => &mut self.achievements,
            Category::TeachingExperience => &mut self.teaching_experience,
            Category::OtherContent => &mut self.other_content,
            Category::TeachingImages => &mut self.teaching_images,
            Category::TeachingStyle => return None,
        };
        Some(list)
    }

    /// Mutable access to the text category; `None` for list categories.
    pub fn text_mut(&mut self, category: Category) -> Option<&mut String> {
        match category {
            Category::TeachingStyle => Some(&mut self.teaching_style),
            _ => None,
        }
    }

    /// Check the classification contract: `name` must be non-empty.
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Categories holding content, in canonical order.
    pub fn non_empty_categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::all().filter(move |c| !self.field(*c).is_empty())
    }

    /// Apply the topic bracket rule to every entry of `topics`.
    pub fn normalize_topics(&mut self) {
        for topic in self.topics.iter_mut() {
            *topic = normalize_topic(topic);
        }
    }
}

/// Trim a topic and wrap it in 《》 unless it is empty or already wrapped.
///
/// Idempotent: `normalize_topic(&normalize_topic(s)) == normalize_topic(s)`.
pub fn normalize_topic(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() || (topic.starts_with(TOPIC_OPEN) && topic.ends_with(TOPIC_CLOSE)) {
        return topic.to_string();
    }
    format!("{TOPIC_OPEN}{topic}{TOPIC_CLOSE}")
}

/// Addressable profile field: the name, or one of the categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Name,
    Category(Category),
}

impl FieldKey {
    pub fn kind(self) -> FieldKind {
        match self {
            FieldKey::Name => FieldKind::Text,
            FieldKey::Category(c) => c.kind(),
        }
    }
}

impl From<Category> for FieldKey {
    fn from(category: Category) -> Self {
        FieldKey::Category(category)
    }
}

impl FromStr for FieldKey {
    type Err = crate::error::BioCraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == NAME_KEY {
            return Ok(FieldKey::Name);
        }
        Category::from_key(s)
            .map(FieldKey::Category)
            .ok_or_else(|| crate::error::BioCraftError::UnknownField { key: s.to_string() })
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Name => f.write_str(NAME_KEY),
            FieldKey::Category(c) => f.write_str(c.key()),
        }
    }
}
