//! The fixed category catalogue shared by classification, editing and export.
//!
//! Every profile category is described once, in [`CATEGORIES`]: its JSON key,
//! the Chinese section label used in exported documents, whether it holds an
//! ordered list of items or a single text block, and the description handed
//! to the LLM. The classifier's response schema, the editor's input shaping
//! and the exporter's section order are all derived from this table.

use serde_json::{json, Map, Value};

/// Shape of a category's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Ordered sequence of free-text items; order reflects document order.
    List,
    /// A single free-text block.
    Text,
}

/// The profile categories, in canonical export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Titles,
    Career,
    Education,
    ResearchDirection,
    Topics,
    TeachingStyle,
    Achievements,
    TeachingExperience,
    OtherContent,
    TeachingImages,
}

/// One row of the category table.
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub category: Category,
    /// JSON key in the classification contract.
    pub key: &'static str,
    /// Section heading in exported documents.
    pub label: &'static str,
    pub kind: FieldKind,
    /// Field description sent to the LLM inside the response schema.
    pub description: &'static str,
}

/// JSON key of the mandatory name field.
pub const NAME_KEY: &str = "name";

/// Description of the name field in the response schema.
pub const NAME_DESCRIPTION: &str = "The name of the person (姓名).";

/// All categories in canonical order.
pub const CATEGORIES: [CategorySpec; 10] = [
    CategorySpec {
        category: Category::Titles,
        key: "titles",
        label: "职称头衔",
        kind: FieldKind::List,
        description: "Professional titles, ranks, or honorifics (职称头衔).",
    },
    CategorySpec {
        category: Category::Career,
        key: "career",
        label: "从业经历",
        kind: FieldKind::List,
        description: "Work history and professional experience (从业经历).",
    },
    CategorySpec {
        category: Category::Education,
        key: "education",
        label: "教育经历",
        kind: FieldKind::List,
        description: "Educational background details (教育经历).",
    },
    CategorySpec {
        category: Category::ResearchDirection,
        key: "researchDirection",
        label: "研究方向",
        kind: FieldKind::List,
        description: "Fields of research or specialization (研究方向).",
    },
    CategorySpec {
        category: Category::Topics,
        key: "topics",
        label: "主讲课题",
        kind: FieldKind::List,
        description: "Main subjects or courses taught, one topic per item (主讲课题).",
    },
    CategorySpec {
        category: Category::TeachingStyle,
        key: "teachingStyle",
        label: "授课风格",
        kind: FieldKind::Text,
        description: "Description of teaching style or personality (授课风格).",
    },
    CategorySpec {
        category: Category::Achievements,
        key: "achievements",
        label: "研究成果",
        kind: FieldKind::List,
        description: "Academic or professional achievements, publications, awards (研究成果).",
    },
    CategorySpec {
        category: Category::TeachingExperience,
        key: "teachingExperience",
        label: "授课经历",
        kind: FieldKind::List,
        description: "Teaching history and training experience, including any content about serving clients (服务客户) or serving enterprises (服务企业) (授课经历).",
    },
    CategorySpec {
        category: Category::OtherContent,
        key: "otherContent",
        label: "其他内容",
        kind: FieldKind::List,
        description: "Anything that does not fit any other category (其他内容).",
    },
    CategorySpec {
        category: Category::TeachingImages,
        key: "teachingImages",
        label: "授课图片",
        kind: FieldKind::List,
        description: "Descriptions or captions of teaching images (授课图片).",
    },
];

impl Category {
    /// Table row for this category.
    pub fn spec(self) -> &'static CategorySpec {
        // CATEGORIES is declared in enum order.
        &CATEGORIES[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn kind(self) -> FieldKind {
        self.spec().kind
    }

    /// Look a category up by its JSON key.
    pub fn from_key(key: &str) -> Option<Category> {
        CATEGORIES
            .iter()
            .find(|spec| spec.key == key)
            .map(|spec| spec.category)
    }

    /// Iterate categories in canonical export order.
    pub fn all() -> impl Iterator<Item = Category> {
        CATEGORIES.iter().map(|spec| spec.category)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// True when `key` is a field of the classification contract.
pub fn is_known_key(key: &str) -> bool {
    key == NAME_KEY || Category::from_key(key).is_some()
}

/// Build the JSON schema the classifier response must conform to.
///
/// Every key is listed as required: the response must carry all categories,
/// with empty arrays/strings where the document has nothing to offer.
pub fn response_schema() -> Value {
    let mut properties = Map::new();
    properties.insert(
        NAME_KEY.to_string(),
        json!({ "type": "string", "description": NAME_DESCRIPTION }),
    );
    for spec in &CATEGORIES {
        let prop = match spec.kind {
            FieldKind::List => json!({
                "type": "array",
                "items": { "type": "string" },
                "description": spec.description,
            }),
            FieldKind::Text => json!({
                "type": "string",
                "description": spec.description,
            }),
        };
        properties.insert(spec.key.to_string(), prop);
    }

    let required: Vec<&str> = std::iter::once(NAME_KEY)
        .chain(CATEGORIES.iter().map(|spec| spec.key))
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_in_enum_order() {
        for (idx, spec) in CATEGORIES.iter().enumerate() {
            assert_eq!(spec.category as usize, idx, "row {} out of order", spec.key);
        }
    }

    #[test]
    fn canonical_export_order() {
        let labels: Vec<&str> = Category::all().map(Category::label).collect();
        assert_eq!(
            labels,
            vec![
                "职称头衔", "从业经历", "教育经历", "研究方向", "主讲课题", "授课风格", "研究成果",
                "授课经历", "其他内容", "授课图片"
            ]
        );
    }

    #[test]
    fn only_teaching_style_is_text() {
        let text: Vec<Category> = Category::all()
            .filter(|c| c.kind() == FieldKind::Text)
            .collect();
        assert_eq!(text, vec![Category::TeachingStyle]);
    }

    #[test]
    fn from_key_round_trips_every_row() {
        for spec in &CATEGORIES {
            assert_eq!(Category::from_key(spec.key), Some(spec.category));
        }
        assert_eq!(Category::from_key("hobbies"), None);
        assert!(is_known_key("name"));
        assert!(!is_known_key("hobbies"));
    }

    #[test]
    fn schema_requires_every_key() {
        let schema = response_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 11);
        assert_eq!(schema["properties"]["teachingStyle"]["type"], "string");
        assert_eq!(schema["properties"]["topics"]["type"], "array");
        assert_eq!(schema["properties"]["topics"]["items"]["type"], "string");
    }
}
