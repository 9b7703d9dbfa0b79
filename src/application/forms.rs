//! Input validation for the post and tag editors.
//!
//! Forms deserialize straight from `application/x-www-form-urlencoded`
//! bodies. Validation normalizes the values and either yields the cleaned
//! input or a set of field-level messages for re-rendering the editor.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::entities::{POST_TITLE_MAX_LEN, PostRecord, TAG_TITLE_MAX_LEN, TagRecord};

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub body: String,
    /// Slugs of the selected tags; the field repeats once per tag.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub title: String,
    pub body: String,
    pub tags: Vec<TagRecord>,
}

impl PostForm {
    pub fn from_record(post: &PostRecord, tags: &[TagRecord]) -> Self {
        Self {
            title: post.title.clone(),
            body: post.body.clone(),
            tags: tags.iter().map(|tag| tag.slug.clone()).collect(),
        }
    }

    /// Validate against the tags that currently exist.
    pub fn validate(&self, available: &[TagRecord]) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::new();

        let title = self.title.trim();
        check_title(&mut errors, title, POST_TITLE_MAX_LEN);

        let mut tags: Vec<TagRecord> = Vec::with_capacity(self.tags.len());
        for raw in &self.tags {
            let slug = raw.trim();
            if slug.is_empty() || tags.iter().any(|tag| tag.slug == slug) {
                continue;
            }
            match available.iter().find(|tag| tag.slug == slug) {
                Some(tag) => tags.push(tag.clone()),
                None => errors.add(
                    "tags",
                    format!("Select a valid choice. {slug} is not one of the available choices."),
                ),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidPost {
            title: title.to_string(),
            body: self.body.trim().to_string(),
            tags,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TagForm {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTag {
    pub title: String,
}

impl TagForm {
    pub fn from_record(tag: &TagRecord) -> Self {
        Self {
            title: tag.title.clone(),
        }
    }

    pub fn validate(&self) -> Result<ValidTag, FormErrors> {
        let mut errors = FormErrors::new();
        let title = self.title.trim();
        check_title(&mut errors, title, TAG_TITLE_MAX_LEN);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidTag {
            title: title.to_string(),
        })
    }
}

fn check_title(errors: &mut FormErrors, title: &str, max_len: usize) {
    if title.is_empty() {
        errors.add("title", REQUIRED_MESSAGE);
        return;
    }

    let len = title.chars().count();
    if len > max_len {
        errors.add(
            "title",
            format!("Ensure this value has at most {max_len} characters (it has {len})."),
        );
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn tag(slug: &str) -> TagRecord {
        TagRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: slug.to_string(),
        }
    }

    #[test]
    fn post_form_is_valid_with_known_tag() {
        let python = tag("python");
        let form = PostForm {
            title: "new title".into(),
            body: "new body".into(),
            tags: vec!["python".into()],
        };

        let valid = form.validate(std::slice::from_ref(&python)).expect("valid");
        assert_eq!(valid.title, "new title");
        assert_eq!(valid.body, "new body");
        assert_eq!(valid.tags, vec![python]);
    }

    #[test]
    fn post_form_trims_and_allows_missing_body_and_tags() {
        let form = PostForm {
            title: "  spaced  ".into(),
            ..Default::default()
        };
        let valid = form.validate(&[]).expect("valid");
        assert_eq!(valid.title, "spaced");
        assert!(valid.body.is_empty());
        assert!(valid.tags.is_empty());
    }

    #[test]
    fn post_form_rejects_blank_title() {
        let form = PostForm {
            title: "   ".into(),
            body: "text".into(),
            tags: Vec::new(),
        };
        let errors = form.validate(&[]).expect_err("invalid");
        assert_eq!(errors.field("title"), [REQUIRED_MESSAGE.to_string()]);
        assert!(errors.field("body").is_empty());
    }

    #[test]
    fn post_form_rejects_overlong_title() {
        let form = PostForm {
            title: "x".repeat(151),
            ..Default::default()
        };
        let errors = form.validate(&[]).expect_err("invalid");
        assert_eq!(
            errors.field("title"),
            ["Ensure this value has at most 150 characters (it has 151).".to_string()]
        );
    }

    #[test]
    fn post_form_rejects_unknown_tags_and_collapses_duplicates() {
        let python = tag("python");
        let form = PostForm {
            title: "t".into(),
            body: String::new(),
            tags: vec!["python".into(), "python".into(), "cobol".into()],
        };
        let errors = form
            .validate(std::slice::from_ref(&python))
            .expect_err("unknown tag");
        assert_eq!(
            errors.field("tags"),
            ["Select a valid choice. cobol is not one of the available choices.".to_string()]
        );

        let ok = PostForm {
            tags: vec!["python".into(), "python".into()],
            ..form
        };
        assert_eq!(ok.validate(&[python]).expect("valid").tags.len(), 1);
    }

    #[test]
    fn tag_form_validates_title() {
        assert!(TagForm { title: "".into() }.validate().is_err());
        assert!(TagForm { title: "y".repeat(51) }.validate().is_err());
        let valid = TagForm {
            title: " python ".into(),
        }
        .validate()
        .expect("valid");
        assert_eq!(valid.title, "python");
    }
}
