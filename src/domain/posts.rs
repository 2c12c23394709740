use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};
use url::Url;

use super::error::DomainError;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");

/// A post document as read back from the content store.
///
/// Every field is defaulted: the store schema marks them all optional, so a
/// half-filled document must still deserialize into a renderable record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
}

/// Raw compose-form values, exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFields {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    /// Comma-separated tag list as typed into the form.
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub main_image: String,
}

/// A validated, normalized post ready to be sent to the content store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub author: String,
    pub categories: Vec<String>,
    pub main_image: String,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

impl PostFields {
    /// Validate required fields and normalize into a draft stamped at `published_at`.
    pub fn into_draft(self, published_at: OffsetDateTime) -> Result<PostDraft, DomainError> {
        let PostFields {
            title,
            body,
            author,
            categories,
            main_image,
        } = self;

        require_non_empty("title", &title)?;
        require_non_empty("body", &body)?;
        require_non_empty("author", &author)?;
        require_non_empty("categories", &categories)?;

        let main_image = parse_image_url(&main_image)?;

        Ok(PostDraft {
            title,
            body,
            author,
            categories: parse_categories(&categories),
            main_image: main_image.into(),
            published_at,
        })
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("`{field}` is required")));
    }
    Ok(())
}

/// Split a comma-separated tag string into trimmed tags, dropping empty
/// segments so a trailing comma does not become an empty tag.
pub fn parse_categories(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// An image reference must be an absolute http(s) URL to count as uploaded.
pub fn parse_image_url(value: &str) -> Result<Url, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(
            "`mainImage` is required; upload an image first",
        ));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| DomainError::validation(format!("`mainImage` is not a valid URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DomainError::validation(format!(
            "`mainImage` must use http or https, got `{}`",
            url.scheme()
        )));
    }
    Ok(url)
}

/// Order for the index page: newest first, undated posts last.
pub fn sort_newest_first(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

pub fn format_human_date(date: OffsetDateTime) -> String {
    date.format(HUMAN_DATE_FORMAT).expect("valid calendar date")
}
