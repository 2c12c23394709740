use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::compose::host_allowed;
use crate::application::error::HttpError;
use crate::domain::compose::FormState;
use crate::domain::posts::{PostRecord, format_human_date, parse_image_url};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// One rendered post card.
#[derive(Clone)]
pub struct PostCardView {
    pub title: String,
    pub body: String,
    pub author: String,
    pub published_label: String,
    pub categories: Vec<String>,
    /// Present only when the URL parses and its host is allow-listed.
    pub image_url: Option<String>,
}

impl PostCardView {
    pub fn build(record: &PostRecord, allowed_image_hosts: &[String]) -> Self {
        let image_url = record
            .main_image
            .as_deref()
            .and_then(|raw| parse_image_url(raw).ok())
            .filter(|url| host_allowed(url.host_str(), allowed_image_hosts))
            .map(String::from);

        Self {
            title: record.title.clone(),
            body: record.body.clone(),
            author: record.author.clone(),
            published_label: record
                .published_at
                .map(format_human_date)
                .unwrap_or_default(),
            categories: record.categories.clone(),
            image_url,
        }
    }
}

/// Initial render of the compose form, derived from the form state machine.
/// The page script replays the same transitions client-side.
#[derive(Clone)]
pub struct ComposeView {
    pub visible: bool,
    pub loading: bool,
    pub upload_pending: bool,
    pub image_url: Option<String>,
    pub success_link: Option<String>,
}

impl ComposeView {
    pub fn from_state(state: &FormState) -> Self {
        match state {
            FormState::Idle => Self::hidden(),
            FormState::Editing { image, .. } => Self {
                visible: true,
                loading: false,
                upload_pending: image.is_pending(),
                image_url: image.uploaded_url().map(str::to_string),
                success_link: None,
            },
            FormState::Submitting { image_url, .. } => Self {
                visible: true,
                loading: true,
                upload_pending: false,
                image_url: Some(image_url.clone()),
                success_link: None,
            },
            FormState::Succeeded { post_id } => Self {
                visible: false,
                loading: false,
                upload_pending: false,
                image_url: None,
                success_link: post_id.as_ref().map(|id| format!("/post/{id}")),
            },
        }
    }

    fn hidden() -> Self {
        Self {
            visible: false,
            loading: false,
            upload_pending: false,
            image_url: None,
            success_link: None,
        }
    }
}

pub struct IndexView {
    pub compose: ComposeView,
    pub posts: Vec<PostCardView>,
}

impl IndexView {
    pub fn build(posts: &[PostRecord], allowed_image_hosts: &[String]) -> Self {
        Self {
            compose: ComposeView::from_state(&FormState::default()),
            posts: posts
                .iter()
                .map(|record| PostCardView::build(record, allowed_image_hosts))
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: IndexView,
}
