use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use url::form_urlencoded;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::{FormErrors, PostForm, TagForm};
use crate::application::pagination::Page;
use crate::application::posts::PostEntry;
use crate::domain::entities::{PostRecord, TagRecord};

const EXCERPT_WORDS: usize = 40;

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

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

/// Render the standalone error page and attach a report for the response log.
pub fn render_error_response(view: ErrorPageView) -> Response {
    let status = StatusCode::from_u16(view.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let detail = view.title.clone();
    let mut response = render_template_response(ErrorTemplate { view }, status);
    ErrorReport::from_message("presentation::views::render_error_response", status, detail)
        .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub is_admin: bool,
    pub search_query: String,
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub is_admin: bool,
    pub search_query: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            is_admin: chrome.is_admin,
            search_query: chrome.search_query,
            content,
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub title: String,
    pub href: String,
}

impl From<&TagRecord> for TagBadge {
    fn from(tag: &TagRecord) -> Self {
        Self {
            title: tag.title.clone(),
            href: tag.absolute_url(),
        }
    }
}

#[derive(Clone)]
pub struct PostCard {
    pub title: String,
    pub href: String,
    pub iso_date: String,
    pub published: String,
    pub excerpt: String,
    pub badges: Vec<TagBadge>,
}

impl From<&PostEntry> for PostCard {
    fn from(entry: &PostEntry) -> Self {
        let post = &entry.post;
        Self {
            title: post.title.clone(),
            href: post.absolute_url(),
            iso_date: format_date(post.created_at, ISO_DATE),
            published: format_date(post.created_at, DISPLAY_DATE),
            excerpt: excerpt(&post.body, EXCERPT_WORDS),
            badges: entry.tags.iter().map(TagBadge::from).collect(),
        }
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u32,
    pub num_pages: u32,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
}

impl PaginationView {
    /// Links for `page`, keeping the search query (if any) on every link.
    pub fn new<T>(page: &Page<T>, base_path: &str, search: Option<&str>) -> Self {
        let href = |number: u32| page_href(base_path, search, number);
        Self {
            number: page.number,
            num_pages: page.num_pages,
            first_href: page.has_previous().then(|| href(1)),
            previous_href: page.previous_number().map(href),
            next_href: page.next_number().map(href),
            last_href: page.has_next().then(|| page_href(base_path, search, page.num_pages)),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

fn page_href(base_path: &str, search: Option<&str>, number: u32) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(search) = search {
        query.append_pair("q", search);
    }
    query.append_pair("page", &number.to_string());
    format!("{base_path}?{}", query.finish())
}

#[derive(Clone)]
pub struct PostListView {
    pub posts: Vec<PostCard>,
    pub total: u64,
    pub pagination: PaginationView,
    pub empty_message: String,
}

impl PostListView {
    pub fn new(page: &Page<PostEntry>, base_path: &str, search: Option<&str>) -> Self {
        let empty_message = match search {
            Some(query) => format!("No posts match \u{201c}{query}\u{201d}."),
            None => "No posts yet.".to_string(),
        };
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            total: page.total,
            pagination: PaginationView::new(page, base_path, search),
            empty_message,
        }
    }
}

pub struct IndexView {
    pub heading: String,
    pub listing: PostListView,
}

pub struct TagDetailView {
    pub title: String,
    pub edit_href: String,
    pub delete_href: String,
    pub listing: PostListView,
}

impl TagDetailView {
    pub fn new(tag: &TagRecord, listing: PostListView) -> Self {
        Self {
            title: tag.title.clone(),
            edit_href: format!("/tag/edit/{}/", tag.slug),
            delete_href: format!("/tag/delete/{}/", tag.slug),
            listing,
        }
    }
}

pub struct TagListView {
    pub tags: Vec<TagBadge>,
}

pub struct PostDetailView {
    pub title: String,
    pub iso_date: String,
    pub published: String,
    pub paragraphs: Vec<String>,
    pub badges: Vec<TagBadge>,
    pub edit_href: String,
    pub delete_href: String,
}

impl From<&PostEntry> for PostDetailView {
    fn from(entry: &PostEntry) -> Self {
        let post = &entry.post;
        Self {
            title: post.title.clone(),
            iso_date: format_date(post.created_at, ISO_DATE),
            published: format_date(post.created_at, DISPLAY_DATE),
            paragraphs: paragraphs(&post.body),
            badges: entry.tags.iter().map(TagBadge::from).collect(),
            edit_href: format!("/post/edit/{}/", post.slug),
            delete_href: format!("/post/delete/{}/", post.slug),
        }
    }
}

pub struct TagOptionView {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub cancel_href: String,
    pub title: String,
    pub body: String,
    pub tag_options: Vec<TagOptionView>,
    pub title_errors: Vec<String>,
    pub body_errors: Vec<String>,
    pub tags_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl PostFormView {
    pub fn create(form: &PostForm, available: &[TagRecord], errors: &FormErrors) -> Self {
        Self::build(
            "New post",
            "/post/create/".to_string(),
            "Create",
            "/".to_string(),
            form,
            available,
            errors,
        )
    }

    pub fn edit(
        post: &PostRecord,
        form: &PostForm,
        available: &[TagRecord],
        errors: &FormErrors,
    ) -> Self {
        Self::build(
            "Edit post",
            format!("/post/edit/{}/", post.slug),
            "Save",
            post.absolute_url(),
            form,
            available,
            errors,
        )
    }

    fn build(
        heading: &str,
        action: String,
        submit_label: &str,
        cancel_href: String,
        form: &PostForm,
        available: &[TagRecord],
        errors: &FormErrors,
    ) -> Self {
        let tag_options = available
            .iter()
            .map(|tag| TagOptionView {
                slug: tag.slug.clone(),
                title: tag.title.clone(),
                selected: form.tags.iter().any(|selected| selected.trim() == tag.slug),
            })
            .collect();

        Self {
            heading: heading.to_string(),
            action,
            submit_label: submit_label.to_string(),
            cancel_href,
            title: form.title.clone(),
            body: form.body.clone(),
            tag_options,
            title_errors: errors.field("title").to_vec(),
            body_errors: errors.field("body").to_vec(),
            tags_errors: errors.field("tags").to_vec(),
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

pub struct TagFormView {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub cancel_href: String,
    pub title: String,
    pub title_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl TagFormView {
    pub fn create(form: &TagForm, errors: &FormErrors) -> Self {
        Self::build("New tag", "/tags/create".to_string(), "Create", form, errors)
    }

    pub fn edit(tag: &TagRecord, form: &TagForm, errors: &FormErrors) -> Self {
        Self::build(
            "Edit tag",
            format!("/tag/edit/{}/", tag.slug),
            "Save",
            form,
            errors,
        )
    }

    fn build(
        heading: &str,
        action: String,
        submit_label: &str,
        form: &TagForm,
        errors: &FormErrors,
    ) -> Self {
        Self {
            heading: heading.to_string(),
            action,
            submit_label: submit_label.to_string(),
            cancel_href: "/tags/".to_string(),
            title: form.title.clone(),
            title_errors: errors.field("title").to_vec(),
            non_field_errors: errors.non_field().to_vec(),
        }
    }
}

pub struct ConfirmDeleteView {
    pub heading: String,
    pub subject: String,
    pub note: Option<String>,
    pub action: String,
    pub cancel_href: String,
}

impl ConfirmDeleteView {
    pub fn post(post: &PostRecord) -> Self {
        Self {
            heading: "Delete post".to_string(),
            subject: post.title.clone(),
            note: None,
            action: format!("/post/delete/{}/", post.slug),
            cancel_href: post.absolute_url(),
        }
    }

    pub fn tag(tag: &TagRecord) -> Self {
        Self {
            heading: "Delete tag".to_string(),
            subject: tag.title.clone(),
            note: Some("Posts carrying this tag are kept.".to_string()),
            action: format!("/tag/delete/{}/", tag.slug),
            cancel_href: tag.absolute_url(),
        }
    }
}

pub struct ErrorPageView {
    pub status_code: u16,
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            status_code: StatusCode::FORBIDDEN.as_u16(),
            title: "Forbidden".to_string(),
            message: "Administrator privileges are required for this page.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts_list.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexView>,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Template)]
#[template(path = "tags_list.html")]
pub struct TagListTemplate {
    pub view: LayoutContext<TagListView>,
}

#[derive(Template)]
#[template(path = "tag_detail.html")]
pub struct TagDetailTemplate {
    pub view: LayoutContext<TagDetailView>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Template)]
#[template(path = "tag_form.html")]
pub struct TagFormTemplate {
    pub view: LayoutContext<TagFormView>,
}

#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub view: LayoutContext<ConfirmDeleteView>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}

fn format_date(value: OffsetDateTime, format: &[BorrowedFormatItem<'_>]) -> String {
    value.format(format).unwrap_or_default()
}

/// First `limit` words of `body`, with an ellipsis when anything was cut.
fn excerpt(body: &str, limit: usize) -> String {
    let mut words = body.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(limit).collect();
    let mut text = kept.join(" ");
    if words.next().is_some() {
        text.push_str(" \u{2026}");
    }
    text
}

/// Split a body into paragraphs on blank lines.
fn paragraphs(body: &str) -> Vec<String> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}
