//! HTTP surface: router, middleware and page handlers.

mod middleware;
mod outcome;
mod posts;
mod tags;

pub use outcome::Outcome;

use std::sync::Arc;

use askama::Template;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::{Form, FormRejection};

use crate::application::{
    auth::{Authenticator, Principal},
    error::{ContentError, ErrorReport, HttpError},
    forms::FormErrors,
    pagination::Paginator,
    posts::PostService,
    repos::{
        HealthRepo, PostTagsRepo, PostsRepo, PostsWriteRepo, RepoError, TagsRepo, TagsWriteRepo,
    },
    tags::TagService,
};
use crate::presentation::views::{LayoutChrome, render_template};

use self::middleware::{log_responses, resolve_principal, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub posts: Arc<PostService>,
    pub tags: Arc<TagService>,
    pub authenticator: Arc<Authenticator>,
    pub health: Arc<dyn HealthRepo>,
    pub site_title: Arc<str>,
}

impl HttpState {
    /// Wire services over a single store implementing every repository.
    pub fn from_repositories<R>(
        repositories: Arc<R>,
        authenticator: Authenticator,
        paginator: Paginator,
        site_title: &str,
    ) -> Self
    where
        R: PostsRepo
            + PostsWriteRepo
            + TagsRepo
            + TagsWriteRepo
            + PostTagsRepo
            + HealthRepo
            + 'static,
    {
        let posts = PostService::new(
            repositories.clone(),
            repositories.clone(),
            repositories.clone(),
            paginator,
        );
        let tags = TagService::new(
            repositories.clone(),
            repositories.clone(),
            repositories.clone(),
        );

        Self {
            posts: Arc::new(posts),
            tags: Arc::new(tags),
            authenticator: Arc::new(authenticator),
            health: repositories,
            site_title: Arc::from(site_title),
        }
    }

    fn chrome(&self, principal: &Principal, search: Option<&str>) -> LayoutChrome {
        LayoutChrome {
            site_title: self.site_title.to_string(),
            is_admin: principal.is_admin(),
            search_query: search.unwrap_or_default().to_string(),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(posts::index))
        .route("/tags/", get(tags::index))
        .route(
            "/post/create/",
            get(posts::create_form).post(posts::create_submit),
        )
        .route(
            "/post/edit/{slug}/",
            get(posts::edit_form).post(posts::edit_submit),
        )
        .route(
            "/post/delete/{slug}/",
            get(posts::delete_confirm).post(posts::delete_submit),
        )
        .route("/post/{slug}/", get(posts::detail))
        .route("/tag/{slug}/", get(tags::detail))
        .route(
            "/tags/create",
            get(tags::create_form).post(tags::create_submit),
        )
        .route(
            "/tag/edit/{slug}/",
            get(tags::edit_form).post(tags::edit_submit),
        )
        .route(
            "/tag/delete/{slug}/",
            get(tags::delete_confirm).post(tags::delete_submit),
        )
        .route("/_health/db", get(db_health))
        .fallback(fallback)
        .with_state(state.clone())
        .layer(from_fn(log_responses))
        .layer(from_fn_with_state(state, resolve_principal))
        .layer(from_fn(set_request_context))
}

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Slug already in use",
            constraint,
        ),
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Resolve a service failure outside of a form submission.
fn content_error(source: &'static str, err: ContentError) -> Result<Outcome, HttpError> {
    match err {
        ContentError::NotFound { .. } | ContentError::Pagination(_) => Ok(Outcome::NotFound),
        ContentError::Invalid { field, message } => Err(HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid input",
            format!("{field}: {message}"),
        )),
        ContentError::Repo(err) => Err(repo_error_to_http(source, err)),
    }
}

/// Place a save-time validation message on `field` when the form renders
/// it, otherwise above the form.
fn invalid_form(field: &'static str, message: String, form_fields: &[&str]) -> FormErrors {
    if form_fields.contains(&field) {
        return FormErrors::single(field, message);
    }
    let mut errors = FormErrors::new();
    errors.add_non_field(message);
    errors
}

fn ensure_admin(principal: &Principal) -> Result<(), Outcome> {
    principal.require_admin().map_err(|_| Outcome::Forbidden)
}

/// Unwrap a form body extracted after the admin gate.
fn form_body<T>(
    source: &'static str,
    form: Result<Form<T>, FormRejection>,
) -> Result<T, HttpError> {
    form.map(|Form(value)| value).map_err(|rejection| {
        HttpError::new(
            source,
            rejection.status(),
            "Invalid form submission",
            rejection.body_text(),
        )
    })
}

fn render<T: Template>(template: T) -> Result<Outcome, HttpError> {
    render_template(template).map(Outcome::Rendered)
}

async fn db_health(State(state): State<HttpState>) -> Response {
    match state.health.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn fallback() -> Outcome {
    Outcome::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_form_fields_fall_back_to_non_field_errors() {
        let errors = invalid_form("slug", "Slug is taken.".to_string(), &["title"]);
        assert!(errors.field("slug").is_empty());
        assert_eq!(errors.non_field(), ["Slug is taken.".to_string()]);

        let errors = invalid_form("title", "Too long.".to_string(), &["title"]);
        assert_eq!(errors.field("title"), ["Too long.".to_string()]);
        assert!(errors.non_field().is_empty());
    }

    #[test]
    fn content_errors_map_to_outcomes() {
        assert!(matches!(
            content_error("test", ContentError::NotFound { entity: "post" }),
            Ok(Outcome::NotFound)
        ));

        let err = content_error("test", ContentError::invalid("title", "bad"))
            .expect_err("invalid input is an error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
