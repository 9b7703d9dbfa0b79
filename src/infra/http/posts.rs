use axum::extract::{Extension, Path, Query, State};
use axum_extra::extract::{Form, FormRejection};
use serde::Deserialize;

use crate::application::{
    auth::Principal,
    error::{ContentError, HttpError},
    forms::{FormErrors, PostForm},
    pagination::PageSelector,
    posts::{CreatePostCommand, UpdatePostCommand},
};
use crate::domain::entities::TagRecord;
use crate::presentation::views::{
    ConfirmDeleteTemplate, ConfirmDeleteView, IndexTemplate, IndexView, LayoutContext,
    PostDetailTemplate, PostDetailView, PostFormTemplate, PostFormView, PostListView,
};

use super::{
    HttpState, Outcome, content_error, ensure_admin, form_body, invalid_form, render,
};

const SOURCE: &str = "infra::http::posts";
const FORM_FIELDS: &[&str] = &["title", "body", "tags"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ListQuery {
    q: Option<String>,
    page: Option<String>,
}

pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<Outcome, HttpError> {
    let Ok(selector) = PageSelector::parse(query.page.as_deref()) else {
        return Ok(Outcome::NotFound);
    };
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let page = match state.posts.list(search, selector).await {
        Ok(page) => page,
        Err(err) => return content_error(SOURCE, err),
    };

    let heading = match search {
        Some(value) => format!("Search results for \u{201c}{value}\u{201d}"),
        None => "Latest posts".to_string(),
    };
    let content = IndexView {
        heading,
        listing: PostListView::new(&page, "/", search),
    };
    let view = LayoutContext::new(state.chrome(&principal, search), content);
    render(IndexTemplate { view })
}

pub(super) async fn detail(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> Result<Outcome, HttpError> {
    let entry = match state.posts.find(&slug).await {
        Ok(entry) => entry,
        Err(err) => return content_error(SOURCE, err),
    };

    let view = LayoutContext::new(
        state.chrome(&principal, None),
        PostDetailView::from(&entry),
    );
    render(PostDetailTemplate { view })
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let available = match state.tags.list_all().await {
        Ok(tags) => tags,
        Err(err) => return content_error(SOURCE, err),
    };

    let content = PostFormView::create(&PostForm::default(), &available, &FormErrors::new());
    render_form(&state, &principal, content)
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    form: Result<Form<PostForm>, FormRejection>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let form = form_body(SOURCE, form)?;
    let available = match state.tags.list_all().await {
        Ok(tags) => tags,
        Err(err) => return content_error(SOURCE, err),
    };

    let valid = match form.validate(&available) {
        Ok(valid) => valid,
        Err(errors) => {
            let content = PostFormView::create(&form, &available, &errors);
            return render_form(&state, &principal, content);
        }
    };

    let command = CreatePostCommand {
        slug: None,
        title: valid.title,
        body: valid.body,
        tag_ids: tag_ids(&valid.tags),
    };
    match state.posts.create(principal.actor(), command).await {
        Ok(post) => Ok(Outcome::Redirect(post.absolute_url())),
        Err(ContentError::Invalid { field, message }) => {
            let errors = invalid_form(field, message, FORM_FIELDS);
            let content = PostFormView::create(&form, &available, &errors);
            render_form(&state, &principal, content)
        }
        Err(err) => content_error(SOURCE, err),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let entry = match state.posts.find(&slug).await {
        Ok(entry) => entry,
        Err(err) => return content_error(SOURCE, err),
    };
    let available = match state.tags.list_all().await {
        Ok(tags) => tags,
        Err(err) => return content_error(SOURCE, err),
    };

    let form = PostForm::from_record(&entry.post, &entry.tags);
    let content = PostFormView::edit(&entry.post, &form, &available, &FormErrors::new());
    render_form(&state, &principal, content)
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
    form: Result<Form<PostForm>, FormRejection>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let form = form_body(SOURCE, form)?;
    let entry = match state.posts.find(&slug).await {
        Ok(entry) => entry,
        Err(err) => return content_error(SOURCE, err),
    };
    let available = match state.tags.list_all().await {
        Ok(tags) => tags,
        Err(err) => return content_error(SOURCE, err),
    };

    let valid = match form.validate(&available) {
        Ok(valid) => valid,
        Err(errors) => {
            let content = PostFormView::edit(&entry.post, &form, &available, &errors);
            return render_form(&state, &principal, content);
        }
    };

    let command = UpdatePostCommand {
        title: valid.title,
        body: valid.body,
        tag_ids: tag_ids(&valid.tags),
    };
    match state.posts.update(principal.actor(), &slug, command).await {
        Ok(post) => Ok(Outcome::Redirect(post.absolute_url())),
        Err(ContentError::Invalid { field, message }) => {
            let errors = invalid_form(field, message, FORM_FIELDS);
            let content = PostFormView::edit(&entry.post, &form, &available, &errors);
            render_form(&state, &principal, content)
        }
        Err(err) => content_error(SOURCE, err),
    }
}

pub(super) async fn delete_confirm(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let entry = match state.posts.find(&slug).await {
        Ok(entry) => entry,
        Err(err) => return content_error(SOURCE, err),
    };

    let view = LayoutContext::new(
        state.chrome(&principal, None),
        ConfirmDeleteView::post(&entry.post),
    );
    render(ConfirmDeleteTemplate { view })
}

pub(super) async fn delete_submit(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }

    match state.posts.delete(principal.actor(), &slug).await {
        Ok(()) => Ok(Outcome::Redirect("/".to_string())),
        Err(err) => content_error(SOURCE, err),
    }
}

fn render_form(
    state: &HttpState,
    principal: &Principal,
    content: PostFormView,
) -> Result<Outcome, HttpError> {
    let view = LayoutContext::new(state.chrome(principal, None), content);
    render(PostFormTemplate { view })
}

fn tag_ids(tags: &[TagRecord]) -> Vec<uuid::Uuid> {
    tags.iter().map(|tag| tag.id).collect()
}
