use axum::extract::{Extension, Path, Query, State};
use axum_extra::extract::{Form, FormRejection};
use serde::Deserialize;

use crate::application::{
    auth::Principal,
    error::{ContentError, HttpError},
    forms::{FormErrors, TagForm},
    pagination::PageSelector,
    tags::{CreateTagCommand, UpdateTagCommand},
};
use crate::presentation::views::{
    ConfirmDeleteTemplate, ConfirmDeleteView, LayoutContext, PostListView, TagBadge,
    TagDetailTemplate, TagDetailView, TagFormTemplate, TagFormView, TagListTemplate, TagListView,
};

use super::{
    HttpState, Outcome, content_error, ensure_admin, form_body, invalid_form, render,
};

const SOURCE: &str = "infra::http::tags";
const FORM_FIELDS: &[&str] = &["title"];
const TAGS_INDEX: &str = "/tags/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct DetailQuery {
    page: Option<String>,
}

pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
) -> Result<Outcome, HttpError> {
    let tags = match state.tags.list_all().await {
        Ok(tags) => tags,
        Err(err) => return content_error(SOURCE, err),
    };

    let content = TagListView {
        tags: tags.iter().map(TagBadge::from).collect(),
    };
    let view = LayoutContext::new(state.chrome(&principal, None), content);
    render(TagListTemplate { view })
}

pub(super) async fn detail(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<Outcome, HttpError> {
    let tag = match state.tags.find(&slug).await {
        Ok(tag) => tag,
        Err(err) => return content_error(SOURCE, err),
    };
    let Ok(selector) = PageSelector::parse(query.page.as_deref()) else {
        return Ok(Outcome::NotFound);
    };
    let page = match state.posts.list_for_tag(&tag, selector).await {
        Ok(page) => page,
        Err(err) => return content_error(SOURCE, err),
    };

    let listing = PostListView::new(&page, &tag.absolute_url(), None);
    let view = LayoutContext::new(
        state.chrome(&principal, None),
        TagDetailView::new(&tag, listing),
    );
    render(TagDetailTemplate { view })
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }

    let content = TagFormView::create(&TagForm::default(), &FormErrors::new());
    render_form(&state, &principal, content)
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    form: Result<Form<TagForm>, FormRejection>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let form = form_body(SOURCE, form)?;

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            return render_form(&state, &principal, TagFormView::create(&form, &errors));
        }
    };

    let command = CreateTagCommand {
        slug: None,
        title: valid.title,
    };
    match state.tags.create(principal.actor(), command).await {
        Ok(_) => Ok(Outcome::Redirect(TAGS_INDEX.to_string())),
        Err(ContentError::Invalid { field, message }) => {
            let errors = invalid_form(field, message, FORM_FIELDS);
            render_form(&state, &principal, TagFormView::create(&form, &errors))
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
    let tag = match state.tags.find(&slug).await {
        Ok(tag) => tag,
        Err(err) => return content_error(SOURCE, err),
    };

    let form = TagForm::from_record(&tag);
    let content = TagFormView::edit(&tag, &form, &FormErrors::new());
    render_form(&state, &principal, content)
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    Extension(principal): Extension<Principal>,
    Path(slug): Path<String>,
    form: Result<Form<TagForm>, FormRejection>,
) -> Result<Outcome, HttpError> {
    if let Err(outcome) = ensure_admin(&principal) {
        return Ok(outcome);
    }
    let form = form_body(SOURCE, form)?;
    let tag = match state.tags.find(&slug).await {
        Ok(tag) => tag,
        Err(err) => return content_error(SOURCE, err),
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            return render_form(&state, &principal, TagFormView::edit(&tag, &form, &errors));
        }
    };

    let command = UpdateTagCommand { title: valid.title };
    match state.tags.update(principal.actor(), &slug, command).await {
        Ok(_) => Ok(Outcome::Redirect(TAGS_INDEX.to_string())),
        Err(ContentError::Invalid { field, message }) => {
            let errors = invalid_form(field, message, FORM_FIELDS);
            render_form(&state, &principal, TagFormView::edit(&tag, &form, &errors))
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
    let tag = match state.tags.find(&slug).await {
        Ok(tag) => tag,
        Err(err) => return content_error(SOURCE, err),
    };

    let view = LayoutContext::new(state.chrome(&principal, None), ConfirmDeleteView::tag(&tag));
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

    match state.tags.delete(principal.actor(), &slug).await {
        Ok(()) => Ok(Outcome::Redirect(TAGS_INDEX.to_string())),
        Err(err) => content_error(SOURCE, err),
    }
}

fn render_form(
    state: &HttpState,
    principal: &Principal,
    content: TagFormView,
) -> Result<Outcome, HttpError> {
    let view = LayoutContext::new(state.chrome(principal, None), content);
    render(TagFormTemplate { view })
}
