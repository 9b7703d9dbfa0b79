use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::presentation::views::{ErrorPageView, render_error_response};

/// Result of a page handler.
#[derive(Debug)]
pub enum Outcome {
    Rendered(Html<String>),
    /// 303 See Other to the given location.
    Redirect(String),
    NotFound,
    Forbidden,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Rendered(html) => (StatusCode::OK, html).into_response(),
            Outcome::Redirect(location) => Redirect::to(&location).into_response(),
            Outcome::NotFound => render_error_response(ErrorPageView::not_found()),
            Outcome::Forbidden => render_error_response(ErrorPageView::forbidden()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    #[test]
    fn redirect_is_see_other() {
        let response = Outcome::Redirect("/tags/".into()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/tags/");
    }

    #[test]
    fn error_outcomes_carry_status() {
        assert_eq!(
            Outcome::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Outcome::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
