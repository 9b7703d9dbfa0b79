#![allow(dead_code)]

use std::{num::NonZeroU32, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use quire::application::auth::{Authenticator, Credential, hash_token};
use quire::application::pagination::Paginator;
use quire::infra::http::{HttpState, build_router};
use quire::infra::memory::MemoryRepositories;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const READER_TOKEN: &str = "reader-secret";

pub struct TestApp {
    pub router: Router,
    pub repositories: Arc<MemoryRepositories>,
}

/// Router over an empty in-memory store with one admin and one reader.
pub fn app_with_page_size(page_size: u32) -> TestApp {
    let repositories = Arc::new(MemoryRepositories::new());
    let authenticator = Authenticator::new(vec![
        Credential::from_hex("admin", &hash_token(ADMIN_TOKEN), true).expect("admin credential"),
        Credential::from_hex("reader", &hash_token(READER_TOKEN), false)
            .expect("reader credential"),
    ]);
    let paginator = Paginator::new(NonZeroU32::new(page_size).expect("non-zero page size"));
    let state =
        HttpState::from_repositories(repositories.clone(), authenticator, paginator, "Quire");

    TestApp {
        router: build_router(state),
        repositories,
    }
}

pub fn app() -> TestApp {
    app_with_page_size(4)
}

impl TestApp {
    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.send(Method::GET, uri, token, None, String::new()).await
    }

    pub async fn post_form(&self, uri: &str, token: Option<&str>, body: &str) -> Response {
        self.send(
            Method::POST,
            uri,
            token,
            Some("application/x-www-form-urlencoded"),
            body.to_string(),
        )
        .await
    }

    /// POST with an arbitrary (or missing) content type.
    pub async fn post_raw(
        &self,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: &str,
    ) -> Response {
        self.send(Method::POST, uri, token, content_type, body.to_string())
            .await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: String,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(Body::from(body))
            .expect("request should build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn create_tag(&self, title: &str) {
        let response = self
            .post_form("/tags/create", Some(ADMIN_TOKEN), &format!("title={title}"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "create tag {title}");
    }

    /// Creates a post and returns the redirect location.
    pub async fn create_post(&self, form: &str) -> String {
        let response = self
            .post_form("/post/create/", Some(ADMIN_TOKEN), form)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "create post {form}");
        location(&response)
    }
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
