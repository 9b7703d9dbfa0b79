//! Quire: a small server-rendered blog engine with tagged posts and an
//! administrator tier for editing.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
