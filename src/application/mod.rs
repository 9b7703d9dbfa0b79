pub mod audit;
pub mod auth;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod posts;
pub mod repos;
pub mod tags;
