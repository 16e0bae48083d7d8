//! Application services layer.

pub mod auth;
pub mod error;
pub mod jobs;
pub mod repos;
pub mod service;
pub mod statistics;
pub mod users;
