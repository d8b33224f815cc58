pub mod auth;
pub mod category;
pub mod config;
pub mod error;
pub mod receipt;
pub mod tracing;
pub mod transaction;
pub mod user;
pub mod web;
