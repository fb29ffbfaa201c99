//! User management REST API: registration, login, profile and admin CRUD
//! behind bearer-token authentication.

pub mod app;
pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod state;
pub mod users;
