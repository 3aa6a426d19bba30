//! Divergent Flow: capture short notes, classify them, review them later.
//!
//! Requests enter through [`api`], are dispatched by [`mediator`] through a
//! validation stage to the handlers in [`app`], which operate on the stores
//! in [`db`] and mirror writes to the best-effort [`projection`].

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod inference;
pub mod mediator;
pub mod models;
pub mod projection;
