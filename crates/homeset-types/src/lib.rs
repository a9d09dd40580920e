//! Shared types for homeset: the home model, host bridge events and the
//! HTTP request/response shapes. Kept free of storage and runtime concerns
//! so every other crate can depend on it.

pub mod api;
pub mod events;
pub mod models;
