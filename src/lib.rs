//! MyCar - Vehicle sale listings for a dealership platform
//!
//! This library provides the core functionality of the MyCar service:
//! listings with their vehicles and technical sheets, moderation by the
//! dealership administrator, and the HTTP API on top of it.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
