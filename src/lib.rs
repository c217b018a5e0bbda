//! Rollcall - geofenced classroom attendance tracking
//!
//! This library provides the core functionality for the Rollcall attendance system.

pub mod api;
pub mod config;
pub mod db;
pub mod geo;
pub mod models;
pub mod services;
