//! gitpulse application library
//!
//! This exposes the public API of the gitpulse service for testing and external usage.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod interface;
pub mod lifecycle;
pub mod services;
