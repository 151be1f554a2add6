//! Application layer: the briefing pipeline and its building blocks.

pub mod auth;
pub mod filter;
pub mod orchestrator;
pub mod plugins;
pub mod schema;
pub mod service;
