//! Taskflow Domain Module
//!
//! This module contains the task-management app served over MCP:
//! - Domain models (Task, tool inputs, widget-state payloads)
//! - Business logic helpers (visibility, ordering, narration)
//! - The registered tool set and its handlers
//! - Application state management
//! - REST handlers for the widget-state channel

pub mod handlers;
pub mod helpers;
pub mod models;
pub mod state;
pub mod tools;

pub use handlers::routes;
pub use state::{AppState, SharedState};
