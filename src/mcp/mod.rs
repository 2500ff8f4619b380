//! Model Context Protocol (MCP) Module
//!
//! This module contains the MCP protocol implementation, including:
//! - Protocol models (JsonRpcRequest, constants, error codes)
//! - RPC helpers (success/error envelopes, widget instance ids)
//! - MCP handlers (initialize, tools/list, tools/call, resources, ...)

pub mod handlers;
pub mod helpers;
pub mod models;

// Re-export commonly used types and functions
pub use handlers::routes;
