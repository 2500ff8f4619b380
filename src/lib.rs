//! Taskflow Library
//!
//! A task-management app served to ChatGPT over MCP (Model Context Protocol),
//! built on a reusable Apps SDK tool contract.

// Tool contract
pub mod apps;

// Domain modules
pub mod mcp;
pub mod tasks;

// Infrastructure
pub mod config;
pub mod error;
pub mod router;
