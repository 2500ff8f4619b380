//! Apps SDK tool contract
//!
//! Application-independent pieces of a tool-serving backend:
//! - Tool definitions, verb roles and annotation flags
//! - Closed input schemas with strict validation
//! - The registry and dispatcher
//! - The three-layer response composer
//! - Widget templates, CSP declarations and widget state

pub mod csp;
pub mod registry;
pub mod response;
pub mod schema;
pub mod tool;
pub mod widget;
pub mod widget_state;

pub use csp::WidgetCsp;
pub use registry::{CallContext, ToolHandler, ToolRegistry};
pub use response::{ResponseComposer, ResponseEnvelope, ToolOutput};
pub use schema::{InputSchema, ParamSpec};
pub use tool::{ToolAnnotations, ToolDefinition, ToolName, Verb};
pub use widget::WidgetTemplate;
pub use widget_state::{WidgetPhase, WidgetStateStore};
