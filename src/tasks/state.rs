//! Taskflow State Management
//!
//! Application state: the task store, reminder log, widget-state store, the
//! registered tool set, and widget asset discovery.

use super::models::Task;
use super::tools::register_tools;
use crate::apps::{ResponseComposer, ToolRegistry, WidgetCsp, WidgetStateStore, WidgetTemplate};
use crate::config::AppSettings;
use crate::error::RegistryError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// URI for the widget template
pub const WIDGET_TEMPLATE_URI: &str = "ui://widget/taskflow.html";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state that can be safely passed between threads
pub type SharedState = Arc<AppState>;

pub struct AppState {
    /// In-memory task storage, keyed by task id.
    pub tasks: DashMap<String, Task>,

    /// Last reminder time per task id.
    pub reminders: DashMap<String, DateTime<Utc>>,

    pub widgets: WidgetStateStore,

    pub registry: ToolRegistry<AppState>,

    pub composer: ResponseComposer,

    pub template: WidgetTemplate,

    pub settings: AppSettings,

    /// Path to the directory containing HTML assets.
    pub assets_dir: PathBuf,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates state with default settings.
    ///
    /// # Panics
    ///
    /// Panics if the built-in tool set fails registration under the default
    /// `taskflow` prefix. That set is fixed at compile time and checked by
    /// `default_settings_register_cleanly`; use [`AppState::with_settings`]
    /// for anything configurable.
    pub fn new() -> Self {
        Self::with_settings(AppSettings::default()).expect("built-in tool set is valid")
    }

    pub fn with_settings(settings: AppSettings) -> Result<Self, RegistryError> {
        let mut registry = ToolRegistry::new(settings.service_prefix.clone());
        register_tools(&mut registry)?;

        let assets_dir = match &settings.assets_dir {
            Some(dir) => dir.clone(),
            None => {
                let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                Self::locate_assets_directory(&current_dir)
            }
        };
        tracing::info!("Using assets directory: {:?}", assets_dir);

        let ttl = Duration::seconds(settings.widget_state_ttl_secs.min(u64::from(u32::MAX)) as i64);
        let recovery_tool = format!("{}_list_tasks", settings.service_prefix);

        Ok(Self {
            tasks: DashMap::new(),
            reminders: DashMap::new(),
            widgets: WidgetStateStore::new(settings.widget_state_token_budget, ttl),
            registry,
            composer: ResponseComposer::new(settings.narration_max_chars, recovery_tool),
            template: WidgetTemplate::new(WIDGET_TEMPLATE_URI, "Taskflow board")
                .description("The user's tasks with status, due dates and quick actions.")
                .csp(WidgetCsp::new()),
            settings,
            assets_dir,
        })
    }

    /// Full tool name for an action on this service, e.g. `taskflow_list_tasks`.
    pub fn tool_name(&self, verb_noun: &str) -> String {
        format!("{}_{}", self.settings.service_prefix, verb_noun)
    }

    /// Attempts to locate the assets directory using a multi-step strategy
    fn locate_assets_directory(current_dir: &Path) -> PathBuf {
        // 1. ./assets
        // 2. ../assets (if running from a subdir)
        // 3. Fallback to "assets" relative path

        if current_dir.join("assets").exists() {
            return current_dir.join("assets");
        }

        if let Some(parent) = current_dir.parent() {
            if parent.join("assets").exists() {
                return parent.join("assets");
            }
        }

        PathBuf::from("assets")
    }

    /// Reads taskflow.html or the newest hashed build of it
    pub async fn load_widget_html(&self) -> Result<String, axum::http::StatusCode> {
        let primary_html_path = self.assets_dir.join("taskflow.html");
        if primary_html_path.exists() {
            return tokio::fs::read_to_string(primary_html_path)
                .await
                .map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        }

        // Search for fallbacks (e.g., taskflow-1a2b3c.html)
        let fallback_path = self.find_fallback_html_file().await?;

        tokio::fs::read_to_string(fallback_path)
            .await
            .map_err(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    async fn find_fallback_html_file(&self) -> Result<PathBuf, axum::http::StatusCode> {
        let mut entries = tokio::fs::read_dir(&self.assets_dir)
            .await
            .map_err(|_| axum::http::StatusCode::NOT_FOUND)?;

        let mut fallbacks = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("taskflow-") && name.ends_with(".html") {
                    fallbacks.push(path);
                }
            }
        }

        // Lexicographically last is the latest build
        fallbacks.sort();
        fallbacks
            .last()
            .cloned()
            .ok_or(axum::http::StatusCode::NOT_FOUND)
    }
}
