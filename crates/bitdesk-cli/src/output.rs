//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use bitdesk_core::bridge::{BridgeEvent, SaveStatus};
use bitdesk_core::{Project, ProjectSummary};
use serde_json::{json, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single project
    pub fn print_project(&self, project: &Project) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", project.id);
                println!("Name:     {}", project.name);
                println!("Created:  {}", project.created_at.format("%Y-%m-%d %H:%M"));
                println!("Updated:  {}", project.updated_at.format("%Y-%m-%d %H:%M"));
                println!("Contents: {}", describe_payload(project.payload.as_ref()));
            }
            OutputFormat::Json => {
                println!("{}", to_pretty(project));
            }
            OutputFormat::Quiet => {
                println!("{}", project.id);
            }
        }
    }

    /// Print a list of projects
    pub fn print_projects(&self, projects: &[ProjectSummary]) {
        match self.format {
            OutputFormat::Human => {
                if projects.is_empty() {
                    println!("No projects found.");
                    return;
                }
                for project in projects {
                    println!(
                        "{:<8} | {} | {}",
                        project.id.short(),
                        project.updated_at.format("%Y-%m-%d %H:%M"),
                        truncate(&project.name, 50)
                    );
                }
                println!("\n{} project(s)", projects.len());
            }
            OutputFormat::Json => {
                println!("{}", to_pretty(projects));
            }
            OutputFormat::Quiet => {
                for project in projects {
                    println!("{}", project.id);
                }
            }
        }
    }

    /// Print a bridge event as one line
    pub fn print_event(&self, event: &BridgeEvent) {
        match self.format {
            OutputFormat::Human => println!("{}", describe_event(event)),
            OutputFormat::Json => println!("{}", event_json(event)),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn to_pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| json!({"error": e.to_string()}).to_string())
}

/// Summarize an editor payload without interpreting it further
fn describe_payload(payload: Option<&Value>) -> String {
    let files = payload
        .and_then(|p| p.get("text"))
        .and_then(Value::as_object)
        .map(|text| text.len());

    match files {
        Some(count) => format!("{} file(s)", count),
        None if payload.is_some() => "saved".to_string(),
        None => "(empty)".to_string(),
    }
}

pub fn save_status_label(status: SaveStatus) -> &'static str {
    match status {
        SaveStatus::Saving => "saving",
        SaveStatus::Saved => "saved",
        SaveStatus::Unsaved => "unsaved",
    }
}

fn describe_event(event: &BridgeEvent) -> String {
    match event {
        BridgeEvent::PhaseChanged(phase) => format!("phase: {}", phase),
        BridgeEvent::ImportFailed(error) => format!("import failed: {}", error),
        BridgeEvent::SaveStatusChanged(status) => format!("save: {}", save_status_label(*status)),
        BridgeEvent::PersistFailed(error) => format!("save failed: {}", error),
    }
}

fn event_json(event: &BridgeEvent) -> Value {
    match event {
        BridgeEvent::PhaseChanged(phase) => json!({"event": "phase", "phase": phase.label()}),
        BridgeEvent::ImportFailed(error) => json!({"event": "import_failed", "error": error}),
        BridgeEvent::SaveStatusChanged(status) => {
            json!({"event": "save", "status": save_status_label(*status)})
        }
        BridgeEvent::PersistFailed(error) => json!({"event": "save_failed", "error": error}),
    }
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
