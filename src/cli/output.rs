//! Console output: the running summary shown once the stack is up.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::{style, Style};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::{OrchestrationPlan, ProcessSnapshot, ProcessState};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// One row of the running summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceRow {
    pub name: String,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningSummary {
    pub run_id: Uuid,
    pub services: Vec<ServiceRow>,
}

impl RunningSummary {
    /// Join registry snapshots with the ports the plan declares.
    pub fn new(run_id: Uuid, plan: &OrchestrationPlan, snapshots: &[ProcessSnapshot]) -> Self {
        let services = snapshots
            .iter()
            .map(|snapshot| {
                let port = plan
                    .descriptors()
                    .find(|d| d.name == snapshot.name)
                    .and_then(|d| d.port);
                ServiceRow {
                    name: snapshot.name.clone(),
                    state: snapshot.state,
                    pid: snapshot.pid,
                    port,
                    url: port.map(|p| format!("http://localhost:{p}")),
                }
            })
            .collect();
        Self { run_id, services }
    }
}

fn state_style(state: ProcessState) -> Style {
    match state {
        ProcessState::Ready | ProcessState::Running => Style::new().green(),
        ProcessState::Spawned | ProcessState::Stopping => Style::new().yellow(),
        ProcessState::Failed => Style::new().red().bold(),
        ProcessState::Stopped => Style::new().dim(),
    }
}

impl CommandOutput for RunningSummary {
    fn to_human(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                ["SERVICE", "STATE", "PID", "URL"]
                    .into_iter()
                    .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
            );
        for row in &self.services {
            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(state_style(row.state).apply_to(row.state.as_str())),
                Cell::new(row.pid.map_or_else(|| "-".to_string(), |p| p.to_string())),
                Cell::new(row.url.as_deref().unwrap_or("-")),
            ]);
        }

        [
            String::new(),
            style("ZViewer is running!").bold().green().to_string(),
            String::new(),
            table.to_string(),
            String::new(),
            style("Press Ctrl+C to stop all services").dim().to_string(),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LaunchSpec, Readiness, ServiceDescriptor};
    use chrono::Utc;
    use std::time::Duration;

    fn snapshot(name: &str, state: ProcessState) -> ProcessSnapshot {
        ProcessSnapshot {
            name: name.to_string(),
            pid: Some(42),
            state,
            started_at: Utc::now(),
            command: "go run cmd/api/main.go".to_string(),
            exit_code: None,
        }
    }

    fn plan() -> OrchestrationPlan {
        OrchestrationPlan::new().group(
            "primary-api",
            vec![ServiceDescriptor::new(
                "primary-api",
                LaunchSpec::new("go"),
                Readiness::GracePeriod(Duration::from_millis(1)),
            )
            .with_port(8080)],
        )
    }

    #[test]
    fn test_summary_carries_urls_from_plan() {
        let summary = RunningSummary::new(
            Uuid::new_v4(),
            &plan(),
            &[snapshot("primary-api", ProcessState::Running), snapshot("client", ProcessState::Running)],
        );
        assert_eq!(summary.services[0].url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(summary.services[1].url, None);
    }

    #[test]
    fn test_human_output_has_banner_and_hint() {
        let summary = RunningSummary::new(Uuid::new_v4(), &plan(), &[snapshot("primary-api", ProcessState::Running)]);
        let text = console::strip_ansi_codes(&summary.to_human()).to_string();
        assert!(text.contains("ZViewer is running!"));
        assert!(text.contains("primary-api"));
        assert!(text.contains("http://localhost:8080"));
        assert!(text.contains("Press Ctrl+C to stop all services"));
    }

    #[test]
    fn test_json_output() {
        let summary = RunningSummary::new(Uuid::new_v4(), &plan(), &[snapshot("primary-api", ProcessState::Running)]);
        let json = summary.to_json();
        assert_eq!(json["services"][0]["state"], "running");
        assert_eq!(json["services"][0]["port"], 8080);
    }
}
