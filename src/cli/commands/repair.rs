//! `taskwing repair` — evaluate and optionally apply the repair plan for
//! TaskWing's external AI-tool integrations, gated by a confirmation flag.

use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{IntegrationReport, RepairAction};
use crate::services::repair_planner::{RepairPlanner, ToolIntegrationConfig};

/// The single integration target TaskWing ships a default config for: the
/// `.claude/` project directory a coding assistant reads commands/hooks
/// from. Additional tools are an external collaborator.
fn default_tools() -> Vec<ToolIntegrationConfig> {
    vec![ToolIntegrationConfig {
        tool_name: "claude".to_string(),
        commands_dir: Some(".claude/commands".into()),
        hooks_file: Some(".claude/settings.json".into()),
        plugin_manifest: None,
        local_mcp_config: Some(".mcp.json".into()),
        global_mcp_config: None,
        adoption_marker: ".claude/.taskwing-adopted".into(),
    }]
}

#[derive(Debug, Serialize)]
struct RepairOutput {
    reports: Vec<IntegrationReport>,
    actions: Vec<RepairAction>,
}

impl CommandOutput for RepairOutput {
    fn to_human(&self) -> String {
        if self.actions.is_empty() {
            return "All configured integrations are up to date.".to_string();
        }
        let mut lines = vec![format!("{} repair action(s):", self.actions.len())];
        for action in &self.actions {
            let status = action.skip_reason.as_deref().unwrap_or("applied");
            lines.push(format!("  [{status}] {} — {}", action.tool_name, action.description));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(confirm: bool, dry_run: bool, json_mode: bool) -> anyhow::Result<()> {
    let planner = RepairPlanner::new(default_tools());
    let reports = planner.evaluate();
    let mut plan = planner.compile_plan(&reports);
    planner.apply(&mut plan, confirm, dry_run)?;

    output(
        &RepairOutput {
            reports,
            actions: plan.actions,
        },
        json_mode,
    );
    Ok(())
}
