//! Repair Planner: evaluates configured external AI-tool
//! integrations against on-disk state and compiles an idempotent
//! `RepairPlan`.
//!
//! One function per integration surface producing a structured result, an
//! aggregate that never panics on a missing file, and a config struct
//! selecting which checks run.

use std::path::{Path, PathBuf};

use crate::domain::error::TaskWingResult;
use crate::domain::models::{IntegrationReport, RepairAction, RepairPlan, RepairPrimitive};

/// One integration target: an external AI coding tool TaskWing can register
/// itself with. Each path is optional — a tool that doesn't support a given
/// surface (e.g. no plugin system) simply never reports an issue for it.
#[derive(Debug, Clone)]
pub struct ToolIntegrationConfig {
    pub tool_name: String,
    pub commands_dir: Option<PathBuf>,
    pub hooks_file: Option<PathBuf>,
    pub plugin_manifest: Option<PathBuf>,
    pub local_mcp_config: Option<PathBuf>,
    pub global_mcp_config: Option<PathBuf>,
    /// Marker file whose presence means this tool has previously adopted
    /// TaskWing — distinguishes a plain repair from an `adopt_and_` one.
    pub adoption_marker: PathBuf,
}

/// The content TaskWing expects to find at each integration surface. A
/// plain substring check (`MARKER`) is sufficient to detect drift without
/// parsing each tool's own config format.
const MARKER: &str = "taskwing";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Commands,
    Hooks,
    Plugin,
    LocalMcp,
    GlobalMcp,
}

impl Surface {
    fn primitive(self, adopted: bool) -> RepairPrimitive {
        use RepairPrimitive::{
            AdoptAndRepairCommands, AdoptAndRepairGlobalMcp, AdoptAndRepairHooks, AdoptAndRepairLocalMcp,
            AdoptAndRepairPlugin, RepairCommands, RepairGlobalMcp, RepairHooks, RepairLocalMcp, RepairPlugin,
        };
        match (self, adopted) {
            (Self::Commands, true) => RepairCommands,
            (Self::Commands, false) => AdoptAndRepairCommands,
            (Self::Hooks, true) => RepairHooks,
            (Self::Hooks, false) => AdoptAndRepairHooks,
            (Self::Plugin, true) => RepairPlugin,
            (Self::Plugin, false) => AdoptAndRepairPlugin,
            (Self::LocalMcp, true) => RepairLocalMcp,
            (Self::LocalMcp, false) => AdoptAndRepairLocalMcp,
            (Self::GlobalMcp, true) => RepairGlobalMcp,
            (Self::GlobalMcp, false) => AdoptAndRepairGlobalMcp,
        }
    }

    fn description(self, tool_name: &str) -> String {
        match self {
            Self::Commands => format!("sync TaskWing slash commands for {tool_name}"),
            Self::Hooks => format!("sync TaskWing hooks for {tool_name}"),
            Self::Plugin => format!("register TaskWing plugin manifest for {tool_name}"),
            Self::LocalMcp => format!("register TaskWing as a local MCP server for {tool_name}"),
            Self::GlobalMcp => format!("register TaskWing as a global MCP server for {tool_name}"),
        }
    }
}

fn surface_path(config: &ToolIntegrationConfig, surface: Surface) -> Option<&Path> {
    match surface {
        Surface::Commands => config.commands_dir.as_deref(),
        Surface::Hooks => config.hooks_file.as_deref(),
        Surface::Plugin => config.plugin_manifest.as_deref(),
        Surface::LocalMcp => config.local_mcp_config.as_deref(),
        Surface::GlobalMcp => config.global_mcp_config.as_deref(),
    }
}

const ALL_SURFACES: [Surface; 5] = [
    Surface::Commands,
    Surface::Hooks,
    Surface::Plugin,
    Surface::LocalMcp,
    Surface::GlobalMcp,
];

fn is_in_desired_state(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path)
            .map(|mut entries| {
                entries.any(|e| {
                    e.ok()
                        .and_then(|e| std::fs::read_to_string(e.path()).ok())
                        .is_some_and(|content| content.to_lowercase().contains(MARKER))
                })
            })
            .unwrap_or(false)
    } else {
        std::fs::read_to_string(path)
            .map(|content| content.to_lowercase().contains(MARKER))
            .unwrap_or(false)
    }
}

pub struct RepairPlanner {
    tools: Vec<ToolIntegrationConfig>,
}

impl RepairPlanner {
    pub fn new(tools: Vec<ToolIntegrationConfig>) -> Self {
        Self { tools }
    }

    /// Evaluate every configured tool against observed on-disk state.
    pub fn evaluate(&self) -> Vec<IntegrationReport> {
        self.tools
            .iter()
            .map(|tool| {
                let is_adopted = tool.adoption_marker.exists();
                let mut issues = Vec::new();
                for surface in ALL_SURFACES {
                    let Some(path) = surface_path(tool, surface) else {
                        continue;
                    };
                    if !path.exists() || !is_in_desired_state(path) {
                        issues.push(format!("{surface:?} is missing or out of sync"));
                    }
                }
                IntegrationReport {
                    tool_name: tool.tool_name.clone(),
                    issues,
                    is_adopted,
                }
            })
            .collect()
    }

    /// Compile an ordered `RepairPlan` from reports. One action per drifted
    /// surface; primitive choice depends on whether the tool has already
    /// adopted TaskWing.
    pub fn compile_plan(&self, reports: &[IntegrationReport]) -> RepairPlan {
        let mut actions = Vec::new();
        for (tool, report) in self.tools.iter().zip(reports) {
            if report.issues.is_empty() {
                continue;
            }
            for surface in ALL_SURFACES {
                let Some(path) = surface_path(tool, surface) else {
                    continue;
                };
                if path.exists() && is_in_desired_state(path) {
                    continue;
                }
                actions.push(RepairAction::new(
                    tool.tool_name.clone(),
                    surface.primitive(report.is_adopted),
                    surface.description(&tool.tool_name),
                ));
            }
        }
        RepairPlan { actions }
    }

    /// Apply a plan. `confirm=false` leaves every action that
    /// `needs_confirmation()` unapplied with `"awaiting confirmation"`;
    /// `dry_run=true` marks every action `"dry-run"` regardless of
    /// confirmation. Applying is idempotent: writing the desired marker
    /// content to an already-repaired surface is a no-op on disk.
    pub fn apply(&self, plan: &mut RepairPlan, confirm: bool, dry_run: bool) -> TaskWingResult<()> {
        for action in &mut plan.actions {
            if dry_run {
                action.mark_dry_run();
                continue;
            }
            if action.needs_confirmation() && !confirm {
                action.mark_awaiting_confirmation();
                continue;
            }
            let Some(tool) = self.tools.iter().find(|t| t.tool_name == action.tool_name) else {
                continue;
            };
            apply_action(tool, action)?;
        }
        Ok(())
    }
}

fn apply_action(tool: &ToolIntegrationConfig, action: &RepairAction) -> TaskWingResult<()> {
    use RepairPrimitive::{
        AdoptAndRepairCommands, AdoptAndRepairGlobalMcp, AdoptAndRepairHooks, AdoptAndRepairLocalMcp,
        AdoptAndRepairPlugin, RepairCommands, RepairGlobalMcp, RepairHooks, RepairLocalMcp, RepairPlugin,
    };
    let path = match action.primitive {
        RepairCommands | AdoptAndRepairCommands => tool.commands_dir.as_deref(),
        RepairHooks | AdoptAndRepairHooks => tool.hooks_file.as_deref(),
        RepairPlugin | AdoptAndRepairPlugin => tool.plugin_manifest.as_deref(),
        RepairLocalMcp | AdoptAndRepairLocalMcp => tool.local_mcp_config.as_deref(),
        RepairGlobalMcp | AdoptAndRepairGlobalMcp => tool.global_mcp_config.as_deref(),
    };
    let Some(path) = path else {
        return Ok(());
    };

    if action.primitive == RepairCommands || action.primitive == AdoptAndRepairCommands {
        std::fs::create_dir_all(path)?;
        std::fs::write(path.join("taskwing.md"), "# taskwing\n\nTaskWing slash commands.\n")?;
    } else {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, "{\"taskwing\": true}\n")?;
    }

    if action.requires_adoption {
        if let Some(parent) = tool.adoption_marker.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tool.adoption_marker, "adopted\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_config(root: &Path, name: &str) -> ToolIntegrationConfig {
        ToolIntegrationConfig {
            tool_name: name.to_string(),
            commands_dir: Some(root.join("commands")),
            hooks_file: Some(root.join("hooks.json")),
            plugin_manifest: None,
            local_mcp_config: Some(root.join("mcp.json")),
            global_mcp_config: None,
            adoption_marker: root.join(".adopted"),
        }
    }

    #[test]
    fn missing_files_are_reported_as_issues() {
        let dir = tempfile::tempdir().unwrap();
        let planner = RepairPlanner::new(vec![tool_config(dir.path(), "cursor")]);
        let reports = planner.evaluate();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].issues.is_empty());
        assert!(!reports[0].is_adopted);
    }

    #[test]
    fn unadopted_tool_gets_adopt_and_prefixed_primitives() {
        let dir = tempfile::tempdir().unwrap();
        let planner = RepairPlanner::new(vec![tool_config(dir.path(), "cursor")]);
        let reports = planner.evaluate();
        let plan = planner.compile_plan(&reports);
        assert!(plan.actions.iter().all(|a| a.requires_adoption));
    }

    #[test]
    fn dry_run_applies_nothing_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let planner = RepairPlanner::new(vec![tool_config(dir.path(), "cursor")]);
        let reports = planner.evaluate();
        let mut plan = planner.compile_plan(&reports);
        planner.apply(&mut plan, true, true).unwrap();
        assert!(plan.actions.iter().all(|a| !a.apply));
        assert!(!dir.path().join("hooks.json").exists());
    }

    #[test]
    fn unconfirmed_global_mutation_is_left_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = tool_config(dir.path(), "cursor");
        config.global_mcp_config = Some(dir.path().join("global_mcp.json"));
        let planner = RepairPlanner::new(vec![config]);
        let reports = planner.evaluate();
        let mut plan = planner.compile_plan(&reports);
        planner.apply(&mut plan, false, false).unwrap();
        let global_action = plan
            .actions
            .iter()
            .find(|a| matches!(a.primitive, RepairPrimitive::AdoptAndRepairGlobalMcp))
            .unwrap();
        assert!(!global_action.apply);
        assert_eq!(global_action.skip_reason.as_deref(), Some("awaiting confirmation"));
    }

    #[test]
    fn reapplying_a_finished_plan_produces_zero_additional_actions() {
        let dir = tempfile::tempdir().unwrap();
        let planner = RepairPlanner::new(vec![tool_config(dir.path(), "cursor")]);

        let reports = planner.evaluate();
        let mut plan = planner.compile_plan(&reports);
        planner.apply(&mut plan, true, false).unwrap();

        let reports_after = planner.evaluate();
        let plan_after = planner.compile_plan(&reports_after);
        assert!(plan_after.is_empty());
    }
}
