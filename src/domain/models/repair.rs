//! IntegrationReport / RepairAction / RepairPlan - describe and reconcile
//! drift between desired and observed state of external AI-tool configs.

use serde::{Deserialize, Serialize};

/// One of the fixed set of repair primitives. `AdoptAnd` variants are
/// distinguished from their base primitive because they additionally
/// require `RequiresAdoption` confirmation (a first-time opt-in, not just a
/// mutation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairPrimitive {
    RepairCommands,
    RepairHooks,
    RepairPlugin,
    RepairLocalMcp,
    RepairGlobalMcp,
    AdoptAndRepairCommands,
    AdoptAndRepairHooks,
    AdoptAndRepairPlugin,
    AdoptAndRepairLocalMcp,
    AdoptAndRepairGlobalMcp,
}

impl RepairPrimitive {
    pub fn requires_adoption(&self) -> bool {
        matches!(
            self,
            Self::AdoptAndRepairCommands
                | Self::AdoptAndRepairHooks
                | Self::AdoptAndRepairPlugin
                | Self::AdoptAndRepairLocalMcp
                | Self::AdoptAndRepairGlobalMcp
        )
    }

    pub fn mutates_global(&self) -> bool {
        matches!(
            self,
            Self::RepairGlobalMcp | Self::AdoptAndRepairGlobalMcp
        )
    }
}

/// Drift found for one configured external AI-tool integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub tool_name: String,
    pub issues: Vec<String>,
    pub is_adopted: bool,
}

/// A single repair step, gated by confirmation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAction {
    pub tool_name: String,
    pub primitive: RepairPrimitive,
    pub description: String,
    /// Whether this action will actually run (false in dry-run, or pending
    /// confirmation).
    pub apply: bool,
    pub mutates_global: bool,
    pub requires_adoption: bool,
    /// Reason `apply` is false, e.g. "dry-run" or "awaiting confirmation".
    pub skip_reason: Option<String>,
}

impl RepairAction {
    pub fn new(tool_name: impl Into<String>, primitive: RepairPrimitive, description: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            primitive,
            description: description.into(),
            apply: true,
            mutates_global: primitive.mutates_global(),
            requires_adoption: primitive.requires_adoption(),
            skip_reason: None,
        }
    }

    /// Whether this action needs explicit confirmation (interactive prompt
    /// or `--yes`) before it may apply.
    pub fn needs_confirmation(&self) -> bool {
        self.mutates_global || self.requires_adoption
    }

    pub fn mark_dry_run(&mut self) {
        self.apply = false;
        self.skip_reason = Some("dry-run".to_string());
    }

    pub fn mark_awaiting_confirmation(&mut self) {
        self.apply = false;
        self.skip_reason = Some("awaiting confirmation".to_string());
    }
}

/// An ordered, idempotent set of repair actions compiled from integration
/// reports.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepairPlan {
    pub actions: Vec<RepairAction>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopt_and_global_mcp_requires_both_confirmations() {
        let action = RepairAction::new(
            "cursor",
            RepairPrimitive::AdoptAndRepairGlobalMcp,
            "register global MCP server",
        );
        assert!(action.mutates_global);
        assert!(action.requires_adoption);
        assert!(action.needs_confirmation());
    }

    #[test]
    fn plain_repair_commands_needs_no_confirmation() {
        let action = RepairAction::new("cursor", RepairPrimitive::RepairCommands, "sync commands");
        assert!(!action.needs_confirmation());
    }

    #[test]
    fn dry_run_marks_apply_false_with_reason() {
        let mut action = RepairAction::new("cursor", RepairPrimitive::RepairHooks, "sync hooks");
        action.mark_dry_run();
        assert!(!action.apply);
        assert_eq!(action.skip_reason.as_deref(), Some("dry-run"));
    }
}
