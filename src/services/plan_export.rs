//! Plan export: render a `Plan` and its `Task`s to markdown under
//! `.taskwing/plans/`, with a `latest.md` that always points at the newest
//! export.
//!
//! Follows `adapters::markdown`'s slugify/render/write shape, adapted from
//! one-file-per-feature to one dated file per export plus a pointer file,
//! and `adapters::state::StateStore`'s atomic-write pattern for `latest.md`
//! on platforms without symlinks.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::TaskWingResult;
use crate::domain::models::{Plan, Task};

fn slugify(text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let mut collapsed = String::new();
    let mut last_was_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !last_was_dash {
                collapsed.push(c);
            }
            last_was_dash = true;
        } else {
            collapsed.push(c);
            last_was_dash = false;
        }
    }
    collapsed.trim_matches('-').to_string()
}

/// Render a plan and its tasks to markdown. Exactly one `## Task:` heading
/// per task, in plan order — the round-trip law `parse_headings(export(p))`
/// depends on this.
pub fn render(plan: &Plan, tasks: &[Task]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Plan: {}\n\n", plan.original_goal));
    if let Some(enriched) = &plan.enriched_goal {
        out.push_str(&format!("**Enriched goal:** {enriched}\n\n"));
    }
    out.push_str(&format!("Status: {}\n\n", plan.status.as_str()));

    for task in tasks {
        out.push_str(&format!("## Task: {}\n\n", task.title));
        out.push_str(&format!("{}\n\n", task.description));
        out.push_str(&format!("- Status: {}\n", task.status.as_str()));
        out.push_str(&format!("- Priority: {}\n", task.priority));
        if !task.acceptance_criteria.is_empty() {
            out.push_str("- Acceptance criteria:\n");
            for c in &task.acceptance_criteria {
                out.push_str(&format!("  - {c}\n"));
            }
        }
        if let Some(summary) = &task.completion_summary {
            out.push_str(&format!("- Completion summary: {summary}\n"));
        }
        out.push('\n');
    }
    out
}

fn file_name(plan: &Plan, date: NaiveDate) -> String {
    format!("{}-{}.md", date.format("%Y-%m-%d"), slugify(&plan.original_goal))
}

/// Write the plan's markdown export to `.taskwing/plans/<date>-<slug>.md`
/// and point `latest.md` at it — a symlink on platforms that support one,
/// an atomically-renamed copy otherwise.
pub fn export_plan(plans_root: &Path, plan: &Plan, tasks: &[Task], date: NaiveDate) -> TaskWingResult<PathBuf> {
    std::fs::create_dir_all(plans_root)?;

    let path = plans_root.join(file_name(plan, date));
    std::fs::write(&path, render(plan, tasks))?;

    let latest_path = plans_root.join("latest.md");
    if latest_path.exists() || latest_path.is_symlink() {
        std::fs::remove_file(&latest_path)?;
    }
    point_latest_at(&latest_path, &path)?;

    Ok(path)
}

#[cfg(unix)]
fn point_latest_at(latest_path: &Path, target: &Path) -> TaskWingResult<()> {
    let file_name = target
        .file_name()
        .expect("export_plan always writes a file with a name");
    std::os::unix::fs::symlink(file_name, latest_path)?;
    Ok(())
}

#[cfg(not(unix))]
fn point_latest_at(latest_path: &Path, target: &Path) -> TaskWingResult<()> {
    let tmp_path = latest_path.with_extension("md.tmp");
    std::fs::copy(target, &tmp_path)?;
    std::fs::rename(&tmp_path, latest_path)?;
    Ok(())
}

/// Parse the `## Task: <title>` headings out of an exported plan's
/// markdown, in document order. Used by the round-trip test and by tools
/// that re-import an edited export.
pub fn parse_task_headings(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .filter_map(|line| line.strip_prefix("## Task: "))
        .map(str::to_string)
        .collect()
}
