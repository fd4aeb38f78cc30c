//! Human-readable mirror of feature nodes under `.taskwing/memory/features/`.
//!
//! One file per feature, named `<slug>-<short-id>.md`, regenerated wholesale
//! on every call rather than diffed - simpler and cheap enough at this scale.

use std::path::Path;

use crate::domain::error::TaskWingResult;
use crate::domain::models::{Node, NodeKind};

fn slugify(summary: &str) -> String {
    let slug: String = summary
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

fn render(node: &Node) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", node.summary));
    if let Some(why) = &node.payload.why {
        out.push_str(&format!("## Why\n\n{why}\n\n"));
    }
    out.push_str(&format!("## Content\n\n{}\n", node.content));
    if !node.payload.tradeoffs.is_empty() {
        out.push_str("\n## Tradeoffs\n\n");
        for t in &node.payload.tradeoffs {
            out.push_str(&format!("- {t}\n"));
        }
    }
    if !node.payload.file_paths.is_empty() {
        out.push_str("\n## Files\n\n");
        for f in &node.payload.file_paths {
            out.push_str(&format!("- `{f}`\n"));
        }
    }
    out
}

fn file_name(node: &Node) -> String {
    let slug = slugify(&node.summary);
    let short_id = node.id.chars().take(8).collect::<String>();
    format!("{slug}-{short_id}.md")
}

/// Regenerate every `features/*.md` file from the current set of feature
/// nodes, removing files for nodes that no longer exist.
pub fn regenerate(memory_root: &Path, nodes: &[Node]) -> TaskWingResult<()> {
    let dir = memory_root.join("features");
    std::fs::create_dir_all(&dir)?;

    let mut keep = std::collections::HashSet::new();
    for node in nodes.iter().filter(|n| n.kind == NodeKind::Feature) {
        let name = file_name(node);
        std::fs::write(dir.join(&name), render(node))?;
        keep.insert(name);
    }

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !keep.contains(&name) {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

pub fn feature_markdown_path(memory_root: &Path, node: &Node) -> std::path::PathBuf {
    memory_root.join("features").join(file_name(node))
}
