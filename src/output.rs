//! Output rendering for analysis results and profile listings.
//!
//! Supports `human` (default) and `json` outputs. The JSON form carries the
//! nested result tree, command errors and a top-level summary.

use crate::analyzer::RunOutcome;
use crate::config::Profile;
use crate::models::{NodeId, ResultNode, ResultTree};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::io::IsTerminal;

const PROGRESS_TEMPLATE: &str = "{spinner} {msg} [{bar:40}] {pos}%";

fn use_colors(output: &str) -> bool {
    output != "json" && crate::utils::colors_enabled()
}

/// Print the outcome of a run in the requested format.
pub fn print_outcome(outcome: &RunOutcome, output: &str) {
    match output {
        "json" => match serde_json::to_string_pretty(&compose_outcome_json(outcome)) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("{} {}", crate::utils::error_prefix(), e),
        },
        _ => {
            let color = use_colors(output);
            for e in &outcome.command_errors {
                if color {
                    println!("{} {}", "✖".red(), e.red());
                } else {
                    println!("✖ {}", e);
                }
            }
            for line in render_tree_lines(&outcome.tree, color) {
                println!("{}", line);
            }
            let s = outcome.summary();
            let summary = format!(
                "— Summary — errors={} warnings={} files={} commandErrors={}",
                s.errors, s.warnings, s.files, s.command_errors
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print the aggregated text of the file or folder at `path`.
///
/// Returns `false` when no such node exists in the tree.
pub fn print_selection(tree: &ResultTree, path: &str) -> bool {
    match tree.find_path(path) {
        Some(id) => {
            println!("{}", tree.aggregate_text(id));
            true
        }
        None => false,
    }
}

/// Indented text lines for every node below the root.
pub fn render_tree_lines(tree: &ResultTree, color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for child in tree.children(tree.root()) {
        render_node(tree, *child, 0, color, &mut lines);
    }
    lines
}

fn render_node(tree: &ResultTree, id: NodeId, depth: usize, color: bool, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let node = tree.node(id);
    let text = match node {
        ResultNode::Root(_) => node.label().to_string(),
        ResultNode::Folder(f) => {
            let label = format!("{}/", f.label);
            if color {
                label.bold().to_string()
            } else {
                label
            }
        }
        ResultNode::File(f) => {
            let has_error = tree.file_has_error(id);
            match (color, has_error) {
                (true, true) => f.label.red().bold().to_string(),
                (true, false) => f.label.yellow().bold().to_string(),
                (false, _) => f.label.clone(),
            }
        }
        ResultNode::Error(d) => {
            if color {
                format!("{} {}", "✖".red(), d.message)
            } else {
                format!("✖ {}", d.message)
            }
        }
        ResultNode::Warning(d) => {
            if color {
                format!("{} {}", "▲".yellow(), d.message)
            } else {
                format!("▲ {}", d.message)
            }
        }
    };
    out.push(format!("{}{}", indent, text));
    for child in node.children() {
        render_node(tree, *child, depth + 1, color, out);
    }
}

/// Compose the JSON form of one node and its subtree (pure).
pub fn compose_node_json(tree: &ResultTree, id: NodeId) -> JsonVal {
    let node = tree.node(id);
    let children: Vec<JsonVal> = node
        .children()
        .iter()
        .map(|c| compose_node_json(tree, *c))
        .collect();
    match node {
        ResultNode::Root(r) => json!({"kind": "root", "label": r.label, "children": children}),
        ResultNode::Folder(f) => json!({
            "kind": "folder",
            "label": f.label,
            "directoryPath": f.directory_path,
            "children": children,
        }),
        ResultNode::File(f) => json!({
            "kind": "file",
            "label": f.label,
            "filePath": f.file_path,
            "directoryPath": f.directory_path,
            "hasError": tree.file_has_error(id),
            "children": children,
        }),
        ResultNode::Error(d) | ResultNode::Warning(d) => json!({
            "kind": node.kind(),
            "filePath": d.file_path,
            "line": d.line,
            "column": d.column,
            "message": d.message,
        }),
    }
}

/// Compose the JSON object for a whole run (pure).
pub fn compose_outcome_json(outcome: &RunOutcome) -> JsonVal {
    json!({
        "state": outcome.state,
        "tree": compose_node_json(&outcome.tree, outcome.tree.root()),
        "commandErrors": outcome.command_errors,
        "units": {"total": outcome.units_total, "done": outcome.units_done},
        "summary": outcome.summary(),
    })
}

/// Print configured profiles.
pub fn print_profiles(profiles: &[Profile], output: &str) {
    match output {
        "json" => match serde_json::to_string_pretty(&json!({ "profiles": profiles })) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("{} {}", crate::utils::error_prefix(), e),
        },
        _ => {
            let color = use_colors(output);
            for p in profiles {
                let head = format!("{} ({}bit)", p.name, p.bit);
                if color {
                    println!("{}", head.bold());
                } else {
                    println!("{}", head);
                }
                for o in &p.options {
                    println!("  {}", o);
                }
            }
        }
    }
}

/// Renders progress percentages as a bar on a TTY, or as log lines otherwise.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(quiet: bool) -> Self {
        if quiet || !std::io::stderr().is_terminal() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_message("ANALYZING");
        Self { bar: Some(bar) }
    }

    pub fn report(&self, percent: u8) {
        match &self.bar {
            Some(bar) => {
                bar.set_position(u64::from(percent));
                if percent >= 100 {
                    bar.set_message("FINISH ANALYZE");
                }
            }
            None if percent < 100 => log::info!("ANALYZING-{}%", percent),
            None => log::info!("FINISH ANALYZE-{}%", percent),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
