//! Graph serialization: DOT, Mermaid and a plain-text summary

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;

use super::model::{EdgeType, ExecutionGraph, GraphNode};
use crate::error::Result;
use crate::event::StepStatus;

/// Fill color per node status
pub fn status_color(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "#90EE90",
        StepStatus::Failed => "#FFB6C1",
        StepStatus::Running => "#ADD8E6",
        StepStatus::Skipped => "#D3D3D3",
        _ => "#FFFFFF",
    }
}

/// DOT `(color, style)` per edge type, `None` for unstyled
fn dot_edge_style(edge_type: EdgeType) -> Option<(&'static str, &'static str)> {
    match edge_type {
        EdgeType::GatePass => Some(("green", "solid")),
        EdgeType::GateFail => Some(("red", "dashed")),
        EdgeType::Dependency => Some(("blue", "dotted")),
        EdgeType::Default => None,
    }
}

/// Mermaid class suffix per edge type
fn mermaid_class(edge_type: EdgeType) -> Option<&'static str> {
    match edge_type {
        EdgeType::GatePass => Some("gatePass"),
        EdgeType::GateFail => Some("gateFail"),
        EdgeType::Dependency => Some("dependency"),
        EdgeType::Default => None,
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "#quot;").replace(['\n', '\r'], " ")
}

/// Mermaid-safe, unique node ids (`[A-Za-z0-9_]`)
fn mermaid_ids(nodes: &[GraphNode]) -> BTreeMap<String, String> {
    let mut used: FxHashSet<String> = FxHashSet::default();
    let mut ids = BTreeMap::new();
    for node in nodes {
        let mut base: String = node
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.eq_ignore_ascii_case("end") {
            base = format!("step_{}", base);
        }
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !used.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        ids.insert(node.id.clone(), candidate);
    }
    ids
}

impl ExecutionGraph {
    /// Graphviz `digraph`
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(&self.workflow_id));
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];\n");

        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\", fillcolor=\"{}\"];",
                escape_dot(&node.id),
                escape_dot(&node.label),
                status_color(node.status)
            );
        }

        for edge in &self.edges {
            let mut attrs = Vec::new();
            if let Some(label) = &edge.label {
                attrs.push(format!("label=\"{}\"", escape_dot(label)));
            }
            if let Some((color, style)) = dot_edge_style(edge.edge_type) {
                attrs.push(format!("color=\"{}\"", color));
                attrs.push(format!("style=\"{}\"", style));
            }
            let _ = write!(
                out,
                "    \"{}\" -> \"{}\"",
                escape_dot(&edge.source),
                escape_dot(&edge.target)
            );
            if !attrs.is_empty() {
                let _ = write!(out, " [{}]", attrs.join(", "));
            }
            out.push_str(";\n");
        }

        out.push_str("}\n");
        out
    }

    /// Mermaid `graph LR`
    pub fn to_mermaid(&self) -> String {
        let ids = mermaid_ids(&self.nodes);
        let id_of = |step: &str| ids.get(step).cloned().unwrap_or_else(|| step.to_string());

        let mut out = String::from("graph LR\n");
        for node in &self.nodes {
            let _ = writeln!(out, "    {}[\"{}\"]", id_of(&node.id), escape_mermaid(&node.label));
        }

        for edge in &self.edges {
            let arrow = match edge.edge_type {
                EdgeType::GateFail | EdgeType::Dependency => "-.->",
                EdgeType::GatePass | EdgeType::Default => "-->",
            };
            let label = edge
                .label
                .as_deref()
                .map(|l| format!("|\"{}\"|", escape_mermaid(l)))
                .unwrap_or_default();
            let class = mermaid_class(edge.edge_type)
                .map(|c| format!(":::{}", c))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "    {} {}{} {}{}",
                id_of(&edge.source),
                arrow,
                label,
                id_of(&edge.target),
                class
            );
        }

        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    style {} fill:{}",
                id_of(&node.id),
                status_color(node.status)
            );
        }

        for (index, edge) in self.edges.iter().enumerate() {
            let style = match edge.edge_type {
                EdgeType::GatePass => "stroke:green",
                EdgeType::GateFail => "stroke:red,stroke-dasharray:5 5",
                EdgeType::Dependency => "stroke:blue,stroke-dasharray:2 2",
                EdgeType::Default => continue,
            };
            let _ = writeln!(out, "    linkStyle {} {}", index, style);
        }

        out.push_str("    classDef gatePass stroke:green,stroke-width:2px\n");
        out.push_str("    classDef gateFail stroke:red,stroke-width:2px,stroke-dasharray:5 5\n");
        out.push_str("    classDef dependency stroke:blue,stroke-dasharray:2 2\n");
        out
    }

    /// Human-readable run summary
    pub fn summary(&self) -> String {
        let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
        for node in &self.nodes {
            *by_status.entry(node.status.as_str()).or_insert(0) += 1;
        }

        let mut out = String::new();
        let _ = writeln!(out, "Workflow: {}", self.workflow_id);
        let _ = writeln!(
            out,
            "Steps: {}  Edges: {}",
            self.metadata.node_count, self.metadata.edge_count
        );
        let _ = writeln!(out, "Total duration: {} ms", self.metadata.total_duration_ms);

        out.push_str("\nSteps by status:\n");
        for (status, count) in &by_status {
            let _ = writeln!(out, "  {:<10} {}", status, count);
        }

        out.push_str("\nEdges by type:\n");
        for edge_type in EdgeType::ALL {
            let count = self.edges_of_type(edge_type).count();
            if count > 0 {
                let _ = writeln!(out, "  {:<10} {}", edge_type.as_str(), count);
            }
        }

        let failed: Vec<&GraphNode> = self
            .nodes
            .iter()
            .filter(|n| n.status == StepStatus::Failed)
            .collect();
        if !failed.is_empty() {
            out.push_str("\nFailed steps:\n");
            for node in failed {
                let _ = writeln!(
                    out,
                    "  - {}: {}",
                    node.id,
                    node.error.as_deref().unwrap_or("no error message")
                );
            }
        }
        out
    }

    pub fn save_dot(&self, path: impl AsRef<Path>) -> Result<()> {
        write_output(path.as_ref(), &self.to_dot())
    }

    pub fn save_mermaid(&self, path: impl AsRef<Path>) -> Result<()> {
        write_output(path.as_ref(), &self.to_mermaid())
    }

    pub fn save_summary(&self, path: impl AsRef<Path>) -> Result<()> {
        write_output(path.as_ref(), &self.summary())
    }
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    tracing::debug!(path = %path.display(), "Wrote graph output");
    Ok(())
}
