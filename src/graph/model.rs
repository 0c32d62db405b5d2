//! Execution graph types
//!
//! Built fresh per `GraphGenerator::generate` call, never persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::StepStatus;

/// Relationship between two steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Sequential, predecessor neither completed nor failed
    #[default]
    Default,
    /// Declared `requires`
    Dependency,
    /// Sequential, predecessor completed
    GatePass,
    /// Sequential, predecessor failed
    GateFail,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        Self::Default,
        Self::Dependency,
        Self::GatePass,
        Self::GateFail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dependency => "dependency",
            Self::GatePass => "gate_pass",
            Self::GateFail => "gate_fail",
        }
    }

    /// Sequential edge type derived from the predecessor's terminal status
    pub fn after(status: StepStatus) -> Self {
        match status {
            StepStatus::Completed => Self::GatePass,
            StepStatus::Failed => Self::GateFail,
            _ => Self::Default,
        }
    }

    /// Label carried by edges of this type
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Dependency => Some("requires"),
            Self::GatePass => Some("pass"),
            Self::GateFail => Some("fail"),
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Step id, unique within a graph
    pub id: String,
    pub label: String,
    pub agent: Option<String>,
    pub action: Option<String>,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub edge_type: EdgeType,
    pub label: Option<String>,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            edge_type,
            label: edge_type.label().map(str::to_string),
        }
    }

    /// Whether this edge joins `a` and `b` in either direction
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub node_count: usize,
    pub edge_count: usize,
    /// Sum of step durations
    pub total_duration_ms: u64,
}

/// Directed graph of a workflow's steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub workflow_id: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

impl ExecutionGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }
}
