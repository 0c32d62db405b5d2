//! GraphGenerator - execution graph from a workflow's event log
//!
//! Pipeline, each stage recoverable on its own:
//! 1. id validation (hard error)
//! 2. existence -> `WorkflowNotFound`
//! 3. trace + `requires` parsing -> `InvalidTrace`
//! 4. zero steps / zero usable nodes -> `EmptyWorkflow`
//! 5. edges: declared dependencies first, then sequential fallback edges
//!    between consecutive step starts. Edge failures degrade to no edges.

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use super::model::{EdgeType, ExecutionGraph, GraphEdge, GraphMetadata, GraphNode};
use crate::error::{ObserveError, Result};
use crate::event::{EventLog, EventType, ExecutionTrace, TraceStep};
use crate::util::validate_workflow_id;

/// Builds `ExecutionGraph`s from an `EventLog`
#[derive(Debug, Clone)]
pub struct GraphGenerator {
    log: EventLog,
}

impl GraphGenerator {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn generate(&self, workflow_id: &str) -> Result<ExecutionGraph> {
        validate_workflow_id(workflow_id)?;

        if !self.log.workflow_exists(workflow_id) {
            return Err(ObserveError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            });
        }

        let trace = self
            .log
            .get_execution_trace(workflow_id)
            .map_err(|e| {
                e.or_wrap(|reason| ObserveError::GraphGeneration {
                    workflow_id: workflow_id.to_string(),
                    reason,
                })
            })?;
        let requires = parse_requires(workflow_id, &trace.steps)?;

        if trace.steps.is_empty() {
            return Err(ObserveError::EmptyWorkflow {
                workflow_id: workflow_id.to_string(),
            });
        }

        let nodes = build_nodes(workflow_id, &trace);
        if nodes.is_empty() {
            return Err(ObserveError::EmptyWorkflow {
                workflow_id: workflow_id.to_string(),
            });
        }

        let edges = match self.build_edges(workflow_id, &nodes, &requires) {
            Ok(edges) => edges,
            Err(e) => {
                tracing::warn!(
                    workflow_id,
                    error = %e,
                    "Edge construction failed, returning nodes only"
                );
                Vec::new()
            }
        };

        let metadata = GraphMetadata {
            started_at: trace.started_at,
            ended_at: trace.ended_at,
            node_count: nodes.len(),
            edge_count: edges.len(),
            total_duration_ms: nodes.iter().filter_map(|n| n.duration_ms).sum(),
        };

        tracing::debug!(
            workflow_id,
            nodes = metadata.node_count,
            edges = metadata.edge_count,
            "Generated execution graph"
        );

        Ok(ExecutionGraph {
            workflow_id: workflow_id.to_string(),
            nodes,
            edges,
            metadata,
        })
    }

    fn build_edges(
        &self,
        workflow_id: &str,
        nodes: &[GraphNode],
        requires: &FxHashMap<String, Vec<String>>,
    ) -> Result<Vec<GraphEdge>> {
        let known: FxHashMap<&str, &GraphNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut edges = Vec::new();

        // Pass 1: declared dependencies, dangling references dropped
        for node in nodes {
            let Some(required) = requires.get(&node.id) else {
                continue;
            };
            for dep in required {
                if dep != &node.id && known.contains_key(dep.as_str()) {
                    edges.push(GraphEdge::new(dep.as_str(), node.id.as_str(), EdgeType::Dependency));
                }
            }
        }

        // Pass 2: consecutive step starts, first occurrence order
        let mut events = self.log.read_events(workflow_id, None)?;
        if events.is_empty() {
            events = self.log.recent_events(workflow_id, usize::MAX);
        }
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let order: Vec<&str> = events
            .iter()
            .filter(|e| e.event_type == EventType::StepStart)
            .filter_map(|e| e.step_id())
            .filter(|id| known.contains_key(id))
            .filter(|id| seen.insert(*id))
            .collect();

        for pair in order.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            if edges.iter().any(|e| e.joins(prev, next)) {
                continue;
            }
            let edge_type = known
                .get(prev)
                .map(|n| EdgeType::after(n.status))
                .unwrap_or_default();
            edges.push(GraphEdge::new(prev, next, edge_type));
        }

        Ok(edges)
    }
}

/// `requires` per step: a string or an array of strings
fn parse_requires(
    workflow_id: &str,
    steps: &[TraceStep],
) -> Result<FxHashMap<String, Vec<String>>> {
    let mut requires = FxHashMap::default();
    for step in steps {
        let deps = match step.requires() {
            None | Some(Value::Null) => continue,
            Some(Value::String(dep)) => vec![dep.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid_requires(workflow_id, &step.step_id))?,
            Some(_) => return Err(invalid_requires(workflow_id, &step.step_id)),
        };
        requires.insert(step.step_id.clone(), deps);
    }
    Ok(requires)
}

fn invalid_requires(workflow_id: &str, step_id: &str) -> ObserveError {
    ObserveError::InvalidTrace {
        workflow_id: workflow_id.to_string(),
        reason: format!("step '{}' has a 'requires' that is not a list of step ids", step_id),
    }
}

fn build_nodes(workflow_id: &str, trace: &ExecutionTrace) -> Vec<GraphNode> {
    let mut nodes = Vec::with_capacity(trace.steps.len());
    for step in &trace.steps {
        if step.step_id.trim().is_empty() {
            tracing::warn!(workflow_id, seq = step.first_seq, "Skipping step without id");
            continue;
        }
        let label = if step.agent.is_some() || step.action.is_some() {
            format!("{} ({})", step.step_id, step.operation_name())
        } else {
            step.step_id.clone()
        };
        nodes.push(GraphNode {
            id: step.step_id.clone(),
            label,
            agent: step.agent.clone(),
            action: step.action.clone(),
            status: step.status,
            duration_ms: step.duration_ms,
            error: step.error.clone(),
            metadata: step.metadata.clone(),
        });
    }
    nodes
}
