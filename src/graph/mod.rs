//! Graph Module - execution DAG reconstruction and rendering
//!
//! - `GraphGenerator`: builds an `ExecutionGraph` from an `EventLog`
//! - `ExecutionGraph::{to_dot, to_mermaid, summary}`: serializers

mod generator;
mod model;
mod render;

pub use generator::GraphGenerator;
pub use model::{EdgeType, ExecutionGraph, GraphEdge, GraphMetadata, GraphNode};
pub use render::status_color;
