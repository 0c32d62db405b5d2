//! Graph Integration Tests
//!
//! Node/edge reconstruction and the error taxonomy surfaced to callers.

mod common;

use std::fs;

use common::fixtures::{run_step, three_step_run, Outcome, Storage};
use nika_observe::event::NewEvent;
use nika_observe::graph::{EdgeType, GraphGenerator};
use nika_observe::ObserveError;
use pretty_assertions::assert_eq;

// ═══════════════════════════════════════════════════════════════
// EDGES
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_sequential_gate_edges() {
    let storage = Storage::new();
    three_step_run(&storage.log, "wf");

    let graph = GraphGenerator::new(storage.log.clone()).generate("wf").unwrap();
    assert_eq!(graph.nodes.len(), 3);

    let pass = graph.edge("s1", "s2").unwrap();
    assert_eq!(pass.edge_type, EdgeType::GatePass);
    assert_eq!(pass.label.as_deref(), Some("pass"));

    let fail = graph.edge("s2", "s3").unwrap();
    assert_eq!(fail.edge_type, EdgeType::GateFail);
    assert_eq!(fail.label.as_deref(), Some("fail"));
}

#[test]
fn test_shared_dependency_has_no_duplicate_fallback() {
    let storage = Storage::new();
    let log = &storage.log;
    log.emit_event(NewEvent::step_start("wf", "s1")).unwrap();
    log.emit_event(NewEvent::step_finish("wf", "s1")).unwrap();
    log.emit_event(NewEvent::step_start("wf", "s2").requires(["s1"]))
        .unwrap();
    log.emit_event(NewEvent::step_finish("wf", "s2")).unwrap();
    log.emit_event(NewEvent::step_start("wf", "s3").requires(["s1"]))
        .unwrap();
    log.emit_event(NewEvent::step_finish("wf", "s3")).unwrap();

    let graph = GraphGenerator::new(log.clone()).generate("wf").unwrap();
    let deps: Vec<_> = graph.edges_of_type(EdgeType::Dependency).collect();
    assert_eq!(deps.len(), 2);
    assert!(deps.iter().all(|e| e.source == "s1"));
    assert!(deps.iter().all(|e| e.label.as_deref() == Some("requires")));

    for (a, b) in [("s1", "s2"), ("s1", "s3")] {
        let joining = graph.edges.iter().filter(|e| e.joins(a, b)).count();
        assert_eq!(joining, 1, "{} and {} joined more than once", a, b);
    }
}

// ═══════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_unknown_workflow_is_not_found() {
    let storage = Storage::new();
    let err = GraphGenerator::new(storage.log.clone())
        .generate("ghost")
        .unwrap_err();
    assert!(matches!(err, ObserveError::WorkflowNotFound { .. }));
}

#[test]
fn test_known_workflow_without_events_is_empty() {
    let storage = Storage::new();
    fs::create_dir_all(storage.events_dir()).unwrap();
    fs::write(storage.log.log_path("fresh"), "").unwrap();

    let err = GraphGenerator::new(storage.log.clone())
        .generate("fresh")
        .unwrap_err();
    assert!(matches!(err, ObserveError::EmptyWorkflow { .. }));
    assert!(err.is_informational());
}

#[test]
fn test_garbage_log_is_invalid_trace() {
    let storage = Storage::new();
    fs::create_dir_all(storage.events_dir()).unwrap();
    fs::write(storage.log.log_path("broken"), "garbage\n[1,2,3]\n").unwrap();

    let err = GraphGenerator::new(storage.log.clone())
        .generate("broken")
        .unwrap_err();
    assert!(matches!(err, ObserveError::InvalidTrace { .. }));
}

// ═══════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_dot_and_mermaid_outputs() {
    let storage = Storage::new();
    three_step_run(&storage.log, "wf");
    let graph = GraphGenerator::new(storage.log.clone()).generate("wf").unwrap();

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("#90EE90"));
    assert!(dot.contains("style=\"dashed\""));

    let mermaid = graph.to_mermaid();
    assert!(mermaid.starts_with("graph LR"));
    assert!(mermaid.contains(":::gatePass"));
    assert!(mermaid.contains(":::gateFail"));
}

#[test]
fn test_save_summary() {
    let storage = Storage::new();
    run_step(&storage.log, "wf", "build", "coder", "compile", Outcome::Fail);
    let graph = GraphGenerator::new(storage.log.clone()).generate("wf").unwrap();

    let path = storage.root().join("reports/wf.txt");
    graph.save_summary(&path).unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains("- build: build failed"));
}
