//! Health Scenario Tests
//!
//! End-to-end behaviour across registry, manager, dashboard, dispatcher and
//! the reliability loop, wired the way a host application wires them.

use component_health::registry::graph::DependencyGraph;
use component_health::reliability::{RecoveryManager, ReliabilityManager};
use component_health::{
    ComponentRegistry, EventDispatcher, HealthDashboard, HealthManager, Metric, MetricKind,
    MonitorConfig, Orchestrator, Status,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Registry + manager + dashboard, attached together.
fn engine() -> (Arc<ComponentRegistry>, Arc<HealthManager>, Arc<HealthDashboard>) {
    let registry = Arc::new(ComponentRegistry::new());
    let manager = Arc::new(HealthManager::new().with_directory(registry.clone()));
    let dashboard = Arc::new(HealthDashboard::new().with_directory(registry.clone()));
    manager.attach_dashboard(dashboard.clone());
    (registry, manager, dashboard)
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn repeated_declaration_is_idempotent() {
    let registry = ComponentRegistry::new();
    registry.ensure_registered("a");
    registry.ensure_registered("b");
    assert!(registry.declare_dependency("a", "b"));
    assert!(registry.declare_dependency("a", "b"));
    assert_eq!(registry.get_dependencies("a"), vec!["b".to_string()]);
}

#[test]
fn chain_closure_excludes_self() {
    let registry = ComponentRegistry::new();
    for id in ["a", "b", "c"] {
        registry.ensure_registered(id);
    }
    registry.declare_dependency("a", "b");
    registry.declare_dependency("b", "c");
    assert_eq!(registry.get_all_dependencies("a"), ids(&["b", "c"]));
    assert_eq!(registry.get_all_dependents("c"), ids(&["a", "b"]));
}

#[test]
fn cycle_detection_matches_graph_shape() {
    let registry = ComponentRegistry::new();
    for id in ["x", "y", "z"] {
        registry.ensure_registered(id);
    }
    registry.declare_dependency("x", "y");
    registry.declare_dependency("y", "z");
    assert!(!registry.has_cycle());

    registry.declare_dependency("z", "x");
    assert!(registry.has_cycle());
    registry.remove_dependency("z", "x");
    assert!(!registry.has_cycle());

    registry.declare_dependency("z", "z");
    assert!(registry.has_cycle());
}

#[test]
fn unregister_removes_every_trace() {
    let registry = ComponentRegistry::new();
    for id in ["api", "db", "cache"] {
        registry.ensure_registered(id);
    }
    registry.declare_dependency("api", "db");
    registry.declare_dependency("cache", "db");

    assert!(registry.unregister("db"));
    let graph = registry.get_dependency_graph();
    assert!(!graph.contains_key("db"));
    assert!(graph.values().all(|deps| !deps.iter().any(|d| d == "db")));
    assert!(!registry.unregister("db"));
}

#[test]
fn impact_is_direct_dependents_only() {
    let registry = ComponentRegistry::new();
    for id in ["X", "Y", "Z", "W"] {
        registry.ensure_registered(id);
    }
    registry.declare_dependency("X", "Y");
    registry.declare_dependency("Y", "Z");
    registry.declare_dependency("W", "Z");
    assert_eq!(registry.analyze_impact("Z"), ids(&["Y", "W"]));
}

// ============================================================================
// Cascading and alerts
// ============================================================================

#[test]
fn degraded_cascades_to_direct_dependents_only() {
    let (registry, manager, dashboard) = engine();
    for id in ["P", "D1", "D2", "E"] {
        registry.ensure_registered(id);
    }
    registry.declare_dependency("D1", "P");
    registry.declare_dependency("D2", "P");
    manager.update_status("E", Status::Healthy).unwrap();

    manager.update_status("P", Status::Degraded).unwrap();

    for dependent in ["D1", "D2"] {
        assert_eq!(dashboard.status_for(dependent), Status::Degraded);
        let message = dashboard.get_status(dependent).message.unwrap_or_default();
        assert!(message.contains('P'), "message should reference P: {message}");
    }
    assert_eq!(dashboard.status_for("E"), Status::Healthy);
}

#[test]
fn alert_fires_once_per_transition() {
    let (_registry, manager, _dashboard) = engine();
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    manager.register_alert_callback(move |id, status| {
        sink.lock().unwrap().push(format!("{id}:{status}"));
    });

    manager.update_status("svc", Status::Healthy).unwrap();
    manager.update_status("svc", Status::Degraded).unwrap();
    manager.update_status("svc", Status::Degraded).unwrap();

    assert_eq!(*fired.lock().unwrap(), vec!["svc:HEALTHY", "svc:DEGRADED"]);
}

#[test]
fn report_key_set_is_fixed() {
    let (_registry, manager, dashboard) = engine();
    let expected = ["component", "metrics", "reason", "state", "timestamp"];

    let empty = dashboard.get_report(false).to_value();
    let mut keys: Vec<&str> = empty.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, expected);
    assert!(empty["state"].is_null());

    manager.update_status("api", Status::Healthy).unwrap();
    let detailed = dashboard.get_report(true).to_value();
    let mut keys: Vec<&str> = detailed.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["component", "components", "metrics", "reason", "state", "timestamp"]
    );
    assert_eq!(detailed["components"]["api"], "HEALTHY");
}

#[test]
fn failed_database_takes_down_api_in_report() {
    let (registry, manager, dashboard) = engine();
    registry.ensure_registered("api");
    registry.ensure_registered("db");
    registry.declare_dependency("api", "db");

    manager.update_status("db", Status::Failed).unwrap();

    assert_eq!(dashboard.status_for("api"), Status::Failed);
    let report = dashboard.get_report(false).to_value();
    assert_eq!(report["state"], "FAILED");
    assert!(report["reason"].as_str().unwrap().contains("db"));
}

#[test]
fn metrics_and_diagnosis_never_hide_a_cascaded_failure() {
    let (registry, manager, dashboard) = engine();
    registry.ensure_registered("api");
    registry.ensure_registered("db");
    registry.declare_dependency("api", "db");
    manager.update_status("api", Status::Healthy).unwrap();
    manager.update_status("db", Status::Failed).unwrap();

    manager
        .update_with_metrics("api", vec![Metric::new(MetricKind::Latency, 12.0)])
        .unwrap();
    assert_eq!(dashboard.status_for("api"), Status::Failed);

    let dispatcher = Arc::new(EventDispatcher::new());
    let reliability = ReliabilityManager::new("api", manager.clone(), dispatcher);
    assert!(!reliability.self_diagnose("periodic").unwrap());

    let report = dashboard.get_report(true);
    let components = report.components.unwrap_or_default();
    assert_ne!(components.get("api"), Some(&Status::Healthy));
    assert_eq!(report.state, Some(Status::Failed));
}

#[test]
fn local_graph_cascades_without_registry() {
    let dashboard = HealthDashboard::new();
    let mut graph = DependencyGraph::new();
    graph.insert("web".to_string(), vec!["auth".to_string()]);
    graph.insert("auth".to_string(), Vec::new());
    dashboard.set_dependency_graph(graph);

    dashboard.update_status("auth", Status::Failed);
    assert_eq!(dashboard.status_for("web"), Status::Failed);
}

// ============================================================================
// Reliability
// ============================================================================

#[test]
fn diagnosis_then_recovery_emits_events_in_order() {
    let (_registry, manager, _dashboard) = engine();
    let dispatcher = Arc::new(EventDispatcher::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    dispatcher.register_listener(move |event| {
        sink.lock().unwrap().push(event.state);
        Ok(())
    });

    manager.update_status("db", Status::Degraded).unwrap();
    let reliability = ReliabilityManager::new("db", manager.clone(), dispatcher.clone());
    let recovery = RecoveryManager::new("db", manager.clone(), dispatcher.clone());

    assert!(!reliability.self_diagnose("latency spike").unwrap());
    assert_eq!(manager.status_of("db"), Status::Degraded);
    assert!(recovery.attempt_recovery("restart").unwrap());
    assert_eq!(manager.status_of("db"), Status::Healthy);

    assert_eq!(*seen.lock().unwrap(), vec![Status::Degraded, Status::Healthy]);
}

#[test]
fn self_healer_cycle_recovers_configured_component() {
    let config = MonitorConfig::from_toml(
        r#"
[recovery]
degraded_threshold = 1

[[components]]
id = "db"

[[components]]
id = "api"
depends_on = ["db"]
"#,
    )
    .unwrap();
    let orchestrator = Orchestrator::from_config(&config);
    orchestrator
        .propagate_status("db", Status::Failed, Some("disk full"))
        .unwrap();
    orchestrator.propagate_status("api", Status::Healthy, None).unwrap();

    let mut healer = orchestrator.self_healer();
    let summary = tokio_test::block_on(healer.run_cycle());

    assert_eq!(summary.total_recoveries, 1);
    assert_eq!(orchestrator.manager().status_of("db"), Status::Healthy);
    let api = summary
        .outcomes
        .iter()
        .find(|o| o.component == "api")
        .unwrap();
    assert!(api.diagnosis_passed);
}
