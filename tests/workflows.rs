//! Workflow definitions as they arrive over the API

use camflow::realtime_hub::RealtimeHub;
use camflow::workflow::{NodeCategory, NodeKind, WorkflowDefinition, WorkflowEngine};
use camflow::Error;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn parse(value: Value) -> WorkflowDefinition {
    serde_json::from_value(value).unwrap()
}

#[test]
fn compile_is_deterministic() {
    let definition = parse(json!({
        "nodes": [
            {"id": "cam", "type": "cameraInput", "config": {"camera_id": "c1"}},
            {"id": "det", "type": "objectDetection"},
            {"id": "count", "type": "countLine"},
            {"id": "zone", "type": "region"},
            {"id": "report", "type": "analytics"}
        ],
        "edges": [
            {"source": "cam", "target": "det"},
            {"source": "det", "target": "zone"},
            {"source": "det", "target": "count"},
            {"source": "zone", "target": "report"},
            {"source": "count", "target": "report"}
        ]
    }));
    let engine = WorkflowEngine::new(Arc::new(RealtimeHub::new()));

    let first = engine.compile(&definition).unwrap();
    assert_eq!(first, vec!["cam", "det", "count", "zone", "report"]);
    for _ in 0..10 {
        assert_eq!(engine.compile(&definition).unwrap(), first);
    }
}

#[test]
fn broadcast_nodes_reach_subscribers() {
    let hub = Arc::new(RealtimeHub::new());
    let (_a, mut first) = hub.connect("alert");
    let (_b, mut second) = hub.connect("alert");
    let engine = WorkflowEngine::new(hub.clone());

    let definition = parse(json!({
        "nodes": [
            {"id": "in", "type": "input"},
            {"id": "traffic", "type": "trafficFlow"},
            {"id": "jam", "type": "alert", "broadcast": true,
             "config": {"metric": "vehicle_count", "threshold": 2, "condition": "gte"}}
        ],
        "edges": [
            {"source": "in", "sourceHandle": "detections", "target": "traffic"},
            {"source": "traffic", "target": "jam"}
        ]
    }));
    let mut inputs = Map::new();
    inputs.insert(
        "detections".to_string(),
        json!([
            {"class_name": "car", "confidence": 0.9, "bbox": [0, 0, 10, 10]},
            {"class_name": "bus", "confidence": 0.7, "bbox": [20, 20, 40, 40]}
        ]),
    );

    let result = engine.execute(&definition, &inputs).unwrap();
    assert_eq!(result.deliveries, 2);
    assert_eq!(result.get("jam").unwrap()["triggered"], true);

    for rx in [&mut first, &mut second] {
        let message: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["type"], "alert_update");
    }
}

#[test]
fn unsupported_kinds_are_rejected_up_front() {
    let engine = WorkflowEngine::new(Arc::new(RealtimeHub::new()));
    let definition = parse(json!({
        "nodes": [
            {"id": "in", "type": "input"},
            {"id": "vlm", "type": "vlm"}
        ],
        "edges": [{"source": "in", "target": "vlm"}]
    }));
    assert!(matches!(engine.execute(&definition, &Map::new()), Err(Error::NotImplemented(_))));
}

#[test]
fn every_kind_has_a_category() {
    for kind in NodeKind::ALL {
        let parsed: NodeKind = kind.key().parse().unwrap();
        assert_eq!(parsed, *kind);
        let _: NodeCategory = kind.category();
    }
}
