//! Node capability table and handlers
//!
//! Handlers are plain functions over the gathered input map. Kinds that need
//! an external model have no handler and resolve to `NotImplemented`.

use crate::error::{Error, Result};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

pub(crate) type Inputs = Map<String, Value>;
pub(crate) type Handler = fn(&Inputs) -> Result<Value>;

/// Capability category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Input,
    Processing,
    DomainSpecific,
    Output,
}

macro_rules! node_kinds {
    ($($variant:ident => $key:literal, $category:ident, $handler:expr;)+) => {
        /// Every node type the engine knows
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($variant,)+
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$variant,)+];

            pub fn key(&self) -> &'static str {
                match self {
                    $(NodeKind::$variant => $key,)+
                }
            }

            pub fn category(&self) -> NodeCategory {
                match self {
                    $(NodeKind::$variant => NodeCategory::$category,)+
                }
            }

            pub(crate) fn handler(&self) -> Option<Handler> {
                match self {
                    $(NodeKind::$variant => $handler,)+
                }
            }
        }
    };
}

node_kinds! {
    Input => "input", Input, Some(passthrough);
    CameraInput => "cameraInput", Input, Some(camera_input);

    Processing => "processing", Processing, Some(passthrough);
    ImageProcessing => "imageProcessing", Processing, Some(image_processing);
    ObjectDetection => "objectDetection", Processing, Some(object_detection);
    Filter => "filter", Processing, Some(filter);
    Region => "region", Processing, Some(region);
    CountLine => "countLine", Processing, Some(count_line);
    PersonTracking => "personTracking", Processing, None;
    VehicleTracking => "vehicleTracking", Processing, None;
    Vlm => "vlm", Processing, None;

    HeavyMachineryTracking => "heavyMachineryTracking", DomainSpecific, Some(heavy_machinery);
    SafetyGearCompliance => "safetyGearCompliance", DomainSpecific, None;
    HazardousArea => "hazardousArea", DomainSpecific, Some(hazardous_area);
    TrafficFlow => "trafficFlow", DomainSpecific, Some(traffic_flow);
    ParkingOccupancy => "parkingOccupancy", DomainSpecific, Some(parking_occupancy);
    PublicSafety => "publicSafety", DomainSpecific, Some(public_safety);
    ClassroomActivity => "classroomActivity", DomainSpecific, Some(classroom_activity);
    StudentAttendance => "studentAttendance", DomainSpecific, Some(student_attendance);
    AttentionAnalysis => "attentionAnalysis", DomainSpecific, None;
    PatientMonitoring => "patientMonitoring", DomainSpecific, Some(patient_monitoring);
    StaffTracking => "staffTracking", DomainSpecific, None;
    EquipmentTracking => "equipmentTracking", DomainSpecific, None;
    SecurityMonitoring => "securityMonitoring", DomainSpecific, Some(security_monitoring);
    PackageDetection => "packageDetection", DomainSpecific, Some(package_detection);
    VisitorTracking => "visitorTracking", DomainSpecific, None;

    Output => "output", Output, Some(passthrough);
    Alert => "alert", Output, Some(alert);
    Analytics => "analytics", Output, Some(analytics);
    TimeSeriesAnalysis => "timeSeriesAnalysis", Output, Some(time_series);
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| Error::UnknownNodeType(s.to_string()))
    }
}

const VEHICLE_CLASSES: &[&str] = &["car", "truck", "bus", "motorcycle"];
const MACHINERY_CLASSES: &[&str] = &["truck", "car"];
const PERSON_CLASSES: &[&str] = &["person"];
const PACKAGE_CLASSES: &[&str] = &["suitcase", "backpack", "handbag"];

fn fail(message: impl Into<String>) -> Error {
    Error::Internal(message.into())
}

// ---- detection helpers ----

fn object_class(obj: &Value) -> Option<&str> {
    obj.get("class_name")
        .and_then(Value::as_str)
        .or_else(|| obj.get("class").and_then(Value::as_str))
}

fn object_confidence(obj: &Value) -> f64 {
    obj.get("confidence").and_then(Value::as_f64).unwrap_or(0.0)
}

fn object_bbox(obj: &Value) -> Option<[f64; 4]> {
    let arr = obj.get("bbox")?.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v.as_f64()?;
    }
    Some(out)
}

fn center(bbox: [f64; 4]) -> (f64, f64) {
    ((bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0)
}

fn push_objects(value: &Value, out: &mut Vec<Value>) {
    for key in ["detections", "objects"] {
        if let Some(list) = value.get(key).and_then(Value::as_array) {
            out.extend(list.iter().filter(|o| o.is_object()).cloned());
        }
    }
}

/// Detected objects from the inputs: top-level `detections`/`objects` lists
/// plus the same lists inside any upstream node output
fn gather_objects(inputs: &Inputs) -> Vec<Value> {
    let mut objects = Vec::new();
    push_objects(&Value::Object(inputs.clone()), &mut objects);
    for value in inputs.values().filter(|v| v.is_object()) {
        push_objects(value, &mut objects);
    }
    objects
}

fn count_classes(objects: &[Value], classes: &[&str]) -> usize {
    objects
        .iter()
        .filter(|o| object_class(o).map(|c| classes.contains(&c)).unwrap_or(false))
        .count()
}

fn config_f64(inputs: &Inputs, key: &str) -> Option<f64> {
    inputs.get(key).and_then(Value::as_f64)
}

fn config_strings(inputs: &Inputs, key: &str) -> Option<Vec<String>> {
    inputs.get(key).and_then(Value::as_array).map(|list| {
        list.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Rectangle as `[x1, y1, x2, y2]` or `{x1, y1, x2, y2}`
fn parse_rect(value: &Value) -> Option<[f64; 4]> {
    if let Some(arr) = value.as_array() {
        if arr.len() == 4 {
            let mut out = [0.0; 4];
            for (slot, v) in out.iter_mut().zip(arr) {
                *slot = v.as_f64()?;
            }
            return Some(out);
        }
        return None;
    }
    Some([
        value.get("x1")?.as_f64()?,
        value.get("y1")?.as_f64()?,
        value.get("x2")?.as_f64()?,
        value.get("y2")?.as_f64()?,
    ])
}

fn in_rect(rect: [f64; 4], point: (f64, f64)) -> bool {
    let (x_lo, x_hi) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
    let (y_lo, y_hi) = (rect[1].min(rect[3]), rect[1].max(rect[3]));
    point.0 >= x_lo && point.0 <= x_hi && point.1 >= y_lo && point.1 <= y_hi
}

// ---- input / processing ----

fn passthrough(inputs: &Inputs) -> Result<Value> {
    Ok(Value::Object(inputs.clone()))
}

fn camera_input(inputs: &Inputs) -> Result<Value> {
    let camera_id = inputs
        .get("camera_id")
        .or_else(|| inputs.get("cameraId"))
        .and_then(Value::as_str)
        .ok_or_else(|| fail("cameraInput requires camera_id"))?;

    let mut out = inputs.clone();
    out.insert("type".to_string(), json!("camera_feed"));
    out.insert("camera_id".to_string(), json!(camera_id));
    Ok(Value::Object(out))
}

fn image_processing(inputs: &Inputs) -> Result<Value> {
    let objects = gather_objects(inputs);
    Ok(json!({
        "type": "image_processing_result",
        "analytics": inputs.get("analytics").cloned().unwrap_or(Value::Null),
        "objects": objects,
        "count": objects.len(),
    }))
}

fn object_detection(inputs: &Inputs) -> Result<Value> {
    let threshold = config_f64(inputs, "confidence_threshold").unwrap_or(0.25);
    let classes = config_strings(inputs, "classes");

    let objects: Vec<Value> = gather_objects(inputs)
        .into_iter()
        .filter(|o| object_confidence(o) >= threshold)
        .filter(|o| match (&classes, object_class(o)) {
            (Some(allowed), Some(c)) => allowed.iter().any(|a| a == c),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect();

    Ok(json!({
        "type": "detection_result",
        "count": objects.len(),
        "objects": objects,
    }))
}

fn filter(inputs: &Inputs) -> Result<Value> {
    let filter_type = inputs
        .get("filter_type")
        .and_then(Value::as_str)
        .unwrap_or("confidence");
    let params = inputs
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let param = |key: &str| {
        params
            .get(key)
            .and_then(Value::as_f64)
            .or_else(|| config_f64(inputs, key))
    };

    let objects = gather_objects(inputs);
    let kept: Vec<Value> = match filter_type {
        "class" => {
            let classes = params
                .get("classes")
                .or_else(|| inputs.get("classes"))
                .and_then(Value::as_array)
                .ok_or_else(|| fail("class filter requires classes"))?;
            let classes: Vec<&str> = classes.iter().filter_map(Value::as_str).collect();
            objects
                .into_iter()
                .filter(|o| object_class(o).map(|c| classes.contains(&c)).unwrap_or(false))
                .collect()
        }
        "confidence" => {
            let min = param("min_confidence").unwrap_or(0.5);
            objects
                .into_iter()
                .filter(|o| object_confidence(o) >= min)
                .collect()
        }
        "area" => {
            let min = param("min_area").unwrap_or(0.0);
            let max = param("max_area").unwrap_or(f64::INFINITY);
            objects
                .into_iter()
                .filter(|o| {
                    object_bbox(o)
                        .map(|b| {
                            let area = (b[2] - b[0]).abs() * (b[3] - b[1]).abs();
                            area >= min && area <= max
                        })
                        .unwrap_or(false)
                })
                .collect()
        }
        other => return Err(fail(format!("unsupported filter_type '{}'", other))),
    };

    Ok(json!({
        "type": "filter_result",
        "filter_type": filter_type,
        "parameters": params,
        "count": kept.len(),
        "objects": kept,
    }))
}

fn region(inputs: &Inputs) -> Result<Value> {
    let rect_value = inputs
        .get("region")
        .ok_or_else(|| fail("region node requires region"))?;
    let rect = parse_rect(rect_value).ok_or_else(|| fail("region must be [x1, y1, x2, y2]"))?;

    let inside: Vec<Value> = gather_objects(inputs)
        .into_iter()
        .filter(|o| object_bbox(o).map(|b| in_rect(rect, center(b))).unwrap_or(false))
        .collect();

    Ok(json!({
        "type": "region_result",
        "region": rect_value,
        "focus_area": inputs.get("focus_area").cloned().unwrap_or_else(|| json!({})),
        "count": inside.len(),
        "objects": inside,
    }))
}

fn count_line(inputs: &Inputs) -> Result<Value> {
    let line_value = inputs
        .get("line")
        .ok_or_else(|| fail("countLine node requires line"))?;
    let line = parse_rect(line_value).or_else(|| {
        // [[x1, y1], [x2, y2]]
        let pts = line_value.as_array()?;
        if pts.len() != 2 {
            return None;
        }
        let p = |v: &Value, i: usize| v.as_array().and_then(|a| a.get(i)).and_then(Value::as_f64);
        Some([p(&pts[0], 0)?, p(&pts[0], 1)?, p(&pts[1], 0)?, p(&pts[1], 1)?])
    });
    let [x1, y1, x2, y2] = line.ok_or_else(|| fail("line must be two points"))?;

    let (mut inbound, mut outbound) = (0usize, 0usize);
    for obj in gather_objects(inputs) {
        let Some(bbox) = object_bbox(&obj) else { continue };
        let (cx, cy) = center(bbox);
        let side = (x2 - x1) * (cy - y1) - (y2 - y1) * (cx - x1);
        if side > 0.0 {
            inbound += 1;
        } else if side < 0.0 {
            outbound += 1;
        }
    }

    Ok(json!({
        "type": "count_line_result",
        "line": line_value,
        "counts": { "in": inbound, "out": outbound },
    }))
}

// ---- domain specific ----

fn traffic_flow(inputs: &Inputs) -> Result<Value> {
    let vehicles = count_classes(&gather_objects(inputs), VEHICLE_CLASSES);
    Ok(json!({
        "vehicle_count": vehicles,
        "traffic_density": vehicles as f64 / 100.0,
    }))
}

fn parking_occupancy(inputs: &Inputs) -> Result<Value> {
    let occupied = count_classes(&gather_objects(inputs), VEHICLE_CLASSES);
    let capacity = config_f64(inputs, "capacity").filter(|c| *c > 0.0);
    Ok(json!({
        "occupied_spaces": occupied,
        "capacity": capacity,
        "occupancy_rate": capacity.map(|c| (occupied as f64 / c).min(1.0)),
    }))
}

fn heavy_machinery(inputs: &Inputs) -> Result<Value> {
    Ok(json!({
        "vehicle_count": count_classes(&gather_objects(inputs), MACHINERY_CLASSES),
    }))
}

fn hazardous_area(inputs: &Inputs) -> Result<Value> {
    let objects = gather_objects(inputs);
    let people: Vec<&Value> = objects
        .iter()
        .filter(|o| object_class(o).map(|c| PERSON_CLASSES.contains(&c)).unwrap_or(false))
        .collect();

    let in_zone = match inputs.get("region").map(parse_rect) {
        Some(Some(rect)) => people
            .iter()
            .filter(|o| object_bbox(o).map(|b| in_rect(rect, center(b))).unwrap_or(false))
            .count(),
        Some(None) => return Err(fail("region must be [x1, y1, x2, y2]")),
        None => people.len(),
    };

    Ok(json!({
        "people_in_zone": in_zone,
        "hazard_detected": in_zone > 0,
    }))
}

fn public_safety(inputs: &Inputs) -> Result<Value> {
    let people = count_classes(&gather_objects(inputs), PERSON_CLASSES);
    let threshold = config_f64(inputs, "crowd_threshold").unwrap_or(20.0);
    Ok(json!({
        "people_count": people,
        "crowd_detected": people as f64 >= threshold,
    }))
}

fn classroom_activity(inputs: &Inputs) -> Result<Value> {
    Ok(json!({
        "student_count": count_classes(&gather_objects(inputs), PERSON_CLASSES),
    }))
}

fn student_attendance(inputs: &Inputs) -> Result<Value> {
    let present = count_classes(&gather_objects(inputs), PERSON_CLASSES);
    let expected = config_f64(inputs, "expected").filter(|e| *e > 0.0);
    Ok(json!({
        "present": present,
        "expected": expected,
        "attendance_rate": expected.map(|e| (present as f64 / e).min(1.0)),
    }))
}

fn patient_monitoring(inputs: &Inputs) -> Result<Value> {
    Ok(json!({
        "people_count": count_classes(&gather_objects(inputs), PERSON_CLASSES),
    }))
}

fn security_monitoring(inputs: &Inputs) -> Result<Value> {
    let occupancy = count_classes(&gather_objects(inputs), PERSON_CLASSES);
    let max = config_f64(inputs, "max_occupancy");
    Ok(json!({
        "occupancy": occupancy,
        "intrusion": max.map(|m| occupancy as f64 > m).unwrap_or(false),
    }))
}

fn package_detection(inputs: &Inputs) -> Result<Value> {
    let packages: Vec<Value> = gather_objects(inputs)
        .into_iter()
        .filter(|o| object_class(o).map(|c| PACKAGE_CLASSES.contains(&c)).unwrap_or(false))
        .map(|o| {
            json!({
                "class": object_class(&o),
                "confidence": object_confidence(&o),
                "bbox": o.get("bbox").cloned().unwrap_or(Value::Null),
            })
        })
        .collect();
    Ok(json!({
        "package_count": packages.len(),
        "packages": packages,
    }))
}

// ---- output ----

/// Look up a numeric metric at the top level or inside any upstream output
fn find_metric(inputs: &Inputs, metric: &str) -> Option<f64> {
    if let Some(v) = inputs.get(metric).and_then(Value::as_f64) {
        return Some(v);
    }
    inputs
        .values()
        .filter_map(|v| v.get(metric))
        .find_map(Value::as_f64)
}

fn alert(inputs: &Inputs) -> Result<Value> {
    let metric = inputs
        .get("metric")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("alert node requires metric"))?;
    let threshold = config_f64(inputs, "threshold")
        .ok_or_else(|| fail("alert node requires threshold"))?;
    let value = find_metric(inputs, metric)
        .ok_or_else(|| fail(format!("metric '{}' not found in inputs", metric)))?;
    let condition = inputs.get("condition").and_then(Value::as_str).unwrap_or("gt");

    let triggered = match condition {
        "gt" => value > threshold,
        "gte" => value >= threshold,
        "lt" => value < threshold,
        "lte" => value <= threshold,
        "eq" => (value - threshold).abs() < f64::EPSILON,
        other => return Err(fail(format!("unsupported condition '{}'", other))),
    };

    Ok(json!({
        "type": "alert",
        "triggered": triggered,
        "metric": metric,
        "value": value,
        "condition": condition,
        "threshold": threshold,
        "severity": inputs.get("severity").and_then(Value::as_str).unwrap_or("warning"),
    }))
}

fn analytics(inputs: &Inputs) -> Result<Value> {
    let mut metrics = Map::new();
    for value in inputs.values() {
        let Some(obj) = value.as_object() else { continue };
        for (key, v) in obj {
            if let Some(n) = v.as_f64() {
                let total = metrics.get(key).and_then(Value::as_f64).unwrap_or(0.0) + n;
                metrics.insert(key.clone(), json!(total));
            }
        }
    }
    metrics.insert("object_count".to_string(), json!(gather_objects(inputs).len()));

    Ok(json!({
        "type": "analytics_result",
        "metrics": metrics,
    }))
}

fn time_series(inputs: &Inputs) -> Result<Value> {
    let key = inputs.get("series").and_then(Value::as_str).unwrap_or("values");
    let series = inputs
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| inputs.values().filter_map(|v| v.get(key)).find_map(Value::as_array))
        .ok_or_else(|| fail(format!("series '{}' not found in inputs", key)))?;
    let values: Vec<f64> = series.iter().filter_map(Value::as_f64).collect();
    if values.is_empty() {
        return Err(fail(format!("series '{}' has no numeric values", key)));
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // least squares slope against the sample index
    let x_mean = (n - 1.0) / 2.0;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, v) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (v - mean);
        den += dx * dx;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };

    Ok(json!({
        "type": "time_series_result",
        "count": values.len(),
        "mean": mean,
        "min": min,
        "max": max,
        "slope": slope,
        "trend": if slope > 0.0 {
            "increasing"
        } else if slope < 0.0 {
            "decreasing"
        } else {
            "flat"
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(value: Value) -> Inputs {
        value.as_object().cloned().unwrap()
    }

    fn obj(class: &str, confidence: f64, bbox: [f64; 4]) -> Value {
        json!({"class_name": class, "confidence": confidence, "bbox": bbox})
    }

    #[test]
    fn test_kind_table() {
        assert_eq!("trafficFlow".parse::<NodeKind>().unwrap(), NodeKind::TrafficFlow);
        assert_eq!(NodeKind::TrafficFlow.category(), NodeCategory::DomainSpecific);
        assert!(NodeKind::Vlm.handler().is_none());
        assert!(matches!("teleport".parse::<NodeKind>(), Err(Error::UnknownNodeType(_))));
        for kind in NodeKind::ALL {
            assert_eq!(kind.key().parse::<NodeKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_traffic_flow_counts_vehicles_upstream() {
        let out = traffic_flow(&inputs(json!({
            "detector": {"objects": [
                obj("car", 0.9, [0.0, 0.0, 1.0, 1.0]),
                obj("bus", 0.8, [0.0, 0.0, 1.0, 1.0]),
                obj("person", 0.9, [0.0, 0.0, 1.0, 1.0]),
            ]}
        })))
        .unwrap();
        assert_eq!(out["vehicle_count"], 2);
        assert_eq!(out["traffic_density"], 0.02);
    }

    #[test]
    fn test_region_keeps_centers_inside() {
        let out = region(&inputs(json!({
            "region": [0, 0, 100, 100],
            "detections": [
                obj("person", 0.9, [10.0, 10.0, 30.0, 30.0]),
                obj("person", 0.9, [150.0, 10.0, 170.0, 30.0]),
            ]
        })))
        .unwrap();
        assert_eq!(out["count"], 1);

        assert!(region(&inputs(json!({"detections": []}))).is_err());
    }

    #[test]
    fn test_count_line_sides() {
        let out = count_line(&inputs(json!({
            "line": [[0, 50], [100, 50]],
            "detections": [
                obj("person", 0.9, [10.0, 60.0, 20.0, 80.0]),
                obj("person", 0.9, [10.0, 0.0, 20.0, 10.0]),
                obj("person", 0.9, [30.0, 0.0, 40.0, 20.0]),
            ]
        })))
        .unwrap();
        assert_eq!(out["counts"]["in"], 1);
        assert_eq!(out["counts"]["out"], 2);
    }

    #[test]
    fn test_filter_by_area_and_class() {
        let data = json!([
            obj("car", 0.9, [0.0, 0.0, 10.0, 10.0]),
            obj("car", 0.9, [0.0, 0.0, 2.0, 2.0]),
            obj("dog", 0.4, [0.0, 0.0, 20.0, 20.0]),
        ]);
        let by_area = filter(&inputs(json!({
            "filter_type": "area",
            "parameters": {"min_area": 50},
            "detections": data,
        })))
        .unwrap();
        assert_eq!(by_area["count"], 2);

        let by_class = filter(&inputs(json!({
            "filter_type": "class",
            "classes": ["dog"],
            "detections": data,
        })))
        .unwrap();
        assert_eq!(by_class["count"], 1);

        assert!(filter(&inputs(json!({"filter_type": "mood"}))).is_err());
    }

    #[test]
    fn test_alert_threshold() {
        let out = alert(&inputs(json!({
            "metric": "vehicle_count",
            "threshold": 3,
            "traffic": {"vehicle_count": 5},
        })))
        .unwrap();
        assert_eq!(out["triggered"], true);
        assert_eq!(out["value"], 5.0);

        assert!(alert(&inputs(json!({"metric": "missing", "threshold": 1}))).is_err());
    }

    #[test]
    fn test_time_series_stats() {
        let out = time_series(&inputs(json!({"values": [1, 2, 3, 4]}))).unwrap();
        assert_eq!(out["mean"], 2.5);
        assert_eq!(out["min"], 1.0);
        assert_eq!(out["max"], 4.0);
        assert_eq!(out["slope"], 1.0);
        assert_eq!(out["trend"], "increasing");

        assert!(time_series(&inputs(json!({"values": []}))).is_err());
    }

    #[test]
    fn test_analytics_sums_upstream_numbers() {
        let out = analytics(&inputs(json!({
            "a": {"vehicle_count": 2, "label": "x"},
            "b": {"vehicle_count": 3},
        })))
        .unwrap();
        assert_eq!(out["metrics"]["vehicle_count"], 5.0);
        assert_eq!(out["metrics"]["object_count"], 0);
    }

    #[test]
    fn test_camera_input_requires_id() {
        assert!(camera_input(&inputs(json!({}))).is_err());
        let out = camera_input(&inputs(json!({"camera_id": "lobby"}))).unwrap();
        assert_eq!(out["type"], "camera_feed");
    }
}
