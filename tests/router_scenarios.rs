// Router scenarios beyond the flashlight: Steiner trees, crossing pairs,
// infeasible nets with budget compliance, dynamic pin pools, and side-mount
// placement snapping.

mod common;

use std::collections::HashSet;
use std::time::Instant;

use common::{component, flashlight_catalog, instance, net, pin, rect_outline, ui_placement};
use inkroute::model::catalog::{Body, MountingStyle, PinGroup};
use inkroute::model::design::{DesignSpec, UIPlacement};
use inkroute::model::placement::{FullPlacement, PlacedComponent, PlacementError};
use inkroute::model::primitive::pt;
use inkroute::model::routing::RouterConfig;
use inkroute::place::place_components;
use inkroute::route::route_traces;

fn placed(instance_id: &str, catalog_id: &str, x: f64, y: f64) -> PlacedComponent {
    PlacedComponent {
        instance_id: instance_id.to_owned(),
        catalog_id: catalog_id.to_owned(),
        x_mm: x,
        y_mm: y,
        rotation_deg: 0,
    }
}

// Grid cells claimed by one net's traces, quantized back from world
// coordinates. Waypoint-interpolated so whole segments count.
fn trace_cells(result: &inkroute::model::routing::RoutingResult, net_id: &str) -> HashSet<(i64, i64)> {
    let mut cells = HashSet::new();
    for trace in result.traces.iter().filter(|t| t.net_id == net_id) {
        for w in trace.path.windows(2) {
            let (x1, y1) = w[0];
            let (x2, y2) = w[1];
            let steps = (((x2 - x1).abs() + (y2 - y1).abs()) / 0.5).round() as i64;
            for s in 0..=steps {
                let t = if steps == 0 { 0.0 } else { s as f64 / steps as f64 };
                let x = x1 + (x2 - x1) * t;
                let y = y1 + (y2 - y1) * t;
                cells.insert(((x * 2.0).round() as i64, (y * 2.0).round() as i64));
            }
        }
    }
    cells
}

#[test]
fn impossible_outline_raises_placement_error() {
    let design = DesignSpec {
        components: vec![instance("battery_holder_2xAAA", "bat_1")],
        nets: vec![],
        outline: rect_outline(10.0, 10.0),
        ui_placements: vec![],
    };
    let err: PlacementError =
        place_components(&design, &flashlight_catalog()).expect_err("battery cannot fit");
    assert_eq!(err.instance_id, "bat_1");
    assert!(err.reason.contains("No valid position"));
    let diag = err.diagnostic.expect("diagnostic attached");
    assert!((diag.body_mm.0 - 25.0).abs() < 1e-9);
    assert!((diag.body_mm.1 - 48.0).abs() < 1e-9);
}

#[test]
fn multi_pin_net_routes_as_single_tree() {
    // Nine test points scattered over a wide outline, all on one GND net.
    let catalog = flashlight_catalog();
    let positions = [
        (10.0, 10.0),
        (50.0, 10.0),
        (90.0, 10.0),
        (10.0, 30.0),
        (50.0, 30.0),
        (90.0, 30.0),
        (10.0, 50.0),
        (50.0, 50.0),
        (90.0, 50.0),
    ];
    let components: Vec<PlacedComponent> = positions
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| placed(&format!("tp_{i}"), "test_point", x, y))
        .collect();
    let refs: Vec<String> = (0..9).map(|i| format!("tp_{i}:1")).collect();
    let placement = FullPlacement {
        components,
        outline: rect_outline(100.0, 60.0),
        nets: vec![inkroute::model::design::Net {
            id: "GND".to_owned(),
            pins: refs,
        }],
    };

    let result = route_traces(&placement, &catalog, &RouterConfig::default());
    assert!(result.ok(), "failed: {:?}", result.failed_nets);

    // Every pad must be on the union of GND cells, and that union must be
    // one connected component (a tree, not parallel disjoint branches).
    let cells = trace_cells(&result, "GND");
    assert!(!cells.is_empty());
    for &(x, y) in &positions {
        let near_pad = cells.iter().any(|&(cx, cy)| {
            (cx as f64 / 2.0 - x).abs() <= 1.0 && (cy as f64 / 2.0 - y).abs() <= 1.0
        });
        assert!(near_pad, "pad at ({x},{y}) not reached");
    }

    let start = *cells.iter().next().unwrap();
    let mut seen = HashSet::from([start]);
    let mut queue = vec![start];
    while let Some((cx, cy)) = queue.pop() {
        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let n = (cx + dx, cy + dy);
            if cells.contains(&n) && seen.insert(n) {
                queue.push(n);
            }
        }
    }
    assert_eq!(seen.len(), cells.len(), "GND tree is disconnected");
}

#[test]
fn crossing_pair_routes_without_overlap() {
    // Two nets whose straight connections form an X.
    let catalog = flashlight_catalog();
    let placement = FullPlacement {
        components: vec![
            placed("tp_a", "test_point", 6.0, 6.0),
            placed("tp_b", "test_point", 24.0, 24.0),
            placed("tp_c", "test_point", 6.0, 24.0),
            placed("tp_d", "test_point", 24.0, 6.0),
        ],
        outline: rect_outline(30.0, 30.0),
        nets: vec![net("N1", &["tp_a:1", "tp_b:1"]), net("N2", &["tp_c:1", "tp_d:1"])],
    };

    let result = route_traces(&placement, &catalog, &RouterConfig::default());
    assert!(result.ok(), "failed: {:?}", result.failed_nets);

    // No grid cell belongs to both nets.
    let n1 = trace_cells(&result, "N1");
    let n2 = trace_cells(&result, "N2");
    let shared: Vec<_> = n1.intersection(&n2).collect();
    assert!(shared.is_empty(), "nets overlap at {shared:?}");
}

#[test]
fn infeasible_net_reported_within_budget() {
    // A routing-blocking divider spans the full outline width, cutting the
    // board in two; the TOP_BOT net can never route.
    let mut catalog = flashlight_catalog();
    catalog.components.push(component(
        "divider_bar",
        Body::Rect { width_mm: 40.0, length_mm: 10.0, height_mm: 5.0 },
        MountingStyle::Internal,
        true,
        0.0,
        false,
        vec![],
        vec![],
    ));

    let placement = FullPlacement {
        components: vec![
            placed("div_1", "divider_bar", 10.0, 30.0),
            placed("tp_a", "test_point", 10.0, 10.0),
            placed("tp_b", "test_point", 10.0, 50.0),
            placed("tp_c", "test_point", 5.0, 10.0),
            placed("tp_d", "test_point", 15.0, 10.0),
        ],
        outline: rect_outline(20.0, 60.0),
        nets: vec![net("TOP_BOT", &["tp_a:1", "tp_b:1"]), net("BOT", &["tp_c:1", "tp_d:1"])],
    };

    let config = RouterConfig {
        max_rip_up_attempts: 4,
        inner_rip_up_limit: 10,
        time_budget_s: 20.0,
        ..RouterConfig::default()
    };
    let started = Instant::now();
    let result = route_traces(&placement, &catalog, &config);
    let elapsed = started.elapsed().as_secs_f64();

    assert_eq!(result.failed_nets, vec!["TOP_BOT".to_owned()]);
    assert!(result.traces.iter().any(|t| t.net_id == "BOT"), "BOT should route");
    // One-attempt overshoot allowed on top of the budget.
    assert!(elapsed < config.time_budget_s + 10.0, "took {elapsed:.1}s");
}

#[test]
fn zero_budget_returns_immediately() {
    let catalog = flashlight_catalog();
    let placement = FullPlacement {
        components: vec![
            placed("tp_a", "test_point", 5.0, 5.0),
            placed("tp_b", "test_point", 15.0, 15.0),
        ],
        outline: rect_outline(20.0, 20.0),
        nets: vec![net("N1", &["tp_a:1", "tp_b:1"])],
    };
    let config = RouterConfig { time_budget_s: 0.0, ..RouterConfig::default() };
    let result = route_traces(&placement, &catalog, &config);
    // No attempt ran, so the net is reported unrouted rather than hanging.
    assert_eq!(result.failed_nets, vec!["N1".to_owned()]);
}

#[test]
fn group_allocations_are_injective() {
    // An MCU-like part with one allocatable gpio group feeding two nets:
    // each net must get its own physical pin.
    let mut catalog = flashlight_catalog();
    catalog.components.push(component(
        "mcu_mini",
        Body::Rect { width_mm: 10.0, length_mm: 20.0, height_mm: 4.0 },
        MountingStyle::Internal,
        false,
        1.0,
        false,
        vec![pin("P1", -5.0, 6.0), pin("P2", -5.0, 0.0), pin("P3", -5.0, -6.0)],
        vec![PinGroup {
            id: "gpio".to_owned(),
            pin_ids: vec!["P1".to_owned(), "P2".to_owned(), "P3".to_owned()],
            fixed_net: None,
            allocatable: true,
            capabilities: vec![],
        }],
    ));

    let placement = FullPlacement {
        components: vec![
            placed("mcu_1", "mcu_mini", 30.0, 20.0),
            placed("tp_a", "test_point", 10.0, 28.0),
            placed("tp_b", "test_point", 10.0, 12.0),
        ],
        outline: rect_outline(40.0, 40.0),
        nets: vec![net("SIG_A", &["mcu_1:gpio", "tp_a:1"]), net("SIG_B", &["mcu_1:gpio", "tp_b:1"])],
    };

    let result = route_traces(&placement, &catalog, &RouterConfig::default());
    assert!(result.ok(), "failed: {:?}", result.failed_nets);
    assert_eq!(result.pin_assignments.len(), 2);

    let assigned: HashSet<&String> = result.pin_assignments.values().collect();
    assert_eq!(assigned.len(), 2, "same physical pin assigned twice: {:?}", result.pin_assignments);
    for v in result.pin_assignments.values() {
        assert!(v.starts_with("mcu_1:P"), "unexpected assignment {v}");
    }
}

#[test]
fn side_mount_snaps_to_edge() {
    // A side-mounted switch with an interior UI point and edge_index=2
    // lands on the projection onto the top edge, rotated to face outward.
    let mut catalog = flashlight_catalog();
    catalog.components.push(component(
        "slide_switch",
        Body::Rect { width_mm: 8.0, length_mm: 4.0, height_mm: 6.0 },
        MountingStyle::Side,
        false,
        1.0,
        true,
        vec![pin("A", -2.0, 0.0), pin("B", 2.0, 0.0)],
        vec![],
    ));

    let design = DesignSpec {
        components: vec![instance("slide_switch", "sw_1")],
        nets: vec![],
        outline: rect_outline(30.0, 80.0),
        ui_placements: vec![UIPlacement {
            instance_id: "sw_1".to_owned(),
            x_mm: 12.0,
            y_mm: 50.0,
            edge_index: Some(2),
        }],
    };

    let placement = place_components(&design, &catalog).unwrap();
    let sw = placement.component("sw_1").unwrap();
    // Edge 2 runs (30,80) -> (0,80): the interior point projects straight
    // up; the outward normal of the top edge points +y, so rotation 90.
    assert!((sw.x_mm - 12.0).abs() < 1e-9, "x={}", sw.x_mm);
    assert!((sw.y_mm - 80.0).abs() < 1e-9, "y={}", sw.y_mm);
    assert_eq!(sw.rotation_deg, 90);
}

#[test]
fn interior_ui_placement_ignores_edge_snapping() {
    let catalog = flashlight_catalog();
    let design = DesignSpec {
        components: vec![instance("led_5mm_red", "led_1")],
        nets: vec![],
        outline: rect_outline(30.0, 80.0),
        ui_placements: vec![ui_placement("led_1", pt(15.0, 40.0))],
    };
    let placement = place_components(&design, &catalog).unwrap();
    let led = placement.component("led_1").unwrap();
    assert!((led.x_mm - 15.0).abs() < 1e-9);
    assert!((led.y_mm - 40.0).abs() < 1e-9);
    assert_eq!(led.rotation_deg, 0);
}
