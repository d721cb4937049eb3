// End-to-end flashlight scenario: place the design, then route every net.

mod common;

use common::{flashlight_catalog, flashlight_design};
use inkroute::model::catalog::Catalog;
use inkroute::model::design::DesignSpec;
use inkroute::model::footprint::{aabb_gap, envelope_half_dims};
use inkroute::model::geom::contains::{poly_contains_pt, poly_contains_rt};
use inkroute::model::placement::{parse_placement, placement_to_json, FullPlacement};
use inkroute::model::primitive::{pt, Rt};
use inkroute::model::routing::{parse_routing, routing_to_json, RouterConfig, RoutingResult};
use inkroute::model::rules::TraceRules;
use inkroute::model::validate::validate_design;
use inkroute::place::place_components;
use inkroute::route::route_traces;

fn placed_fixture() -> (DesignSpec, Catalog, FullPlacement) {
    let design = flashlight_design();
    let catalog = flashlight_catalog();
    let placement = place_components(&design, &catalog).expect("flashlight placement succeeds");
    (design, catalog, placement)
}

fn routed_fixture() -> (FullPlacement, RoutingResult) {
    let (_, catalog, placement) = placed_fixture();
    let result = route_traces(&placement, &catalog, &RouterConfig::default());
    (placement, result)
}

#[test]
fn design_validates_cleanly() {
    let errors = validate_design(&flashlight_design(), &flashlight_catalog());
    assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
}

#[test]
fn placement_is_complete() {
    let (design, _, placement) = placed_fixture();
    assert_eq!(placement.components.len(), design.components.len());
    let placed_ids: Vec<&str> =
        placement.components.iter().map(|c| c.instance_id.as_str()).collect();
    for ci in &design.components {
        assert!(placed_ids.contains(&ci.instance_id.as_str()), "missing {}", ci.instance_id);
    }
}

#[test]
fn placement_is_deterministic() {
    let design = flashlight_design();
    let catalog = flashlight_catalog();
    let a = place_components(&design, &catalog).unwrap();
    let b = place_components(&design, &catalog).unwrap();
    assert_eq!(a, b);
}

#[test]
fn ui_components_at_specified_positions() {
    let (_, _, placement) = placed_fixture();
    let btn = placement.component("btn_1").unwrap();
    assert!((btn.x_mm - 17.5).abs() < 1e-9);
    assert!((btn.y_mm - 70.0).abs() < 1e-9);
    assert_eq!(btn.rotation_deg, 0);

    let led = placement.component("led_1").unwrap();
    assert!((led.x_mm - 17.5).abs() < 1e-9);
    assert!((led.y_mm - 100.0).abs() < 1e-9);
}

#[test]
fn rotations_are_valid() {
    let (_, _, placement) = placed_fixture();
    for c in &placement.components {
        assert!(
            [0, 90, 180, 270].contains(&c.rotation_deg),
            "{} has invalid rotation {}",
            c.instance_id,
            c.rotation_deg
        );
    }
}

#[test]
fn envelopes_inside_outline() {
    let (design, catalog, placement) = placed_fixture();
    let outline = design.outline.polygon();
    let pad_r = TraceRules::default().pad_radius_mm();

    for pc in &placement.components {
        let cat = catalog.component(&pc.catalog_id).unwrap();
        let (ehw, ehh) = envelope_half_dims(cat, pc.rotation_deg, pad_r);
        let rect = Rt::centred(pt(pc.x_mm, pc.y_mm), ehw, ehh);
        assert!(
            poly_contains_rt(&outline, &rect),
            "{} envelope {rect} outside outline",
            pc.instance_id
        );
    }
}

#[test]
fn no_envelope_overlaps() {
    let (_, catalog, placement) = placed_fixture();
    let pad_r = TraceRules::default().pad_radius_mm();
    let comps = &placement.components;

    for i in 0..comps.len() {
        let a = &comps[i];
        let cat_a = catalog.component(&a.catalog_id).unwrap();
        let (ahw, ahh) = envelope_half_dims(cat_a, a.rotation_deg, pad_r);
        let ko_a = cat_a.mounting.keepout_margin_mm;
        for b in &comps[i + 1..] {
            let cat_b = catalog.component(&b.catalog_id).unwrap();
            let (bhw, bhh) = envelope_half_dims(cat_b, b.rotation_deg, pad_r);
            let ko_b = cat_b.mounting.keepout_margin_mm;
            let gap = aabb_gap(a.x_mm, a.y_mm, ahw, ahh, b.x_mm, b.y_mm, bhw, bhh);
            let required = ko_a.max(ko_b);
            assert!(
                gap >= required - 0.01,
                "{} and {} too close: gap={gap:.2} < {required:.2}",
                a.instance_id,
                b.instance_id
            );
        }
    }
}

#[test]
fn battery_near_bottom() {
    let (_, _, placement) = placed_fixture();
    let bat = placement.component("bat_1").unwrap();
    assert!(bat.y_mm < 50.0, "battery at y={:.1}, expected near the bottom", bat.y_mm);
}

#[test]
fn outline_and_nets_pass_through() {
    let (design, _, placement) = placed_fixture();
    assert_eq!(placement.outline, design.outline);
    assert_eq!(placement.nets, design.nets);
}

#[test]
fn placement_serialization_round_trips() {
    let (_, _, placement) = placed_fixture();
    let json = placement_to_json(&placement).unwrap();
    let restored = parse_placement(&json).unwrap();
    assert_eq!(restored, placement);
}

#[test]
fn all_nets_routed() {
    let (_, result) = routed_fixture();
    assert!(result.ok(), "failed nets: {:?}", result.failed_nets);
    let routed: Vec<&str> = result.traces.iter().map(|t| t.net_id.as_str()).collect();
    for expected in ["VCC", "BTN_GND", "LED_DRIVE", "GND"] {
        assert!(routed.contains(&expected), "no trace for {expected}");
    }
}

#[test]
fn traces_are_manhattan() {
    let (_, result) = routed_fixture();
    for trace in &result.traces {
        assert!(trace.path.len() >= 2);
        for w in trace.path.windows(2) {
            let (x1, y1) = w[0];
            let (x2, y2) = w[1];
            let horizontal = (y1 - y2).abs() < 0.01;
            let vertical = (x1 - x2).abs() < 0.01;
            assert!(
                horizontal || vertical,
                "non-Manhattan segment in {}: ({x1:.2},{y1:.2}) -> ({x2:.2},{y2:.2})",
                trace.net_id
            );
        }
    }
}

#[test]
fn traces_inside_outline() {
    let (placement, result) = routed_fixture();
    let outline = placement.outline.polygon();
    // Small buffer for grid quantization at the boundary.
    let bounds = outline.bounds();
    for trace in &result.traces {
        for &(x, y) in &trace.path {
            let inside = poly_contains_pt(&outline, pt(x, y))
                || (x >= bounds.l() - 0.01
                    && x <= bounds.r() + 0.01
                    && y >= bounds.b() - 0.01
                    && y <= bounds.t() + 0.01
                    && inkroute::model::geom::distance::poly_edge_dist(&outline, pt(x, y)) < 1.0);
            assert!(inside, "waypoint ({x:.2},{y:.2}) of {} outside outline", trace.net_id);
        }
    }
}

#[test]
fn no_dynamic_assignments_for_flashlight() {
    let (_, result) = routed_fixture();
    assert!(
        result.pin_assignments.is_empty(),
        "flashlight has no allocatable groups: {:?}",
        result.pin_assignments
    );
}

#[test]
fn routing_serialization_round_trips() {
    let (_, result) = routed_fixture();
    let json = routing_to_json(&result).unwrap();
    let restored = parse_routing(&json).unwrap();
    assert_eq!(restored, result);
}
