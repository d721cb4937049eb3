use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::model::catalog::{Catalog, MountingStyle};
use crate::model::design::{DesignSpec, Outline};
use crate::model::footprint::{
    aabb_gap, body_half_dims, envelope_half_dims, footprint_area, pin_world_xy, rect_edge_clearance,
    rotate_offset, ROTATIONS,
};
use crate::model::geom::contains::poly_contains_rt;
use crate::model::placement::{FullPlacement, PlacedComponent, PlacementDiagnostic, PlacementError};
use crate::model::primitive::rect::Rt;
use crate::model::primitive::{pt, Pt};
use crate::model::rules::TraceRules;
use crate::model::Id;
use crate::place::nets::{build_net_graph, build_placement_groups, count_shared_nets};
use crate::place::scoring::{compute_placed_segments, score_candidate, Candidate, Placed, ScoreContext};

// Grid scan resolution for the placer search, in mm.
pub const GRID_STEP_MM: f64 = 1.0;

// Side-mount helpers.

// (start_vertex, end_vertex) for an outline edge, wrapping at the end.
fn edge_vertices(outline: &Outline, edge_index: usize) -> (Pt, Pt) {
    let pts = outline.vertices();
    let n = pts.len();
    (pts[edge_index % n], pts[(edge_index + 1) % n])
}

// Nearest 90-degree rotation for a component mounted on an edge. The
// component's forward direction points outward through the wall; for
// clockwise winding the outward normal is to the right of the edge
// direction.
fn edge_rotation(p1: Pt, p2: Pt) -> i32 {
    let angle = (p2.y - p1.y).atan2(p2.x - p1.x).to_degrees();
    let normal_angle = angle - 90.0;
    let snapped = (normal_angle / 90.0).round() * 90.0;
    (snapped as i32).rem_euclid(360)
}

// Snap a point to its projection on an outline edge. Returns the snapped
// position and the edge-derived rotation.
fn snap_to_edge(x_mm: f64, y_mm: f64, outline: &Outline, edge_index: usize) -> (Pt, i32) {
    let (p1, p2) = edge_vertices(outline, edge_index);
    let d = p2 - p1;
    let len2 = d.mag2();
    if len2 < 1e-12 {
        return (p1, 0);
    }
    let t = ((pt(x_mm, y_mm) - p1).dot(d) / len2).clamp(0.0, 1.0);
    (p1 + d * t, edge_rotation(p1, p2))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// Place all components inside the outline. UI components are fixed at
// their agent-specified positions; everything else is auto-placed via
// exhaustive grid search, optimising for net proximity, uniform clearance
// and compactness. Fails with a PlacementError the first time no legal
// cell exists for a component.
pub fn place_components(
    design: &DesignSpec,
    catalog: &Catalog,
) -> Result<FullPlacement, PlacementError> {
    place_components_with(design, catalog, GRID_STEP_MM, &TraceRules::default())
}

pub fn place_components_with(
    design: &DesignSpec,
    catalog: &Catalog,
    grid_step: f64,
    rules: &TraceRules,
) -> Result<FullPlacement, PlacementError> {
    let catalog_map = catalog.component_map();
    let outline_poly = design.outline.polygon();
    let bounds = *outline_poly.bounds();
    let outline_area = outline_poly.area();

    if outline_poly.len() < 3 || outline_area <= 0.0 {
        return Err(PlacementError::new(
            "_outline",
            "_outline",
            "Outline polygon is invalid or has zero area",
        ));
    }

    let min_edge_clearance = rules.min_edge_clearance_mm();
    let routing_channel = rules.routing_channel_mm();
    let min_pin_sq = rules.min_pin_clearance_mm() * rules.min_pin_clearance_mm();
    let pad_radius = rules.pad_radius_mm();

    let graph = build_net_graph(&design.nets);

    // Effective mounting style per instance: override or catalog default.
    let mut effective_style: HashMap<&str, MountingStyle> = HashMap::new();
    for ci in &design.components {
        if let Some(cat) = catalog_map.get(ci.catalog_id.as_str()) {
            effective_style
                .insert(&ci.instance_id, ci.mounting_style.unwrap_or(cat.mounting.style));
        }
    }

    // 1. Place UI components at fixed positions.
    let mut placed: Vec<Placed> = Vec::new();
    let mut ui_ids: HashSet<&str> = HashSet::new();

    for up in &design.ui_placements {
        let Some(ci) = design.instance(&up.instance_id) else {
            warn!("UI placement for unknown instance {}", up.instance_id);
            continue;
        };
        let Some(cat) = catalog_map.get(ci.catalog_id.as_str()) else {
            warn!("UI placement {}: unknown catalog id {}", ci.instance_id, ci.catalog_id);
            continue;
        };
        let style = effective_style.get(ci.instance_id.as_str()).copied().unwrap_or(cat.mounting.style);

        let (p, rot) = match (style, up.edge_index) {
            (MountingStyle::Side, Some(edge)) => snap_to_edge(up.x_mm, up.y_mm, &design.outline, edge),
            _ => (pt(up.x_mm, up.y_mm), 0),
        };

        let (hw, hh) = body_half_dims(&cat.body, rot);
        let (env_hw, env_hh) = envelope_half_dims(cat, rot, pad_radius);
        placed.push(Placed {
            instance_id: ci.instance_id.clone(),
            catalog_id: ci.catalog_id.clone(),
            x: p.x,
            y: p.y,
            rotation: rot,
            hw,
            hh,
            keepout: cat.mounting.keepout_margin_mm,
            env_hw,
            env_hh,
        });
        ui_ids.insert(&ci.instance_id);
        info!("UI-placed {} at ({:.1}, {:.1}) rot={rot}", ci.instance_id, p.x, p.y);
    }

    // 2. Order the remaining instances by connectivity group, then area.
    let to_place_ids: Vec<Id> = design
        .components
        .iter()
        .filter(|ci| !ui_ids.contains(ci.instance_id.as_str()))
        .map(|ci| ci.instance_id.clone())
        .collect();
    let area_map: HashMap<Id, f64> = design
        .components
        .iter()
        .filter(|ci| !ui_ids.contains(ci.instance_id.as_str()))
        .filter_map(|ci| {
            catalog_map
                .get(ci.catalog_id.as_str())
                .map(|cat| (ci.instance_id.clone(), footprint_area(&cat.body)))
        })
        .collect();
    let groups = build_placement_groups(&to_place_ids, &graph, &area_map);

    // instance_id -> set of group-mates (excluding self).
    let mut group_mates_map: HashMap<Id, HashSet<Id>> = HashMap::new();
    for group in &groups {
        for iid in group {
            let mates: HashSet<Id> = group.iter().filter(|m| *m != iid).cloned().collect();
            group_mates_map.insert(iid.clone(), mates);
        }
    }

    let ordered_ids: Vec<Id> = groups.into_iter().flatten().collect();

    // 3. Auto-place each component via grid search. The shared-nets cache
    // persists across components; pin-clearance checks use squared
    // distances to avoid sqrt in the inner loop.
    let mut shared_nets_cache: HashMap<(Id, Id), usize> = HashMap::new();

    for iid in &ordered_ids {
        let ci = design.instance(iid).expect("ordered instance must exist");
        let Some(&cat) = catalog_map.get(ci.catalog_id.as_str()) else {
            return Err(PlacementError::new(iid, &ci.catalog_id, "unknown catalog id"));
        };
        let style =
            effective_style.get(iid.as_str()).copied().unwrap_or(cat.mounting.style);
        let keepout = cat.mounting.keepout_margin_mm;

        // Virtual wire segments between already-placed components, for
        // crossing detection. Constant during this component's scan.
        let existing_segments = compute_placed_segments(&placed, &catalog_map, &graph);

        // Placed-component pin world positions, also constant during the
        // scan (saves trig per cell).
        let mut placed_pin_positions: HashMap<Id, Vec<Pt>> = HashMap::new();
        for p in &placed {
            if let Some(pcat) = catalog_map.get(p.catalog_id.as_str()) {
                placed_pin_positions.insert(
                    p.instance_id.clone(),
                    pcat.pins
                        .iter()
                        .map(|pin| pin_world_xy(pin.position_mm, p.x, p.y, p.rotation))
                        .collect(),
                );
            }
        }

        let mut best_pos: Option<Pt> = None;
        let mut best_rot = 0;
        let mut best_score = f64::NEG_INFINITY;

        for rotation in ROTATIONS {
            let (hw, hh) = body_half_dims(&cat.body, rotation);
            let (env_hw, env_hh) = envelope_half_dims(cat, rotation, pad_radius);

            // The envelope plus edge clearance must fit inside the
            // outline; shrink the scan range accordingly.
            let ihw = env_hw + min_edge_clearance;
            let ihh = env_hh + min_edge_clearance;
            let scan_xmin = bounds.l() + ihw;
            let scan_xmax = bounds.r() - ihw;
            let scan_ymin = bounds.b() + ihh;
            let scan_ymax = bounds.t() - ihh;
            if scan_xmin > scan_xmax || scan_ymin > scan_ymax {
                continue;
            }

            // Rotated pin offsets are position-independent; just add the
            // candidate centre in the inner loop.
            let my_pin_offsets: Vec<Pt> =
                cat.pins.iter().map(|p| rotate_offset(p.position_mm, rotation)).collect();

            let mut cx = scan_xmin;
            while cx <= scan_xmax + 1e-6 {
                let mut cy = scan_ymin;
                'cell: while cy <= scan_ymax + 1e-6 {
                    // H1: inflated envelope inside the outline.
                    if !poly_contains_rt(&outline_poly, &Rt::centred(pt(cx, cy), ihw, ihh)) {
                        cy += grid_step;
                        continue;
                    }

                    // H2: envelope gap to every placed neighbor covers
                    // keepouts plus the trace channels that must pass
                    // between the two components.
                    for p in &placed {
                        let key = if *iid < p.instance_id {
                            (iid.clone(), p.instance_id.clone())
                        } else {
                            (p.instance_id.clone(), iid.clone())
                        };
                        let n_channels = *shared_nets_cache
                            .entry(key)
                            .or_insert_with(|| count_shared_nets(iid, &p.instance_id, &graph));
                        let channel_gap = n_channels as f64 * routing_channel;
                        let required_gap = keepout.max(p.keepout).max(channel_gap);
                        let actual_gap =
                            aabb_gap(cx, cy, env_hw, env_hh, p.x, p.y, p.env_hw, p.env_hh);
                        if actual_gap < required_gap {
                            cy += grid_step;
                            continue 'cell;
                        }
                    }

                    // H3: minimum edge clearance, checked against the
                    // envelope so pins don't crowd the outline wall.
                    let edge_dist = rect_edge_clearance(cx, cy, env_hw, env_hh, &outline_poly);
                    if edge_dist < min_edge_clearance {
                        cy += grid_step;
                        continue;
                    }

                    // H4: pin-to-pin clearance against every placed pin.
                    for p in &placed {
                        let Some(other_pins) = placed_pin_positions.get(&p.instance_id) else {
                            continue;
                        };
                        for op in other_pins {
                            for off in &my_pin_offsets {
                                let mp = pt(cx + off.x, cy + off.y);
                                if mp.dist2(*op) < min_pin_sq {
                                    cy += grid_step;
                                    continue 'cell;
                                }
                            }
                        }
                    }

                    // Soft constraints.
                    let ctx = ScoreContext {
                        placed: &placed,
                        catalog_map: &catalog_map,
                        graph: &graph,
                        outline: &outline_poly,
                        outline_area,
                        rules,
                        existing_segments: &existing_segments,
                        placed_pin_positions: &placed_pin_positions,
                        group_mates: group_mates_map.get(iid),
                    };
                    let score = score_candidate(
                        &Candidate {
                            instance_id: iid,
                            cat,
                            cx,
                            cy,
                            rotation,
                            hw,
                            hh,
                            env_hw,
                            env_hh,
                            keepout,
                            style,
                        },
                        &ctx,
                    );
                    if score > best_score {
                        best_score = score;
                        best_pos = Some(pt(cx, cy));
                        best_rot = rotation;
                    }

                    cy += grid_step;
                }
                cx += grid_step;
            }
        }

        let Some(pos) = best_pos else {
            let (bhw, bhh) = body_half_dims(&cat.body, 0);
            let (body_w, body_h) = (bhw * 2.0, bhh * 2.0);
            let diagnostic = PlacementDiagnostic {
                body_mm: (body_w, body_h),
                keepout_mm: keepout,
                outline_bounds: bounds,
                placed_envelopes: placed
                    .iter()
                    .map(|p| {
                        (p.instance_id.clone(), Rt::centred(pt(p.x, p.y), p.env_hw, p.env_hh))
                    })
                    .collect(),
            };
            return Err(PlacementError::new(
                iid,
                &ci.catalog_id,
                format!(
                    "No valid position found inside the {:.0}x{:.0}mm outline. Body is \
                     {body_w:.1}x{body_h:.1}mm with {keepout:.1}mm keepout. Try widening the \
                     outline or repositioning other components.",
                    bounds.w(),
                    bounds.h(),
                ),
            )
            .with_diagnostic(diagnostic));
        };

        let (hw, hh) = body_half_dims(&cat.body, best_rot);
        let (env_hw, env_hh) = envelope_half_dims(cat, best_rot, pad_radius);
        placed.push(Placed {
            instance_id: iid.clone(),
            catalog_id: ci.catalog_id.clone(),
            x: pos.x,
            y: pos.y,
            rotation: best_rot,
            hw,
            hh,
            keepout,
            env_hw,
            env_hh,
        });
        info!(
            "Auto-placed {iid} at ({:.1}, {:.1}) rot={best_rot} score={best_score:.2}",
            pos.x, pos.y
        );
        debug!("  scoring trace: {} candidates considered against {} placed", iid, placed.len() - 1);
    }

    // 4. Build the output, rounding world coordinates for the artifact.
    let components = placed
        .iter()
        .map(|p| PlacedComponent {
            instance_id: p.instance_id.clone(),
            catalog_id: p.catalog_id.clone(),
            x_mm: round2(p.x),
            y_mm: round2(p.y),
            rotation_deg: p.rotation,
        })
        .collect();

    Ok(FullPlacement {
        components,
        outline: design.outline.clone(),
        nets: design.nets.clone(),
    })
}
