use std::collections::{HashMap, HashSet};

use crate::model::catalog::{Component, MountingStyle};
use crate::model::footprint::{aabb_gap, pin_world_xy, rect_edge_clearance};
use crate::model::geom::intersects::seg_crosses_seg;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{seg, Pt};
use crate::model::rules::TraceRules;
use crate::model::Id;
use crate::place::nets::{resolve_pin_positions, NetGraph};

// Scoring weights. Higher absolute value = more influence. These are
// empirical and mutually interacting; keep them together and do not re-tune
// piecemeal.
pub const W_NET_PROXIMITY: f64 = 5.0; // MAIN driver: connected components close
pub const W_EDGE_CLEARANCE: f64 = 0.5; // prefer safe distance from outline
pub const W_COMPACTNESS: f64 = 0.3; // weakly prefer compact layouts
pub const W_CLEARANCE_UNIFORM: f64 = 1.0; // prefer uniform gaps between components
pub const W_BOTTOM_PREFERENCE: f64 = 0.08; // bottom-mount components prefer low Y
pub const W_CROSSING: f64 = 50.0; // heavy penalty per inter-net crossing
pub const W_PIN_COLLOCATION: f64 = 40.0; // heavy penalty per near-colliding pin pair
pub const W_SPREAD: f64 = 0.6; // reward for spreading out when space allows
pub const W_GROUP_COHESION: f64 = 1.5; // reward for staying near group-mates

// Edge clearance stops rewarding beyond this distance.
const EDGE_CLEARANCE_CAP_MM: f64 = 5.0;
// Spread reward saturates here.
const SPREAD_CAP_MM: f64 = 8.0;
// Pin pairs closer than this (but past the hard constraint) still get the
// collocation penalty, as a defence against wall-hugging pin clusters.
const PIN_CROWDING_FACTOR: f64 = 1.5;

// Tracking info for a placed component during the algorithm.
#[derive(Debug, Clone)]
pub struct Placed {
    pub instance_id: Id,
    pub catalog_id: Id,
    pub x: f64,
    pub y: f64,
    pub rotation: i32,
    pub hw: f64, // half width (rotated body)
    pub hh: f64, // half height (rotated body)
    pub keepout: f64,
    pub env_hw: f64, // half width (rotated envelope)
    pub env_hh: f64, // half height (rotated envelope)
}

// A virtual wire between the closest connected pin pair of two placed
// instances.
#[derive(Debug, Clone)]
pub struct WireSegment {
    pub net_id: Id,
    pub a: Pt,
    pub b: Pt,
}

// Compute virtual wire segments between already-placed components: one per
// (net, instance pair), connecting the closest pin pair. Candidate
// positions are scored against these to detect crossings that would make
// single-layer routing impossible.
pub fn compute_placed_segments(
    placed: &[Placed],
    catalog_map: &HashMap<&str, &Component>,
    graph: &NetGraph,
) -> Vec<WireSegment> {
    let placed_map: HashMap<&str, &Placed> =
        placed.iter().map(|p| (p.instance_id.as_str(), p)).collect();
    let mut seen: HashSet<(Id, Id, Id)> = HashSet::new();
    let mut segments = Vec::new();

    for p in placed {
        let Some(cat_a) = catalog_map.get(p.catalog_id.as_str()) else { continue };
        let Some(edges) = graph.get(&p.instance_id) else { continue };
        for edge in edges {
            let Some(other_p) = placed_map.get(edge.other_iid.as_str()) else { continue };
            let key = if p.instance_id < edge.other_iid {
                (edge.net_id.clone(), p.instance_id.clone(), edge.other_iid.clone())
            } else {
                (edge.net_id.clone(), edge.other_iid.clone(), p.instance_id.clone())
            };
            if !seen.insert(key) {
                continue;
            }
            let Some(cat_b) = catalog_map.get(other_p.catalog_id.as_str()) else { continue };

            let my_positions = resolve_pin_positions(&edge.my_pins, cat_a);
            let other_positions = resolve_pin_positions(&edge.other_pins, cat_b);

            if let Some((a, b)) = closest_pin_pair(
                &my_positions,
                p.x,
                p.y,
                p.rotation,
                &other_positions,
                other_p.x,
                other_p.y,
                other_p.rotation,
            ) {
                segments.push(WireSegment { net_id: edge.net_id.clone(), a, b });
            }
        }
    }

    segments
}

#[allow(clippy::too_many_arguments)]
fn closest_pin_pair(
    my_positions: &[Pt],
    cx: f64,
    cy: f64,
    rot: i32,
    other_positions: &[Pt],
    ox: f64,
    oy: f64,
    orot: i32,
) -> Option<(Pt, Pt)> {
    let mut best_d = f64::INFINITY;
    let mut best = None;
    for mp in my_positions {
        let w1 = pin_world_xy(*mp, cx, cy, rot);
        for op in other_positions {
            let w2 = pin_world_xy(*op, ox, oy, orot);
            let d = w1.dist2(w2);
            if d < best_d {
                best_d = d;
                best = Some((w1, w2));
            }
        }
    }
    best
}

// Everything a candidate is scored against. Constant during one
// component's grid scan.
pub struct ScoreContext<'a> {
    pub placed: &'a [Placed],
    pub catalog_map: &'a HashMap<&'a str, &'a Component>,
    pub graph: &'a NetGraph,
    pub outline: &'a Poly,
    pub outline_area: f64,
    pub rules: &'a TraceRules,
    pub existing_segments: &'a [WireSegment],
    pub placed_pin_positions: &'a HashMap<Id, Vec<Pt>>,
    pub group_mates: Option<&'a HashSet<Id>>,
}

// A candidate grid cell for one component at one rotation.
pub struct Candidate<'a> {
    pub instance_id: &'a str,
    pub cat: &'a Component,
    pub cx: f64,
    pub cy: f64,
    pub rotation: i32,
    pub hw: f64,
    pub hh: f64,
    pub env_hw: f64,
    pub env_hh: f64,
    pub keepout: f64,
    pub style: MountingStyle,
}

// Score a candidate position. Higher = better. Net proximity dominates;
// the remaining terms shape clearance uniformity, compactness, planarity
// and pin spacing.
pub fn score_candidate(cand: &Candidate<'_>, ctx: &ScoreContext<'_>) -> f64 {
    let mut score = 0.0;

    // 1. Net proximity (MAIN driver): closest connected pin pair per edge.
    if let Some(edges) = ctx.graph.get(cand.instance_id) {
        for edge in edges {
            let Some(other) = ctx.placed.iter().find(|p| p.instance_id == edge.other_iid) else {
                continue;
            };
            let Some(other_cat) = ctx.catalog_map.get(other.catalog_id.as_str()) else { continue };

            let my_positions = resolve_pin_positions(&edge.my_pins, cand.cat);
            let other_positions = resolve_pin_positions(&edge.other_pins, other_cat);
            if let Some((a, b)) = closest_pin_pair(
                &my_positions,
                cand.cx,
                cand.cy,
                cand.rotation,
                &other_positions,
                other.x,
                other.y,
                other.rotation,
            ) {
                score -= a.dist(b) * W_NET_PROXIMITY;
            }
        }
    }

    // 2. Edge clearance, clamped so mid-board positions don't dominate.
    let edge_dist = rect_edge_clearance(cand.cx, cand.cy, cand.hw, cand.hh, ctx.outline);
    score += edge_dist.min(EDGE_CLEARANCE_CAP_MM) * W_EDGE_CLEARANCE;

    if !ctx.placed.is_empty() {
        let n = ctx.placed.len() as f64;

        // 3. Uniform clearance to neighbors: mean |gap - target|.
        for p in ctx.placed {
            let gap = aabb_gap(cand.cx, cand.cy, cand.hw, cand.hh, p.x, p.y, p.hw, p.hh);
            let target = cand.keepout.max(p.keepout);
            if gap > 0.0 {
                score -= (gap - target).abs() * W_CLEARANCE_UNIFORM / n;
            }
        }

        // 4. Compactness: distance to the placed centroid.
        let centroid_x = ctx.placed.iter().map(|p| p.x).sum::<f64>() / n;
        let centroid_y = ctx.placed.iter().map(|p| p.y).sum::<f64>() / n;
        score -= ((cand.cx - centroid_x).hypot(cand.cy - centroid_y)) * W_COMPACTNESS;

        // 8. Spread: when the outline has room, reward keeping some air to
        // the nearest neighbor instead of piling up at the centroid.
        let occupied: f64 = ctx.placed.iter().map(|p| 4.0 * p.env_hw * p.env_hh).sum::<f64>()
            + 4.0 * cand.env_hw * cand.env_hh;
        if occupied < 0.5 * ctx.outline_area {
            let nearest_gap = ctx
                .placed
                .iter()
                .map(|p| {
                    aabb_gap(cand.cx, cand.cy, cand.env_hw, cand.env_hh, p.x, p.y, p.env_hw, p.env_hh)
                })
                .fold(f64::INFINITY, f64::min);
            if nearest_gap.is_finite() {
                score += nearest_gap.clamp(0.0, SPREAD_CAP_MM) * W_SPREAD;
            }
        }

        // 9. Group cohesion: stay near already-placed group-mates.
        if let Some(mates) = ctx.group_mates {
            let mate_dists: Vec<f64> = ctx
                .placed
                .iter()
                .filter(|p| mates.contains(&p.instance_id))
                .map(|p| (cand.cx - p.x).hypot(cand.cy - p.y))
                .collect();
            if !mate_dists.is_empty() {
                let mean = mate_dists.iter().sum::<f64>() / mate_dists.len() as f64;
                score -= mean * W_GROUP_COHESION;
            }
        }
    }

    // 5. Bottom preference for bottom-mount components.
    if cand.style == MountingStyle::Bottom {
        score -= (cand.cy - ctx.outline.bounds().b()) * W_BOTTOM_PREFERENCE;
    }

    // 6. Crossing penalty (planarity): for each net edge to a placed
    // instance, count proper intersections between the new virtual wire
    // and the existing different-net wires. Same-net crossings are fine,
    // the router handles those as a single tree.
    if !ctx.existing_segments.is_empty() {
        let mut crossings = 0;
        if let Some(edges) = ctx.graph.get(cand.instance_id) {
            for edge in edges {
                let Some(other) = ctx.placed.iter().find(|p| p.instance_id == edge.other_iid)
                else {
                    continue;
                };
                let Some(other_cat) = ctx.catalog_map.get(other.catalog_id.as_str()) else {
                    continue;
                };
                let my_positions = resolve_pin_positions(&edge.my_pins, cand.cat);
                let other_positions = resolve_pin_positions(&edge.other_pins, other_cat);
                let Some((a, b)) = closest_pin_pair(
                    &my_positions,
                    cand.cx,
                    cand.cy,
                    cand.rotation,
                    &other_positions,
                    other.x,
                    other.y,
                    other.rotation,
                ) else {
                    continue;
                };

                let new_seg = seg(a, b);
                for ws in ctx.existing_segments {
                    if ws.net_id == edge.net_id {
                        continue;
                    }
                    if seg_crosses_seg(&new_seg, &seg(ws.a, ws.b)) {
                        crossings += 1;
                    }
                }
            }
        }
        score -= f64::from(crossings) * W_CROSSING;
    }

    // 7. Pin collocation: pins that pass the hard minimum but still crowd
    // foreign pins get penalised, a defence against wall-hugging clusters.
    let crowding_dist = ctx.rules.min_pin_clearance_mm() * PIN_CROWDING_FACTOR;
    let crowding_sq = crowding_dist * crowding_dist;
    let mut crowded_pairs = 0;
    for pin in &cand.cat.pins {
        let w = pin_world_xy(pin.position_mm, cand.cx, cand.cy, cand.rotation);
        for p in ctx.placed {
            if let Some(other_pins) = ctx.placed_pin_positions.get(&p.instance_id) {
                for op in other_pins {
                    if w.dist2(*op) < crowding_sq {
                        crowded_pairs += 1;
                    }
                }
            }
        }
    }
    score -= f64::from(crowded_pairs) * W_PIN_COLLOCATION;

    score
}
