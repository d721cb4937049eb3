use crate::model::catalog::{Body, Component};
use crate::model::geom::distance::poly_edge_dist;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{pt, Pt};

// Footprint geometry under the four placement rotations. Rotations are
// integer degrees, so the trig values are tabulated.

pub const ROTATIONS: [i32; 4] = [0, 90, 180, 270];

// (cos, sin) for 0, 90, 180, 270 degrees.
const ROT_TABLE: [(f64, f64); 4] = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];

fn rot_cos_sin(rotation_deg: i32) -> (f64, f64) {
    let idx = (rotation_deg.rem_euclid(360) / 90) as usize % 4;
    ROT_TABLE[idx]
}

// Rotate a component-local offset by a placement rotation.
pub fn rotate_offset(local: Pt, rotation_deg: i32) -> Pt {
    let (cos_r, sin_r) = rot_cos_sin(rotation_deg);
    pt(local.x * cos_r - local.y * sin_r, local.x * sin_r + local.y * cos_r)
}

// Transform a component-local pin position to world coordinates.
pub fn pin_world_xy(pin_local: Pt, cx: f64, cy: f64, rotation_deg: i32) -> Pt {
    let r = rotate_offset(pin_local, rotation_deg);
    pt(cx + r.x, cy + r.y)
}

// (half_width, half_height) of the body at a given rotation. Rect bodies
// swap width/length at 90 and 270; circles are rotation-invariant.
pub fn body_half_dims(body: &Body, rotation_deg: i32) -> (f64, f64) {
    match *body {
        Body::Circle { diameter_mm, .. } => {
            let r = diameter_mm / 2.0;
            (r, r)
        }
        Body::Rect { width_mm, length_mm, .. } => {
            let hw = width_mm / 2.0;
            let hh = length_mm / 2.0;
            if rotation_deg.rem_euclid(360) == 90 || rotation_deg.rem_euclid(360) == 270 {
                (hh, hw)
            } else {
                (hw, hh)
            }
        }
    }
}

// Footprint area in mm^2, used for placement ordering.
pub fn footprint_area(body: &Body) -> f64 {
    match *body {
        Body::Circle { diameter_mm, .. } => {
            let r = diameter_mm / 2.0;
            std::f64::consts::PI * r * r
        }
        Body::Rect { width_mm, length_mm, .. } => width_mm * length_mm,
    }
}

// (half_width, half_height) of the component envelope: the body extent
// extended by every rotated pin offset inflated by |pad_radius|, so overlap
// checks reflect the space actually claimed by routable pads.
pub fn envelope_half_dims(cat: &Component, rotation_deg: i32, pad_radius: f64) -> (f64, f64) {
    let (mut hw, mut hh) = body_half_dims(&cat.body, rotation_deg);
    for pin in &cat.pins {
        let r = rotate_offset(pin.position_mm, rotation_deg);
        hw = hw.max(r.x.abs() + pad_radius);
        hh = hh.max(r.y.abs() + pad_radius);
    }
    (hw, hh)
}

// Chebyshev gap between two AABBs: the minimum separation between their
// edges, negative when overlapping. Conservative and cheap compared to the
// true Euclidean corner gap.
pub fn aabb_gap(
    cx1: f64,
    cy1: f64,
    hw1: f64,
    hh1: f64,
    cx2: f64,
    cy2: f64,
    hw2: f64,
    hh2: f64,
) -> f64 {
    let gap_x = (cx1 - cx2).abs() - hw1 - hw2;
    let gap_y = (cy1 - cy2).abs() - hh1 - hh2;
    gap_x.max(gap_y)
}

// Default spacing for perimeter sampling; catches concavities that a
// 4-corner check would miss.
const PERIMETER_SAMPLE_SPACING_MM: f64 = 4.0;

// Dense perimeter samples of an axis-aligned rectangle: corners plus enough
// intermediate points that no two adjacent samples are further apart than
// the spacing.
pub fn rect_perimeter_samples(cx: f64, cy: f64, hw: f64, hh: f64) -> Vec<Pt> {
    let w = hw * 2.0;
    let h = hh * 2.0;
    let nx = ((w / PERIMETER_SAMPLE_SPACING_MM).ceil() as usize + 1).max(2);
    let ny = ((h / PERIMETER_SAMPLE_SPACING_MM).ceil() as usize + 1).max(2);
    let mut pts = Vec::with_capacity(2 * (nx + ny));
    for i in 0..nx {
        let t = i as f64 / (nx - 1) as f64;
        let x = cx - hw + w * t;
        pts.push(pt(x, cy - hh));
        pts.push(pt(x, cy + hh));
    }
    for j in 1..ny.saturating_sub(1) {
        let t = j as f64 / (ny - 1) as f64;
        let y = cy - hh + h * t;
        pts.push(pt(cx - hw, y));
        pts.push(pt(cx + hw, y));
    }
    pts
}

// Minimum distance from the rectangle perimeter to the polygon boundary.
pub fn rect_edge_clearance(cx: f64, cy: f64, hw: f64, hh: f64, outline: &Poly) -> f64 {
    rect_perimeter_samples(cx, cy, hw, hh)
        .into_iter()
        .map(|p| poly_edge_dist(outline, p))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use approx::assert_relative_eq;

    use super::*;
    use crate::model::catalog::{Mounting, MountingStyle, Pin, PinDirection};
    use crate::model::primitive::poly;

    fn rect_component(width: f64, length: f64, pins: Vec<Pin>) -> Component {
        Component {
            id: "test".to_owned(),
            name: "test".to_owned(),
            description: String::new(),
            ui_placement: false,
            body: Body::Rect { width_mm: width, length_mm: length, height_mm: 3.0 },
            mounting: Mounting {
                style: MountingStyle::Internal,
                allowed_styles: vec![MountingStyle::Internal],
                blocks_routing: false,
                keepout_margin_mm: 1.0,
            },
            pins,
            internal_nets: vec![],
            pin_groups: vec![],
            configurable: HashMap::new(),
        }
    }

    fn bidi_pin(id: &str, x: f64, y: f64) -> Pin {
        Pin {
            id: id.to_owned(),
            label: id.to_owned(),
            position_mm: pt(x, y),
            direction: PinDirection::Bidirectional,
            hole_diameter_mm: 0.8,
        }
    }

    #[test]
    fn test_body_half_dims_rect_swaps() {
        let body = Body::Rect { width_mm: 6.0, length_mm: 10.0, height_mm: 3.0 };
        assert_eq!(body_half_dims(&body, 0), (3.0, 5.0));
        assert_eq!(body_half_dims(&body, 90), (5.0, 3.0));
        assert_eq!(body_half_dims(&body, 180), (3.0, 5.0));
        assert_eq!(body_half_dims(&body, 270), (5.0, 3.0));
    }

    #[test]
    fn test_body_half_dims_circle_invariant() {
        let body = Body::Circle { diameter_mm: 8.0, height_mm: 5.0 };
        for rot in ROTATIONS {
            assert_eq!(body_half_dims(&body, rot), (4.0, 4.0));
        }
    }

    #[test]
    fn test_pin_world_xy() {
        let w = pin_world_xy(pt(3.0, 4.0), 10.0, 20.0, 0);
        assert_relative_eq!(w.x, 13.0);
        assert_relative_eq!(w.y, 24.0);

        let w = pin_world_xy(pt(3.0, 0.0), 10.0, 20.0, 90);
        assert_relative_eq!(w.x, 10.0);
        assert_relative_eq!(w.y, 23.0);

        let w = pin_world_xy(pt(3.0, 0.0), 10.0, 20.0, 180);
        assert_relative_eq!(w.x, 7.0);
        assert_relative_eq!(w.y, 20.0);
    }

    #[test]
    fn test_envelope_covers_pins() {
        // Axial resistor: 6.5x2.5 body, leads extending to +-5.0.
        let cat = rect_component(6.5, 2.5, vec![bidi_pin("1", -5.0, 0.0), bidi_pin("2", 5.0, 0.0)]);
        let (hw, hh) = envelope_half_dims(&cat, 0, 1.0);
        assert_relative_eq!(hw, 6.0); // 5.0 + 1.0 pad radius
        assert!(hh >= 1.25);

        // At 90 degrees the axes swap.
        let (hw90, hh90) = envelope_half_dims(&cat, 90, 1.0);
        assert_relative_eq!(hh90, 6.0);
        assert!(hw90 >= 1.25);
    }

    #[test]
    fn test_aabb_gap() {
        assert_relative_eq!(aabb_gap(0.0, 0.0, 1.0, 1.0, 6.0, 0.0, 1.0, 1.0), 4.0);
        assert_relative_eq!(aabb_gap(0.0, 0.0, 1.0, 1.0, 2.0, 0.0, 1.0, 1.0), 0.0);
        assert!(aabb_gap(0.0, 0.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0) < 0.0);
    }

    #[test]
    fn test_rect_edge_clearance() {
        let sq = poly(&[pt(0.0, 0.0), pt(30.0, 0.0), pt(30.0, 80.0), pt(0.0, 80.0)]);
        let d = rect_edge_clearance(15.0, 40.0, 5.0, 5.0, &sq);
        assert_relative_eq!(d, 10.0);
        let d = rect_edge_clearance(5.0, 40.0, 4.0, 4.0, &sq);
        assert_relative_eq!(d, 1.0);
    }

    #[test]
    fn test_footprint_area() {
        assert_relative_eq!(
            footprint_area(&Body::Rect { width_mm: 4.0, length_mm: 5.0, height_mm: 1.0 }),
            20.0
        );
        assert_relative_eq!(
            footprint_area(&Body::Circle { diameter_mm: 2.0, height_mm: 1.0 }),
            std::f64::consts::PI
        );
    }
}
