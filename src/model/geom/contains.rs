use crate::model::geom::distance::poly_edge_dist;
use crate::model::geom::intersects::seg_crosses_seg;
use crate::model::geom::math::{cross_at, ge, lt};
use crate::model::primitive::point::Pt;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::rect::Rt;
use crate::model::primitive::seg;

// Winding number test. Looks at a horizontal line at b.y and counts
// crossings of edges from |a|. Points on the boundary count as contained.
// Works for either winding direction.
pub fn poly_contains_pt(a: &Poly, b: Pt) -> bool {
    if !a.bounds().contains(b) {
        return false;
    }

    let mut winding = 0;
    for (p0, p1) in a.edges() {
        // Treat points at b.y as slightly above it.
        if ge(p0.y, b.y) {
            // Downward crossing edge with |b| to the right of it decreases
            // winding number.
            if lt(p1.y, b.y) && lt(cross_at(p0, p1, b), 0.0) {
                winding -= 1;
            }
        } else if ge(p1.y, b.y) && ge(cross_at(p0, p1, b), 0.0) {
            // Upward crossing edge with |b| to the left of it increases
            // winding number.
            winding += 1;
        }
    }
    winding != 0
}

// Membership in the polygon eroded by |inset| (Minkowski erosion by a
// disk): true iff a disk of radius |inset| centred on |b| fits entirely
// inside |a|. The disk fits exactly when |b| is inside and its distance to
// the boundary is at least |inset|; the nearest point of the complement
// always lies on an edge segment, so this holds for concave outlines too —
// a point squeezed into a notch narrower than 2*inset is within |inset| of
// one of the notch walls and is rejected.
pub fn eroded_poly_contains_pt(a: &Poly, b: Pt, inset: f64) -> bool {
    poly_contains_pt(a, b) && ge(poly_edge_dist(a, b), inset)
}

// Exact AABB-in-polygon test: all four corners contained and no polygon
// edge crossing a rectangle edge. The edge check matters for concave
// outlines that can cut through the interior of a corner-inscribed box.
pub fn poly_contains_rt(a: &Poly, b: &Rt) -> bool {
    if !a.bounds().contains_rt(b) {
        return false;
    }

    for p in b.pts() {
        if !poly_contains_pt(a, p) {
            return false;
        }
    }
    for (p0, p1) in a.edges() {
        let e = seg(p0, p1);
        for rs in b.segs() {
            if seg_crosses_seg(&e, &rs) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitive::{poly, pt, rt};

    fn square() -> Poly {
        poly(&[pt(0.0, 0.0), pt(30.0, 0.0), pt(30.0, 80.0), pt(0.0, 80.0)])
    }

    // L-shaped outline: the notch cuts out the top-right quadrant.
    fn l_shape() -> Poly {
        poly(&[
            pt(0.0, 0.0),
            pt(20.0, 0.0),
            pt(20.0, 10.0),
            pt(10.0, 10.0),
            pt(10.0, 20.0),
            pt(0.0, 20.0),
        ])
    }

    #[test]
    fn test_poly_contains_pt() {
        let sq = square();
        assert!(poly_contains_pt(&sq, pt(15.0, 40.0)));
        assert!(!poly_contains_pt(&sq, pt(-1.0, 40.0)));
        assert!(!poly_contains_pt(&sq, pt(15.0, 81.0)));
    }

    #[test]
    fn test_poly_contains_pt_concave() {
        let l = l_shape();
        assert!(poly_contains_pt(&l, pt(5.0, 5.0)));
        assert!(poly_contains_pt(&l, pt(15.0, 5.0)));
        assert!(poly_contains_pt(&l, pt(5.0, 15.0)));
        // In the notch.
        assert!(!poly_contains_pt(&l, pt(15.0, 15.0)));
    }

    #[test]
    fn test_eroded_poly_contains_pt() {
        let sq = square();
        assert!(eroded_poly_contains_pt(&sq, pt(15.0, 40.0), 5.0));
        // 1 mm from the left wall: fails a 1.5 mm erosion, passes 0.5 mm.
        assert!(!eroded_poly_contains_pt(&sq, pt(1.0, 40.0), 1.5));
        assert!(eroded_poly_contains_pt(&sq, pt(1.0, 40.0), 0.5));
        // Outside points are never in the eroded polygon.
        assert!(!eroded_poly_contains_pt(&sq, pt(-3.0, 40.0), 0.5));
    }

    #[test]
    fn test_eroded_poly_contains_pt_concave_slot() {
        // Square with a 2 mm wide slot cut down from the top edge. Points
        // near the slot are squeezed between edges that are not the outer
        // walls.
        let slotted = poly(&[
            pt(0.0, 0.0),
            pt(20.0, 0.0),
            pt(20.0, 20.0),
            pt(11.0, 20.0),
            pt(11.0, 8.0),
            pt(9.0, 8.0),
            pt(9.0, 20.0),
            pt(0.0, 20.0),
        ]);
        // Below the slot tip: 2 mm from the slot bottom is the nearest
        // boundary, not the outer walls.
        assert!(eroded_poly_contains_pt(&slotted, pt(10.0, 6.0), 1.5));
        assert!(!eroded_poly_contains_pt(&slotted, pt(10.0, 6.0), 2.5));
        // Beside the slot: 1 mm from the slot wall.
        assert!(eroded_poly_contains_pt(&slotted, pt(8.0, 14.0), 0.5));
        assert!(!eroded_poly_contains_pt(&slotted, pt(8.0, 14.0), 1.5));
        // Inside the slot itself (outside the polygon).
        assert!(!eroded_poly_contains_pt(&slotted, pt(10.0, 14.0), 0.5));
    }

    #[test]
    fn test_poly_contains_rt() {
        let sq = square();
        assert!(poly_contains_rt(&sq, &rt(10.0, 35.0, 20.0, 45.0)));
        assert!(!poly_contains_rt(&sq, &rt(-4.0, -4.0, 6.0, 6.0)));
        assert!(!poly_contains_rt(&sq, &rt(23.0, 35.0, 33.0, 45.0)));
    }

    #[test]
    fn test_poly_contains_rt_concave() {
        let l = l_shape();
        assert!(!poly_contains_rt(&l, &rt(5.0, 5.0, 18.0, 18.0)));
        assert!(poly_contains_rt(&l, &rt(1.0, 1.0, 9.0, 9.0)));
    }

    #[test]
    fn test_poly_contains_rt_spike() {
        // Square with a spike intruding from the top edge down to (15, 12).
        // A wide box whose corners all lie inside still crosses the spike.
        let spiked = poly(&[
            pt(0.0, 0.0),
            pt(30.0, 0.0),
            pt(30.0, 30.0),
            pt(18.0, 30.0),
            pt(15.0, 12.0),
            pt(12.0, 30.0),
            pt(0.0, 30.0),
        ]);
        assert!(!poly_contains_rt(&spiked, &rt(5.0, 5.0, 25.0, 20.0)));
        assert!(poly_contains_rt(&spiked, &rt(5.0, 2.0, 25.0, 10.0)));
    }
}
