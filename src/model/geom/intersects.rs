use crate::model::geom::math::{cross_at, eq, ge, le, pt_eq, EP};
use crate::model::primitive::point::Pt;
use crate::model::primitive::segment::Segment;

// Check if point |q| lies on segment |p|-|r|, assuming collinearity.
fn on_segment(p: Pt, q: Pt, r: Pt) -> bool {
    ge(q.x, p.x.min(r.x)) && le(q.x, p.x.max(r.x)) && ge(q.y, p.y.min(r.y)) && le(q.y, p.y.max(r.y))
}

// Returns true iff |a| and |b| properly intersect. Segments that share an
// endpoint are NOT considered crossing; collinear overlap is. Used during
// placement scoring to detect net crossings that would make single-layer
// routing impossible.
pub fn seg_crosses_seg(a: &Segment, b: &Segment) -> bool {
    let (p1, p2) = (a.st(), a.en());
    let (p3, p4) = (b.st(), b.en());

    // Shared-endpoint check: touching is fine, not a crossing.
    for ea in [p1, p2] {
        for eb in [p3, p4] {
            if pt_eq(ea, eb) {
                return false;
            }
        }
    }

    let d1 = cross_at(p3, p4, p1);
    let d2 = cross_at(p3, p4, p2);
    let d3 = cross_at(p1, p2, p3);
    let d4 = cross_at(p1, p2, p4);

    // Standard proper-intersection test.
    if ((d1 > EP && d2 < -EP) || (d1 < -EP && d2 > EP))
        && ((d3 > EP && d4 < -EP) || (d3 < -EP && d4 > EP))
    {
        return true;
    }

    // Collinear overlap checks.
    if eq(d1, 0.0) && on_segment(p3, p1, p4) {
        return true;
    }
    if eq(d2, 0.0) && on_segment(p3, p2, p4) {
        return true;
    }
    if eq(d3, 0.0) && on_segment(p1, p3, p2) {
        return true;
    }
    if eq(d4, 0.0) && on_segment(p1, p4, p2) {
        return true;
    }

    false
}
