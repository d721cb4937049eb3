use derive_more::Display;

use crate::model::geom::math::{ge, le, lt};
use crate::model::primitive::point::Pt;
use crate::model::primitive::segment::Segment;
use crate::model::primitive::{pt, rt, seg};

// Rt covers the range [l, r] x [b, t]. Empty rectangles have r < l or t < b.
#[derive(Debug, Copy, Clone, Display)]
#[display(fmt = "({}, {}, {}, {})", l, b, r, t)]
pub struct Rt {
    l: f64,
    b: f64,
    r: f64,
    t: f64,
}

impl Default for Rt {
    fn default() -> Self {
        Self::empty()
    }
}

impl Rt {
    pub const fn new(l: f64, b: f64, r: f64, t: f64) -> Self {
        Self { l, b, r, t }
    }

    pub const fn empty() -> Self {
        rt(0.0, 0.0, -1.0, -1.0)
    }

    pub fn is_empty(&self) -> bool {
        lt(self.r, self.l) || lt(self.t, self.b)
    }

    pub fn w(&self) -> f64 {
        self.r - self.l
    }

    pub fn h(&self) -> f64 {
        self.t - self.b
    }

    pub const fn l(&self) -> f64 {
        self.l
    }

    pub const fn b(&self) -> f64 {
        self.b
    }

    pub const fn r(&self) -> f64 {
        self.r
    }

    pub const fn t(&self) -> f64 {
        self.t
    }

    pub const fn bl(&self) -> Pt {
        pt(self.l, self.b)
    }

    pub const fn br(&self) -> Pt {
        pt(self.r, self.b)
    }

    pub const fn tl(&self) -> Pt {
        pt(self.l, self.t)
    }

    pub const fn tr(&self) -> Pt {
        pt(self.r, self.t)
    }

    pub const fn pts(&self) -> [Pt; 4] {
        [self.bl(), self.br(), self.tr(), self.tl()]
    }

    pub fn segs(&self) -> [Segment; 4] {
        [
            seg(self.bl(), self.br()),
            seg(self.br(), self.tr()),
            seg(self.tr(), self.tl()),
            seg(self.tl(), self.bl()),
        ]
    }

    pub fn center(&self) -> Pt {
        pt((self.l + self.r) / 2.0, (self.b + self.t) / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.w() * self.h()
    }

    pub fn contains(&self, p: Pt) -> bool {
        ge(p.x, self.l) && ge(p.y, self.b) && le(p.x, self.r) && le(p.y, self.t)
    }

    pub fn contains_rt(&self, o: &Rt) -> bool {
        ge(o.l, self.l) && ge(o.b, self.b) && le(o.r, self.r) && le(o.t, self.t)
    }

    pub fn united(&self, o: &Rt) -> Rt {
        if o.is_empty() {
            *self
        } else if self.is_empty() {
            *o
        } else {
            rt(self.l.min(o.l), self.b.min(o.b), self.r.max(o.r), self.t.max(o.t))
        }
    }

    pub fn inset(&self, dx: f64, dy: f64) -> Rt {
        let wsub = self.w().min(2.0 * dx) / 2.0;
        let hsub = self.h().min(2.0 * dy) / 2.0;
        rt(self.l + wsub, self.b + hsub, self.r - wsub, self.t - hsub)
    }

    pub fn enclosing(pa: Pt, pb: Pt) -> Rt {
        let l = pa.x.min(pb.x);
        let b = pa.y.min(pb.y);
        let r = pa.x.max(pb.x);
        let t = pa.y.max(pb.y);
        rt(l, b, r, t)
    }

    // Rectangle centred on |c| with the given half-dimensions.
    pub fn centred(c: Pt, hw: f64, hh: f64) -> Rt {
        rt(c.x - hw, c.y - hh, c.x + hw, c.y + hh)
    }
}

impl PartialEq for Rt {
    fn eq(&self, o: &Self) -> bool {
        self.tl() == o.tl() && self.br() == o.br()
    }
}
