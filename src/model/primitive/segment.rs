use derive_more::Display;

use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;

#[derive(Debug, Default, PartialEq, Copy, Clone, Display)]
#[display(fmt = "Seg[{}, {}]", st, en)]
pub struct Segment {
    st: Pt,
    en: Pt,
}

impl Segment {
    pub const fn new(st: Pt, en: Pt) -> Self {
        Self { st, en }
    }

    pub const fn st(&self) -> Pt {
        self.st
    }

    pub const fn en(&self) -> Pt {
        self.en
    }

    pub fn dir(&self) -> Pt {
        self.en - self.st
    }

    pub fn bounds(&self) -> Rt {
        Rt::enclosing(self.st, self.en)
    }
}
