use std::collections::HashSet;

use crate::model::geom::contains::eroded_poly_contains_pt;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{pt, pti, Pt, PtI};
use crate::model::rules::TraceRules;

// Discretized routing grid covering the bounding box of the outline
// polygon. Cells outside the polygon (plus edge clearance) are permanently
// blocked. Routing-blocked component bodies get permanent blocks; routed
// traces get temporary blocks that can be cleared for rip-up.
//
// The cell array is a flat byte-sized vector addressed by y * width + x, so
// snapshot is a single allocation + copy and restore a single in-place
// write.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum CellState {
    Free = 0,
    Blocked = 1,
    PermBlocked = 2,
    // Occupied by an actual trace, not just clearance.
    TracePath = 3,
}

#[derive(Debug, Clone)]
pub struct RoutingGrid {
    resolution: f64,
    edge_clearance: f64,
    origin: Pt,
    width: i32,
    height: i32,
    cells: Vec<CellState>,
    // Pin pad cells that trace clearance must not re-block. Traces can
    // still pass through protected cells; block_trace skips them so nearby
    // pads stay reachable. Only grown during grid construction.
    protected: HashSet<PtI>,
    // Default clearance radius for block_trace / free_trace, in cells.
    trace_clearance_cells: i32,
    outline: Poly,
}

impl RoutingGrid {
    pub fn new(outline: &Poly, rules: &TraceRules) -> Self {
        let resolution = rules.grid_resolution_mm;
        let edge_clearance = rules.edge_clearance_mm;
        let bounds = *outline.bounds();
        let width = (bounds.w() / resolution).ceil() as i32 + 1;
        let height = (bounds.h() / resolution).ceil() as i32 + 1;

        let trace_clearance_cells = ((rules.trace_width_mm / 2.0 + rules.trace_clearance_mm)
            / resolution)
            .ceil()
            .max(1.0) as i32;

        let mut grid = Self {
            resolution,
            edge_clearance,
            origin: bounds.bl(),
            width,
            height,
            cells: vec![CellState::Free; (width * height) as usize],
            protected: HashSet::new(),
            trace_clearance_cells,
            outline: outline.clone(),
        };

        // Permanently block every cell whose centre falls outside the
        // outline shrunk by the edge clearance.
        for gy in 0..height {
            for gx in 0..width {
                let w = grid.grid_to_world(pti(gx, gy));
                if !eroded_poly_contains_pt(outline, w, edge_clearance) {
                    grid.cells[(gy * width + gx) as usize] = CellState::PermBlocked;
                }
            }
        }

        grid
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    pub const fn edge_clearance(&self) -> f64 {
        self.edge_clearance
    }

    pub const fn outline(&self) -> &Poly {
        &self.outline
    }

    pub const fn trace_clearance_cells(&self) -> i32 {
        self.trace_clearance_cells
    }

    fn idx(&self, p: PtI) -> usize {
        (p.y * self.width + p.x) as usize
    }

    // Coordinate conversion.

    // World mm to grid cell, clamped to bounds.
    pub fn world_to_grid(&self, w: Pt) -> PtI {
        let gx = ((w.x - self.origin.x) / self.resolution - 0.5).round() as i32;
        let gy = ((w.y - self.origin.y) / self.resolution - 0.5).round() as i32;
        pti(gx.clamp(0, self.width - 1), gy.clamp(0, self.height - 1))
    }

    // Grid cell to world mm (cell centre).
    pub fn grid_to_world(&self, g: PtI) -> Pt {
        pt(
            self.origin.x + (g.x as f64 + 0.5) * self.resolution,
            self.origin.y + (g.y as f64 + 0.5) * self.resolution,
        )
    }

    // Cell queries.

    pub fn in_bounds(&self, p: PtI) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    pub fn state(&self, p: PtI) -> Option<CellState> {
        self.in_bounds(p).then(|| self.cells[self.idx(p)])
    }

    pub fn is_free(&self, p: PtI) -> bool {
        self.state(p) == Some(CellState::Free)
    }

    // Out-of-bounds counts as blocked.
    pub fn is_blocked(&self, p: PtI) -> bool {
        !self.is_free(p)
    }

    pub fn is_permanently_blocked(&self, p: PtI) -> bool {
        self.state(p).map_or(true, |s| s == CellState::PermBlocked)
    }

    pub fn is_trace_path(&self, p: PtI) -> bool {
        self.state(p) == Some(CellState::TracePath)
    }

    pub fn is_protected(&self, p: PtI) -> bool {
        self.protected.contains(&p)
    }

    // Cell mutation.

    // Temporarily block a cell; only FREE cells change.
    pub fn block_cell(&mut self, p: PtI) {
        if self.in_bounds(p) {
            let i = self.idx(p);
            if self.cells[i] == CellState::Free {
                self.cells[i] = CellState::Blocked;
            }
        }
    }

    pub fn permanently_block_cell(&mut self, p: PtI) {
        if self.in_bounds(p) {
            let i = self.idx(p);
            self.cells[i] = CellState::PermBlocked;
        }
    }

    // Free a temporarily-blocked cell; permanent blocks are untouched.
    pub fn free_cell(&mut self, p: PtI) {
        if self.in_bounds(p) {
            let i = self.idx(p);
            if self.cells[i] == CellState::Blocked {
                self.cells[i] = CellState::Free;
            }
        }
    }

    // Force a cell to FREE, whatever its state. Used to keep component pin
    // positions reachable even when the body blocks routing.
    pub fn force_free_cell(&mut self, p: PtI) {
        if self.in_bounds(p) {
            let i = self.idx(p);
            self.cells[i] = CellState::Free;
        }
    }

    pub fn protect_cell(&mut self, p: PtI) {
        if self.in_bounds(p) {
            self.protected.insert(p);
        }
    }

    // Area blocking.

    // Block all cells whose centres fall inside a world-space rectangle.
    pub fn block_rect_world(&mut self, centre: Pt, half_w: f64, half_h: f64, permanent: bool) {
        let gx_min = (((centre.x - half_w) - self.origin.x) / self.resolution).floor() as i32;
        let gx_max = (((centre.x + half_w) - self.origin.x) / self.resolution).ceil() as i32;
        let gy_min = (((centre.y - half_h) - self.origin.y) / self.resolution).floor() as i32;
        let gy_max = (((centre.y + half_h) - self.origin.y) / self.resolution).ceil() as i32;

        for gy in gy_min.max(0)..=gy_max.min(self.height - 1) {
            for gx in gx_min.max(0)..=gx_max.min(self.width - 1) {
                if permanent {
                    self.permanently_block_cell(pti(gx, gy));
                } else {
                    self.block_cell(pti(gx, gy));
                }
            }
        }
    }

    // Block cells along a trace path, including the clearance radius. The
    // path cells themselves are always marked TracePath: the physical
    // trace is there and no other net may use them. Clearance-zone cells
    // become Blocked, but protected pin-pad cells are skipped so other
    // nets can still reach their pads.
    pub fn block_trace(&mut self, path: &[PtI]) {
        let r = self.trace_clearance_cells;
        let path_set: HashSet<PtI> = path.iter().copied().collect();

        for &p in &path_set {
            if self.in_bounds(p) {
                let i = self.idx(p);
                if self.cells[i] == CellState::Free || self.cells[i] == CellState::Blocked {
                    self.cells[i] = CellState::TracePath;
                }
            }
        }

        for &p in path {
            for dy in -r..=r {
                for dx in -r..=r {
                    let n = pti(p.x + dx, p.y + dy);
                    if !path_set.contains(&n) && !self.protected.contains(&n) {
                        self.block_cell(n);
                    }
                }
            }
        }
    }

    // Free cells along a trace path, for rip-up: both the TracePath cells
    // and the Blocked clearance zone. Permanently-blocked cells are never
    // touched.
    pub fn free_trace(&mut self, path: &[PtI]) {
        let r = self.trace_clearance_cells;
        for &p in path {
            for dy in -r..=r {
                for dx in -r..=r {
                    let n = pti(p.x + dx, p.y + dy);
                    if self.in_bounds(n) {
                        let i = self.idx(n);
                        if self.cells[i] == CellState::Blocked
                            || self.cells[i] == CellState::TracePath
                        {
                            self.cells[i] = CellState::Free;
                        }
                    }
                }
            }
        }
    }

    // Snapshot / restore for rip-up rollback.

    pub fn snapshot(&self) -> Vec<CellState> {
        self.cells.clone()
    }

    pub fn restore(&mut self, snap: &[CellState]) {
        self.cells.copy_from_slice(snap);
    }

    // Cell-state counts for diagnostic logging: (free, blocked, perm,
    // trace).
    pub fn stats(&self) -> (usize, usize, usize, usize) {
        let mut counts = [0usize; 4];
        for c in &self.cells {
            counts[*c as usize] += 1;
        }
        (counts[0], counts[1], counts[2], counts[3])
    }

    pub fn free_pct(&self) -> f64 {
        let (free, ..) = self.stats();
        free as f64 / self.cells.len() as f64 * 100.0
    }
}
