use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::model::primitive::{pti, PtI};
use crate::route::grid::{CellState, RoutingGrid};

// A* Manhattan routing over the grid, with a turn penalty to bias toward
// long straight runs. Returning None is a first-class non-error signal.

// Manhattan directions: (dx, dy).
const DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

const NO_DIR: i8 = -1;
const NO_PARENT: i32 = -1;

// A search state in the priority queue. The counter breaks f-score ties in
// insertion order so exploration stays deterministic.
#[derive(Debug, Clone, Copy)]
struct State {
    f: i32,
    counter: u32,
    cell: PtI,
    dir: i8,
    parent_key: i32,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.counter == other.counter
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: BinaryHeap is a max-heap by default.
        other.f.cmp(&self.f).then_with(|| other.counter.cmp(&self.counter))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn key_of(grid: &RoutingGrid, p: PtI) -> i32 {
    p.y * grid.width() + p.x
}

fn cell_of(grid: &RoutingGrid, key: i32) -> PtI {
    pti(key % grid.width(), key / grid.width())
}

fn reconstruct(grid: &RoutingGrid, parents: &HashMap<i32, (i32, i8)>, terminal: PtI) -> Vec<PtI> {
    let mut path = vec![terminal];
    let mut k = key_of(grid, terminal);
    while let Some(&(pk, _)) = parents.get(&k) {
        if pk < 0 {
            break;
        }
        path.push(cell_of(grid, pk));
        k = pk;
    }
    path.reverse();
    path
}

// Point-to-point A*. Returns the list of grid cells from source to sink,
// or None if no path exists. The source and sink cells may be stepped onto
// even if blocked (they are pad cells), but another net's trace is never
// traversable.
pub fn find_path(
    grid: &RoutingGrid,
    source: PtI,
    sink: PtI,
    turn_penalty: i32,
) -> Option<Vec<PtI>> {
    if !grid.in_bounds(source) || !grid.in_bounds(sink) {
        return None;
    }
    // Reject endpoints occupied by another net's trace.
    if grid.is_trace_path(source) || grid.is_trace_path(sink) {
        return None;
    }
    if source == sink {
        return Some(vec![source]);
    }

    // Fast path: one-bend L-shaped probes before the full search.
    if let Some(path) = try_l_route(grid, source, sink) {
        return Some(path);
    }

    let start_key = key_of(grid, source);
    let sink_key = key_of(grid, sink);

    let mut counter: u32 = 0;
    let mut heap = BinaryHeap::new();
    heap.push(State {
        f: source.manhattan_dist(sink),
        counter,
        cell: source,
        dir: NO_DIR,
        parent_key: NO_PARENT,
    });
    let mut g_scores: HashMap<i32, i32> = HashMap::new();
    g_scores.insert(start_key, 0);
    let mut parents: HashMap<i32, (i32, i8)> = HashMap::new();
    let mut closed: HashSet<i32> = HashSet::new();

    while let Some(s) = heap.pop() {
        let key = key_of(grid, s.cell);
        if !closed.insert(key) {
            continue;
        }
        if key != start_key {
            parents.insert(key, (s.parent_key, s.dir));
        }

        if key == sink_key {
            return Some(reconstruct(grid, &parents, s.cell));
        }

        let cur_g = g_scores[&key];
        for (d, (dx, dy)) in DIRS.iter().enumerate() {
            let n = pti(s.cell.x + dx, s.cell.y + dy);
            if !grid.in_bounds(n) {
                continue;
            }
            let nkey = key_of(grid, n);
            if closed.contains(&nkey) {
                continue;
            }
            match grid.state(n) {
                Some(CellState::Free) => {}
                Some(CellState::TracePath) => continue,
                // Blocked cells are enterable only at the endpoints.
                _ if n == sink || n == source => {}
                _ => continue,
            }

            let is_turn = s.dir != NO_DIR && s.dir != d as i8;
            let cost = 1 + if is_turn { turn_penalty } else { 0 };
            let tentative_g = cur_g + cost;
            if g_scores.get(&nkey).map_or(true, |&g| tentative_g < g) {
                g_scores.insert(nkey, tentative_g);
                counter += 1;
                heap.push(State {
                    f: tentative_g + n.manhattan_dist(sink),
                    counter,
                    cell: n,
                    dir: d as i8,
                    parent_key: key,
                });
            }
        }
    }

    None
}

// A* from source cell(s) to any cell of an existing routing tree. Used for
// multi-pin nets: multi-source search from the whole sub-tree prevents
// parallel duplicate traces when bridging two sub-trees.
//
// With allow_crossings, temporarily-blocked cells can be traversed at a
// heavy additive penalty; this is how the rip-up loop discovers which nets
// are in the way. Permanently-blocked cells and other nets' trace cells
// stay impassable.
pub fn find_path_to_tree(
    grid: &RoutingGrid,
    sources: &HashSet<PtI>,
    tree: &HashSet<PtI>,
    turn_penalty: i32,
    allow_crossings: bool,
    crossing_penalty: i32,
) -> Option<Vec<PtI>> {
    if tree.is_empty() {
        return None;
    }
    if let Some(&cell) = sources.intersection(tree).next() {
        return Some(vec![cell]);
    }

    let tree_cells: Vec<PtI> = tree.iter().copied().collect();
    let min_h = |p: PtI| -> i32 {
        let mut best = i32::MAX;
        for t in &tree_cells {
            let d = p.manhattan_dist(*t);
            if d < best {
                best = d;
                if d == 0 {
                    break;
                }
            }
        }
        best
    };
    let tree_keys: HashSet<i32> = tree.iter().map(|&t| key_of(grid, t)).collect();

    let mut counter: u32 = 0;
    let mut heap = BinaryHeap::new();
    let mut g_scores: HashMap<i32, i32> = HashMap::new();
    let mut source_keys: HashSet<i32> = HashSet::new();

    for &s in sources {
        if !grid.in_bounds(s) {
            continue;
        }
        // Skip sources on another net's trace or permanently blocked.
        match grid.state(s) {
            Some(CellState::TracePath) | Some(CellState::PermBlocked) => continue,
            _ => {}
        }
        let skey = key_of(grid, s);
        source_keys.insert(skey);
        g_scores.insert(skey, 0);
        heap.push(State { f: min_h(s), counter, cell: s, dir: NO_DIR, parent_key: NO_PARENT });
        counter += 1;
    }

    if heap.is_empty() {
        return None;
    }

    let mut parents: HashMap<i32, (i32, i8)> = HashMap::new();
    let mut closed: HashSet<i32> = HashSet::new();

    while let Some(s) = heap.pop() {
        let key = key_of(grid, s.cell);
        if !closed.insert(key) {
            continue;
        }
        if !source_keys.contains(&key) {
            parents.insert(key, (s.parent_key, s.dir));
        }

        if tree_keys.contains(&key) {
            return Some(reconstruct(grid, &parents, s.cell));
        }

        let cur_g = g_scores[&key];
        for (d, (dx, dy)) in DIRS.iter().enumerate() {
            let n = pti(s.cell.x + dx, s.cell.y + dy);
            if !grid.in_bounds(n) {
                continue;
            }
            let nkey = key_of(grid, n);
            if closed.contains(&nkey) {
                continue;
            }

            let is_tree_cell = tree_keys.contains(&nkey);
            let state = grid.state(n);
            let cell_free = state == Some(CellState::Free);

            // Never cross an existing trace, even in crossing-aware mode.
            if !cell_free && !is_tree_cell {
                match state {
                    Some(CellState::TracePath) => continue,
                    Some(CellState::PermBlocked) => continue,
                    _ if !allow_crossings => continue,
                    _ => {}
                }
            }

            let is_turn = s.dir != NO_DIR && s.dir != d as i8;
            let mut cost = 1 + if is_turn { turn_penalty } else { 0 };
            if !cell_free && !is_tree_cell {
                cost += crossing_penalty;
            }
            let tentative_g = cur_g + cost;
            if g_scores.get(&nkey).map_or(true, |&g| tentative_g < g) {
                g_scores.insert(nkey, tentative_g);
                counter += 1;
                heap.push(State {
                    f: tentative_g + min_h(n),
                    counter,
                    cell: n,
                    dir: d as i8,
                    parent_key: key,
                });
            }
        }
    }

    None
}

// Fast L-shaped (one-bend) probe: horizontal-then-vertical, then
// vertical-then-horizontal. Succeeds only when every intermediate cell is
// free (the endpoints themselves may be blocked pad cells).
fn try_l_route(grid: &RoutingGrid, source: PtI, sink: PtI) -> Option<Vec<PtI>> {
    for h_first in [true, false] {
        if let Some(path) = l_route(grid, source, sink, h_first) {
            return Some(path);
        }
    }
    None
}

fn l_route(grid: &RoutingGrid, source: PtI, sink: PtI, horizontal_first: bool) -> Option<Vec<PtI>> {
    let mut path = vec![source];
    let mut cur = source;

    let walk = |cur: &mut PtI, path: &mut Vec<PtI>, dx: i32, dy: i32, target: i32| -> bool {
        loop {
            let v = if dx != 0 { cur.x } else { cur.y };
            if v == target {
                return true;
            }
            let n = pti(cur.x + dx, cur.y + dy);
            if !grid.in_bounds(n) {
                return false;
            }
            match grid.state(n) {
                Some(CellState::Free) => {}
                Some(CellState::TracePath) => return false,
                _ if n == sink => {}
                _ => return false,
            }
            path.push(n);
            *cur = n;
        }
    };

    if horizontal_first {
        let dx = if sink.x > source.x { 1 } else { -1 };
        if !walk(&mut cur, &mut path, dx, 0, sink.x) {
            return None;
        }
        let dy = if sink.y > source.y { 1 } else { -1 };
        if !walk(&mut cur, &mut path, 0, dy, sink.y) {
            return None;
        }
    } else {
        let dy = if sink.y > source.y { 1 } else { -1 };
        if !walk(&mut cur, &mut path, 0, dy, sink.y) {
            return None;
        }
        let dx = if sink.x > source.x { 1 } else { -1 };
        if !walk(&mut cur, &mut path, dx, 0, sink.x) {
            return None;
        }
    }

    Some(path)
}
