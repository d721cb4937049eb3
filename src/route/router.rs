use std::collections::{HashMap, HashSet};
use std::time::Instant;

use itertools::Itertools;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::model::catalog::Catalog;
use crate::model::footprint::{body_half_dims, pin_world_xy};
use crate::model::geom::contains::poly_contains_pt;
use crate::model::geom::distance::poly_nearest_boundary_pt;
use crate::model::placement::FullPlacement;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{pt, pti, Pt, PtI};
use crate::model::routing::{RouterConfig, RoutingResult, Trace};
use crate::model::Id;
use crate::route::astar::{find_path, find_path_to_tree};
use crate::route::grid::RoutingGrid;
use crate::route::pins::{
    allocate_best_pin, build_pin_pools, copy_pools, pin_world_pos, resolve_pin_ref, NetPad,
    PinPools,
};

// Main routing engine: connects all net pins with single-layer Manhattan
// traces.
//
//   1. Build the routing grid (blocked: outside outline, routing-blocked
//      component bodies) and carve escape channels for trapped pins.
//   2. Resolve net pads; group references are allocated lazily from pin
//      pools to minimise trace length.
//   3. Route each net via A* (MST-guided Steiner tree for 3+ pin nets).
//   4. On failure, rip-up and reroute across random orderings, pruning
//      orderings that share a known-dead prefix.
//
// Routing failure is never an error; unroutable nets are reported in
// RoutingResult::failed_nets.

pub trait RouteStrategy {
    fn route(&mut self) -> RoutingResult;
}

// Convenience entry point used by the pipeline orchestrator.
pub fn route_traces(
    placement: &FullPlacement,
    catalog: &Catalog,
    config: &RouterConfig,
) -> RoutingResult {
    GridRouter::new(placement.clone(), catalog.clone(), config.clone()).route()
}

// Unresolved pin reference from the net list.
#[derive(Debug, Clone)]
struct PinRef {
    raw: String,
    instance_id: Id,
    pin_or_group: Id,
    is_group: bool,
}

type GridPath = Vec<PtI>;
type RoutedPaths = HashMap<Id, Vec<GridPath>>;

#[derive(Debug, Clone)]
pub struct GridRouter {
    placement: FullPlacement,
    catalog: Catalog,
    cfg: RouterConfig,
    pad_radius: i32,
    foreign_pin_radius: i32,
}

impl RouteStrategy for GridRouter {
    fn route(&mut self) -> RoutingResult {
        self.route_all()
    }
}

impl GridRouter {
    pub fn new(placement: FullPlacement, catalog: Catalog, cfg: RouterConfig) -> Self {
        let rules = cfg.rules;
        // Pad protection / freeing radius in cells.
        let pad_radius = ((rules.trace_width_mm / 2.0 + rules.trace_clearance_mm)
            / rules.grid_resolution_mm)
            .ceil()
            .max(1.0) as i32;
        // Blocking radius around foreign pins, so a trace with its physical
        // width can never overlap a pin pad it doesn't belong to.
        let foreign_pin_radius =
            (rules.trace_width_mm / rules.grid_resolution_mm).ceil().max(1.0) as i32;
        Self { placement, catalog, cfg, pad_radius, foreign_pin_radius }
    }

    fn route_all(&mut self) -> RoutingResult {
        let outline = self.placement.outline.polygon();

        info!(
            "Router: starting - {} components, {} nets, outline area={:.1} mm2",
            self.placement.components.len(),
            self.placement.nets.len(),
            outline.area()
        );
        info!(
            "Router config: grid={:.2}mm, trace_w={:.1}mm, clearance={:.1}mm, edge_clr={:.1}mm, \
             time_budget={:.0}s, max_attempts={}",
            self.cfg.rules.grid_resolution_mm,
            self.cfg.rules.trace_width_mm,
            self.cfg.rules.trace_clearance_mm,
            self.cfg.rules.edge_clearance_mm,
            self.cfg.time_budget_s,
            self.cfg.max_rip_up_attempts
        );

        if outline.len() < 3 || outline.area() <= 0.0 {
            warn!("Router: invalid outline polygon - all nets fail");
            return RoutingResult {
                traces: Vec::new(),
                pin_assignments: HashMap::new(),
                failed_nets: self.placement.nets.iter().map(|n| n.id.clone()).collect(),
            };
        }

        // 1. Pin pools for dynamic allocation.
        let pin_pools = build_pin_pools(&self.placement, &self.catalog);

        // 2. Classify every net's pin references. Group refs stay
        // unresolved until routing, when the exact pin is chosen.
        let mut net_pad_map: HashMap<Id, Vec<PinRef>> = HashMap::new();
        for net in &self.placement.nets {
            let refs: Vec<PinRef> = net
                .pins
                .iter()
                .filter_map(|r| {
                    resolve_pin_ref(r, &self.placement, &self.catalog).map(
                        |(iid, pid, is_group)| PinRef {
                            raw: r.clone(),
                            instance_id: iid.to_owned(),
                            pin_or_group: pid.to_owned(),
                            is_group,
                        },
                    )
                })
                .collect();
            net_pad_map.insert(net.id.clone(), refs);
        }

        // 3. Base grid with component blocking and pin escapes.
        let mut base_grid = RoutingGrid::new(&outline, &self.cfg.rules);
        self.block_components(&mut base_grid);

        // 4. Route with rip-up.
        self.route_with_ripup(&net_pad_map, &base_grid, &pin_pools, &outline)
    }

    // Component blocking.

    // Permanently block grid cells under routing-blocking component
    // bodies, then guarantee every pin stays reachable: escape channels
    // for pins trapped inside permanently-blocked zones, a force-freed and
    // protected pad neighbourhood around every pin, and re-blocked body
    // interiors with just the pin cells poked back open.
    fn block_components(&self, grid: &mut RoutingGrid) {
        let catalog_map = self.catalog.component_map();

        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            if !cat.mounting.blocks_routing {
                continue;
            }
            let (hw, hh) = body_half_dims(&cat.body, pc.rotation_deg);
            let keepout = cat.mounting.keepout_margin_mm;
            grid.block_rect_world(pt(pc.x_mm, pc.y_mm), hw + keepout, hh + keepout, true);
        }

        // Carve escape channels for ANY pin sitting in a permanently
        // blocked zone, before the pad neighbourhoods are freed so the
        // scan sees the true boundary of the blocked region. This covers
        // pins of non-blocking components that land inside another body's
        // footprint, and wall-mounted pins inside the edge clearance band.
        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            for pin in &cat.pins {
                let w = pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg);
                let cell = grid.world_to_grid(w);
                if grid.is_permanently_blocked(cell) {
                    carve_escape_channel(grid, cell);
                }
            }
        }

        // Force-free and protect the pad neighbourhood of every pin so
        // trace clearance can never wall a pad in.
        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            for pin in &cat.pins {
                let w = pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg);
                let cell = grid.world_to_grid(w);
                for dx in -self.pad_radius..=self.pad_radius {
                    for dy in -self.pad_radius..=self.pad_radius {
                        let n = pti(cell.x + dx, cell.y + dy);
                        grid.force_free_cell(n);
                        grid.protect_cell(n);
                    }
                }
            }
        }

        // The pad freeing above may have opened cells deep inside a
        // routing-blocked body. The body interior must stay impassable, so
        // re-block it (without the keepout margin) and re-open just the
        // pin cell plus its 8-neighbourhood for reachability.
        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            if !cat.mounting.blocks_routing {
                continue;
            }
            let (hw, hh) = body_half_dims(&cat.body, pc.rotation_deg);
            grid.block_rect_world(pt(pc.x_mm, pc.y_mm), hw, hh, true);
            debug!(
                "Re-blocked body interior of {} ({}): {:.1}x{:.1} mm at ({:.1},{:.1})",
                pc.instance_id,
                pc.catalog_id,
                hw * 2.0,
                hh * 2.0,
                pc.x_mm,
                pc.y_mm
            );
        }
        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            if !cat.mounting.blocks_routing {
                continue;
            }
            for pin in &cat.pins {
                let w = pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg);
                let cell = grid.world_to_grid(w);
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        let n = pti(cell.x + dx, cell.y + dy);
                        grid.force_free_cell(n);
                        grid.protect_cell(n);
                    }
                }
            }
        }
    }

    // Pad resolution (deferred for group pins).

    // Resolve all pin references in a net to pads with grid coordinates.
    // Group references re-use a prior assignment when one exists in this
    // attempt, otherwise allocate the pool pin closest to the centroid of
    // the already-resolved pads. Returns None if anything fails to
    // resolve.
    fn resolve_pads(
        &self,
        refs: &[PinRef],
        net_id: &str,
        pools: &mut PinPools,
        grid: &RoutingGrid,
        assignments: &mut HashMap<String, String>,
    ) -> Option<Vec<NetPad>> {
        let mut pads: Vec<Option<NetPad>> = vec![None; refs.len()];
        let mut unresolved: Vec<usize> = Vec::new();

        for (i, r) in refs.iter().enumerate() {
            if !r.is_group {
                let Some(w) = pin_world_pos(&r.instance_id, &r.pin_or_group, &self.placement, &self.catalog)
                else {
                    warn!("Net {net_id}: cannot resolve pin {}", r.raw);
                    return None;
                };
                pads[i] = Some(NetPad {
                    instance_id: r.instance_id.clone(),
                    pin_id: r.pin_or_group.clone(),
                    group_id: None,
                    cell: grid.world_to_grid(w),
                    world: w,
                });
                continue;
            }

            // Re-use an assignment recorded earlier in this attempt.
            let key = format!("{net_id}|{}", r.raw);
            if let Some(assigned) = assignments.get(&key) {
                if let Some((_, pin_id)) = assigned.split_once(':') {
                    if let Some(w) =
                        pin_world_pos(&r.instance_id, pin_id, &self.placement, &self.catalog)
                    {
                        pads[i] = Some(NetPad {
                            instance_id: r.instance_id.clone(),
                            pin_id: pin_id.to_owned(),
                            group_id: Some(r.pin_or_group.clone()),
                            cell: grid.world_to_grid(w),
                            world: w,
                        });
                        continue;
                    }
                }
            }
            unresolved.push(i);
        }

        // Fallback target: centre of the grid in world coordinates.
        let centre = grid.grid_to_world(pti(grid.width() / 2, grid.height() / 2));

        for i in unresolved {
            let r = &refs[i];
            let Some(pool) = pools.get_mut(&r.instance_id) else {
                warn!("Net {net_id}: no pin pool for {}", r.raw);
                return None;
            };

            // Centroid of the other resolved pads in this net.
            let resolved: Vec<&NetPad> = pads.iter().flatten().collect();
            let target = if resolved.is_empty() {
                centre
            } else {
                let n = resolved.len() as f64;
                pt(
                    resolved.iter().map(|p| p.world.x).sum::<f64>() / n,
                    resolved.iter().map(|p| p.world.y).sum::<f64>() / n,
                )
            };

            let Some(chosen) = allocate_best_pin(
                &r.instance_id,
                &r.pin_or_group,
                target,
                pool,
                &self.placement,
                &self.catalog,
            ) else {
                warn!("Net {net_id}: pool exhausted for {}:{}", r.instance_id, r.pin_or_group);
                return None;
            };

            let Some(w) = pin_world_pos(&r.instance_id, &chosen, &self.placement, &self.catalog)
            else {
                warn!("Net {net_id}: resolved pin {}:{chosen} has no position", r.instance_id);
                return None;
            };

            pads[i] = Some(NetPad {
                instance_id: r.instance_id.clone(),
                pin_id: chosen.clone(),
                group_id: Some(r.pin_or_group.clone()),
                cell: grid.world_to_grid(w),
                world: w,
            });
            assignments
                .insert(format!("{net_id}|{}", r.raw), format!("{}:{chosen}", r.instance_id));
        }

        let result: Vec<NetPad> = pads.into_iter().flatten().collect();
        (result.len() == refs.len()).then_some(result)
    }

    // Grid cells occupied by every physical pin of every component. Used
    // to temporarily block foreign pin pads during each net's search.
    fn build_all_pin_cells(&self, grid: &RoutingGrid) -> Vec<PtI> {
        let catalog_map = self.catalog.component_map();
        let mut cells = Vec::new();
        for pc in &self.placement.components {
            let Some(cat) = catalog_map.get(pc.catalog_id.as_str()) else { continue };
            for pin in &cat.pins {
                let w = pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg);
                cells.push(grid.world_to_grid(w));
            }
        }
        cells
    }

    // Single-net routing.

    // Route one net by connecting pads into a Steiner tree. Returns the
    // committed-to-be paths and whether the whole net connected.
    //
    // Multi-pin nets use MST-ordered growth over union-find sub-trees.
    // Each sub-tree owns its full cell set (pads plus all routed path
    // cells); the pathfinder target is the whole larger sub-tree so a new
    // leaf can join the nearest backbone cell instead of reaching for a
    // distant pad, and the smaller sub-tree seeds a multi-source search to
    // avoid parallel duplicate traces.
    fn route_single_net(
        &self,
        net_id: &str,
        pads: &[NetPad],
        grid: &mut RoutingGrid,
        all_pin_cells: &[PtI],
    ) -> (Vec<GridPath>, bool) {
        if pads.len() < 2 {
            return (Vec::new(), true);
        }

        if pads.len() == 2 {
            // Simple 2-pin net: direct A*. Pad neighbourhoods are freed so
            // the pathfinder can escape through clearance zones covering
            // the pad area; foreign pins are blocked after the freeing so
            // the free zone cannot erase them.
            let src = pads[0].cell;
            let snk = pads[1].cell;

            let freed_src = self.free_pad_neighborhood(grid, src);
            let freed_snk = self.free_pad_neighborhood(grid, snk);
            let fp_blocked = self.block_foreign_pins(grid, all_pin_cells, pads);

            let path = find_path(grid, src, snk, self.cfg.turn_penalty);

            unblock_cells(grid, &fp_blocked);
            restore_cells(grid, &freed_src);
            restore_cells(grid, &freed_snk);

            return match path {
                Some(p) => (vec![p], true),
                None => {
                    info!(
                        "  [2P] {net_id} NO PATH src={}:{} @{} snk={}:{} @{}",
                        pads[0].instance_id, pads[0].pin_id, src, pads[1].instance_id,
                        pads[1].pin_id, snk
                    );
                    (Vec::new(), false)
                }
            };
        }

        let mst_edges = compute_mst(pads);
        let mut all_paths: Vec<GridPath> = Vec::new();

        let mut uf = UnionFind::new(pads.len());
        // Per-root tree cells: pad position plus all path cells routed so
        // far for that component.
        let mut comp_trees: HashMap<usize, HashSet<PtI>> =
            (0..pads.len()).map(|i| (i, HashSet::from([pads[i].cell]))).collect();

        debug!("  [MP] {net_id} multi-pin ({} pads, {} MST edges)", pads.len(), mst_edges.len());

        for (pa, pb) in mst_edges {
            if uf.find(pa) == uf.find(pb) {
                continue;
            }

            // The larger tree is the A* target; the smaller supplies the
            // multi-source start set.
            let tree_a = &comp_trees[&uf.find(pa)];
            let tree_b = &comp_trees[&uf.find(pb)];
            let (src_root, tgt_root) = if tree_a.len() >= tree_b.len() {
                (uf.find(pb), uf.find(pa))
            } else {
                (uf.find(pa), uf.find(pb))
            };
            let src_tree = comp_trees[&src_root].clone();
            let target_tree = comp_trees[&tgt_root].clone();

            let ok = self.connect_subtrees(
                grid,
                pads,
                all_pin_cells,
                &src_tree,
                &target_tree,
                |pidx, uf_ref| uf_ref.find(pidx) == src_root,
                |pidx, uf_ref| uf_ref.find(pidx) == tgt_root,
                &mut uf,
                &mut |path, uf_now| {
                    merge_comps(&mut comp_trees, uf_now, pa, pb, path);
                    all_paths.push(path.to_vec());
                },
            );
            if !ok {
                info!(
                    "  [MP] {net_id} NO PATH bridging sub-trees ({} -> {} cells)",
                    src_tree.len(),
                    target_tree.len()
                );
            }
        }

        // All pads connected?
        let mut roots: Vec<usize> = (0..pads.len()).map(|i| uf.find(i)).collect();
        roots.sort_unstable();
        roots.dedup();
        if roots.len() == 1 {
            return (all_paths, true);
        }

        // Greedy fallback: join each leftover component to the largest
        // tree with a multi-source search.
        let mut main_root = *roots
            .iter()
            .max_by_key(|r| comp_trees[r].len())
            .expect("roots nonempty");

        let remaining: Vec<usize> = roots.into_iter().filter(|r| *r != main_root).collect();
        for rr in remaining {
            let comp_tree = comp_trees[&rr].clone();
            let main_tree = comp_trees[&main_root].clone();
            let merge_pidx = (0..pads.len()).find(|i| uf.find(*i) == rr).expect("member exists");
            let main_pidx =
                (0..pads.len()).find(|i| uf.find(*i) == main_root).expect("member exists");

            let ok = self.connect_subtrees(
                grid,
                pads,
                all_pin_cells,
                &comp_tree,
                &main_tree,
                |pidx, uf_ref| uf_ref.find(pidx) == rr,
                |pidx, uf_ref| uf_ref.find(pidx) == main_root,
                &mut uf,
                &mut |path, uf_now| {
                    merge_comps(&mut comp_trees, uf_now, merge_pidx, main_pidx, path);
                    all_paths.push(path.to_vec());
                },
            );
            if !ok {
                info!(
                    "  [MP] {net_id} fallback FAIL: unreachable component (tree={} cells, \
                     main={} cells)",
                    comp_tree.len(),
                    main_tree.len()
                );
                return (all_paths, false);
            }
            main_root = uf.find(merge_pidx);
        }

        (all_paths, true)
    }

    // Scoped bridge between two sub-trees: free both trees' cells and
    // both sides' pad neighbourhoods, block foreign pins, run the
    // multi-source search, then restore everything in reverse order on
    // every exit path.
    #[allow(clippy::too_many_arguments)]
    fn connect_subtrees(
        &self,
        grid: &mut RoutingGrid,
        pads: &[NetPad],
        all_pin_cells: &[PtI],
        src_tree: &HashSet<PtI>,
        target_tree: &HashSet<PtI>,
        is_src_pad: impl Fn(usize, &mut UnionFind) -> bool,
        is_tgt_pad: impl Fn(usize, &mut UnionFind) -> bool,
        uf: &mut UnionFind,
        on_success: &mut dyn FnMut(&[PtI], &mut UnionFind),
    ) -> bool {
        // Free tree cells that other nets' clearance zones have covered.
        let mut freed_tgt: Vec<PtI> = Vec::new();
        for &cell in target_tree {
            if grid.is_blocked(cell) && !grid.is_permanently_blocked(cell) {
                grid.free_cell(cell);
                freed_tgt.push(cell);
            }
        }
        let mut freed_src: Vec<PtI> = Vec::new();
        for &cell in src_tree {
            if grid.is_blocked(cell) && !grid.is_permanently_blocked(cell) {
                grid.free_cell(cell);
                freed_src.push(cell);
            }
        }

        // Free pad neighbourhoods for every pad on either side.
        for pidx in 0..pads.len() {
            if is_src_pad(pidx, uf) {
                freed_src.extend(self.free_pad_neighborhood(grid, pads[pidx].cell));
            } else if is_tgt_pad(pidx, uf) {
                freed_tgt.extend(self.free_pad_neighborhood(grid, pads[pidx].cell));
            }
        }

        // Foreign pins are blocked AFTER pad freeing so the free zone
        // cannot erase the blocks.
        let fp_blocked = self.block_foreign_pins(grid, all_pin_cells, pads);

        let path = find_path_to_tree(
            grid,
            src_tree,
            target_tree,
            self.cfg.turn_penalty,
            false,
            self.cfg.crossing_penalty,
        );

        unblock_cells(grid, &fp_blocked);
        restore_cells(grid, &freed_tgt);
        restore_cells(grid, &freed_src);

        match path {
            Some(p) => {
                on_success(&p, uf);
                true
            }
            None => false,
        }
    }

    // Temporarily free blocked (never permanently blocked) cells around a
    // pad. Returns the changed cells for later restore.
    fn free_pad_neighborhood(&self, grid: &mut RoutingGrid, cell: PtI) -> Vec<PtI> {
        let mut freed = Vec::new();
        for dx in -self.pad_radius..=self.pad_radius {
            for dy in -self.pad_radius..=self.pad_radius {
                let n = pti(cell.x + dx, cell.y + dy);
                if grid.in_bounds(n) && grid.is_blocked(n) && !grid.is_permanently_blocked(n) {
                    grid.free_cell(n);
                    freed.push(n);
                }
            }
        }
        freed
    }

    // Temporarily block cells around pins not belonging to the current
    // net, so a trace can never pass through a foreign pin pad. Returns
    // the blocked cells for later restore.
    fn block_foreign_pins(
        &self,
        grid: &mut RoutingGrid,
        all_pin_cells: &[PtI],
        net_pads: &[NetPad],
    ) -> Vec<PtI> {
        let r = self.foreign_pin_radius;
        let mut net_cells: HashSet<PtI> = HashSet::new();
        for pad in net_pads {
            for dx in -r..=r {
                for dy in -r..=r {
                    net_cells.insert(pti(pad.cell.x + dx, pad.cell.y + dy));
                }
            }
        }

        let mut blocked = Vec::new();
        for &c in all_pin_cells {
            for dx in -r..=r {
                for dy in -r..=r {
                    let cell = pti(c.x + dx, c.y + dy);
                    if !net_cells.contains(&cell) && grid.is_free(cell) {
                        grid.block_cell(cell);
                        blocked.push(cell);
                    }
                }
            }
        }
        blocked
    }

    // Rip-up orchestrator.

    fn route_with_ripup(
        &self,
        net_pad_map: &HashMap<Id, Vec<PinRef>>,
        base_grid: &RoutingGrid,
        pin_pools: &PinPools,
        outline: &Poly,
    ) -> RoutingResult {
        let net_ids: Vec<Id> = self
            .placement
            .nets
            .iter()
            .filter(|n| net_pad_map.get(&n.id).map_or(0, Vec::len) >= 2)
            .map(|n| n.id.clone())
            .collect();
        let skipped: Vec<&Id> = self
            .placement
            .nets
            .iter()
            .filter(|n| net_pad_map.get(&n.id).map_or(0, Vec::len) < 2)
            .map(|n| &n.id)
            .collect();
        if !skipped.is_empty() {
            info!("Router: skipping {} nets with <2 pins: {skipped:?}", skipped.len());
        }
        if net_ids.is_empty() {
            info!("Router: no nets to route");
            return RoutingResult::default();
        }

        info!("Router: routing {} nets", net_ids.len());
        let start_time = Instant::now();
        let time_left =
            |start: &Instant| start.elapsed().as_secs_f64() < self.cfg.time_budget_s;

        let mut best_traces: Vec<Trace> = Vec::new();
        let mut best_assignments: HashMap<String, String> = HashMap::new();
        let mut best_failed: Vec<Id> = net_ids.clone();

        // Power nets first (they need the most routing resources), then
        // more-pin nets first; the stable sort keeps the design order as
        // the final tiebreak.
        let mut base_order = net_ids.clone();
        base_order.sort_by_key(|nid| {
            let is_power = matches!(nid.as_str(), "VCC" | "GND" | "VBAT");
            let refs = net_pad_map.get(nid).map_or(0, Vec::len);
            (usize::from(!is_power), std::cmp::Reverse(refs))
        });

        // Invariants across attempts.
        let all_pin_cells = self.build_all_pin_cells(base_grid);

        // Dead-prefix pruning: the ordered subsequence of nets that
        // phase 1 routed in a failed attempt. Any future ordering starting
        // with the same prefix reaches an identical grid state and fails
        // identically, so it is skipped.
        let mut dead_prefixes: Vec<Vec<Id>> = Vec::new();
        let mut pruned_count = 0usize;

        let starts_with_dead_prefix = |ordering: &[Id], prefixes: &[Vec<Id>]| {
            prefixes.iter().any(|p| ordering.len() >= p.len() && ordering[..p.len()] == p[..])
        };

        let mut rng = SmallRng::seed_from_u64(self.cfg.seed);
        let mut attempts_run = 0usize;

        for attempt in 0..self.cfg.max_rip_up_attempts {
            if !time_left(&start_time) || self.cfg.is_cancelled() {
                info!(
                    "Router: budget exhausted after {attempt} attempts ({pruned_count} pruned)"
                );
                break;
            }
            attempts_run = attempt + 1;

            // Attempt 0 is the deterministic priority order; later
            // attempts shuffle, rejecting orderings with a dead prefix.
            let mut order = base_order.clone();
            if attempt > 0 {
                order.shuffle(&mut rng);
                let mut exhausted = true;
                for _ in 0..100 {
                    if !starts_with_dead_prefix(&order, &dead_prefixes) {
                        exhausted = false;
                        break;
                    }
                    order.shuffle(&mut rng);
                    pruned_count += 1;
                }
                if exhausted {
                    info!(
                        "Router: search space exhausted after {attempt} attempts \
                         ({pruned_count} pruned, {} dead prefixes)",
                        dead_prefixes.len()
                    );
                    break;
                }
            }

            // Fresh pools and grid for this attempt.
            let mut attempt_pools = copy_pools(pin_pools);
            let mut attempt_assignments: HashMap<String, String> = HashMap::new();
            let mut grid = base_grid.clone();

            // Phase 1: route every net in order.
            let mut routed_paths: RoutedPaths = HashMap::new();
            let mut failed_set: HashSet<Id> = HashSet::new();

            for nid in &order {
                let refs = &net_pad_map[nid];
                let pads = self.resolve_pads(
                    refs,
                    nid,
                    &mut attempt_pools,
                    &grid,
                    &mut attempt_assignments,
                );
                let Some(pads) = pads.filter(|p| p.len() >= 2) else {
                    debug!("  [P1] {nid} FAIL - pad resolution failed");
                    failed_set.insert(nid.clone());
                    continue;
                };

                let (paths, ok) = self.route_single_net(nid, &pads, &mut grid, &all_pin_cells);
                if ok && !paths.is_empty() {
                    for path in &paths {
                        grid.block_trace(path);
                    }
                    debug!(
                        "  [P1] {nid} OK - {} segments, {} cells",
                        paths.len(),
                        paths.iter().map(Vec::len).sum::<usize>()
                    );
                    routed_paths.insert(nid.clone(), paths);
                } else {
                    failed_set.insert(nid.clone());
                    info!("  [P1] {nid} FAIL - no route (grid {:.1}% free)", grid.free_pct());
                }
            }

            info!(
                "Router attempt {}: {}/{} nets routed (phase 1), grid {:.1}% free",
                attempt + 1,
                order.len() - failed_set.len(),
                order.len(),
                grid.free_pct()
            );

            if failed_set.is_empty() {
                // All routed on the first pass; validate no crossings.
                let stripped = strip_crossing_traces(&mut routed_paths, &mut grid);
                if stripped.is_empty() {
                    return RoutingResult {
                        traces: grid_paths_to_traces(&routed_paths, &grid, outline),
                        pin_assignments: attempt_assignments,
                        failed_nets: Vec::new(),
                    };
                }
                warn!("Phase 1 crossing validation stripped {} nets", stripped.len());
                failed_set.extend(stripped);
            }

            // Phase 2: inner rip-up loop.
            self.inner_ripup(
                net_pad_map,
                &mut grid,
                &mut routed_paths,
                &mut failed_set,
                &mut attempt_pools,
                &mut attempt_assignments,
                &all_pin_cells,
                &start_time,
                &mut rng,
            );

            // Backstop: strip any traces that still overlap at cell level.
            let stripped = strip_crossing_traces(&mut routed_paths, &mut grid);
            if !stripped.is_empty() {
                warn!(
                    "Attempt {}: crossing validation stripped {} nets: {stripped:?}",
                    attempt + 1,
                    stripped.len()
                );
                failed_set.extend(stripped);
            }

            // Best-so-far: fewer failures wins, earlier attempts win ties.
            if failed_set.len() < best_failed.len() {
                best_traces = grid_paths_to_traces(&routed_paths, &grid, outline);
                best_assignments = attempt_assignments.clone();
                best_failed = failed_set.iter().cloned().collect();
                best_failed.sort();
            }

            if failed_set.is_empty() {
                info!("Router: all nets routed on attempt {} ({pruned_count} pruned)", attempt + 1);
                return RoutingResult {
                    traces: best_traces,
                    pin_assignments: best_assignments,
                    failed_nets: Vec::new(),
                };
            }

            // Record the routed prefix of this failed attempt, unless a
            // shorter recorded prefix already subsumes it.
            let routed_prefix: Vec<Id> =
                order.iter().filter(|nid| !failed_set.contains(*nid)).cloned().collect();
            if !routed_prefix.is_empty()
                && !starts_with_dead_prefix(&routed_prefix, &dead_prefixes)
            {
                debug!("Router: recorded dead prefix len={}", routed_prefix.len());
                dead_prefixes.push(routed_prefix);
            }
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        info!(
            "Router: finished in {elapsed:.1}s with {}/{} nets routed, {} failed",
            net_ids.len() - best_failed.len(),
            net_ids.len(),
            best_failed.len()
        );
        if !best_failed.is_empty() {
            warn!("Router: FAILED nets: {best_failed:?}");
            warn!(
                "Router: {attempts_run} attempts total, {pruned_count} pruned, {} dead prefixes",
                dead_prefixes.len()
            );
            for fnid in &best_failed {
                let refs = net_pad_map.get(fnid).map_or(&[][..], Vec::as_slice);
                let pin_desc: Vec<&str> = refs.iter().map(|r| r.raw.as_str()).collect();
                warn!("  {fnid} ({} pins): {}", refs.len(), pin_desc.join(", "));
            }
        }

        RoutingResult {
            traces: best_traces,
            pin_assignments: best_assignments,
            failed_nets: best_failed,
        }
    }

    // One attempt's inner rip-up loop: per failed net, retry a plain
    // route, then find a minimum-crossing path, rip the nets it crosses
    // under a snapshot, and re-route all of them or roll the whole
    // exchange back. The conservative commit rule means no attempt ever
    // leaves physically crossing traces in place.
    #[allow(clippy::too_many_arguments)]
    fn inner_ripup(
        &self,
        net_pad_map: &HashMap<Id, Vec<PinRef>>,
        grid: &mut RoutingGrid,
        routed_paths: &mut RoutedPaths,
        failed_set: &mut HashSet<Id>,
        attempt_pools: &mut PinPools,
        attempt_assignments: &mut HashMap<String, String>,
        all_pin_cells: &[PtI],
        start_time: &Instant,
        rng: &mut SmallRng,
    ) {
        for _inner in 0..self.cfg.inner_rip_up_limit {
            if failed_set.is_empty()
                || start_time.elapsed().as_secs_f64() >= self.cfg.time_budget_s
                || self.cfg.is_cancelled()
            {
                break;
            }

            let mut progress = false;
            let mut failed_list: Vec<Id> = failed_set.iter().cloned().collect();
            failed_list.sort();
            failed_list.shuffle(rng);

            for failed_net in &failed_list {
                if !failed_set.contains(failed_net) {
                    continue;
                }

                let refs = &net_pad_map[failed_net];
                let pads = self.resolve_pads(
                    refs,
                    failed_net,
                    attempt_pools,
                    grid,
                    attempt_assignments,
                );
                let Some(pads) = pads.filter(|p| p.len() >= 2) else { continue };

                // Plain retry on the updated grid first.
                let (paths, ok) = self.route_single_net(failed_net, &pads, grid, all_pin_cells);
                if ok && !paths.is_empty() {
                    for path in &paths {
                        grid.block_trace(path);
                    }
                    routed_paths.insert(failed_net.clone(), paths);
                    failed_set.remove(failed_net);
                    debug!("  [P2] {failed_net} OK - simple re-route succeeded");
                    progress = true;
                    continue;
                }

                // Crossing-aware tree construction: grow from pad 0,
                // always attaching the nearest unconnected pad, allowing
                // entry into blocked cells at a heavy cost.
                let mut tree_cells: HashSet<PtI> = HashSet::from([pads[0].cell]);
                let mut crossing_paths: Vec<GridPath> = Vec::new();
                let mut crossed_cells: HashSet<PtI> = HashSet::new();
                let mut route_ok = true;
                let mut remaining: Vec<usize> = (1..pads.len()).collect();

                while !remaining.is_empty() {
                    // Nearest unconnected pad to the current tree.
                    let (ri, _) = remaining
                        .iter()
                        .enumerate()
                        .map(|(ri, &pidx)| {
                            let d = tree_cells
                                .iter()
                                .map(|t| pads[pidx].cell.manhattan_dist(*t))
                                .min()
                                .unwrap_or(i32::MAX);
                            (ri, d)
                        })
                        .min_by_key(|&(_, d)| d)
                        .expect("remaining nonempty");
                    let pad_idx = remaining.swap_remove(ri);

                    let mut freed: Vec<PtI> = Vec::new();
                    for &cell in &tree_cells {
                        if grid.is_blocked(cell) && !grid.is_permanently_blocked(cell) {
                            grid.free_cell(cell);
                            freed.push(cell);
                        }
                    }
                    let src = pads[pad_idx].cell;
                    let freed_src = self.free_pad_neighborhood(grid, src);
                    let fp_blocked = self.block_foreign_pins(grid, all_pin_cells, &pads);

                    let sources = HashSet::from([src]);
                    let path = find_path_to_tree(
                        grid,
                        &sources,
                        &tree_cells,
                        self.cfg.turn_penalty,
                        true,
                        self.cfg.crossing_penalty,
                    );

                    unblock_cells(grid, &fp_blocked);
                    restore_cells(grid, &freed);
                    restore_cells(grid, &freed_src);

                    let Some(path) = path else {
                        route_ok = false;
                        break;
                    };
                    for &cell in &path {
                        tree_cells.insert(cell);
                        if grid.is_blocked(cell) && !grid.is_permanently_blocked(cell) {
                            crossed_cells.insert(cell);
                        }
                    }
                    crossing_paths.push(path);
                }

                if !route_ok || crossed_cells.is_empty() {
                    if !route_ok {
                        debug!("  [P2] {failed_net} FAIL - crossing-aware pathfinder also failed");
                    } else {
                        debug!("  [P2] {failed_net} SKIP - crossing path found no actual crossings");
                    }
                    continue;
                }

                // Which committed nets would have to be ripped.
                let ripped_nets: HashSet<Id> = routed_paths
                    .iter()
                    .filter(|(nid, _)| *nid != failed_net)
                    .filter(|(_, npaths)| {
                        npaths.iter().any(|p| p.iter().any(|c| crossed_cells.contains(c)))
                    })
                    .map(|(nid, _)| nid.clone())
                    .collect();
                if ripped_nets.is_empty() {
                    continue;
                }

                debug!(
                    "  [P2] {failed_net} rip-up: crosses {} nets {:?}",
                    ripped_nets.len(),
                    ripped_nets
                );

                // Snapshot so the exchange can be rolled back; crossings
                // must never survive a commit.
                let snap_before_rip = grid.snapshot();
                let saved_routed = routed_paths.clone();

                for ripped in &ripped_nets {
                    if let Some(rpaths) = routed_paths.remove(ripped) {
                        for rpath in &rpaths {
                            grid.free_trace(rpath);
                        }
                    }
                }

                routed_paths.insert(failed_net.clone(), crossing_paths.clone());
                for cpath in &crossing_paths {
                    grid.block_trace(cpath);
                }

                // Re-route every ripped net; all must succeed.
                let mut rerouted: RoutedPaths = HashMap::new();
                let mut all_rerouted = true;
                let mut ripped_sorted: Vec<&Id> = ripped_nets.iter().collect();
                ripped_sorted.sort();
                for ripped in ripped_sorted {
                    let rrefs = &net_pad_map[ripped];
                    let rpads = self.resolve_pads(
                        rrefs,
                        ripped,
                        attempt_pools,
                        grid,
                        attempt_assignments,
                    );
                    let Some(rpads) = rpads.filter(|p| p.len() >= 2) else {
                        all_rerouted = false;
                        break;
                    };
                    let (rpaths, rok) =
                        self.route_single_net(ripped, &rpads, grid, all_pin_cells);
                    if rok && !rpaths.is_empty() {
                        for rp in &rpaths {
                            grid.block_trace(rp);
                        }
                        rerouted.insert(ripped.clone(), rpaths);
                    } else {
                        all_rerouted = false;
                        break;
                    }
                }

                if all_rerouted {
                    for (ripped, rpaths) in rerouted {
                        routed_paths.insert(ripped, rpaths);
                    }
                    failed_set.remove(failed_net);
                    for ripped in &ripped_nets {
                        failed_set.remove(ripped);
                    }
                    debug!(
                        "  [P2] {failed_net} COMMIT - rip-up succeeded, all {} ripped nets \
                         re-routed",
                        ripped_nets.len()
                    );
                    progress = true;
                    break; // restart the inner loop
                }

                // Roll back the whole exchange.
                debug!("  [P2] {failed_net} ROLLBACK - ripped nets failed to re-route");
                grid.restore(&snap_before_rip);
                *routed_paths = saved_routed;
                for ripped in &ripped_nets {
                    if !routed_paths.contains_key(ripped) {
                        failed_set.insert(ripped.clone());
                    }
                }
                // failed_net stays failed; try the next one.
            }

            if !progress {
                break;
            }
        }
    }
}

// Union-find with path compression and union by rank.
#[derive(Debug, Clone)]
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.rank[ra] < self.rank[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        if self.rank[ra] == self.rank[rb] {
            self.rank[ra] += 1;
        }
        true
    }
}

// Union the components of pads |a| and |b|, merging their tree-cell sets
// and folding in the new path cells. Merges into the larger set.
fn merge_comps(
    comp_trees: &mut HashMap<usize, HashSet<PtI>>,
    uf: &mut UnionFind,
    a: usize,
    b: usize,
    path_cells: &[PtI],
) {
    let (ra, rb) = (uf.find(a), uf.find(b));
    if ra == rb {
        comp_trees.get_mut(&ra).expect("tree exists").extend(path_cells.iter().copied());
        return;
    }
    let tree_a = comp_trees.remove(&ra).expect("tree exists");
    let tree_b = comp_trees.remove(&rb).expect("tree exists");
    uf.union(a, b);
    let new_root = uf.find(a);
    let (mut large, small) =
        if tree_a.len() >= tree_b.len() { (tree_a, tree_b) } else { (tree_b, tree_a) };
    large.extend(small);
    large.extend(path_cells.iter().copied());
    comp_trees.insert(new_root, large);
}

// Kruskal's MST on pads by Manhattan distance. Returns pad-index pairs.
fn compute_mst(pads: &[NetPad]) -> Vec<(usize, usize)> {
    let n = pads.len();
    if n < 2 {
        return Vec::new();
    }

    let mut edges: Vec<(i32, usize, usize)> = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            edges.push((pads[i].cell.manhattan_dist(pads[j].cell), i, j));
        }
    }
    edges.sort_unstable();

    let mut uf = UnionFind::new(n);
    let mut result = Vec::with_capacity(n - 1);
    for (_, i, j) in edges {
        if uf.union(i, j) {
            result.push((i, j));
            if result.len() == n - 1 {
                break;
            }
        }
    }
    result
}

// Re-block cells that were temporarily freed.
fn restore_cells(grid: &mut RoutingGrid, cells: &[PtI]) {
    for &c in cells {
        grid.block_cell(c);
    }
}

// Restore previously blocked foreign pin cells.
fn unblock_cells(grid: &mut RoutingGrid, cells: &[PtI]) {
    for &c in cells {
        grid.free_cell(c);
    }
}

// Escape channels: scan outward from a trapped pin in the four cardinal
// directions through permanently-blocked cells until open space, then
// force-free the two shortest tracks (plus one perpendicular cell per step
// for width). Only cells whose centre lies inside the outline are freed so
// traces never clip outside the board edge.
fn carve_escape_channel(grid: &mut RoutingGrid, pin_cell: PtI) {
    const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
    const SCAN_LIMIT: i32 = 300;

    let mut dir_dists: Vec<(i32, (i32, i32))> = Vec::new();
    for (dx, dy) in DIRECTIONS {
        let mut cell = pin_cell;
        for dist in 1..=SCAN_LIMIT {
            cell = pti(cell.x + dx, cell.y + dy);
            if !grid.in_bounds(cell) {
                break;
            }
            if !grid.is_permanently_blocked(cell) {
                dir_dists.push((dist, (dx, dy)));
                break;
            }
        }
    }
    if dir_dists.is_empty() {
        return;
    }

    dir_dists.sort_unstable();
    let tracks: Vec<(i32, i32)> = dir_dists.iter().take(2).map(|&(_, d)| d).collect();
    for (dx, dy) in tracks {
        let mut cell = pin_cell;
        loop {
            cell = pti(cell.x + dx, cell.y + dy);
            if !grid.in_bounds(cell) || !grid.is_permanently_blocked(cell) {
                break;
            }
            let w = grid.grid_to_world(cell);
            if !poly_contains_pt(grid.outline(), w) {
                break;
            }
            grid.force_free_cell(cell);
            // One cell on each side perpendicular, for width.
            for (pdx, pdy) in [(dy, dx), (-dy, -dx)] {
                let n = pti(cell.x + pdx, cell.y + pdy);
                if grid.in_bounds(n) && poly_contains_pt(grid.outline(), grid.grid_to_world(n)) {
                    grid.force_free_cell(n);
                }
            }
        }
    }
}

// Trace emission.

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// Convert committed grid paths to world-coordinate traces: collapse
// collinear intermediate points, clamp stray boundary waypoints back onto
// the outline, and round for the artifact.
fn grid_paths_to_traces(routed_paths: &RoutedPaths, grid: &RoutingGrid, outline: &Poly) -> Vec<Trace> {
    let mut traces = Vec::new();
    for net_id in routed_paths.keys().sorted() {
        for grid_path in &routed_paths[net_id] {
            if grid_path.len() < 2 {
                continue;
            }
            let path = simplify_path(grid_path, grid)
                .into_iter()
                .map(|w| {
                    let clamped = if poly_contains_pt(outline, w) {
                        w
                    } else {
                        poly_nearest_boundary_pt(outline, w)
                    };
                    (round2(clamped.x), round2(clamped.y))
                })
                .collect();
            traces.push(Trace { net_id: net_id.clone(), path });
        }
    }
    traces
}

// Keep the start, the end, and every point where the direction changes.
fn simplify_path(grid_path: &[PtI], grid: &RoutingGrid) -> Vec<Pt> {
    if grid_path.len() <= 2 {
        return grid_path.iter().map(|&g| grid.grid_to_world(g)).collect();
    }

    let mut waypoints = vec![grid_path[0]];
    for w in grid_path.windows(3) {
        let d1 = w[1] - w[0];
        let d2 = w[2] - w[1];
        if d1 != d2 {
            waypoints.push(w[1]);
        }
    }
    waypoints.push(*grid_path.last().expect("nonempty"));

    waypoints.into_iter().map(|g| grid.grid_to_world(g)).collect()
}

// Post-routing crossing validation.

// Nets whose trace cells physically overlap another net's. A crossing is
// two different nets claiming the same grid cell; clearance-zone overlap
// near protected pads is fine and not flagged here.
fn find_crossing_nets(routed_paths: &RoutedPaths) -> Vec<Id> {
    let mut cell_owner: HashMap<PtI, &Id> = HashMap::new();
    let mut crossing: HashSet<Id> = HashSet::new();

    for net_id in routed_paths.keys().sorted() {
        for path in &routed_paths[net_id] {
            for cell in path {
                match cell_owner.get(cell) {
                    Some(owner) if *owner != net_id => {
                        crossing.insert((*owner).clone());
                        crossing.insert(net_id.clone());
                        warn!("  CROSSING: cell {cell} nets: {owner} vs {net_id}");
                    }
                    _ => {
                        cell_owner.insert(*cell, net_id);
                    }
                }
            }
        }
    }

    let mut result: Vec<Id> = crossing.into_iter().collect();
    result.sort();
    result
}

// Iteratively remove crossing nets until no cell is claimed twice,
// dropping the longest offender each round (the hardest to re-route
// anyway). Returns the removed net IDs; they go back to the failed pool.
fn strip_crossing_traces(routed_paths: &mut RoutedPaths, grid: &mut RoutingGrid) -> Vec<Id> {
    let mut removed = Vec::new();
    let max_iters = routed_paths.len() + 1;

    for _ in 0..max_iters {
        let crossing = find_crossing_nets(routed_paths);
        if crossing.is_empty() {
            break;
        }

        let victim = crossing
            .into_iter()
            .max_by_key(|nid| routed_paths.get(nid).map_or(0, |ps| ps.iter().map(Vec::len).sum::<usize>()))
            .expect("crossing nonempty");
        info!("Crossing validation: removing {victim}");
        if let Some(paths) = routed_paths.remove(&victim) {
            for path in &paths {
                grid.free_trace(path);
            }
        }
        removed.push(victim);
    }

    removed
}
