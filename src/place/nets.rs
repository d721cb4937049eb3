use std::collections::{HashMap, HashSet, VecDeque};

use ordered_float::OrderedFloat;

use crate::model::catalog::Component;
use crate::model::design::{split_pin_ref, Net};
use crate::model::primitive::{pt, Pt};
use crate::model::Id;

// Net connectivity graph used by placement ordering and scoring. Nodes are
// instances; each net with k instances contributes k*(k-1)/2 mirrored edge
// pairs. Counterparties are named by ID, never by reference, so the graph
// has no ownership cycles.

#[derive(Debug, Clone, PartialEq)]
pub struct NetEdge {
    pub net_id: Id,
    pub other_iid: Id,
    pub my_pins: Vec<Id>,
    pub other_pins: Vec<Id>,
    // Number of distinct instances on this net. High-fanout nets (GND, VCC)
    // get stronger proximity weight.
    pub fanout: usize,
}

pub type NetGraph = HashMap<Id, Vec<NetEdge>>;

pub fn build_net_graph(nets: &[Net]) -> NetGraph {
    let mut graph: NetGraph = HashMap::new();

    for net in nets {
        // Group pins by instance.
        let mut by_inst: Vec<(String, Vec<Id>)> = Vec::new();
        for r in &net.pins {
            let Some((iid, pid)) = split_pin_ref(r) else { continue };
            match by_inst.iter_mut().find(|(i, _)| i == iid) {
                Some((_, pins)) => pins.push(pid.to_owned()),
                None => by_inst.push((iid.to_owned(), vec![pid.to_owned()])),
            }
        }

        let fanout = by_inst.len();
        for i in 0..by_inst.len() {
            for j in (i + 1)..by_inst.len() {
                let (a, a_pins) = &by_inst[i];
                let (b, b_pins) = &by_inst[j];
                graph.entry(a.clone()).or_default().push(NetEdge {
                    net_id: net.id.clone(),
                    other_iid: b.clone(),
                    my_pins: a_pins.clone(),
                    other_pins: b_pins.clone(),
                    fanout,
                });
                graph.entry(b.clone()).or_default().push(NetEdge {
                    net_id: net.id.clone(),
                    other_iid: a.clone(),
                    my_pins: b_pins.clone(),
                    other_pins: a_pins.clone(),
                    fanout,
                });
            }
        }
    }

    graph
}

// net_id -> number of distinct instances on the net. Nets with fanout >= 3
// are the high-fanout ones (GND, VCC) whose members should cluster.
pub fn net_fanout_map(nets: &[Net]) -> HashMap<Id, usize> {
    nets.iter()
        .map(|net| {
            let instances: HashSet<&str> =
                net.pins.iter().filter_map(|r| split_pin_ref(r)).map(|(iid, _)| iid).collect();
            (net.id.clone(), instances.len())
        })
        .collect()
}

// Count distinct nets connecting two instances: how many trace channels
// must fit in the gap between them.
pub fn count_shared_nets(iid_a: &str, iid_b: &str, graph: &NetGraph) -> usize {
    let mut nets: HashSet<&str> = HashSet::new();
    if let Some(edges) = graph.get(iid_a) {
        for e in edges {
            if e.other_iid == iid_b {
                nets.insert(&e.net_id);
            }
        }
    }
    nets.len()
}

// Number of unique neighbor instances per instance. High degree marks a
// hub, placed first so its satellites can cluster around it.
pub fn component_degree(graph: &NetGraph) -> HashMap<Id, usize> {
    graph
        .iter()
        .map(|(iid, edges)| {
            let n: HashSet<&str> = edges.iter().map(|e| e.other_iid.as_str()).collect();
            (iid.clone(), n.len())
        })
        .collect()
}

// Partition and order instances for group-aware placement:
// 1. Connected components traced through the FULL net graph (including
//    UI-placed bridges), filtered down to the requested instance IDs.
// 2. BFS within each group from the highest-degree member, ties broken by
//    footprint area (largest first), frontier re-sorted each pop.
// 3. Groups sorted so the group holding the largest single component comes
//    first.
pub fn build_placement_groups(
    instance_ids: &[Id],
    graph: &NetGraph,
    area_map: &HashMap<Id, f64>,
) -> Vec<Vec<Id>> {
    if instance_ids.is_empty() {
        return Vec::new();
    }

    let degrees = component_degree(graph);
    let degree = |iid: &str| degrees.get(iid).copied().unwrap_or(0);
    let area = |iid: &str| area_map.get(iid).copied().unwrap_or(0.0);

    let mut visited_global: HashSet<Id> = HashSet::new();
    let mut raw_groups: Vec<Vec<Id>> = Vec::new();

    for id in instance_ids {
        if visited_global.contains(id) {
            continue;
        }
        // BFS through the full net graph so two auto-placed components
        // linked transitively through UI-placed intermediaries share a
        // group.
        let mut reached: HashSet<Id> = HashSet::new();
        reached.insert(id.clone());
        let mut queue: VecDeque<Id> = VecDeque::new();
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(edges) = graph.get(&current) {
                for e in edges {
                    if !reached.contains(&e.other_iid) {
                        reached.insert(e.other_iid.clone());
                        queue.push_back(e.other_iid.clone());
                    }
                }
            }
        }
        let members: Vec<Id> =
            instance_ids.iter().filter(|i| reached.contains(i.as_str())).cloned().collect();
        visited_global.extend(members.iter().cloned());
        raw_groups.push(members);
    }

    // BFS-order within each group, hub first.
    let mut ordered_groups: Vec<Vec<Id>> = raw_groups
        .into_iter()
        .map(|members| {
            let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
            let seed = members
                .iter()
                .max_by_key(|i| (degree(i), OrderedFloat(area(i))))
                .cloned()
                .expect("group has members");
            let mut visited: Vec<Id> = Vec::new();
            let mut queue: Vec<Id> = vec![seed.clone()];
            let mut seen: HashSet<Id> = HashSet::new();
            seen.insert(seed);
            while !queue.is_empty() {
                // Prioritise high-degree components in the current
                // frontier, breaking ties by area. The sort is stable, so
                // full ties keep their BFS discovery order.
                queue.sort_by_key(|i| {
                    (std::cmp::Reverse(degree(i)), std::cmp::Reverse(OrderedFloat(area(i))))
                });
                let current = queue.remove(0);
                if let Some(edges) = graph.get(&current) {
                    for e in edges {
                        if member_set.contains(e.other_iid.as_str()) && !seen.contains(&e.other_iid)
                        {
                            seen.insert(e.other_iid.clone());
                            queue.push(e.other_iid.clone());
                        }
                    }
                }
                visited.push(current);
            }
            // Members unreachable through the member subgraph go last, by
            // descending area.
            let mut stragglers: Vec<Id> =
                members.iter().filter(|m| !seen.contains(*m)).cloned().collect();
            stragglers.sort_by_key(|i| std::cmp::Reverse(OrderedFloat(area(i))));
            visited.extend(stragglers);
            visited
        })
        .collect();

    ordered_groups.sort_by_key(|g| {
        std::cmp::Reverse(OrderedFloat(
            g.iter().map(|i| area(i)).fold(0.0, f64::max),
        ))
    });

    ordered_groups
}

// Local positions for a list of pin or group IDs. Group IDs resolve to the
// centroid of the group's pins; the router picks the exact pin later.
pub fn resolve_pin_positions(pin_ids: &[Id], cat: &Component) -> Vec<Pt> {
    let mut positions = Vec::new();
    for pid in pin_ids {
        if let Some(pin) = cat.pin(pid) {
            positions.push(pin.position_mm);
        } else if let Some(group) = cat.pin_group(pid) {
            let pts: Vec<Pt> = group
                .pin_ids
                .iter()
                .filter_map(|gp| cat.pin(gp).map(|p| p.position_mm))
                .collect();
            if !pts.is_empty() {
                let n = pts.len() as f64;
                positions.push(pt(
                    pts.iter().map(|p| p.x).sum::<f64>() / n,
                    pts.iter().map(|p| p.y).sum::<f64>() / n,
                ));
            }
        }
    }
    positions
}
