use std::collections::HashMap;

use crate::model::catalog::Catalog;
use crate::model::design::split_pin_ref;
use crate::model::footprint::pin_world_xy;
use crate::model::placement::FullPlacement;
use crate::model::primitive::{Pt, PtI};
use crate::model::Id;

// Pin resolution: maps net-level pin references to physical pin world
// coordinates. Direct references resolve immediately; group references
// ("mcu_1:gpio") are dynamic, allocated from the group's pool to minimise
// trace length.

// A pad participating in a net, in both world and grid coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPad {
    pub instance_id: Id,
    // Resolved physical pin ID.
    pub pin_id: Id,
    // Original group ID if this was a dynamic allocation.
    pub group_id: Option<Id>,
    pub cell: PtI,
    pub world: Pt,
}

// Remaining unallocated physical pins per allocatable group, for one
// instance. Deep-copied per routing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PinPool {
    pub instance_id: Id,
    pub pools: HashMap<Id, Vec<Id>>,
}

pub type PinPools = HashMap<Id, PinPool>;

// Build dynamic pin pools for every placed instance with at least one
// allocatable pin group.
pub fn build_pin_pools(placement: &FullPlacement, catalog: &Catalog) -> PinPools {
    let mut pools = PinPools::new();
    for pc in &placement.components {
        let Some(cat) = catalog.component(&pc.catalog_id) else { continue };
        let inst_pools: HashMap<Id, Vec<Id>> = cat
            .pin_groups
            .iter()
            .filter(|g| g.allocatable)
            .map(|g| (g.id.clone(), g.pin_ids.clone()))
            .collect();
        if !inst_pools.is_empty() {
            pools.insert(
                pc.instance_id.clone(),
                PinPool { instance_id: pc.instance_id.clone(), pools: inst_pools },
            );
        }
    }
    pools
}

// Deep-copy pin pools for a fresh routing attempt.
pub fn copy_pools(pools: &PinPools) -> PinPools {
    pools.clone()
}

// Parse a pin reference and classify it. Returns (instance_id,
// pin_or_group_id, is_group). Direct pin IDs take priority: if a pin ID
// matches, it is a direct ref even if a group shares the name.
pub fn resolve_pin_ref<'a>(
    pin_ref: &'a str,
    placement: &FullPlacement,
    catalog: &Catalog,
) -> Option<(&'a str, &'a str, bool)> {
    let (iid, pid) = split_pin_ref(pin_ref)?;
    let Some(pc) = placement.component(iid) else {
        return Some((iid, pid, false));
    };
    let Some(cat) = catalog.component(&pc.catalog_id) else {
        return Some((iid, pid, false));
    };
    if cat.pin(pid).is_some() {
        return Some((iid, pid, false));
    }
    if cat.pin_group(pid).is_some() {
        return Some((iid, pid, true));
    }
    Some((iid, pid, false))
}

// World position of a specific physical pin on a placed instance.
pub fn pin_world_pos(
    instance_id: &str,
    pin_id: &str,
    placement: &FullPlacement,
    catalog: &Catalog,
) -> Option<Pt> {
    let pc = placement.component(instance_id)?;
    let cat = catalog.component(&pc.catalog_id)?;
    let pin = cat.pin(pin_id)?;
    Some(pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg))
}

// World positions of all pins in a pin group: (pin_id, world).
pub fn group_pin_positions(
    instance_id: &str,
    group_id: &str,
    placement: &FullPlacement,
    catalog: &Catalog,
) -> Vec<(Id, Pt)> {
    let Some(pc) = placement.component(instance_id) else { return Vec::new() };
    let Some(cat) = catalog.component(&pc.catalog_id) else { return Vec::new() };
    let Some(group) = cat.pin_group(group_id) else { return Vec::new() };

    group
        .pin_ids
        .iter()
        .filter_map(|pid| {
            cat.pin(pid).map(|pin| {
                (pid.clone(), pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg))
            })
        })
        .collect()
}

// Pick the pin in the group's pool whose world position is closest to the
// target, removing it from the pool. Returns None when the pool is empty.
pub fn allocate_best_pin(
    instance_id: &str,
    group_id: &str,
    target: Pt,
    pool: &mut PinPool,
    placement: &FullPlacement,
    catalog: &Catalog,
) -> Option<Id> {
    let pc = placement.component(instance_id)?;
    let cat = catalog.component(&pc.catalog_id)?;
    let available = pool.pools.get_mut(group_id)?;

    let mut best: Option<(usize, f64)> = None;
    for (i, pid) in available.iter().enumerate() {
        let Some(pin) = cat.pin(pid) else { continue };
        let w = pin_world_xy(pin.position_mm, pc.x_mm, pc.y_mm, pc.rotation_deg);
        let d = w.dist2(target);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }

    best.map(|(i, _)| available.remove(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::{Body, Component, Mounting, MountingStyle, Pin, PinDirection, PinGroup};
    use crate::model::design::Outline;
    use crate::model::placement::PlacedComponent;
    use crate::model::primitive::pt;

    fn mcu_component() -> Component {
        let pin = |id: &str, x: f64, y: f64| Pin {
            id: id.to_owned(),
            label: id.to_owned(),
            position_mm: pt(x, y),
            direction: PinDirection::Bidirectional,
            hole_diameter_mm: 0.8,
        };
        Component {
            id: "mcu_atmega328".to_owned(),
            name: "MCU".to_owned(),
            description: String::new(),
            ui_placement: false,
            body: Body::Rect { width_mm: 10.0, length_mm: 35.0, height_mm: 4.0 },
            mounting: Mounting {
                style: MountingStyle::Internal,
                allowed_styles: vec![MountingStyle::Internal],
                blocks_routing: false,
                keepout_margin_mm: 1.0,
            },
            pins: vec![pin("PD2", -5.0, 4.0), pin("PD3", -5.0, 1.0), pin("PD4", -5.0, -2.0)],
            internal_nets: vec![],
            pin_groups: vec![PinGroup {
                id: "gpio".to_owned(),
                pin_ids: vec!["PD2".to_owned(), "PD3".to_owned(), "PD4".to_owned()],
                fixed_net: None,
                allocatable: true,
                capabilities: vec![],
            }],
            configurable: Default::default(),
        }
    }

    fn placement_with_mcu() -> FullPlacement {
        FullPlacement {
            components: vec![PlacedComponent {
                instance_id: "mcu_1".to_owned(),
                catalog_id: "mcu_atmega328".to_owned(),
                x_mm: 20.0,
                y_mm: 20.0,
                rotation_deg: 0,
            }],
            outline: Outline::default(),
            nets: vec![],
        }
    }

    #[test]
    fn test_build_pin_pools() {
        let catalog = Catalog::new(vec![mcu_component()]);
        let placement = placement_with_mcu();
        let pools = build_pin_pools(&placement, &catalog);
        assert_eq!(pools["mcu_1"].pools["gpio"].len(), 3);
    }

    #[test]
    fn test_resolve_pin_ref_direct_vs_group() {
        let catalog = Catalog::new(vec![mcu_component()]);
        let placement = placement_with_mcu();
        assert_eq!(resolve_pin_ref("mcu_1:PD2", &placement, &catalog), Some(("mcu_1", "PD2", false)));
        assert_eq!(resolve_pin_ref("mcu_1:gpio", &placement, &catalog), Some(("mcu_1", "gpio", true)));
        assert_eq!(resolve_pin_ref("bogus", &placement, &catalog), None);
    }

    #[test]
    fn test_allocate_best_pin_nearest_and_injective() {
        let catalog = Catalog::new(vec![mcu_component()]);
        let placement = placement_with_mcu();
        let mut pools = build_pin_pools(&placement, &catalog);
        let pool = pools.get_mut("mcu_1").unwrap();

        // Target near PD4's world position (15, 18).
        let chosen = allocate_best_pin("mcu_1", "gpio", pt(15.0, 18.0), pool, &placement, &catalog);
        assert_eq!(chosen.as_deref(), Some("PD4"));
        // PD4 is gone from the pool now.
        assert!(!pool.pools["gpio"].contains(&"PD4".to_owned()));

        let chosen = allocate_best_pin("mcu_1", "gpio", pt(15.0, 18.0), pool, &placement, &catalog);
        assert_eq!(chosen.as_deref(), Some("PD3"));
        let chosen = allocate_best_pin("mcu_1", "gpio", pt(15.0, 18.0), pool, &placement, &catalog);
        assert_eq!(chosen.as_deref(), Some("PD2"));
        // Pool exhausted.
        let chosen = allocate_best_pin("mcu_1", "gpio", pt(15.0, 18.0), pool, &placement, &catalog);
        assert_eq!(chosen, None);
    }

    #[test]
    fn test_group_pin_positions() {
        let catalog = Catalog::new(vec![mcu_component()]);
        let placement = placement_with_mcu();
        let positions = group_pin_positions("mcu_1", "gpio", &placement, &catalog);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].0, "PD2");
        // PD2 local (-5, 4) at (20, 20) rot 0 -> (15, 24).
        assert!((positions[0].1.x - 15.0).abs() < 1e-9);
        assert!((positions[0].1.y - 24.0).abs() < 1e-9);
        assert!(group_pin_positions("mcu_1", "nope", &placement, &catalog).is_empty());
    }

    #[test]
    fn test_pin_world_pos_with_rotation() {
        let catalog = Catalog::new(vec![mcu_component()]);
        let mut placement = placement_with_mcu();
        placement.components[0].rotation_deg = 90;
        // PD2 local (-5, 4) rotated 90: (-4, -5); world = (16, 15).
        let w = pin_world_pos("mcu_1", "PD2", &placement, &catalog).unwrap();
        assert!((w.x - 16.0).abs() < 1e-9);
        assert!((w.y - 15.0).abs() < 1e-9);
    }
}
