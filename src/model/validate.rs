use std::collections::{HashMap, HashSet};

use crate::model::catalog::{Catalog, Component, MountingStyle};
use crate::model::design::{split_pin_ref, DesignSpec};
use crate::model::geom::contains::poly_contains_pt;
use crate::model::geom::intersects::seg_crosses_seg;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{pt, seg};

// Validate a DesignSpec against the catalog before the core runs. Returns
// human-readable error messages; empty means valid. Validation errors never
// reach the placer.
pub fn validate_design(spec: &DesignSpec, catalog: &Catalog) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();
    let catalog_map = catalog.component_map();

    // All catalog_ids must exist.
    for ci in &spec.components {
        if !catalog_map.contains_key(ci.catalog_id.as_str()) {
            errors.push(format!(
                "Component '{}': unknown catalog_id '{}'",
                ci.instance_id, ci.catalog_id
            ));
        }
    }

    // Instance IDs must be unique.
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for ci in &spec.components {
        if !seen_ids.insert(&ci.instance_id) {
            errors.push(format!("Duplicate instance_id '{}'", ci.instance_id));
        }
    }

    // instance_id -> catalog Component, only for known catalog_ids.
    let instance_to_catalog: HashMap<&str, &Component> = spec
        .components
        .iter()
        .filter_map(|ci| {
            catalog_map.get(ci.catalog_id.as_str()).map(|&c| (ci.instance_id.as_str(), c))
        })
        .collect();

    // Mounting style overrides must be allowed.
    for ci in &spec.components {
        if let (Some(style), Some(cat)) =
            (ci.mounting_style, instance_to_catalog.get(ci.instance_id.as_str()))
        {
            if !cat.mounting.allowed_styles.contains(&style) {
                errors.push(format!(
                    "Component '{}': mounting_style '{style}' not in allowed_styles {:?}",
                    ci.instance_id,
                    cat.mounting.allowed_styles.iter().map(ToString::to_string).collect::<Vec<_>>()
                ));
            }
        }
    }

    // Configurable fields.
    for ci in &spec.components {
        if let (Some(config), Some(cat)) =
            (&ci.config, instance_to_catalog.get(ci.instance_id.as_str()))
        {
            if cat.configurable.is_empty() {
                errors.push(format!(
                    "Component '{}': has config but '{}' has no configurable fields",
                    ci.instance_id, ci.catalog_id
                ));
            } else {
                for key in config.keys() {
                    if !cat.configurable.contains_key(key) {
                        errors.push(format!(
                            "Component '{}': unknown config key '{key}'",
                            ci.instance_id
                        ));
                    }
                }
            }
        }
    }

    // Net pin references.
    for net in &spec.nets {
        if net.pins.len() < 2 {
            errors.push(format!("Net '{}': must have at least 2 pins", net.id));
        }
        for pin_ref in &net.pins {
            let Some((iid, pid)) = split_pin_ref(pin_ref) else {
                errors.push(format!(
                    "Net '{}': invalid pin reference '{pin_ref}' (expected 'instance_id:pin_id')",
                    net.id
                ));
                continue;
            };
            if !seen_ids.contains(iid) {
                errors.push(format!("Net '{}': unknown instance '{iid}' in '{pin_ref}'", net.id));
                continue;
            }
            // Unknown catalog_id was already reported.
            let Some(cat) = instance_to_catalog.get(iid) else { continue };
            if cat.pin(pid).is_none() && cat.pin_group(pid).is_none() {
                errors.push(format!(
                    "Net '{}': unknown pin/group '{pid}' on '{iid}' (catalog: {})",
                    net.id, cat.id
                ));
            }
        }
    }

    // Each direct pin in at most one net; group references are dynamic
    // allocations, capped by the pool size instead.
    let mut allocatable_groups: HashMap<(&str, &str), usize> = HashMap::new();
    for ci in &spec.components {
        if let Some(cat) = instance_to_catalog.get(ci.instance_id.as_str()) {
            for g in &cat.pin_groups {
                if g.allocatable {
                    allocatable_groups.insert((ci.instance_id.as_str(), g.id.as_str()), g.pin_ids.len());
                }
            }
        }
    }

    let mut pin_to_net: HashMap<&str, &str> = HashMap::new();
    let mut group_alloc: HashMap<(&str, &str), Vec<&str>> = HashMap::new();
    for net in &spec.nets {
        for pin_ref in &net.pins {
            let Some((iid, pid)) = split_pin_ref(pin_ref) else { continue };
            if allocatable_groups.contains_key(&(iid, pid)) {
                group_alloc.entry((iid, pid)).or_default().push(&net.id);
            } else if let Some(prev) = pin_to_net.insert(pin_ref, &net.id) {
                errors.push(format!("Pin '{pin_ref}' in both net '{prev}' and net '{}'", net.id));
            }
        }
    }
    for ((iid, gid), net_ids) in &group_alloc {
        let pool = allocatable_groups[&(*iid, *gid)];
        if net_ids.len() > pool {
            errors.push(format!(
                "Group '{iid}:{gid}' used in {} nets but only has {pool} pins available (nets: {})",
                net_ids.len(),
                net_ids.join(", ")
            ));
        }
    }

    // UI placements must reference ui_placement=true components; side-mount
    // placements need a valid edge_index, nothing else may carry one.
    for up in &spec.ui_placements {
        let Some(cat) = instance_to_catalog.get(up.instance_id.as_str()) else {
            if !seen_ids.contains(up.instance_id.as_str()) {
                errors.push(format!("UI placement: unknown instance '{}'", up.instance_id));
            }
            continue;
        };
        if !cat.ui_placement {
            errors.push(format!(
                "UI placement: '{}' ({}) has ui_placement=false",
                up.instance_id, cat.id
            ));
        }

        let eff_style = spec
            .instance(&up.instance_id)
            .and_then(|ci| ci.mounting_style)
            .unwrap_or(cat.mounting.style);

        if eff_style == MountingStyle::Side {
            match up.edge_index {
                None => errors.push(format!(
                    "UI placement '{}': side-mount components require edge_index \
                     (which outline edge to mount on)",
                    up.instance_id
                )),
                Some(i) if i >= spec.outline.points.len() => errors.push(format!(
                    "UI placement '{}': edge_index {i} out of range (0-{})",
                    up.instance_id,
                    spec.outline.points.len().saturating_sub(1)
                )),
                Some(_) => {}
            }
        } else if up.edge_index.is_some() {
            errors.push(format!(
                "UI placement '{}': edge_index is only for side-mount components \
                 (mounting style is '{eff_style}')",
                up.instance_id
            ));
        }
    }

    // All ui_placement=true components must have a placement.
    let ui_placed: HashSet<&str> = spec.ui_placements.iter().map(|u| u.instance_id.as_str()).collect();
    for ci in &spec.components {
        if let Some(cat) = instance_to_catalog.get(ci.instance_id.as_str()) {
            if cat.ui_placement && !ui_placed.contains(ci.instance_id.as_str()) {
                errors.push(format!(
                    "Component '{}' ({}) has ui_placement=true but no UIPlacement defined",
                    ci.instance_id, cat.id
                ));
            }
        }
    }

    // Outline validation.
    if spec.outline.points.len() < 3 {
        errors.push("Outline must have at least 3 vertices".to_owned());
    }
    for (i, p) in spec.outline.points.iter().enumerate() {
        if p.ease_in < 0.0 {
            errors.push(format!("Vertex {i}: ease_in must be >= 0"));
        }
        if p.ease_out < 0.0 {
            errors.push(format!("Vertex {i}: ease_out must be >= 0"));
        }
    }

    if spec.outline.points.len() >= 3 {
        let poly = spec.outline.polygon();
        if !is_simple_polygon(&poly) {
            errors.push("Outline polygon is self-intersecting or invalid".to_owned());
        } else if poly.area() <= 0.0 {
            errors.push("Outline polygon has zero or negative area".to_owned());
        } else {
            for up in &spec.ui_placements {
                // Side-mount: on the edge, not interior.
                if up.edge_index.is_some() {
                    continue;
                }
                if !poly_contains_pt(&poly, pt(up.x_mm, up.y_mm)) {
                    errors.push(format!(
                        "UI placement '{}' at ({}, {}) is outside the outline",
                        up.instance_id, up.x_mm, up.y_mm
                    ));
                }
            }
        }
    }

    errors
}

// A polygon is simple when no two non-adjacent edges intersect. Adjacent
// edges share an endpoint, which seg_crosses_seg already exempts.
fn is_simple_polygon(poly: &Poly) -> bool {
    let n = poly.len();
    for i in 0..n {
        let (a0, a1) = poly.edge(i);
        for j in (i + 1)..n {
            let (b0, b1) = poly.edge(j);
            if seg_crosses_seg(&seg(a0, a1), &seg(b0, b1)) {
                return false;
            }
        }
    }
    true
}
