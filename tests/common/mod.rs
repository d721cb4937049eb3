// Shared fixtures for the end-to-end tests. The flashlight is the simplest
// complete device: battery -> button -> resistor -> LED -> ground. Four
// components, four two-pin nets, no dynamic pin allocation.
#![allow(dead_code)]

use std::collections::HashMap;

use inkroute::model::catalog::{
    Body, Catalog, Component, Mounting, MountingStyle, Pin, PinDirection, PinGroup,
};
use inkroute::model::design::{ComponentInstance, DesignSpec, Net, Outline, OutlineVertex, UIPlacement};
use inkroute::model::primitive::{pt, Pt};

pub fn pin(id: &str, x: f64, y: f64) -> Pin {
    Pin {
        id: id.to_owned(),
        label: id.to_owned(),
        position_mm: pt(x, y),
        direction: PinDirection::Bidirectional,
        hole_diameter_mm: 0.8,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn component(
    id: &str,
    body: Body,
    style: MountingStyle,
    blocks_routing: bool,
    keepout: f64,
    ui_placement: bool,
    pins: Vec<Pin>,
    pin_groups: Vec<PinGroup>,
) -> Component {
    Component {
        id: id.to_owned(),
        name: id.to_owned(),
        description: String::new(),
        ui_placement,
        body,
        mounting: Mounting {
            style,
            allowed_styles: vec![style],
            blocks_routing,
            keepout_margin_mm: keepout,
        },
        pins,
        internal_nets: vec![],
        pin_groups,
        configurable: HashMap::new(),
    }
}

pub fn rect_outline(w: f64, h: f64) -> Outline {
    Outline::new(vec![
        OutlineVertex::sharp(0.0, 0.0),
        OutlineVertex::sharp(w, 0.0),
        OutlineVertex::sharp(w, h),
        OutlineVertex::sharp(0.0, h),
    ])
}

pub fn net(id: &str, pins: &[&str]) -> Net {
    Net { id: id.to_owned(), pins: pins.iter().map(|s| (*s).to_owned()).collect() }
}

pub fn instance(catalog_id: &str, instance_id: &str) -> ComponentInstance {
    ComponentInstance {
        catalog_id: catalog_id.to_owned(),
        instance_id: instance_id.to_owned(),
        config: None,
        mounting_style: None,
    }
}

pub fn ui_placement(instance_id: &str, p: Pt) -> UIPlacement {
    UIPlacement { instance_id: instance_id.to_owned(), x_mm: p.x, y_mm: p.y, edge_index: None }
}

// The flashlight catalog: battery holder, tactile button, axial resistor,
// 5 mm LED, plus a tiny single-pin test point used by router scenarios.
pub fn flashlight_catalog() -> Catalog {
    Catalog::new(vec![
        component(
            "battery_holder_2xAAA",
            Body::Rect { width_mm: 25.0, length_mm: 48.0, height_mm: 13.0 },
            MountingStyle::Bottom,
            true,
            2.0,
            false,
            vec![pin("V+", -8.0, 25.5), pin("GND", 8.0, 25.5)],
            vec![],
        ),
        component(
            "tactile_button_6x6",
            Body::Rect { width_mm: 6.0, length_mm: 6.0, height_mm: 4.0 },
            MountingStyle::Top,
            false,
            1.0,
            true,
            vec![pin("A", -4.5, 0.0), pin("B", 4.5, 0.0)],
            vec![],
        ),
        component(
            "resistor_axial",
            Body::Rect { width_mm: 6.5, length_mm: 2.5, height_mm: 2.5 },
            MountingStyle::Internal,
            false,
            1.0,
            false,
            vec![pin("1", -5.0, 0.0), pin("2", 5.0, 0.0)],
            vec![],
        ),
        component(
            "led_5mm_red",
            Body::Circle { diameter_mm: 5.0, height_mm: 8.6 },
            MountingStyle::Top,
            false,
            1.0,
            true,
            vec![pin("anode", -1.27, 0.0), pin("cathode", 1.27, 0.0)],
            vec![],
        ),
        component(
            "test_point",
            Body::Circle { diameter_mm: 2.0, height_mm: 1.0 },
            MountingStyle::Top,
            false,
            0.5,
            false,
            vec![pin("1", 0.0, 0.0)],
            vec![],
        ),
    ])
}

// Flashlight design: 35 x 120 mm outline, button and LED UI-placed on the
// centre line, battery and resistor auto-placed.
pub fn flashlight_design() -> DesignSpec {
    DesignSpec {
        components: vec![
            instance("battery_holder_2xAAA", "bat_1"),
            instance("tactile_button_6x6", "btn_1"),
            instance("resistor_axial", "r_1"),
            instance("led_5mm_red", "led_1"),
        ],
        nets: vec![
            net("VCC", &["bat_1:V+", "btn_1:A"]),
            net("BTN_GND", &["btn_1:B", "r_1:1"]),
            net("LED_DRIVE", &["r_1:2", "led_1:anode"]),
            net("GND", &["led_1:cathode", "bat_1:GND"]),
        ],
        outline: rect_outline(35.0, 120.0),
        ui_placements: vec![
            ui_placement("btn_1", pt(17.5, 70.0)),
            ui_placement("led_1", pt(17.5, 100.0)),
        ],
    }
}
