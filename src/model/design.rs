use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::model::catalog::MountingStyle;
use crate::model::primitive::polygon::Poly;
use crate::model::primitive::{pt, Pt};
use crate::model::Id;

// The design spec is the agent's output: components drawn from the catalog,
// nets connecting their pins, a 2D outline polygon, and fixed positions for
// user-facing components.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub catalog_id: Id,
    pub instance_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mounting_style: Option<MountingStyle>,
}

// Pin references are "instance_id:pin_id", or "instance_id:group_id" for
// dynamic allocation from a pin pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub id: Id,
    pub pins: Vec<String>,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

// A single outline vertex with optional corner easing: ease_in runs along
// the incoming edge, ease_out along the outgoing edge. Zero = sharp corner.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineVertex {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ease_in: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ease_out: f64,
}

impl OutlineVertex {
    pub fn sharp(x: f64, y: f64) -> Self {
        Self { x, y, ease_in: 0.0, ease_out: 0.0 }
    }
}

// Device outline as a list of vertices. Clockwise winding by convention,
// but the geometry accepts either.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline {
    pub points: Vec<OutlineVertex>,
}

impl Outline {
    pub fn new(points: Vec<OutlineVertex>) -> Self {
        Self { points }
    }

    pub fn vertices(&self) -> Vec<Pt> {
        self.points.iter().map(|p| pt(p.x, p.y)).collect()
    }

    pub fn polygon(&self) -> Poly {
        Poly::new(&self.vertices())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIPlacement {
    pub instance_id: Id,
    pub x_mm: f64,
    pub y_mm: f64,
    // Side-mount only: which outline edge (0-based) to mount on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_index: Option<usize>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    pub components: Vec<ComponentInstance>,
    pub nets: Vec<Net>,
    pub outline: Outline,
    pub ui_placements: Vec<UIPlacement>,
}

impl DesignSpec {
    pub fn instance(&self, instance_id: &str) -> Option<&ComponentInstance> {
        self.components.iter().find(|c| c.instance_id == instance_id)
    }
}

// Parse a raw JSON design object (from the agent or the session store).
pub fn parse_design(json: &str) -> Result<DesignSpec> {
    let mut spec: DesignSpec =
        serde_json::from_str(json).wrap_err("failed to parse design spec")?;
    // If only one easing side is given, mirror it to the other.
    for v in &mut spec.outline.points {
        if v.ease_in != 0.0 && v.ease_out == 0.0 {
            v.ease_out = v.ease_in;
        } else if v.ease_out != 0.0 && v.ease_in == 0.0 {
            v.ease_in = v.ease_out;
        }
    }
    Ok(spec)
}

pub fn design_to_json(spec: &DesignSpec) -> Result<String> {
    serde_json::to_string_pretty(spec).wrap_err("failed to serialize design spec")
}

// Split an "instance:pin" reference. Returns None for malformed refs.
pub fn split_pin_ref(pin_ref: &str) -> Option<(&str, &str)> {
    pin_ref.split_once(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_design_roundtrip() {
        let json = r#"{
            "components": [
                {"catalog_id": "led_5mm_red", "instance_id": "led_1", "mounting_style": "top"}
            ],
            "nets": [
                {"id": "GND", "pins": ["led_1:cathode", "bat_1:GND"]}
            ],
            "outline": [
                {"x": 0, "y": 0}, {"x": 30, "y": 0},
                {"x": 30, "y": 80, "ease_in": 8}, {"x": 0, "y": 80}
            ],
            "ui_placements": [
                {"instance_id": "led_1", "x_mm": 15.0, "y_mm": 70.0}
            ]
        }"#;
        let spec = parse_design(json).unwrap();
        assert_eq!(spec.components.len(), 1);
        assert_eq!(spec.components[0].mounting_style, Some(MountingStyle::Top));
        assert_eq!(spec.nets[0].pins.len(), 2);
        assert_eq!(spec.outline.points.len(), 4);
        // Single-sided easing mirrors to the other side.
        assert_eq!(spec.outline.points[2].ease_in, 8.0);
        assert_eq!(spec.outline.points[2].ease_out, 8.0);
        assert_eq!(spec.ui_placements[0].edge_index, None);

        let back = design_to_json(&spec).unwrap();
        let reparsed = parse_design(&back).unwrap();
        assert_eq!(reparsed, spec);
    }

    #[test]
    fn test_split_pin_ref() {
        assert_eq!(split_pin_ref("bat_1:V+"), Some(("bat_1", "V+")));
        assert_eq!(split_pin_ref("mcu_1:gpio"), Some(("mcu_1", "gpio")));
        assert_eq!(split_pin_ref("nonsense"), None);
    }

    #[test]
    fn test_outline_polygon() {
        let outline = Outline::new(vec![
            OutlineVertex::sharp(0.0, 0.0),
            OutlineVertex::sharp(35.0, 0.0),
            OutlineVertex::sharp(35.0, 120.0),
            OutlineVertex::sharp(0.0, 120.0),
        ]);
        let poly = outline.polygon();
        assert_eq!(poly.area(), 35.0 * 120.0);
    }
}
