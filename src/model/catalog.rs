use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::primitive::point::Pt;
use crate::model::Id;

// Typed representation of the read-only component catalog. Entries are
// loaded from JSON; the placer and router only ever read them.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Body {
    Rect { width_mm: f64, length_mm: f64, height_mm: f64 },
    Circle { diameter_mm: f64, height_mm: f64 },
}

impl Body {
    pub fn height_mm(&self) -> f64 {
        match self {
            Body::Rect { height_mm, .. } | Body::Circle { height_mm, .. } => *height_mm,
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MountingStyle {
    #[default]
    Top,
    Bottom,
    Side,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mounting {
    pub style: MountingStyle,
    pub allowed_styles: Vec<MountingStyle>,
    pub blocks_routing: bool,
    pub keepout_margin_mm: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    In,
    Out,
    Bidirectional,
}

// Pin positions are in the component's local frame; the placement rotation
// is applied when computing world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: Id,
    #[serde(default)]
    pub label: String,
    pub position_mm: Pt,
    pub direction: PinDirection,
    pub hole_diameter_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinGroup {
    pub id: Id,
    pub pin_ids: Vec<Id>,
    #[serde(default)]
    pub fixed_net: Option<Id>,
    #[serde(default)]
    pub allocatable: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ui_placement: bool,
    pub body: Body,
    pub mounting: Mounting,
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub internal_nets: Vec<Vec<Id>>,
    #[serde(default)]
    pub pin_groups: Vec<PinGroup>,
    #[serde(default)]
    pub configurable: HashMap<String, serde_json::Value>,
}

impl Component {
    pub fn pin(&self, pin_id: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == pin_id)
    }

    pub fn pin_group(&self, group_id: &str) -> Option<&PinGroup> {
        self.pin_groups.iter().find(|g| g.id == group_id)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub components: Vec<Component>,
}

impl Catalog {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn component(&self, catalog_id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == catalog_id)
    }

    // Lookup map for the hot paths in the placer and router.
    pub fn component_map(&self) -> HashMap<&str, &Component> {
        self.components.iter().map(|c| (c.id.as_str(), c)).collect()
    }
}
