use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::model::design::{Net, Outline};
use crate::model::primitive::rect::Rt;
use crate::model::Id;

// A component with a resolved world position and rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedComponent {
    pub instance_id: Id,
    pub catalog_id: Id,
    pub x_mm: f64,
    pub y_mm: f64,
    pub rotation_deg: i32,
}

// Complete placement of all components, ready for the router. The outline
// and nets pass through unchanged so downstream stages can read them.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullPlacement {
    pub components: Vec<PlacedComponent>,
    pub outline: Outline,
    pub nets: Vec<Net>,
}

impl FullPlacement {
    pub fn component(&self, instance_id: &str) -> Option<&PlacedComponent> {
        self.components.iter().find(|c| c.instance_id == instance_id)
    }
}

// Structured context for a placement failure, for the design agent to act
// on: the offending footprint, the outline it did not fit, and what was
// already committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementDiagnostic {
    pub body_mm: (f64, f64),
    pub keepout_mm: f64,
    pub outline_bounds: Rt,
    pub placed_envelopes: Vec<(Id, Rt)>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot place '{instance_id}' ({catalog_id}): {reason}")]
pub struct PlacementError {
    pub instance_id: Id,
    pub catalog_id: Id,
    pub reason: String,
    pub diagnostic: Option<PlacementDiagnostic>,
}

impl PlacementError {
    pub fn new(instance_id: &str, catalog_id: &str, reason: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.to_owned(),
            catalog_id: catalog_id.to_owned(),
            reason: reason.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: PlacementDiagnostic) -> Self {
        self.diagnostic = Some(diagnostic);
        self
    }
}

// Serialize a FullPlacement to the placement.json artifact.
pub fn placement_to_json(fp: &FullPlacement) -> Result<String> {
    serde_json::to_string_pretty(fp).wrap_err("failed to serialize placement")
}

// Parse a placement.json artifact back into a FullPlacement.
pub fn parse_placement(json: &str) -> Result<FullPlacement> {
    serde_json::from_str(json).wrap_err("failed to parse placement")
}
