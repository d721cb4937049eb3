use serde::{Deserialize, Serialize};

// Physical design rules for conductive-ink traces. All distances in mm.
//
// Both the placer (which reserves routing channels between components) and
// the router (which lays down actual traces) derive their clearance
// parameters from this single record, so changing a value here keeps the
// two stages in sync.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRules {
    /// Width of a single conductive-ink trace.
    pub trace_width_mm: f64,
    /// Minimum edge-to-edge gap between two traces.
    pub trace_clearance_mm: f64,
    /// Minimum gap from a trace edge to a foreign pin centre.
    pub pin_clearance_mm: f64,
    /// Minimum distance from a trace or component to the outline edge.
    pub edge_clearance_mm: f64,
    /// Routing-grid cell size.
    pub grid_resolution_mm: f64,
}

// Largest common pin hole diameter, used for the centre-to-centre bound.
const PIN_HOLE_DIAMETER_MM: f64 = 1.2;

impl Default for TraceRules {
    fn default() -> Self {
        TRACE_RULES
    }
}

impl TraceRules {
    // Width needed per trace channel between components: one trace plus one
    // full clearance (the gap the router enforces on each side is half the
    // clearance already).
    pub fn routing_channel_mm(&self) -> f64 {
        self.trace_width_mm + self.trace_clearance_mm
    }

    // Minimum centre-to-centre distance between pin holes of different
    // components, so a trace with its clearance envelope can pass between
    // two pins without violating pin_clearance on either side.
    pub fn min_pin_clearance_mm(&self) -> f64 {
        PIN_HOLE_DIAMETER_MM + 2.0 * self.pin_clearance_mm
    }

    // Hard minimum body-to-outline distance for the placer. Matches the
    // router edge clearance so traces at the body perimeter can still reach
    // the outline-inset boundary.
    pub fn min_edge_clearance_mm(&self) -> f64 {
        self.edge_clearance_mm
    }

    // Radius of the routable pad disk claimed around each pin; the envelope
    // computation inflates pin offsets by this much.
    pub fn pad_radius_mm(&self) -> f64 {
        self.trace_clearance_mm / 2.0
    }
}

// Crate-wide defaults.
pub const TRACE_RULES: TraceRules = TraceRules {
    trace_width_mm: 1.0,
    trace_clearance_mm: 2.0,
    pin_clearance_mm: 2.0,
    edge_clearance_mm: 1.5,
    grid_resolution_mm: 0.5,
};
