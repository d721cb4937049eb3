use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::model::rules::TraceRules;
use crate::model::Id;

// A routed trace: a simplified Manhattan polyline in world millimetres.
// Consecutive waypoints differ on exactly one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub net_id: Id,
    pub path: Vec<(f64, f64)>,
}

// Complete routing result. Routing failure is data, not an error: nets that
// could not be routed within the search budget are listed in failed_nets.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub traces: Vec<Trace>,
    // "net|ref" -> "instance:physical_pin" for dynamic group allocations.
    pub pin_assignments: HashMap<String, String>,
    pub failed_nets: Vec<Id>,
}

impl RoutingResult {
    pub fn ok(&self) -> bool {
        self.failed_nets.is_empty()
    }
}

// All tuneable router parameters in one place. Physical dimensions come
// from the shared TraceRules so they stay in sync with the placer.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub rules: TraceRules,

    /// A* cost added per direction change (bias toward straight runs).
    pub turn_penalty: i32,
    /// A* cost for entering a blocked cell in rip-up mode.
    pub crossing_penalty: i32,

    /// Outer random-ordering attempts (pruning skips dead orderings).
    pub max_rip_up_attempts: usize,
    /// Inner rip-up iterations per outer attempt.
    pub inner_rip_up_limit: usize,
    /// Maximum wall-clock time for routing, in seconds.
    pub time_budget_s: f64,

    /// Seed for the shuffled orderings of attempts >= 1.
    pub seed: u64,
    /// Externally observable cancellation flag, checked wherever the time
    /// budget is.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rules: TraceRules::default(),
            turn_penalty: 5,
            crossing_penalty: 500,
            max_rip_up_attempts: 200,
            inner_rip_up_limit: 100,
            time_budget_s: 60.0,
            seed: 0x1c3_7ace,
            cancel: None,
        }
    }
}

impl RouterConfig {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

// Serialize a RoutingResult to the routing.json artifact.
pub fn routing_to_json(result: &RoutingResult) -> Result<String> {
    serde_json::to_string_pretty(result).wrap_err("failed to serialize routing result")
}

// Parse a routing.json artifact back into a RoutingResult. Missing optional
// fields default to empty.
pub fn parse_routing(json: &str) -> Result<RoutingResult> {
    #[derive(Deserialize)]
    struct Partial {
        #[serde(default)]
        traces: Vec<Trace>,
        #[serde(default)]
        pin_assignments: HashMap<String, String>,
        #[serde(default)]
        failed_nets: Vec<Id>,
    }
    let p: Partial = serde_json::from_str(json).wrap_err("failed to parse routing result")?;
    Ok(RoutingResult {
        traces: p.traces,
        pin_assignments: p.pin_assignments,
        failed_nets: p.failed_nets,
    })
}
