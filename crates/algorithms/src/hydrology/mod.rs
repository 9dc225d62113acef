//! Hydrological conditioning and D8 routing
//!
//! - Priority-Flood: O(n log n) depression filling (Barnes 2014)
//! - Flow direction: D8 single flow direction with a fixed tie-break order
//! - Flow accumulation: upstream cell counts in decreasing-elevation order

pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod priority_flood;
mod routing;

pub use flow_accumulation::{flow_accumulation, topological_order};
pub use flow_direction::{flow_direction, FlowDirectionParams};
pub use priority_flood::{has_monotonic_drainage, priority_flood, PriorityFlood, PriorityFloodParams};
pub use routing::{route, FlowRouter, FlowRouting};
