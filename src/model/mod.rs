pub mod catalog;
pub mod design;
pub mod footprint;
pub mod geom;
pub mod placement;
pub mod primitive;
pub mod routing;
pub mod rules;
pub mod validate;

// Readable names used throughout the design: instance IDs, catalog IDs,
// net IDs, pin IDs.
pub type Id = String;
