pub mod arena;
pub mod bounds;
pub mod ids;
pub mod math;

// Foundation crate: small, well-tested primitives only.
pub use arena::*;
pub use bounds::*;
pub use ids::*;
