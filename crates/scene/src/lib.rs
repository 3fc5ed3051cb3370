pub mod feature;
pub mod reconcile;
pub mod selection;
pub mod store;

pub use feature::*;
pub use reconcile::*;
pub use selection::*;
pub use store::*;
