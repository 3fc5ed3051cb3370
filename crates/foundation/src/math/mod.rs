pub mod crs;
pub mod geodesy;
pub mod viewport;

pub use crs::*;
pub use geodesy::*;
pub use viewport::*;
