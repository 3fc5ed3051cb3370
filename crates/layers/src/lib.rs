pub mod keywords;
pub mod layer;
pub mod mapping;
pub mod query;

pub use keywords::*;
pub use layer::*;
pub use mapping::{FeatureMapper, MappingExpr};
pub use query::*;
