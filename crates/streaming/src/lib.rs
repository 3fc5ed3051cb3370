pub mod batch;
pub mod error;
pub mod getfeatureinfo;
pub mod gml;
pub mod orchestrator;
pub mod scope;
pub mod source;

pub use batch::*;
pub use error::*;
pub use getfeatureinfo::*;
pub use orchestrator::*;
pub use scope::*;
pub use source::*;
