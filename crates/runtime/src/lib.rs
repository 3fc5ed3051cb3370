pub mod adapter;
pub mod event_bus;
pub mod idle;

pub use adapter::*;
pub use event_bus::*;
pub use idle::*;
