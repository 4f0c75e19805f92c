pub mod asserts;
pub mod deciders;
pub mod faults;
pub mod fixtures;

pub use asserts::*;
pub use deciders::*;
pub use faults::*;
pub use fixtures::*;
