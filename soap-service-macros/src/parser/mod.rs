pub mod attributes;
pub mod functions;

pub use attributes::*;
pub use functions::*;
