pub mod operation;

pub use operation::expand_service_module;
