pub mod identity;
pub mod model;
