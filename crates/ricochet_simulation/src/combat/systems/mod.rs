//! Combat systems (FixedUpdate)

pub mod weapon;

pub use weapon::*;
