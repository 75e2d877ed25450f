// Path Planning algorithms module

pub mod longitudinal;

pub use longitudinal::*;
