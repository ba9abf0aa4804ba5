//! Domain model module declarations.

pub mod params;
pub mod ports;
pub mod session;
