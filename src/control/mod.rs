// Control surface - method-name dispatch for host applications

pub mod surface;

pub use surface::{ControlError, ControlSurface, platform_version};
