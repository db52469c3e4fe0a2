//! Bridges a touch-digitizer controller into discrete move/down/up events for
//! a windowed host.
//!
//! The controller's native API is modelled by [`link::HardwareLink`]; the
//! translation pipeline and the host-facing [`touch::TouchDevice`] live in
//! [`touch`].

pub mod config;
pub mod link;
pub mod touch;

pub use config::BridgeConfig;
pub use link::{HardwareLink, LinkContext, LinkError, SimulatedLink, SurfaceRect};
pub use touch::{
    BridgeError, InputSink, ScaledPoint, SurfaceSize, TargetSurface, TouchDevice, TouchEvent,
    TouchEventArgs, TouchEventKind,
};
