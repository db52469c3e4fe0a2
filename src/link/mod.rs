//! Hardware link - the digitizer controller's native API as seen by the bridge
//!
//! The bridge never talks to the controller directly. Everything it needs from
//! the vendor driver goes through [`HardwareLink`]: session setup, device
//! selection, the record callback and the coordinate transform.
//!
//! [`LinkContext`] replaces a process-wide "already initialized" flag: the link
//! is opened once when the context is created and closed when the last owner
//! (the host or a device binding) lets go of it.

pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::touch::dispatch::RecordSink;
use crate::touch::record::RawPositionalSample;

pub use simulated::SimulatedLink;

/// Hardware link errors
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Failed to open hardware session: {0}")]
    OpenError(String),

    #[error("Device {0} is not available")]
    DeviceUnavailable(usize),

    #[error("Callback registration failed: {0}")]
    CallbackError(String),

    #[error("Failed to establish scaling region: {0}")]
    RegionError(String),

    #[error("Coordinate transform failed: {0}")]
    TransformError(String),

    #[error("Session error: {0}")]
    SessionError(String),
}

/// Selected controller device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceRef(pub i32);

/// Handle of a scaling region owned by the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHandle(pub i64);

impl RegionHandle {
    /// Sentinel for "no scaling configured yet"
    pub const UNSET: RegionHandle = RegionHandle(-1);

    pub fn is_set(&self) -> bool {
        *self != Self::UNSET
    }
}

/// Target rectangle in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl SurfaceRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the surface origin
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

impl fmt::Display for SurfaceRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// The vendor API surface consumed by the bridge.
///
/// Implementations are shared between the host thread and the consumer thread,
/// so every operation takes `&self`. Records must be handed to the registered
/// [`RecordSink`]; the sink never blocks.
pub trait HardwareLink: Send + Sync + 'static {
    /// One-time session start
    fn open(&self) -> Result<(), LinkError>;

    fn select_device(&self, index: usize) -> Result<DeviceRef, LinkError>;

    /// Whether raw controller input is also surfaced as OS pointer events
    fn set_mouse_passthrough(&self, enabled: bool);

    fn register_callback(&self, device: DeviceRef, sink: RecordSink) -> Result<(), LinkError>;

    fn unregister_callback(&self, device: DeviceRef) -> Result<(), LinkError>;

    fn establish_scaling_region(&self, rect: SurfaceRect) -> Result<RegionHandle, LinkError>;

    /// Maps a positional sample into the region's coordinate space.
    fn scale_coordinates(
        &self,
        region: RegionHandle,
        sample: &RawPositionalSample,
    ) -> Result<(i32, i32), LinkError>;

    fn reset_error_counts(&self) -> Result<(), LinkError>;

    fn close(&self) -> Result<(), LinkError>;

    fn terminate(&self);
}

/// Opened hardware session shared by all device bindings
pub struct LinkContext {
    link: Arc<dyn HardwareLink>,
}

impl LinkContext {
    /// Opens the link. A session that cannot start is fatal for every binding.
    pub fn open(link: Arc<dyn HardwareLink>) -> Result<Arc<Self>, LinkError> {
        info!("Opening hardware link session");
        if let Err(e) = link.open() {
            error!("Failed to open hardware link: {}", e);
            return Err(e);
        }
        info!("Hardware link session opened");

        Ok(Arc::new(Self { link }))
    }

    pub fn link(&self) -> &Arc<dyn HardwareLink> {
        &self.link
    }
}

impl Drop for LinkContext {
    fn drop(&mut self) {
        info!("Closing hardware link session");
        if let Err(e) = self.link.close() {
            warn!("Failed to close hardware link: {}", e);
        }
        self.link.terminate();
        debug!("Hardware link terminated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_size_is_anchored_at_origin() {
        let rect = SurfaceRect::from_size(1920, 1080);
        assert_eq!(rect, SurfaceRect::new(0, 0, 1920, 1080));
        assert_eq!(rect.width(), 1920);
        assert_eq!(rect.height(), 1080);
        assert!(!rect.is_empty());
        assert!(SurfaceRect::from_size(0, 10).is_empty());
    }

    #[test]
    fn context_closes_the_link_when_dropped() {
        let link = Arc::new(SimulatedLink::new());
        let context = LinkContext::open(link.clone()).unwrap();
        assert!(link.is_open());

        drop(context);
        assert!(!link.is_open());
        assert!(link.is_terminated());
    }

    #[test]
    fn failed_open_is_reported() {
        let link = Arc::new(SimulatedLink::new().failing_open());
        let result = LinkContext::open(link);
        assert!(matches!(result, Err(LinkError::OpenError(_))));
    }
}
