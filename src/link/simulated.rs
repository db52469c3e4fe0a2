//! Software stand-in for the digitizer controller.
//!
//! Scales raw device coordinates linearly from the device range into the
//! region and delivers injected records on the injecting thread, the same way
//! the vendor driver calls back on a thread of its own.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::{DeviceRef, HardwareLink, LinkError, RegionHandle, SurfaceRect};
use crate::touch::dispatch::RecordSink;
use crate::touch::record::{RawPositionalSample, RawRecord};

/// Raw coordinate range of a typical resistive controller
pub const DEFAULT_DEVICE_RANGE: (u32, u32) = (4096, 4096);

#[derive(Default)]
struct SimulatedState {
    opened: bool,
    terminated: bool,
    mouse_passthrough: bool,
    selected: Option<DeviceRef>,
    callback: Option<(DeviceRef, RecordSink)>,
    regions: Vec<SurfaceRect>,
    error_resets: usize,
    fail_transform: bool,
}

pub struct SimulatedLink {
    device_count: usize,
    device_range: (u32, u32),
    fail_open: bool,
    state: Mutex<SimulatedState>,
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self {
            device_count: 1,
            device_range: DEFAULT_DEVICE_RANGE,
            fail_open: false,
            state: Mutex::new(SimulatedState {
                mouse_passthrough: true,
                ..Default::default()
            }),
        }
    }

    pub fn with_devices(mut self, count: usize) -> Self {
        self.device_count = count;
        self
    }

    pub fn with_device_range(mut self, max_x: u32, max_y: u32) -> Self {
        self.device_range = (max_x.max(1), max_y.max(1));
        self
    }

    /// Makes `open` fail, as a controller with no driver would.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn set_transform_failure(&self, fail: bool) {
        self.state().fail_transform = fail;
    }

    /// Hands a record to the registered callback on the calling thread.
    ///
    /// Returns false when no callback is registered or the sink refused it.
    pub fn inject(&self, record: &[u8]) -> bool {
        let callback = self.state().callback.clone();
        match callback {
            Some((device, sink)) => sink.deliver(device.0, record),
            None => {
                debug!("No callback registered, dropping injected record");
                false
            }
        }
    }

    pub fn inject_record(&self, record: impl Into<RawRecord>) -> bool {
        let record = record.into();
        self.inject(record.as_bytes())
    }

    pub fn is_open(&self) -> bool {
        self.state().opened
    }

    pub fn is_terminated(&self) -> bool {
        self.state().terminated
    }

    pub fn mouse_passthrough(&self) -> bool {
        self.state().mouse_passthrough
    }

    pub fn has_callback(&self) -> bool {
        self.state().callback.is_some()
    }

    pub fn error_resets(&self) -> usize {
        self.state().error_resets
    }

    pub fn region_rect(&self, handle: RegionHandle) -> Option<SurfaceRect> {
        let index = usize::try_from(handle.0).ok()?;
        self.state().regions.get(index).copied()
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HardwareLink for SimulatedLink {
    fn open(&self) -> Result<(), LinkError> {
        if self.fail_open {
            return Err(LinkError::OpenError(
                "simulated controller refused the session".to_string(),
            ));
        }
        let mut state = self.state();
        state.opened = true;
        state.terminated = false;
        info!("Simulated link opened with {} device(s)", self.device_count);
        Ok(())
    }

    fn select_device(&self, index: usize) -> Result<DeviceRef, LinkError> {
        let mut state = self.state();
        if !state.opened {
            return Err(LinkError::SessionError("link is not open".to_string()));
        }
        if index >= self.device_count {
            return Err(LinkError::DeviceUnavailable(index));
        }
        let device = DeviceRef(i32::try_from(index).unwrap_or(i32::MAX));
        state.selected = Some(device);
        Ok(device)
    }

    fn set_mouse_passthrough(&self, enabled: bool) {
        debug!("Simulated mouse passthrough: {}", enabled);
        self.state().mouse_passthrough = enabled;
    }

    fn register_callback(&self, device: DeviceRef, sink: RecordSink) -> Result<(), LinkError> {
        let mut state = self.state();
        if state.selected != Some(device) {
            return Err(LinkError::CallbackError(format!(
                "device {:?} is not selected",
                device
            )));
        }
        if state.callback.is_some() {
            warn!("Replacing existing callback registration");
        }
        state.callback = Some((device, sink));
        Ok(())
    }

    fn unregister_callback(&self, device: DeviceRef) -> Result<(), LinkError> {
        let mut state = self.state();
        match state.callback.take() {
            Some((registered, _)) if registered == device => Ok(()),
            Some(other) => {
                state.callback = Some(other);
                Err(LinkError::CallbackError(format!(
                    "no callback registered for {:?}",
                    device
                )))
            }
            None => Err(LinkError::CallbackError("no callback registered".to_string())),
        }
    }

    fn establish_scaling_region(&self, rect: SurfaceRect) -> Result<RegionHandle, LinkError> {
        if rect.is_empty() {
            return Err(LinkError::RegionError(format!("empty rectangle {}", rect)));
        }
        let mut state = self.state();
        state.regions.push(rect);
        let handle = RegionHandle(state.regions.len() as i64 - 1);
        debug!("Simulated region {:?} for {}", handle, rect);
        Ok(handle)
    }

    fn scale_coordinates(
        &self,
        region: RegionHandle,
        sample: &RawPositionalSample,
    ) -> Result<(i32, i32), LinkError> {
        let state = self.state();
        if state.fail_transform {
            return Err(LinkError::TransformError(
                "simulated transform failure".to_string(),
            ));
        }
        let rect = usize::try_from(region.0)
            .ok()
            .and_then(|index| state.regions.get(index).copied())
            .ok_or_else(|| LinkError::TransformError(format!("unknown region {:?}", region)))?;

        let (max_x, max_y) = self.device_range;
        let x = scale_axis(sample.raw_x, max_x, rect.left, rect.right);
        let y = scale_axis(sample.raw_y, max_y, rect.top, rect.bottom);
        Ok((x, y))
    }

    fn reset_error_counts(&self) -> Result<(), LinkError> {
        self.state().error_resets += 1;
        Ok(())
    }

    fn close(&self) -> Result<(), LinkError> {
        let mut state = self.state();
        if !state.opened {
            return Err(LinkError::SessionError("link already closed".to_string()));
        }
        state.opened = false;
        state.callback = None;
        Ok(())
    }

    fn terminate(&self) {
        self.state().terminated = true;
    }
}

// Clips to the rectangle's far edge.
fn scale_axis(raw: u32, max: u32, low: i32, high: i32) -> i32 {
    let raw = u64::from(raw.min(max));
    let span = (i64::from(high) - i64::from(low)).max(0) as u64;
    let offset = raw * span / u64::from(max);
    low + offset as i32
}
