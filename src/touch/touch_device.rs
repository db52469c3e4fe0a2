//! Touch Device - host-facing binding of one digitizer to one surface
//!
//! Brings the controller up, wires the callback into the dispatch bridge and
//! exposes the observer registry and the visible position to the host. All
//! hardware resources acquired here are released by [`TouchDevice::dispose`],
//! which also runs on drop.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► select device ──► reset errors ──► passthrough off ──► hook surface
//!     ──► spawn consumer ──► register callback ──► (events) ──► dispose
//! ```

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::link::{DeviceRef, LinkContext, SurfaceRect};
use crate::touch::bubbler::{EventBubbler, InputSink, ObserverId};
use crate::touch::dispatch::{DispatchBridge, DispatchSettings, TranslationGate};
use crate::touch::error::BridgeError;
use crate::touch::event::{ScaledPoint, TouchAction, TouchEventArgs, TouchEventKind, TouchPoint};
use crate::touch::ingestor::TouchSnapshot;
use crate::touch::scaler::ScalingRegion;
use crate::touch::translator::{TouchTranslator, TranslatorSettings};

/// Window or other area the touch input is mapped onto
pub trait TargetSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn name(&self) -> String {
        "surface".to_string()
    }
}

/// Plain surface described only by its size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl TargetSurface for SurfaceSize {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn name(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// One active digitizer bound to a hooked surface
pub struct TouchDevice {
    context: Option<Arc<LinkContext>>,
    device: DeviceRef,
    gate: Arc<TranslationGate>,
    bubbler: Arc<EventBubbler>,
    bridge: DispatchBridge,
    mouse_passthrough: bool,
}

impl TouchDevice {
    /// Activates the configured device and hooks `surface`.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::LinkError`] - device selection or callback registration failed
    /// * [`BridgeError::HookError`] - no scaling region for the surface
    /// * [`BridgeError::DispatchError`] - the consumer thread could not start
    pub fn new(
        context: Arc<LinkContext>,
        surface: &dyn TargetSurface,
        sink: Arc<dyn InputSink>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        info!(
            "Activating touch device {} for surface {}",
            config.device_index,
            surface.name()
        );
        let link = context.link().clone();

        let device = match link.select_device(config.device_index) {
            Ok(device) => device,
            Err(e) => {
                error!("Failed to select device {}: {}", config.device_index, e);
                return Err(e.into());
            }
        };
        debug!("Selected device {:?}", device);

        if let Err(e) = link.reset_error_counts() {
            warn!("Failed to reset controller error counts: {}", e);
        }

        // Off by default so the OS cursor does not jump to the touch surface;
        // `mouse_passthrough = true` in the config keeps it on.
        link.set_mouse_passthrough(config.mouse_passthrough);

        let translator = TouchTranslator::new(
            link.clone(),
            TranslatorSettings {
                jitter_threshold: config.jitter_threshold,
                edge_triggered: config.edge_triggered,
            },
        );
        let gate = Arc::new(TranslationGate::new(translator));
        let region = match establish_region(&context, surface) {
            Ok(region) => region,
            Err(e) => {
                link.set_mouse_passthrough(true);
                return Err(e);
            }
        };
        gate.enter().replace_region(region);

        let bubbler = Arc::new(EventBubbler::new(sink));
        let mut bridge = match DispatchBridge::spawn(
            gate.clone(),
            bubbler.clone(),
            DispatchSettings {
                thread_name: config.consumer_thread_name.clone(),
                stats_interval_secs: config.stats_interval_secs,
            },
        ) {
            Ok(bridge) => bridge,
            Err(e) => {
                error!("Failed to start consumer thread: {}", e);
                link.set_mouse_passthrough(true);
                return Err(e.into());
            }
        };

        if let Err(e) = link.register_callback(device, bridge.sink()) {
            error!("Failed to register data callback: {}", e);
            bridge.shutdown();
            link.set_mouse_passthrough(true);
            return Err(e.into());
        }

        info!("Touch device {:?} active", device);
        Ok(Self {
            context: Some(context),
            device,
            gate,
            bubbler,
            bridge,
            mouse_passthrough: config.mouse_passthrough,
        })
    }

    /// Maps the controller onto a new surface.
    ///
    /// Waits for any in-flight translation before swapping the region. Must not
    /// be called from an observer.
    pub fn hook(&mut self, surface: &dyn TargetSurface) -> Result<ScalingRegion, BridgeError> {
        let context = self.context.as_ref().ok_or(BridgeError::Disposed)?;
        let region = establish_region(context, surface)?;
        self.gate.enter().replace_region(region);
        info!("Hooked surface {} with region {:?}", surface.name(), region);
        Ok(region)
    }

    pub fn on_move<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&mut TouchEventArgs) + Send + Sync + 'static,
    {
        self.bubbler.subscribe(TouchEventKind::Move, Arc::new(observer))
    }

    pub fn on_up<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&mut TouchEventArgs) + Send + Sync + 'static,
    {
        self.bubbler.subscribe(TouchEventKind::Up, Arc::new(observer))
    }

    pub fn on_down<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&mut TouchEventArgs) + Send + Sync + 'static,
    {
        self.bubbler.subscribe(TouchEventKind::Down, Arc::new(observer))
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.bubbler.unsubscribe(id)
    }

    /// Position of the most recent touch reported to the host
    pub fn position(&self) -> ScaledPoint {
        self.bubbler.position()
    }

    /// Current contact as a 1x1 touch point
    pub fn touch_point(&self) -> TouchPoint {
        TouchPoint {
            position: self.position(),
            width: 1.0,
            height: 1.0,
            action: TouchAction::Move,
        }
    }

    /// Always empty: the controller reports one pointer and no history.
    pub fn intermediate_touch_points(&self) -> Vec<TouchPoint> {
        Vec::new()
    }

    pub fn region(&self) -> ScalingRegion {
        self.gate.enter().region()
    }

    pub fn snapshot(&self) -> TouchSnapshot {
        self.gate.enter().snapshot().clone()
    }

    pub fn device(&self) -> DeviceRef {
        self.device
    }

    pub fn mouse_passthrough(&self) -> bool {
        self.mouse_passthrough
    }

    pub fn set_mouse_passthrough(&mut self, enabled: bool) -> Result<(), BridgeError> {
        let context = self.context.as_ref().ok_or(BridgeError::Disposed)?;
        context.link().set_mouse_passthrough(enabled);
        self.mouse_passthrough = enabled;
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// Deactivates the device and releases its hardware resources.
    ///
    /// Unregisters the callback, waits for queued translations to finish,
    /// restores mouse passthrough and drops this binding's share of the link.
    /// Failures are logged and skipped. Calling it twice is a no-op.
    pub fn dispose(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        info!("Disposing touch device {:?}", self.device);

        let link = context.link();
        if let Err(e) = link.unregister_callback(self.device) {
            warn!("Failed to unregister data callback: {}", e);
        }

        self.bridge.shutdown();

        link.set_mouse_passthrough(true);
        self.mouse_passthrough = true;

        drop(context);
        debug!("Touch device {:?} released", self.device);
    }
}

impl Drop for TouchDevice {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn establish_region(
    context: &LinkContext,
    surface: &dyn TargetSurface,
) -> Result<ScalingRegion, BridgeError> {
    let rect = SurfaceRect::from_size(surface.width(), surface.height());
    if rect.is_empty() {
        return Err(BridgeError::HookError(format!(
            "surface {} has no area",
            surface.name()
        )));
    }

    match context.link().establish_scaling_region(rect) {
        Ok(handle) => Ok(ScalingRegion::established(handle, rect)),
        Err(e) => {
            error!("Failed to establish scaling region {}: {}", rect, e);
            Err(BridgeError::HookError(e.to_string()))
        }
    }
}
