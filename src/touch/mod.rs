//! Touch subsystem - from raw controller records to host touch events
//!
//! Implements the translation pipeline for one digitizer:
//!
//! 1. [`record`] - Wire decoding of the 76-byte controller records
//! 2. [`ingestor`] - Record classification and jitter filtering
//! 3. [`scaler`] - Device to surface coordinate mapping
//! 4. [`state_tracker`] - Down/Up derivation from button bits
//! 5. [`dispatch`] - Hand-off to the consumer thread, single translation in flight
//! 6. [`bubbler`] - Observer claims and default reporting
//! 7. [`touch_device`] - Host API and lifecycle
//!
//! # Architecture
//!
//! ```text
//! HardwareLink ──► Ingestor ──► Scaler / StateTracker ──► Bubbler ──► observers
//!   (link thread)  └──────────── consumer thread ─────────────┘    └► InputSink
//! ```

pub mod bubbler;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod ingestor;
pub mod record;
pub mod scaler;
pub mod state_tracker;
pub mod touch_device;
pub mod translator;

pub use bubbler::{BubbleOutcome, EventBubbler, InputSink, ObserverId};
pub use dispatch::{DispatchBridge, DispatchError, DispatchSettings, RecordSink, TranslationGate};
pub use error::BridgeError;
pub use event::{ScaledPoint, TouchAction, TouchEvent, TouchEventArgs, TouchEventKind, TouchPoint};
pub use ingestor::{PressState, SampleIngestor, TouchSnapshot};
pub use record::{RawButtonSample, RawPositionalSample, RawRecord, RawSample, RecordError};
pub use scaler::{CoordinateScaler, ScalingRegion};
pub use state_tracker::StateTracker;
pub use touch_device::{SurfaceSize, TargetSurface, TouchDevice};
pub use translator::{TouchTranslator, TranslatorSettings};
