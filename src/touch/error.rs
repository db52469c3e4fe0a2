use thiserror::Error;

use crate::link::LinkError;
use crate::touch::dispatch::DispatchError;

/// Errors surfaced by a device binding
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The controller session or device could not be brought up
    #[error("Hardware link error: {0}")]
    LinkError(#[from] LinkError),

    #[error("Dispatch error: {0}")]
    DispatchError(#[from] DispatchError),

    /// The surface could not be turned into a scaling region
    #[error("Failed to hook surface: {0}")]
    HookError(String),

    #[error("Device binding already disposed")]
    Disposed,
}
