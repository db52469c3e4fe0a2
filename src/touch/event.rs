use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in target-surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaledPoint {
    pub x: f64,
    pub y: f64,
}

impl ScaledPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ScaledPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TouchEventKind {
    Move,
    Up,
    Down,
}

impl fmt::Display for TouchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TouchEventKind::Move => write!(f, "Move"),
            TouchEventKind::Up => write!(f, "Up"),
            TouchEventKind::Down => write!(f, "Down"),
        }
    }
}

/// A discrete touch event derived from one hardware sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Move(ScaledPoint),
    Down(ScaledPoint),
    Up(ScaledPoint),
}

impl TouchEvent {
    pub fn kind(&self) -> TouchEventKind {
        match self {
            TouchEvent::Move(_) => TouchEventKind::Move,
            TouchEvent::Down(_) => TouchEventKind::Down,
            TouchEvent::Up(_) => TouchEventKind::Up,
        }
    }

    pub fn point(&self) -> ScaledPoint {
        match self {
            TouchEvent::Move(point) | TouchEvent::Down(point) | TouchEvent::Up(point) => *point,
        }
    }
}

/// Event record handed to observers.
///
/// Setting `handled` claims the event: the host input framework is not told
/// about it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEventArgs {
    pub kind: TouchEventKind,
    pub point: ScaledPoint,
    pub handled: bool,
}

impl TouchEventArgs {
    pub fn new(event: TouchEvent) -> Self {
        Self {
            kind: event.kind(),
            point: event.point(),
            handled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    Move,
    Up,
}

/// Contact area of the single pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub position: ScaledPoint,
    pub width: f64,
    pub height: f64,
    pub action: TouchAction,
}
