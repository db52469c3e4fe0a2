use tracing::debug;

use crate::touch::event::TouchEvent;
use crate::touch::ingestor::{PressState, TouchSnapshot};
use crate::touch::record::RawButtonSample;
use crate::touch::scaler::ScalingRegion;

/// Derives Down/Up events from button samples.
///
/// By default every button sample fires: two consecutive pressed samples give
/// two Down events. With `edge_triggered` only changes of state fire.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    edge_triggered: bool,
}

impl StateTracker {
    pub fn new(edge_triggered: bool) -> Self {
        Self { edge_triggered }
    }

    pub fn is_edge_triggered(&self) -> bool {
        self.edge_triggered
    }

    /// Records the button state and returns the event to raise, if any.
    ///
    /// The event is reported at the snapshot's last known position.
    pub fn track(
        &self,
        sample: &RawButtonSample,
        region: &ScalingRegion,
        snapshot: &mut TouchSnapshot,
    ) -> Option<TouchEvent> {
        let state = if sample.is_pressed() {
            PressState::Pressed
        } else {
            PressState::Released
        };
        let previous = snapshot.press_state.replace(state);

        if !region.is_established() {
            debug!("Button sample {:?} without scaling region, no event", state);
            return None;
        }

        if self.edge_triggered && previous == Some(state) {
            debug!("Repeated {:?} sample suppressed", state);
            return None;
        }

        let point = snapshot.position;
        Some(match state {
            PressState::Pressed => TouchEvent::Down(point),
            PressState::Released => TouchEvent::Up(point),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{RegionHandle, SurfaceRect};
    use crate::touch::event::ScaledPoint;

    fn region() -> ScalingRegion {
        ScalingRegion::established(RegionHandle(0), SurfaceRect::from_size(1920, 1080))
    }

    fn button(left: bool, right: bool) -> RawButtonSample {
        RawButtonSample {
            left,
            right,
            ..Default::default()
        }
    }

    #[test]
    fn every_combination_yields_exactly_one_event() {
        let tracker = StateTracker::default();
        let point = ScaledPoint::new(12.0, 34.0);

        for (left, right, down) in [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ] {
            let mut snapshot = TouchSnapshot {
                position: point,
                ..Default::default()
            };
            let event = tracker.track(&button(left, right), &region(), &mut snapshot);
            let expected = if down {
                TouchEvent::Down(point)
            } else {
                TouchEvent::Up(point)
            };
            assert_eq!(event, Some(expected));
        }
    }

    #[test]
    fn repeated_press_fires_again() {
        let tracker = StateTracker::default();
        let mut snapshot = TouchSnapshot::default();

        let first = tracker.track(&button(true, false), &region(), &mut snapshot);
        let second = tracker.track(&button(true, false), &region(), &mut snapshot);
        assert!(matches!(first, Some(TouchEvent::Down(_))));
        assert!(matches!(second, Some(TouchEvent::Down(_))));
    }

    #[test]
    fn edge_triggered_suppresses_repeats() {
        let tracker = StateTracker::new(true);
        let mut snapshot = TouchSnapshot::default();

        assert!(tracker
            .track(&button(true, false), &region(), &mut snapshot)
            .is_some());
        assert!(tracker
            .track(&button(false, true), &region(), &mut snapshot)
            .is_none());
        assert!(matches!(
            tracker.track(&button(false, false), &region(), &mut snapshot),
            Some(TouchEvent::Up(_))
        ));
    }

    #[test]
    fn no_region_updates_state_without_event() {
        let tracker = StateTracker::default();
        let mut snapshot = TouchSnapshot::default();

        let event = tracker.track(&button(true, false), &ScalingRegion::unset(), &mut snapshot);
        assert_eq!(event, None);
        assert_eq!(snapshot.press_state, Some(PressState::Pressed));
    }
}
