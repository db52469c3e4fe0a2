use std::sync::Arc;
use tracing::debug;

use crate::link::HardwareLink;
use crate::touch::event::TouchEvent;
use crate::touch::ingestor::{Ingested, SampleIngestor, TouchSnapshot};
use crate::touch::record::{RawRecord, RecordError};
use crate::touch::scaler::{CoordinateScaler, ScalingRegion};
use crate::touch::state_tracker::StateTracker;

/// Translation settings
#[derive(Clone, Debug)]
pub struct TranslatorSettings {
    pub jitter_threshold: u32,
    pub edge_triggered: bool,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            jitter_threshold: crate::touch::ingestor::DEFAULT_JITTER_THRESHOLD,
            edge_triggered: false,
        }
    }
}

/// Turns raw records into touch events for one device binding.
///
/// Owns the binding's snapshot and scaling region; all access goes through
/// the dispatch gate.
pub struct TouchTranslator {
    ingestor: SampleIngestor,
    scaler: CoordinateScaler,
    tracker: StateTracker,
    snapshot: TouchSnapshot,
}

impl TouchTranslator {
    pub fn new(link: Arc<dyn HardwareLink>, settings: TranslatorSettings) -> Self {
        debug!("Creating touch translator with settings: {:?}", settings);
        Self {
            ingestor: SampleIngestor::new(settings.jitter_threshold),
            scaler: CoordinateScaler::new(link),
            tracker: StateTracker::new(settings.edge_triggered),
            snapshot: TouchSnapshot::default(),
        }
    }

    pub fn translate(&mut self, record: &RawRecord) -> Result<Option<TouchEvent>, RecordError> {
        match self.ingestor.ingest(record, &mut self.snapshot)? {
            Ingested::Jitter => Ok(None),
            Ingested::Positional(sample) => {
                let point = self.scaler.scale(&sample, &mut self.snapshot);
                debug!(
                    "Positional tick={} raw=({}, {}) -> {}",
                    sample.tick, sample.raw_x, sample.raw_y, point
                );
                Ok(Some(TouchEvent::Move(point)))
            }
            Ingested::Button(sample) => {
                let region = self.scaler.region();
                Ok(self.tracker.track(&sample, &region, &mut self.snapshot))
            }
        }
    }

    pub fn region(&self) -> ScalingRegion {
        self.scaler.region()
    }

    pub fn replace_region(&mut self, region: ScalingRegion) {
        self.scaler.replace_region(region);
    }

    pub fn snapshot(&self) -> &TouchSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{SimulatedLink, SurfaceRect};
    use crate::touch::event::ScaledPoint;
    use crate::touch::record::{RawButtonSample, RawPositionalSample};

    fn positional(raw_x: u32, raw_y: u32, cal_x: u32, cal_y: u32) -> RawRecord {
        RawPositionalSample {
            raw_x,
            raw_y,
            cal_x,
            cal_y,
            ..Default::default()
        }
        .to_record()
    }

    fn button(left: bool) -> RawRecord {
        RawButtonSample {
            left,
            ..Default::default()
        }
        .to_record()
    }

    #[test]
    fn without_region_moves_use_calibrated_points_and_buttons_are_silent() {
        let link = Arc::new(SimulatedLink::new());
        let mut translator = TouchTranslator::new(link, TranslatorSettings::default());

        let event = translator.translate(&positional(100, 100, 50, 50)).unwrap();
        assert_eq!(event, Some(TouchEvent::Move(ScaledPoint::new(50.0, 50.0))));
        assert_eq!(translator.translate(&button(true)).unwrap(), None);
    }

    #[test]
    fn button_events_carry_the_last_move_position() {
        let link = Arc::new(SimulatedLink::new());
        link.open().unwrap();
        let rect = SurfaceRect::from_size(1920, 1080);
        let handle = link.establish_scaling_region(rect).unwrap();

        let mut translator = TouchTranslator::new(link, TranslatorSettings::default());
        translator.replace_region(ScalingRegion::established(handle, rect));

        let moved = translator
            .translate(&positional(2048, 2048, 10, 10))
            .unwrap()
            .unwrap();
        let point = moved.point();
        assert_eq!(point, ScaledPoint::new(960.0, 540.0));

        // Jitter does not move the reported position.
        assert_eq!(translator.translate(&positional(2050, 2046, 11, 9)).unwrap(), None);

        assert_eq!(
            translator.translate(&button(true)).unwrap(),
            Some(TouchEvent::Down(point))
        );
        assert_eq!(
            translator.translate(&button(false)).unwrap(),
            Some(TouchEvent::Up(point))
        );
    }

    #[test]
    fn malformed_record_is_an_error() {
        let link = Arc::new(SimulatedLink::new());
        let mut translator = TouchTranslator::new(link, TranslatorSettings::default());
        let mut bytes = *positional(100, 100, 1, 1).as_bytes();
        bytes[72] = 7;
        let record = RawRecord::from_slice(&bytes).unwrap();

        assert_eq!(
            translator.translate(&record),
            Err(RecordError::UnknownRecordType(7))
        );
        assert_eq!(translator.snapshot().accepted_samples, 0);
    }
}
