//! Sample ingestion: record classification and jitter filtering.

use tracing::debug;

use crate::touch::event::ScaledPoint;
use crate::touch::record::{RawButtonSample, RawPositionalSample, RawRecord, RawSample, RecordError};

/// Positional samples closer than this (on both axes) to the last accepted one are noise.
pub const DEFAULT_JITTER_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Pressed,
    Released,
}

/// Last known touch state of one device binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchSnapshot {
    /// Raw device position of the last sample that cleared the jitter filter
    pub last_raw: (u32, u32),
    /// Last scaled position
    pub position: ScaledPoint,
    pub press_state: Option<PressState>,
    pub accepted_samples: u64,
    pub jitter_samples: u64,
}

/// Result of ingesting one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Positional sample that moved far enough to matter
    Positional(RawPositionalSample),
    Button(RawButtonSample),
    /// Positional sample discarded as noise
    Jitter,
}

#[derive(Debug, Clone)]
pub struct SampleIngestor {
    jitter_threshold: u32,
}

impl Default for SampleIngestor {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_THRESHOLD)
    }
}

impl SampleIngestor {
    pub fn new(jitter_threshold: u32) -> Self {
        Self { jitter_threshold }
    }

    pub fn jitter_threshold(&self) -> u32 {
        self.jitter_threshold
    }

    /// Classifies a record and applies the jitter filter to positional samples.
    ///
    /// Only a positional sample that clears the filter touches the snapshot.
    pub fn ingest(
        &self,
        record: &RawRecord,
        snapshot: &mut TouchSnapshot,
    ) -> Result<Ingested, RecordError> {
        match record.decode()? {
            RawSample::Positional(sample) => {
                if self.is_jitter(snapshot.last_raw, &sample) {
                    snapshot.jitter_samples += 1;
                    debug!(
                        "Discarding jitter sample raw=({}, {}) last=({}, {})",
                        sample.raw_x, sample.raw_y, snapshot.last_raw.0, snapshot.last_raw.1
                    );
                    return Ok(Ingested::Jitter);
                }

                snapshot.last_raw = (sample.raw_x, sample.raw_y);
                snapshot.accepted_samples += 1;
                Ok(Ingested::Positional(sample))
            }
            RawSample::Button(sample) => {
                snapshot.accepted_samples += 1;
                Ok(Ingested::Button(sample))
            }
        }
    }

    pub fn is_jitter(&self, last_raw: (u32, u32), sample: &RawPositionalSample) -> bool {
        let dx = sample.raw_x.abs_diff(last_raw.0);
        let dy = sample.raw_y.abs_diff(last_raw.1);
        dx < self.jitter_threshold && dy < self.jitter_threshold
    }
}
