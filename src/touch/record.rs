//! Wire decoding for the 76-byte records delivered by the digitizer controller.
//!
//! Both record variants share one envelope. The discriminator lives at the same
//! trailing offset in each, so it is read before anything else is interpreted.
//!
//! ```text
//! positional: | tick | raw_x | raw_y | cal_x | cal_y | reserved .. | dev | sty | type |
//! button:     | tick | l | r | t | reserved ..                     | dev | sty | type |
//!               0      4 5 6                                          70    71    72..76
//! ```
//!
//! All multi-byte fields are little-endian.

use tracing::debug;

/// Size of every record the controller hands to the callback.
pub const RECORD_LEN: usize = 76;

/// Discriminator value of a positional record.
pub const POSITIONAL_RECORD: u32 = 1;

/// Discriminator value of a button-state record.
pub const BUTTON_RECORD: u32 = 2;

const TICK_OFFSET: usize = 0;
const RAW_X_OFFSET: usize = 4;
const RAW_Y_OFFSET: usize = 8;
const CAL_X_OFFSET: usize = 12;
const CAL_Y_OFFSET: usize = 16;
const LEFT_OFFSET: usize = 4;
const RIGHT_OFFSET: usize = 5;
const TIMED_OFFSET: usize = 6;
const DEVICE_OFFSET: usize = 70;
const STYLUS_OFFSET: usize = 71;
const TYPE_OFFSET: usize = 72;

/// Record decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Record has {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Unknown record type: {0}")]
    UnknownRecordType(u32),
}

/// Positional sample in device space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPositionalSample {
    pub tick: u32,
    pub raw_x: u32,
    pub raw_y: u32,
    pub cal_x: u32,
    pub cal_y: u32,
    pub device_handle: u8,
    pub stylus_handle: u8,
}

impl RawPositionalSample {
    pub fn record_type(&self) -> u32 {
        POSITIONAL_RECORD
    }

    /// Serializes the sample into the controller's wire envelope.
    pub fn to_record(&self) -> RawRecord {
        let mut bytes = [0u8; RECORD_LEN];
        write_u32(&mut bytes, TICK_OFFSET, self.tick);
        write_u32(&mut bytes, RAW_X_OFFSET, self.raw_x);
        write_u32(&mut bytes, RAW_Y_OFFSET, self.raw_y);
        write_u32(&mut bytes, CAL_X_OFFSET, self.cal_x);
        write_u32(&mut bytes, CAL_Y_OFFSET, self.cal_y);
        bytes[DEVICE_OFFSET] = self.device_handle;
        bytes[STYLUS_OFFSET] = self.stylus_handle;
        write_u32(&mut bytes, TYPE_OFFSET, POSITIONAL_RECORD);
        RawRecord(bytes)
    }
}

/// Button-state sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawButtonSample {
    pub tick: u32,
    pub left: bool,
    pub right: bool,
    pub timed: bool,
    pub device_handle: u8,
    pub stylus_handle: u8,
}

impl RawButtonSample {
    pub fn record_type(&self) -> u32 {
        BUTTON_RECORD
    }

    pub fn is_pressed(&self) -> bool {
        self.left || self.right
    }

    pub fn to_record(&self) -> RawRecord {
        let mut bytes = [0u8; RECORD_LEN];
        write_u32(&mut bytes, TICK_OFFSET, self.tick);
        bytes[LEFT_OFFSET] = u8::from(self.left);
        bytes[RIGHT_OFFSET] = u8::from(self.right);
        bytes[TIMED_OFFSET] = u8::from(self.timed);
        bytes[DEVICE_OFFSET] = self.device_handle;
        bytes[STYLUS_OFFSET] = self.stylus_handle;
        write_u32(&mut bytes, TYPE_OFFSET, BUTTON_RECORD);
        RawRecord(bytes)
    }
}

/// A decoded record, tagged by its discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    Positional(RawPositionalSample),
    Button(RawButtonSample),
}

/// One undecoded record, copied out of the controller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord([u8; RECORD_LEN]);

impl RawRecord {
    /// Copies a record out of a callback buffer. The buffer must be exactly one record long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() != RECORD_LEN {
            return Err(RecordError::LengthMismatch {
                expected: RECORD_LEN,
                actual: bytes.len(),
            });
        }

        let mut buffer = [0u8; RECORD_LEN];
        buffer.copy_from_slice(bytes);
        Ok(Self(buffer))
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    pub fn record_type(&self) -> u32 {
        read_u32(&self.0, TYPE_OFFSET)
    }

    /// Interprets the record according to its discriminator.
    pub fn decode(&self) -> Result<RawSample, RecordError> {
        let bytes = &self.0;
        match self.record_type() {
            POSITIONAL_RECORD => Ok(RawSample::Positional(RawPositionalSample {
                tick: read_u32(bytes, TICK_OFFSET),
                raw_x: read_u32(bytes, RAW_X_OFFSET),
                raw_y: read_u32(bytes, RAW_Y_OFFSET),
                cal_x: read_u32(bytes, CAL_X_OFFSET),
                cal_y: read_u32(bytes, CAL_Y_OFFSET),
                device_handle: bytes[DEVICE_OFFSET],
                stylus_handle: bytes[STYLUS_OFFSET],
            })),
            BUTTON_RECORD => Ok(RawSample::Button(RawButtonSample {
                tick: read_u32(bytes, TICK_OFFSET),
                left: bytes[LEFT_OFFSET] != 0,
                right: bytes[RIGHT_OFFSET] != 0,
                timed: bytes[TIMED_OFFSET] != 0,
                device_handle: bytes[DEVICE_OFFSET],
                stylus_handle: bytes[STYLUS_OFFSET],
            })),
            other => {
                debug!("Record with unknown discriminator {}", other);
                Err(RecordError::UnknownRecordType(other))
            }
        }
    }
}

impl From<RawPositionalSample> for RawRecord {
    fn from(sample: RawPositionalSample) -> Self {
        sample.to_record()
    }
}

impl From<RawButtonSample> for RawRecord {
    fn from(sample: RawButtonSample) -> Self {
        sample.to_record()
    }
}

fn read_u32(bytes: &[u8; RECORD_LEN], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn write_u32(bytes: &mut [u8; RECORD_LEN], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
