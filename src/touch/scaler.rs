use std::sync::Arc;
use tracing::debug;

use crate::link::{HardwareLink, RegionHandle, SurfaceRect};
use crate::touch::event::ScaledPoint;
use crate::touch::ingestor::TouchSnapshot;
use crate::touch::record::RawPositionalSample;

/// Scaling region of the hooked surface.
///
/// Replaced as a whole on re-hook; never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingRegion {
    handle: RegionHandle,
    rect: Option<SurfaceRect>,
}

impl Default for ScalingRegion {
    fn default() -> Self {
        Self::unset()
    }
}

impl ScalingRegion {
    pub const fn unset() -> Self {
        Self {
            handle: RegionHandle::UNSET,
            rect: None,
        }
    }

    pub fn established(handle: RegionHandle, rect: SurfaceRect) -> Self {
        Self {
            handle,
            rect: Some(rect),
        }
    }

    pub fn is_established(&self) -> bool {
        self.handle.is_set()
    }

    pub fn handle(&self) -> RegionHandle {
        self.handle
    }

    pub fn rect(&self) -> Option<SurfaceRect> {
        self.rect
    }
}

/// Maps positional samples into target-surface coordinates
pub struct CoordinateScaler {
    link: Arc<dyn HardwareLink>,
    region: ScalingRegion,
}

impl CoordinateScaler {
    pub fn new(link: Arc<dyn HardwareLink>) -> Self {
        Self {
            link,
            region: ScalingRegion::unset(),
        }
    }

    pub fn region(&self) -> ScalingRegion {
        self.region
    }

    pub fn replace_region(&mut self, region: ScalingRegion) {
        debug!(
            "Scaling region replaced: {:?} -> {:?}",
            self.region.handle(),
            region.handle()
        );
        self.region = region;
    }

    /// Scales the sample and stores the result as the snapshot's position.
    ///
    /// Without a region, or when the link cannot transform the sample, the
    /// calibrated coordinates are used as they are.
    pub fn scale(&self, sample: &RawPositionalSample, snapshot: &mut TouchSnapshot) -> ScaledPoint {
        let point = if self.region.is_established() {
            match self.link.scale_coordinates(self.region.handle(), sample) {
                Ok((x, y)) => ScaledPoint::new(f64::from(x), f64::from(y)),
                Err(e) => {
                    debug!("Falling back to calibrated coordinates: {}", e);
                    calibrated(sample)
                }
            }
        } else {
            calibrated(sample)
        };

        snapshot.position = point;
        point
    }
}

fn calibrated(sample: &RawPositionalSample) -> ScaledPoint {
    ScaledPoint::new(f64::from(sample.cal_x), f64::from(sample.cal_y))
}
