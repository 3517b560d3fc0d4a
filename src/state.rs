//! Per-pixel progress kept between calls, so a larger budget continues where the
//! previous call stopped.

use log::debug;

use crate::{
    fixed::FixedPoint,
    kernel::{Job, Precision},
    pixel::{PixelState, PixelStatus},
    screen,
};

/// What a [`ResumableState`] was computed for. Any difference means the stored
/// iterations are not a prefix of the requested ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResumeKey {
    pub origin_re: FixedPoint,
    pub origin_im: FixedPoint,
    pub step_re: FixedPoint,
    pub step_im: FixedPoint,
    pub size: screen::Size,
    horizon_bits: u64,
    pub precision: Precision,
}

impl ResumeKey {
    pub fn for_job(job: &Job) -> Self {
        ResumeKey {
            origin_re: job.grid.origin_re,
            origin_im: job.grid.origin_im,
            step_re: job.grid.step_re,
            step_im: job.grid.step_im,
            size: job.size,
            horizon_bits: job.horizon.to_bits(),
            precision: job.precision,
        }
    }

    pub fn horizon(&self) -> f64 {
        f64::from_bits(self.horizon_bits)
    }
}

/// Pixel progress in device order (row 0 at the bottom of the view).
#[derive(Clone, Debug, Default)]
pub struct ResumableState {
    key: Option<ResumeKey>,
    pixels: Vec<PixelState>,
}

impl ResumableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&ResumeKey> {
        self.key.as_ref()
    }

    pub fn pixels(&self) -> &[PixelState] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [PixelState] {
        &mut self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Forgets all progress.
    pub fn reset(&mut self) {
        self.key = None;
        self.pixels.clear();
    }

    /// Makes the state valid for `key`. Returns `true` when the existing progress
    /// is reused, `false` when every pixel was reset to a fresh start.
    pub(crate) fn prepare(&mut self, key: ResumeKey) -> bool {
        let pixel_count = key.size.pixel_count();
        if self.key.as_ref() == Some(&key) && self.pixels.len() == pixel_count {
            debug!("resuming {} pixels", pixel_count);
            return true;
        }

        if self.key.is_some() {
            debug!("resume key changed, resetting {} pixels", pixel_count);
        }
        self.pixels.clear();
        self.pixels.resize(pixel_count, PixelState::FRESH);
        self.key = Some(key);
        false
    }

    /// Pixel status in output order: `(x, y)` with row 0 at the top.
    pub fn status(&self, x: u32, y: u32, max_iter: u32) -> Option<PixelStatus> {
        let key = self.key.as_ref()?;
        if x >= key.size.width || y >= key.size.height {
            return None;
        }
        let row = (key.size.height - 1 - y) as usize;
        self.pixels
            .get(row * key.size.width as usize + x as usize)
            .map(|pixel| pixel.status(max_iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FixedGrid;

    fn job(width: u32, horizon: f64) -> Job {
        Job {
            grid: FixedGrid {
                origin_re: FixedPoint::from_native(-2.0).unwrap(),
                origin_im: FixedPoint::from_native(-1.0).unwrap(),
                step_re: FixedPoint::from_native(0.25).unwrap(),
                step_im: FixedPoint::from_native(0.25).unwrap(),
            },
            size: screen::Size::new(width, 4),
            max_iter: 10,
            horizon,
            precision: Precision::Fixed,
        }
    }

    #[test]
    fn reuse_only_on_matching_key() {
        let mut state = ResumableState::new();
        assert!(!state.prepare(ResumeKey::for_job(&job(8, 2.0))));
        assert_eq!(state.len(), 32);

        state.pixels_mut()[3].iteration_count = 7;
        assert!(state.prepare(ResumeKey::for_job(&job(8, 2.0))));
        assert_eq!(state.pixels()[3].iteration_count, 7);

        assert!(!state.prepare(ResumeKey::for_job(&job(8, 4.0))));
        assert_eq!(state.pixels()[3], PixelState::FRESH);

        assert!(!state.prepare(ResumeKey::for_job(&job(6, 4.0))));
        assert_eq!(state.len(), 24);

        state.reset();
        assert!(state.is_empty());
        assert!(state.key().is_none());
    }

    #[test]
    fn max_iter_is_not_part_of_the_key() {
        let mut longer = job(8, 2.0);
        longer.max_iter = 1000;
        assert_eq!(ResumeKey::for_job(&job(8, 2.0)), ResumeKey::for_job(&longer));
        assert_eq!(ResumeKey::for_job(&longer).horizon(), 2.0);
    }

    #[test]
    fn status_uses_output_rows() {
        let mut state = ResumableState::new();
        state.prepare(ResumeKey::for_job(&job(8, 2.0)));
        // Device row 0 is the bottom output row.
        state.pixels_mut()[1] = PixelState {
            iteration_count: 4,
            escaped: 1,
            ..PixelState::FRESH
        };
        assert_eq!(state.status(1, 3, 10), Some(PixelStatus::Escaped(4)));
        assert_eq!(state.status(1, 0, 10), Some(PixelStatus::Active { iterations: 0 }));
        assert_eq!(state.status(8, 0, 10), None);
    }
}
