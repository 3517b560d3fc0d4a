use bytemuck::{Pod, Zeroable};

use crate::fixed::FixedPoint;

/// Native-precision complex value used by the fast path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex {
    pub real: f64,
    pub imaginary: f64,
}

impl Complex {
    pub const ZERO: Self = Complex {
        real: 0.0,
        imaginary: 0.0,
    };

    pub fn new(real: f64, imaginary: f64) -> Self {
        Complex { real, imaginary }
    }

    pub fn norm_squared(&self) -> f64 {
        self.real * self.real + self.imaginary * self.imaginary
    }
}

/// Where a pixel stands after some number of `z ← z² + c` steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelStatus {
    /// Still iterating; `iterations` steps done without escaping.
    Active { iterations: u32 },
    /// `|z|` exceeded the horizon on step `n` (0-indexed).
    Escaped(u32),
    /// Reached the iteration budget without escaping.
    Bounded,
}

/**
[`bytemuck`]-compatible iteration state for a single pixel.

Mirrors `mandelbrot.wgsl#PixelState`. `iteration_count` is the number of completed
non-escaping steps, or the escape step when `escaped == 1`. The last value of `z`
is kept so a later call with a larger budget continues from here: in `z_real` and
`z_imag` for fixed-point jobs, and as raw `f64` bits in `z_native` for native ones.
A state only ever resumes under the arithmetic it was computed with, so the unused
pair is left alone.
*/
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelState {
    pub iteration_count: u32,
    pub escaped: u32,
    pub z_real: FixedPoint,
    pub z_imag: FixedPoint,
    /// `[re lo, re hi, im lo, im hi]` words of the native `z`.
    pub z_native: [u32; 4],
}

impl PixelState {
    pub const FRESH: Self = PixelState {
        iteration_count: 0,
        escaped: 0,
        z_real: FixedPoint::ZERO,
        z_imag: FixedPoint::ZERO,
        z_native: [0; 4],
    };

    pub fn native_z(&self) -> Complex {
        let word = |lo: u32, hi: u32| f64::from_bits(u64::from(hi) << 32 | u64::from(lo));
        Complex::new(
            word(self.z_native[0], self.z_native[1]),
            word(self.z_native[2], self.z_native[3]),
        )
    }

    pub fn set_native_z(&mut self, z: Complex) {
        let (re, im) = (z.real.to_bits(), z.imaginary.to_bits());
        self.z_native = [re as u32, (re >> 32) as u32, im as u32, (im >> 32) as u32];
    }

    pub fn has_escaped(&self) -> bool {
        self.escaped != 0
    }

    pub fn status(&self, max_iter: u32) -> PixelStatus {
        if self.has_escaped() {
            if self.iteration_count < max_iter {
                PixelStatus::Escaped(self.iteration_count)
            } else {
                PixelStatus::Bounded
            }
        } else if self.iteration_count >= max_iter {
            PixelStatus::Bounded
        } else {
            PixelStatus::Active {
                iterations: self.iteration_count,
            }
        }
    }
}
