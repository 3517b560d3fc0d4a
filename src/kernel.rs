/*!
Per-pixel escape iteration, shared by the host dispatcher and mirrored by
`mandelbrot.wgsl`.

One step from `z = zr + zi·i` with cached squares `zr2`, `zi2`:

```text
zi  = 2·zr·zi + ci
zr  = (zr2 - zi2) + cr
zr2 = zr·zr
zi2 = zi·zi
escaped when zr2 + zi2 > horizon²
```

The fixed-point step has to stay operation-for-operation identical to the shader so
that both dispatchers produce the same iteration counts.
*/

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    fixed::FixedPoint,
    pixel::{Complex, PixelState, PixelStatus},
    screen,
    view::FixedGrid,
};

/// Iteration budgets at or above this are clamped: the device counter is a signed
/// 32-bit integer, kept 256 times below its limit.
pub const MAX_ITERATIONS: u32 = (1 << 31) / 256;

/// Largest escape radius: `horizon²` has to fit the 31 integer bits of the
/// transport encoding.
pub const MAX_HORIZON: f64 = 32768.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// `f64` coordinates and iteration.
    Native,
    /// [`FixedPoint`] coordinates and iteration.
    Fixed,
}

/// Everything a dispatcher needs to run one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Job {
    pub grid: FixedGrid,
    pub size: screen::Size,
    pub max_iter: u32,
    pub horizon: f64,
    pub precision: Precision,
}

impl Job {
    pub fn horizon_squared(&self) -> f64 {
        self.horizon * self.horizon
    }

    pub fn horizon_squared_fixed(&self) -> Result<FixedPoint> {
        FixedPoint::from_native(self.horizon_squared())
    }

    /// The fixed-point sample point of device pixel `(gx, gy)`.
    pub fn fixed_point_at(&self, gx: u32, gy: u32) -> Result<(FixedPoint, FixedPoint)> {
        let offset = |origin: FixedPoint, step: FixedPoint, pixels: u32| {
            step.mul_u32(pixels)
                .and_then(|delta| origin.checked_add(delta))
                .ok_or_else(|| Error::precision_exceeded("sample point overflows"))
        };
        Ok((
            offset(self.grid.origin_re, self.grid.step_re, gx)?,
            offset(self.grid.origin_im, self.grid.step_im, gy)?,
        ))
    }

    /// The `f64` sample point of device pixel `(gx, gy)`.
    pub fn native_point_at(&self, gx: u32, gy: u32) -> Complex {
        Complex::new(
            self.grid.origin_re.to_native() + self.grid.step_re.to_native() * f64::from(gx),
            self.grid.origin_im.to_native() + self.grid.step_im.to_native() * f64::from(gy),
        )
    }
}

fn overflow() -> Error {
    Error::precision_exceeded("z overflows the fixed-point range")
}

/// Runs `state` up to `max_iter` steps in fixed point. Escaped pixels and pixels
/// already at or past the budget are left alone.
pub fn advance_fixed(
    state: &mut PixelState,
    c_re: FixedPoint,
    c_im: FixedPoint,
    max_iter: u32,
    horizon_squared: FixedPoint,
) -> Result<()> {
    if state.has_escaped() || state.iteration_count >= max_iter {
        return Ok(());
    }

    let mut zr = state.z_real;
    let mut zi = state.z_imag;
    let mut zr2 = zr.checked_square().ok_or_else(overflow)?;
    let mut zi2 = zi.checked_square().ok_or_else(overflow)?;
    let mut n = state.iteration_count;

    while n < max_iter {
        zi = zr
            .double()
            .and_then(|twice| twice.checked_mul(zi))
            .and_then(|product| product.checked_add(c_im))
            .ok_or_else(overflow)?;
        zr = zr2
            .checked_sub(zi2)
            .and_then(|difference| difference.checked_add(c_re))
            .ok_or_else(overflow)?;
        zr2 = zr.checked_square().ok_or_else(overflow)?;
        zi2 = zi.checked_square().ok_or_else(overflow)?;

        if zr2.checked_add(zi2).ok_or_else(overflow)? > horizon_squared {
            state.escaped = 1;
            break;
        }
        n += 1;
    }

    state.iteration_count = n;
    state.z_real = zr;
    state.z_imag = zi;
    Ok(())
}

/// The `f64` counterpart of [`advance_fixed`]. `z` is stored bit for bit in
/// [`PixelState::z_native`], so resuming gives the same result as one long run.
pub fn advance_native(state: &mut PixelState, c: Complex, max_iter: u32, horizon_squared: f64) {
    if state.has_escaped() || state.iteration_count >= max_iter {
        return;
    }

    let mut z = state.native_z();
    let (n, escaped) = iterate_native(&mut z, c, state.iteration_count, max_iter, horizon_squared);

    state.iteration_count = n;
    state.escaped = u32::from(escaped);
    state.set_native_z(z);
}

fn iterate_native(
    z: &mut Complex,
    c: Complex,
    mut n: u32,
    max_iter: u32,
    horizon_squared: f64,
) -> (u32, bool) {
    let mut zr2 = z.real * z.real;
    let mut zi2 = z.imaginary * z.imaginary;

    while n < max_iter {
        z.imaginary = 2.0 * z.real * z.imaginary + c.imaginary;
        z.real = zr2 - zi2 + c.real;
        zr2 = z.real * z.real;
        zi2 = z.imaginary * z.imaginary;

        if zr2 + zi2 > horizon_squared {
            return (n, true);
        }
        n += 1;
    }
    (n, false)
}

/// Escape time of a single point, starting from `z = 0`.
pub fn escape_time(c: Complex, max_iter: u32, horizon: f64) -> PixelStatus {
    let mut z = Complex::ZERO;
    match iterate_native(&mut z, c, 0, max_iter, horizon * horizon) {
        (n, true) => PixelStatus::Escaped(n),
        (_, false) => PixelStatus::Bounded,
    }
}

/// Packed `0x00BBGGRR` colour of a pixel: its palette entry when it escaped
/// strictly before the last entry, black otherwise.
pub fn packed_colour(state: &PixelState, palette: &[u32]) -> u32 {
    let index = state.iteration_count as usize;
    if state.has_escaped() && index + 1 < palette.len() {
        palette[index]
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: f64) -> FixedPoint {
        FixedPoint::from_native(value).unwrap()
    }

    fn run_fixed(c: (f64, f64), max_iter: u32) -> PixelState {
        let mut state = PixelState::FRESH;
        advance_fixed(&mut state, fixed(c.0), fixed(c.1), max_iter, fixed(4.0)).unwrap();
        state
    }

    fn run_native(c: (f64, f64), max_iter: u32) -> PixelState {
        let mut state = PixelState::FRESH;
        advance_native(&mut state, Complex::new(c.0, c.1), max_iter, 4.0);
        state
    }

    #[test]
    fn far_point_escapes_on_the_first_step() {
        assert_eq!(run_fixed((2.0, 2.0), 100).status(100), PixelStatus::Escaped(0));
        assert_eq!(run_native((2.0, 2.0), 100).status(100), PixelStatus::Escaped(0));
        assert_eq!(
            escape_time(Complex::new(2.0, 2.0), 100, 2.0),
            PixelStatus::Escaped(0)
        );
    }

    #[test]
    fn origin_is_bounded() {
        let state = run_fixed((0.0, 0.0), 100);
        assert_eq!(state.iteration_count, 100);
        assert_eq!(state.status(100), PixelStatus::Bounded);
        assert_eq!(escape_time(Complex::ZERO, 100, 2.0), PixelStatus::Bounded);
    }

    #[test]
    fn known_escape_times() {
        // z1 = 1, z2 = 2, z3 = 5.
        assert_eq!(escape_time(Complex::new(1.0, 0.0), 100, 2.0), PixelStatus::Escaped(2));
        assert_eq!(run_fixed((1.0, 0.0), 100).status(100), PixelStatus::Escaped(2));
        // c = -2 sits on the boundary: |z| = 2 is never strictly greater.
        assert_eq!(run_fixed((-2.0, 0.0), 50).status(50), PixelStatus::Bounded);
    }

    #[test]
    fn fixed_and_native_agree_on_ordinary_points() {
        for &c in &[(0.5, 0.5), (-1.5, 0.5), (0.0, 1.5), (0.3, 0.0), (-0.5, 0.0), (-0.1, 0.1)] {
            let a = run_fixed(c, 500);
            let b = run_native(c, 500);
            assert_eq!(a.status(500), b.status(500), "{c:?}");
        }
    }

    #[test]
    fn resuming_matches_a_single_run() {
        for &c in &[(-0.75, 0.1), (0.3, 0.5), (-0.1, 0.9), (-0.5, 0.0)] {
            let mut resumed = run_fixed(c, 100);
            advance_fixed(&mut resumed, fixed(c.0), fixed(c.1), 200, fixed(4.0)).unwrap();
            assert_eq!(resumed, run_fixed(c, 200), "{c:?}");
        }
    }

    #[test]
    fn native_resume_matches_a_single_run() {
        for &c in &[(-0.75, 0.1), (0.3, 0.5), (-0.1, 0.9), (-0.5, 0.0), (-1.7548776, 0.0)] {
            let mut resumed = run_native(c, 100);
            advance_native(&mut resumed, Complex::new(c.0, c.1), 200, 4.0);
            assert_eq!(resumed, run_native(c, 200), "{c:?}");
        }
    }

    #[test]
    fn lower_budget_never_recomputes() {
        let mut state = run_fixed((-0.5, 0.0), 200);
        let before = state;
        advance_fixed(&mut state, fixed(-0.5), fixed(0.0), 100, fixed(4.0)).unwrap();
        assert_eq!(state, before);
        assert_eq!(state.status(100), PixelStatus::Bounded);
    }

    #[test]
    fn colour_lookup() {
        let palette = [1, 2, 3, 0];
        let mut state = PixelState {
            escaped: 1,
            iteration_count: 2,
            ..PixelState::FRESH
        };
        assert_eq!(packed_colour(&state, &palette), 3);
        state.iteration_count = 3;
        assert_eq!(packed_colour(&state, &palette), 0);
        state.escaped = 0;
        state.iteration_count = 1;
        assert_eq!(packed_colour(&state, &palette), 0);
    }

    #[test]
    fn sample_points_follow_the_grid() {
        let job = Job {
            grid: FixedGrid {
                origin_re: fixed(-2.0),
                origin_im: fixed(-1.5),
                step_re: fixed(0.03),
                step_im: fixed(0.03),
            },
            size: screen::Size::new(100, 100),
            max_iter: 10,
            horizon: 2.0,
            precision: Precision::Fixed,
        };
        let (re, im) = job.fixed_point_at(50, 50).unwrap();
        assert!((re.to_native() - -0.5).abs() < 1e-12);
        assert!(im.to_native().abs() < 1e-12);
        let c = job.native_point_at(50, 50);
        assert!((c.real - -0.5).abs() < 1e-12);
    }
}
