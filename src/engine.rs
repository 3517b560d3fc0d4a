/*!
The escape-time engine: turns a [`View`] into colours, resuming from earlier
progress when it can.

A call runs in four steps:

1. clamp the iteration budget to [`MAX_ITERATIONS`],
2. pick native or fixed-point arithmetic for the view,
3. validate the sampling grid and prepare the [`ResumableState`] for it,
4. submit to the [`Dispatcher`] and unpack the colours into the caller's buffer.
*/

use std::{ops::AddAssign, sync::Arc};

use log::{debug, warn};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::{
    colour::{ColourBuffer, Palette, PaletteCache, PaletteScheme},
    config::{Backend, EngineConfig},
    dispatch::{Dispatcher, HostDispatcher},
    error::{Error, Result},
    gpu::GpuDispatcher,
    kernel::{Job, Precision, MAX_HORIZON, MAX_ITERATIONS},
    pixel::{PixelState, PixelStatus},
    state::{ResumableState, ResumeKey},
    view::View,
};

/// Neighbouring pixels stay distinct in `f64` while the step is at least this
/// fraction of the largest coordinate.
const NATIVE_STEP_RATIO: f64 = 1.0 / (1u64 << 40) as f64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    /// Native while the view is shallow enough, fixed point past that.
    #[default]
    Auto,
    Native,
    Fixed,
}

/// Whether `f64` arithmetic still tells neighbouring pixels of `view` apart.
pub fn native_suffices(view: &View) -> bool {
    let magnitude = [view.xmin(), view.xmax(), view.ymin(), view.ymax()]
        .iter()
        .fold(1.0f64, |acc, value| acc.max(value.abs()));
    let step = view.step_size().min(view.step_size_imag());
    step >= magnitude * NATIVE_STEP_RATIO
}

/// Recoverable conditions met during a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// The budget was at or above [`MAX_ITERATIONS`].
    MaxIterClamped { requested: u32, used: u32 },
    /// Native precision was requested but the dispatcher only runs fixed point.
    NativeUnsupported,
    /// The GPU could not be opened and the engine runs on the host.
    HostFallback { reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelCounts {
    pub escaped: usize,
    pub bounded: usize,
    pub active: usize,
}

impl PixelCounts {
    fn count(pixels: &[PixelState], max_iter: u32) -> Self {
        pixels
            .par_iter()
            .map(|pixel| match pixel.status(max_iter) {
                PixelStatus::Escaped(_) => PixelCounts {
                    escaped: 1,
                    ..PixelCounts::default()
                },
                PixelStatus::Bounded => PixelCounts {
                    bounded: 1,
                    ..PixelCounts::default()
                },
                PixelStatus::Active { .. } => PixelCounts {
                    active: 1,
                    ..PixelCounts::default()
                },
            })
            .reduce(PixelCounts::default, |mut a, b| {
                a += b;
                a
            })
    }
}

impl AddAssign for PixelCounts {
    fn add_assign(&mut self, other: Self) {
        self.escaped += other.escaped;
        self.bounded += other.bounded;
        self.active += other.active;
    }
}

/// What a call did, alongside the colours it wrote.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub precision: Precision,
    /// Budget after clamping.
    pub max_iter: u32,
    /// Whether earlier progress was picked up.
    pub resumed: bool,
    pub notices: Vec<Notice>,
    pub counts: PixelCounts,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub colours: ColourBuffer,
    pub outcome: Outcome,
}

impl Frame {
    /// Row-major RGB, shape `(H, W, 3)`.
    pub fn as_bytes(&self) -> &[u8] {
        self.colours.as_bytes()
    }
}

pub struct EscapeEngine {
    config: EngineConfig,
    dispatcher: Box<dyn Dispatcher>,
    palettes: PaletteCache,
    packed: Vec<u32>,
    pending: Vec<Notice>,
}

impl EscapeEngine {
    pub fn new(config: EngineConfig, dispatcher: Box<dyn Dispatcher>) -> Result<Self> {
        config.validate()?;
        debug!("escape engine on the {} dispatcher", dispatcher.name());
        Ok(EscapeEngine {
            config,
            dispatcher,
            palettes: PaletteCache::new(),
            packed: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Default settings on the rayon thread pool.
    pub fn host() -> Self {
        EscapeEngine {
            config: EngineConfig {
                backend: Backend::Host,
                ..EngineConfig::default()
            },
            dispatcher: Box::new(HostDispatcher::new()),
            palettes: PaletteCache::new(),
            packed: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Default settings on the compute shader.
    pub fn gpu() -> Result<Self> {
        Self::from_config(EngineConfig::default())
    }

    /// Opens the dispatcher named by `config.backend`.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut pending = Vec::new();
        let dispatcher: Box<dyn Dispatcher> = match config.backend {
            Backend::Gpu => Box::new(GpuDispatcher::new()?),
            Backend::Host => Box::new(HostDispatcher::new()),
            Backend::GpuOrHost => match GpuDispatcher::new() {
                Ok(gpu) => Box::new(gpu),
                Err(error) => {
                    warn!("GPU unavailable ({}), falling back to host dispatch", error);
                    pending.push(Notice::HostFallback {
                        reason: error.to_string(),
                    });
                    Box::new(HostDispatcher::new())
                }
            },
        };

        let mut engine = Self::new(config, dispatcher)?;
        engine.pending = pending;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher_name(&self) -> &str {
        self.dispatcher.name()
    }

    pub fn set_palette(&mut self, scheme: PaletteScheme) {
        self.config.palette = scheme;
    }

    pub fn set_precision(&mut self, precision: PrecisionMode) {
        self.config.precision = precision;
    }

    /// Palettes built so far, most recently used kept.
    pub fn palette_cache(&self) -> &PaletteCache {
        &self.palettes
    }

    /// The palette this engine colours a `max_iter` budget with.
    pub fn palette(&mut self, max_iter: u32) -> Arc<Palette> {
        self.palettes.get(max_iter, self.config.palette)
    }

    /// Renders `view` into a new buffer. See [`EscapeEngine::compute_into`].
    pub fn compute(&mut self, view: &View, state: Option<&mut ResumableState>) -> Result<Frame> {
        let mut colours = ColourBuffer::new(view.size());
        let outcome = self.compute_into(view, state, &mut colours)?;
        Ok(Frame { colours, outcome })
    }

    /**
    Renders `view` into `colours`, reallocating it only when the frame size
    changed.

    With a `state` whose key matches the view, pixels continue from their stored
    iteration; any mismatch silently starts them all afresh. The state holds the
    progress of every pixel afterwards, so a later call with a larger budget only
    runs the remaining iterations.
    */
    pub fn compute_into(
        &mut self,
        view: &View,
        state: Option<&mut ResumableState>,
        colours: &mut ColourBuffer,
    ) -> Result<Outcome> {
        let mut notices = std::mem::take(&mut self.pending);

        let requested = view.max_iter();
        let max_iter = if requested >= MAX_ITERATIONS {
            warn!(
                "maxiter {} is at or above the limit, clamping to {}",
                requested, MAX_ITERATIONS
            );
            notices.push(Notice::MaxIterClamped {
                requested,
                used: MAX_ITERATIONS,
            });
            MAX_ITERATIONS
        } else {
            requested
        };

        let precision = self.select_precision(view, &mut notices);
        let job = self.job(view, max_iter, precision)?;

        let mut fresh = ResumableState::new();
        let state = state.unwrap_or(&mut fresh);
        let resumed = state.prepare(ResumeKey::for_job(&job));

        let palette = self.palettes.get(max_iter, self.config.palette);
        let pixel_count = view.size().pixel_count();
        self.packed.resize(pixel_count, 0);

        self.dispatcher
            .submit(&job, state.pixels_mut(), palette.packed(), &mut self.packed)?;

        colours.ensure_size(view.size());
        colours.unpack_from(&self.packed);

        let counts = PixelCounts::count(state.pixels(), max_iter);
        debug!(
            "{}: {:?} to maxiter {} ({} escaped, {} bounded, {} active)",
            view, precision, max_iter, counts.escaped, counts.bounded, counts.active
        );

        Ok(Outcome {
            precision,
            max_iter,
            resumed,
            notices,
            counts,
        })
    }

    fn select_precision(&self, view: &View, notices: &mut Vec<Notice>) -> Precision {
        let native = self.dispatcher.supports_native();
        let precision = match self.config.precision {
            PrecisionMode::Fixed => Precision::Fixed,
            PrecisionMode::Native if native => Precision::Native,
            PrecisionMode::Native => {
                warn!(
                    "the {} dispatcher has no native arithmetic, using fixed point",
                    self.dispatcher.name()
                );
                notices.push(Notice::NativeUnsupported);
                Precision::Fixed
            }
            PrecisionMode::Auto if native && native_suffices(view) => Precision::Native,
            PrecisionMode::Auto => Precision::Fixed,
        };
        debug!(
            "{:?} precision for step {:e} ({:?} mode)",
            precision,
            view.step_size(),
            self.config.precision
        );
        precision
    }

    /// Builds the job, checking that every sample point and `horizon²` fit the
    /// transport encoding so the kernel cannot overflow.
    fn job(&self, view: &View, max_iter: u32, precision: Precision) -> Result<Job> {
        let horizon = self.config.horizon;
        if !horizon.is_finite() || horizon <= 0.0 || horizon > MAX_HORIZON {
            return Err(Error::Config(format!("horizon {} is out of range", horizon)));
        }

        let job = Job {
            grid: view.fixed_grid()?,
            size: view.size(),
            max_iter,
            horizon,
            precision,
        };

        let (first_re, first_im) = job.fixed_point_at(0, 0)?;
        let (last_re, last_im) = job.fixed_point_at(view.width() - 1, view.height() - 1)?;
        for value in [first_re, first_im, last_re, last_im, job.grid.step_re, job.grid.step_im] {
            value.to_hi_lo()?;
        }
        job.horizon_squared_fixed()?.to_hi_lo()?;

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colour::Rgb;

    fn seed() -> View {
        View::new(-2.0, 1.0, -1.5, 1.5, 100, 100, 100).unwrap()
    }

    #[test]
    fn origin_is_black_and_far_corner_escapes() {
        let mut engine = EscapeEngine::host();
        let mut state = ResumableState::new();
        let view = seed();
        let frame = engine.compute(&view, Some(&mut state)).unwrap();

        let (px, py) = view.complex_to_pixel(0.0, 0.0);
        assert_eq!(
            state.status(px as u32, py as u32, 100),
            Some(PixelStatus::Bounded)
        );
        assert_eq!(frame.colours.pixel(px as u32, py as u32), Some(Rgb::BLACK));
        assert_eq!(frame.outcome.precision, Precision::Native);
        assert!(!frame.outcome.resumed);
        assert_eq!(
            frame.outcome.counts.escaped + frame.outcome.counts.bounded,
            100 * 100
        );
        assert_eq!(frame.as_bytes().len(), 100 * 100 * 3);
    }

    #[test]
    fn fixed_and_native_agree_on_a_coarse_view() {
        let view = View::new(-2.0, 1.0, -1.5, 1.5, 24, 24, 30).unwrap();
        let mut engine = EscapeEngine::host();

        engine.set_precision(PrecisionMode::Native);
        let native = engine.compute(&view, None).unwrap();
        engine.set_precision(PrecisionMode::Fixed);
        let fixed = engine.compute(&view, None).unwrap();

        assert_eq!(native.outcome.precision, Precision::Native);
        assert_eq!(fixed.outcome.precision, Precision::Fixed);
        assert_eq!(native.outcome.counts, fixed.outcome.counts);
    }

    #[test]
    fn clamps_the_budget() {
        let mut engine = EscapeEngine::host();
        let view = View::new(2.0, 3.0, 2.0, 3.0, 2, 2, u32::MAX).unwrap();
        let frame = engine.compute(&view, None).unwrap();
        assert_eq!(frame.outcome.max_iter, MAX_ITERATIONS);
        assert_eq!(
            frame.outcome.notices,
            vec![Notice::MaxIterClamped {
                requested: u32::MAX,
                used: MAX_ITERATIONS
            }]
        );
    }

    #[test]
    fn deep_views_switch_to_fixed_point() {
        let shallow = seed();
        assert!(native_suffices(&shallow));

        let deep = View::from_center(-0.743643887037151, 0.13182590420533, 1e-14, 8, 8, 50).unwrap();
        assert!(!native_suffices(&deep));

        let mut engine = EscapeEngine::host();
        let frame = engine.compute(&deep, None).unwrap();
        assert_eq!(frame.outcome.precision, Precision::Fixed);
    }

    #[test]
    fn rejects_untransportable_views() {
        let mut engine = EscapeEngine::host();
        let far = View::new(3e9, 3e9 + 1.0, 0.0, 1.0, 2, 2, 10).unwrap();
        assert!(matches!(
            engine.compute(&far, None),
            Err(Error::PrecisionExceeded(_))
        ));
    }

    #[test]
    fn reuses_the_caller_buffer() {
        let mut engine = EscapeEngine::host();
        let mut colours = ColourBuffer::default();
        engine.compute_into(&seed(), None, &mut colours).unwrap();
        assert_eq!(colours.size(), seed().size());

        let mut smaller = seed();
        smaller.resize(10, 10).unwrap();
        engine.compute_into(&smaller, None, &mut colours).unwrap();
        assert_eq!(colours.as_bytes().len(), 300);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            horizon: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(matches!(
            EscapeEngine::new(config, Box::new(HostDispatcher::new())),
            Err(Error::Config(_))
        ));
    }
}
