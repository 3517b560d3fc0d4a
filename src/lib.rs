/*!
Escape-time Mandelbrot rendering at arbitrary zoom depth.

An [`EscapeEngine`] maps a [`View`] (a window on the complex plane, a pixel grid
and an iteration budget) to RGB colours. Shallow views iterate in `f64`; deep views
iterate in 192-bit [`FixedPoint`], on a wgpu compute shader or on the rayon thread
pool. A [`ResumableState`] keeps per-pixel progress between calls, and
[`Progressive`] uses it to refine a tiled frame pass by pass.

```no_run
use mandelzoom::{EscapeEngine, ResumableState, View};

let mut engine = EscapeEngine::host();
let mut view = View::from_bounds(-2.0, 1.0, -1.5, 1.5, 640, 480, 200)?;
let mut state = ResumableState::new();
let frame = engine.compute(&view, Some(&mut state))?;

// Continue the same pixels to a larger budget.
view.set_max_iter(1000);
let frame = engine.compute(&view, Some(&mut state))?;
# Ok::<(), mandelzoom::Error>(())
```
*/

pub mod bookmark;
pub mod colour;
mod compute;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod gpu;
pub mod kernel;
pub mod orbit;
pub mod pixel;
pub mod screen;
pub mod state;
pub mod tiler;
mod typed_buffer;
pub mod view;

pub use bookmark::Bookmark;
pub use colour::{ColourBuffer, Palette, PaletteCache, PaletteScheme, Rgb};
pub use config::{Backend, EngineConfig};
pub use dispatch::{Dispatcher, HostDispatcher};
pub use engine::{EscapeEngine, Frame, Notice, Outcome, PixelCounts, PrecisionMode};
pub use error::{Error, Result};
pub use fixed::FixedPoint;
pub use gpu::GpuDispatcher;
pub use kernel::{escape_time, Precision, MAX_ITERATIONS};
pub use orbit::OrbitTrace;
pub use pixel::{Complex, PixelState, PixelStatus};
pub use state::{ResumableState, ResumeKey};
pub use tiler::{Progressive, Tile, TileReport, Tiler};
pub use view::View;
