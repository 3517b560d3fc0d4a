//! Colouring: iteration-count palettes and the RGB output buffer.

use std::{f64::consts::PI, sync::Arc};

use fnv::FnvHashMap;
use log::trace;
use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSliceMut};
use serde::{Deserialize, Serialize};

use crate::{pixel::PixelStatus, screen};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// `0x00BBGGRR`, the layout the kernel writes.
    pub fn packed(self) -> u32 {
        u32::from(self.r) | u32::from(self.g) << 8 | u32::from(self.b) << 16
    }

    pub fn from_packed(value: u32) -> Self {
        Rgb {
            r: value as u8,
            g: (value >> 8) as u8,
            b: (value >> 16) as u8,
        }
    }
}

/// Strategy for turning an escape iteration into a colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum PaletteScheme {
    /// Amber ramp: `r = g = floor(ln(i + 1) / ln(maxiter + 1) * 255)`, `b = 0`.
    #[default]
    Log,
    /// Three cosine channels phase-shifted by 0°, 120° and 240°, repeating
    /// `revolutions` times over `maxiter`.
    CosineWheel { revolutions: u32 },
}

impl PaletteScheme {
    pub const DEFAULT_REVOLUTIONS: u32 = 5;

    pub fn cosine_wheel() -> Self {
        PaletteScheme::CosineWheel {
            revolutions: Self::DEFAULT_REVOLUTIONS,
        }
    }

    fn colour(self, index: u32, max_iter: u32) -> Rgb {
        match self {
            PaletteScheme::Log => {
                let level = (f64::from(index) + 1.0).ln() / (f64::from(max_iter) + 1.0).ln();
                let level = (level * 255.0).floor().clamp(0.0, 255.0) as u8;
                Rgb::new(level, level, 0)
            }
            PaletteScheme::CosineWheel { revolutions } => {
                let rad = 2.0 * PI * f64::from(index) / f64::from(wheel_divisions(max_iter, revolutions));
                let channel = |shift: f64| ((rad + shift).cos() * 255.0).trunc().max(0.0) as u8;
                Rgb::new(
                    channel(0.0),
                    channel(2.0 * PI / 3.0),
                    channel(4.0 * PI / 3.0),
                )
            }
        }
    }
}

/// Indices per revolution of the cosine wheel.
fn wheel_divisions(max_iter: u32, revolutions: u32) -> u32 {
    (max_iter / revolutions.max(1)).max(1)
}

/**
Dot size for point-trace visualisations of a cosine-wheel palette: starts at
`revolutions` and shrinks by one on each completed revolution, never below 1.
*/
pub fn dot_size(index: u32, max_iter: u32, revolutions: u32) -> u32 {
    let completed = index / wheel_divisions(max_iter, revolutions);
    revolutions.saturating_sub(completed).max(1)
}

/**
`maxiter` colours indexed by escape iteration.

The last entry, and any index past it, is black: a pixel that used its whole budget
is drawn as inside the set whatever the scheme's formula gives.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    scheme: PaletteScheme,
    entries: Vec<Rgb>,
    packed: Vec<u32>,
}

impl Palette {
    /// The default [`PaletteScheme::Log`] palette.
    pub fn build(max_iter: u32) -> Self {
        Self::with_scheme(max_iter, PaletteScheme::Log)
    }

    pub fn with_scheme(max_iter: u32, scheme: PaletteScheme) -> Self {
        let mut entries: Vec<Rgb> = (0..max_iter)
            .map(|index| scheme.colour(index, max_iter))
            .collect();
        if let Some(last) = entries.last_mut() {
            *last = Rgb::BLACK;
        }
        let packed = entries.iter().map(|colour| colour.packed()).collect();
        Palette {
            scheme,
            entries,
            packed,
        }
    }

    pub fn scheme(&self) -> PaletteScheme {
        self.scheme
    }

    pub fn max_iter(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries(&self) -> &[Rgb] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u32) -> Rgb {
        let index = index as usize;
        if index + 1 >= self.entries.len() {
            Rgb::BLACK
        } else {
            self.entries[index]
        }
    }

    pub fn colour(&self, status: PixelStatus) -> Rgb {
        match status {
            PixelStatus::Escaped(iteration) => self.get(iteration),
            PixelStatus::Active { .. } | PixelStatus::Bounded => Rgb::BLACK,
        }
    }

    /// One `0x00BBGGRR` word per entry, for upload to the device.
    pub fn packed(&self) -> &[u32] {
        &self.packed
    }
}

/**
Palettes already built, keyed by `(maxiter, scheme)`.

Holds at most [`PaletteCache::CAPACITY`] palettes; building one more drops the
least recently used. A progressive render asks for a new budget on every pass, so
only the latest few tiers stay alive.
*/
#[derive(Debug, Default)]
pub struct PaletteCache {
    palettes: FnvHashMap<(u32, PaletteScheme), (Arc<Palette>, u64)>,
    clock: u64,
}

impl PaletteCache {
    pub const CAPACITY: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, max_iter: u32, scheme: PaletteScheme) -> Arc<Palette> {
        self.clock += 1;
        let key = (max_iter, scheme);
        if let Some((palette, last_used)) = self.palettes.get_mut(&key) {
            *last_used = self.clock;
            return palette.clone();
        }

        if self.palettes.len() >= Self::CAPACITY {
            let oldest = self
                .palettes
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                trace!("dropping {:?} palette for maxiter {}", oldest.1, oldest.0);
                self.palettes.remove(&oldest);
            }
        }

        trace!("building {:?} palette for maxiter {}", scheme, max_iter);
        let palette = Arc::new(Palette::with_scheme(max_iter, scheme));
        self.palettes.insert(key, (palette.clone(), self.clock));
        palette
    }

    pub fn contains(&self, max_iter: u32, scheme: PaletteScheme) -> bool {
        self.palettes.contains_key(&(max_iter, scheme))
    }

    pub fn len(&self) -> usize {
        self.palettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palettes.is_empty()
    }

    pub fn clear(&mut self) {
        self.palettes.clear()
    }
}

/**
Row-major RGB bytes, shape `(H, W, 3)`, row 0 at the top.

The caller owns this buffer and passes it back on every call: it is reallocated
only when the frame size changes.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColourBuffer {
    size: screen::Size,
    bytes: Vec<u8>,
}

impl ColourBuffer {
    pub const CHANNELS: usize = 3;

    pub fn new(size: screen::Size) -> Self {
        ColourBuffer {
            size,
            bytes: vec![0; size.pixel_count() * Self::CHANNELS],
        }
    }

    pub fn size(&self) -> screen::Size {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns `true` when the buffer had to be reallocated.
    pub fn ensure_size(&mut self, size: screen::Size) -> bool {
        if self.size == size {
            return false;
        }
        trace!(
            "reallocating colour buffer {}x{} -> {}x{}",
            self.size.width,
            self.size.height,
            size.width,
            size.height
        );
        *self = Self::new(size);
        true
    }

    /// `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let index = (y as usize * self.size.width as usize + x as usize) * Self::CHANNELS;
        Some(Rgb::new(self.bytes[index], self.bytes[index + 1], self.bytes[index + 2]))
    }

    /// `None` below the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.size.height {
            return None;
        }
        let stride = self.stride();
        let start = y as usize * stride;
        Some(&self.bytes[start..start + stride])
    }

    fn stride(&self) -> usize {
        self.size.width as usize * Self::CHANNELS
    }

    /// Expands packed `0x00BBGGRR` words, already in output row order.
    pub fn unpack_from(&mut self, packed: &[u32]) {
        trace!("begin unpack_from");
        debug_assert_eq!(packed.len(), self.size.pixel_count());

        self.bytes
            .par_chunks_mut(Self::CHANNELS)
            .zip(packed)
            .for_each(|(bytes, word)| {
                let colour = Rgb::from_packed(*word);
                bytes.copy_from_slice(&[colour.r, colour.g, colour.b]);
            });

        trace!("end unpack_from");
    }

    /// Copies `tile` into this buffer with its top-left pixel at `(x, y)`.
    pub fn blit(&mut self, tile: &ColourBuffer, x: u32, y: u32) {
        debug_assert!(x + tile.size.width <= self.size.width);
        debug_assert!(y + tile.size.height <= self.size.height);

        let stride = self.stride();
        let offset = x as usize * Self::CHANNELS;
        if tile.stride() == 0 {
            return;
        }
        for (row, source) in tile.bytes.chunks_exact(tile.stride()).enumerate() {
            let start = (y as usize + row) * stride + offset;
            self.bytes[start..start + source.len()].copy_from_slice(source);
        }
    }
}
