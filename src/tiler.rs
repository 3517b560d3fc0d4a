/*!
Tiled, progressively refined rendering.

A [`Tiler`] cuts a view into `tile_size` squares (clipped at the right and bottom
edges) and sweeps them row by row, once per pass. Pass `k` caps every tile at
`(k + 1) * iter_step` iterations and the last pass at the view's own budget, so a
coarse preview of the whole frame arrives before any tile is refined.
*/

use log::debug;

use crate::{
    colour::ColourBuffer,
    config::EngineConfig,
    engine::{EscapeEngine, Outcome},
    error::{Error, Result},
    state::ResumableState,
    view::View,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// Left edge in the parent's pixels.
    pub x_offset: u32,
    /// Top edge in the parent's pixels.
    pub y_offset: u32,
    pub pass: u32,
    /// Row-major position within a pass.
    pub index: usize,
    /// The tile's window, with this pass's budget.
    pub view: View,
}

/// Restartable, finite sequence of [`Tile`]s covering a view once per pass.
#[derive(Clone, Debug)]
pub struct Tiler {
    view: View,
    tile_size: u32,
    iter_step: u32,
    columns: u32,
    rows: u32,
    pass_count: u32,
    position: usize,
}

impl Tiler {
    pub fn new(view: View, tile_size: u32, iter_step: u32) -> Result<Self> {
        if tile_size == 0 {
            return Err(Error::invalid_region("tile size is zero"));
        }
        if iter_step == 0 {
            return Err(Error::Config("iter_step must be positive".into()));
        }

        let columns = view.width().div_ceil(tile_size);
        let rows = view.height().div_ceil(tile_size);
        let pass_count = view.max_iter().div_ceil(iter_step).max(1);

        Ok(Tiler {
            view,
            tile_size,
            iter_step,
            columns,
            rows,
            pass_count,
            position: 0,
        })
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Tiles per pass.
    pub fn tile_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    pub fn pass_count(&self) -> u32 {
        self.pass_count
    }

    /// Iteration budget of pass `pass`.
    pub fn pass_max_iter(&self, pass: u32) -> u32 {
        self.iter_step
            .saturating_mul(pass.saturating_add(1))
            .min(self.view.max_iter())
    }

    /// Starts over from the first tile of the first pass.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    fn total(&self) -> usize {
        self.tile_count() * self.pass_count as usize
    }

    fn tile(&self, position: usize) -> Tile {
        let pass = (position / self.tile_count()) as u32;
        let index = position % self.tile_count();
        let column = (index % self.columns as usize) as u32;
        let row = (index / self.columns as usize) as u32;

        let x_offset = column * self.tile_size;
        let y_offset = row * self.tile_size;
        let width = self.tile_size.min(self.view.width() - x_offset);
        let height = self.tile_size.min(self.view.height() - y_offset);

        let mut view = self.view.cut(x_offset, y_offset, width, height);
        view.set_max_iter(self.pass_max_iter(pass));

        Tile {
            x_offset,
            y_offset,
            pass,
            index,
            view,
        }
    }
}

impl Iterator for Tiler {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total() {
            return None;
        }
        let tile = self.tile(self.position);
        self.position += 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Tiler {}

#[derive(Clone, Debug, PartialEq)]
pub struct TileReport {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    pub pass: u32,
    /// Whether this was the last tile of its pass.
    pub pass_complete: bool,
    pub outcome: Outcome,
}

/**
Drives a [`Tiler`] through an [`EscapeEngine`], keeping one [`ResumableState`] per
tile position so each pass only runs the iterations it adds, and assembling the
tiles into a full frame.

A caller that wants to stop early simply stops calling [`Progressive::step`].
*/
pub struct Progressive {
    tiler: Tiler,
    states: Vec<ResumableState>,
    frame: ColourBuffer,
    tile: ColourBuffer,
    completed_pass: Option<u32>,
}

impl Progressive {
    pub fn new(view: View, tile_size: u32, iter_step: u32) -> Result<Self> {
        let tiler = Tiler::new(view, tile_size, iter_step)?;
        let states = vec![ResumableState::new(); tiler.tile_count()];
        let frame = ColourBuffer::new(tiler.view().size());
        Ok(Progressive {
            tiler,
            states,
            frame,
            tile: ColourBuffer::default(),
            completed_pass: None,
        })
    }

    /// Uses the configured tile size and iteration step.
    pub fn with_config(view: View, config: &EngineConfig) -> Result<Self> {
        Self::new(view, config.tile_size, config.iter_step)
    }

    pub fn view(&self) -> &View {
        self.tiler.view()
    }

    pub fn tiler(&self) -> &Tiler {
        &self.tiler
    }

    /// The assembled frame so far.
    pub fn frame(&self) -> &ColourBuffer {
        &self.frame
    }

    pub fn completed_pass(&self) -> Option<u32> {
        self.completed_pass
    }

    pub fn is_complete(&self) -> bool {
        self.tiler.len() == 0
    }

    /// Computes the next tile and copies it into the frame. `None` once every
    /// pass is done.
    pub fn step(&mut self, engine: &mut EscapeEngine) -> Result<Option<TileReport>> {
        let tile = match self.tiler.next() {
            Some(tile) => tile,
            None => return Ok(None),
        };
        if tile.index == 0 {
            debug!(
                "pass {}/{}: maxiter {}",
                tile.pass + 1,
                self.tiler.pass_count(),
                tile.view.max_iter()
            );
        }

        let outcome =
            engine.compute_into(&tile.view, Some(&mut self.states[tile.index]), &mut self.tile)?;
        self.frame.blit(&self.tile, tile.x_offset, tile.y_offset);

        let pass_complete = tile.index + 1 == self.tiler.tile_count();
        if pass_complete {
            self.completed_pass = Some(tile.pass);
        }

        Ok(Some(TileReport {
            x_offset: tile.x_offset,
            y_offset: tile.y_offset,
            width: tile.view.width(),
            height: tile.view.height(),
            pass: tile.pass,
            pass_complete,
            outcome,
        }))
    }

    /// Runs every remaining tile. Returns how many were computed.
    pub fn run_to_completion(&mut self, engine: &mut EscapeEngine) -> Result<usize> {
        let mut computed = 0;
        while self.step(engine)?.is_some() {
            computed += 1;
        }
        Ok(computed)
    }

    /// Starts over, forgetting all progress.
    pub fn restart(&mut self) {
        self.tiler.reset();
        self.states.iter_mut().for_each(ResumableState::reset);
        self.completed_pass = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(width: u32, height: u32, max_iter: u32) -> View {
        View::from_bounds(-2.0, 1.0, -1.5, 1.5, width, height, max_iter).unwrap()
    }

    #[test]
    fn passes_escalate_to_the_outer_budget() {
        let tiler = Tiler::new(view(64, 64, 250), 32, 100).unwrap();
        assert_eq!(tiler.pass_count(), 3);
        assert_eq!(tiler.tile_count(), 4);
        assert_eq!(tiler.len(), 12);

        let budgets: Vec<u32> = tiler.map(|tile| tile.view.max_iter()).collect();
        assert_eq!(budgets[..4], [100; 4]);
        assert_eq!(budgets[4..8], [200; 4]);
        assert_eq!(budgets[8..], [250; 4]);
    }

    #[test]
    fn row_major_within_a_pass() {
        let offsets: Vec<(u32, u32)> = Tiler::new(view(50, 30, 10), 20, 10)
            .unwrap()
            .map(|tile| (tile.x_offset, tile.y_offset))
            .collect();
        assert_eq!(
            offsets,
            [(0, 0), (20, 0), (40, 0), (0, 20), (20, 20), (40, 20)]
        );
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let tiles: Vec<Tile> = Tiler::new(view(50, 30, 10), 20, 10).unwrap().collect();
        assert_eq!(tiles[2].view.size(), crate::screen::Size::new(10, 20));
        assert_eq!(tiles[5].view.size(), crate::screen::Size::new(10, 10));
    }

    #[test]
    fn reset_restarts_the_sweep() {
        let mut tiler = Tiler::new(view(40, 40, 300), 20, 100).unwrap();
        let first: Vec<Tile> = tiler.by_ref().take(5).collect();
        tiler.reset();
        assert_eq!(tiler.next().as_ref(), first.first());
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(Tiler::new(view(10, 10, 10), 0, 10).is_err());
        assert!(Tiler::new(view(10, 10, 10), 5, 0).is_err());
    }
}
