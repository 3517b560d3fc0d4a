/*!
Parallel dispatch of a [`Job`].

A dispatcher advances every pixel of a frame and writes its packed colour. Pixel
state is laid out in device order (row 0 at the bottom of the view) and the output
in image order (row 0 at the top), so device row `gy` lands in output row
`H - 1 - gy`.
*/

use log::trace;
use rayon::prelude::{IndexedParallelIterator, ParallelIterator, ParallelSliceMut};

use crate::{
    error::Result,
    kernel::{self, Job, Precision},
    pixel::PixelState,
};

pub trait Dispatcher {
    fn name(&self) -> &str;

    /// Whether [`Precision::Native`] jobs can run here. Dispatchers that can't are
    /// only given fixed-point jobs.
    fn supports_native(&self) -> bool;

    /**
    Advances `pixels` (device order) to `job.max_iter` and writes one packed
    `0x00BBGGRR` colour per pixel to `output` (image order).

    Blocks until the work has finished.
    */
    fn submit(
        &self,
        job: &Job,
        pixels: &mut [PixelState],
        palette: &[u32],
        output: &mut [u32],
    ) -> Result<()>;
}

/// Runs the kernel on the rayon thread pool, one task per group of rows.
#[derive(Clone, Debug)]
pub struct HostDispatcher {
    tasks_per_thread: usize,
}

impl HostDispatcher {
    pub fn new() -> Self {
        HostDispatcher {
            tasks_per_thread: 4,
        }
    }

    fn rows_per_task(&self, height: u32) -> usize {
        (height as usize / (num_cpus::get() * self.tasks_per_thread)).max(1)
    }
}

impl Default for HostDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for HostDispatcher {
    fn name(&self) -> &str {
        "host"
    }

    fn supports_native(&self) -> bool {
        true
    }

    fn submit(
        &self,
        job: &Job,
        pixels: &mut [PixelState],
        palette: &[u32],
        output: &mut [u32],
    ) -> Result<()> {
        trace!("begin host dispatch");

        let width = job.size.width as usize;
        debug_assert_eq!(pixels.len(), job.size.pixel_count());
        debug_assert_eq!(output.len(), job.size.pixel_count());

        let horizon_squared = job.horizon_squared();
        let horizon_squared_fixed = job.horizon_squared_fixed()?;

        pixels
            .par_chunks_mut(width)
            .zip(output.par_chunks_mut(width).rev())
            .enumerate()
            .with_min_len(self.rows_per_task(job.size.height))
            .try_for_each(|(gy, (row, colours))| -> Result<()> {
                for (gx, (pixel, colour)) in row.iter_mut().zip(colours.iter_mut()).enumerate() {
                    match job.precision {
                        Precision::Native => {
                            let c = job.native_point_at(gx as u32, gy as u32);
                            kernel::advance_native(pixel, c, job.max_iter, horizon_squared);
                        }
                        Precision::Fixed => {
                            let (c_re, c_im) = job.fixed_point_at(gx as u32, gy as u32)?;
                            kernel::advance_fixed(
                                pixel,
                                c_re,
                                c_im,
                                job.max_iter,
                                horizon_squared_fixed,
                            )?;
                        }
                    }
                    *colour = kernel::packed_colour(pixel, palette);
                }
                Ok(())
            })?;

        trace!("end host dispatch");
        Ok(())
    }
}
