use crate::error::{Error, Result};

/// Workgroup size for `mandelbrot.wgsl#mandelbrot`.
pub const MANDELBROT_WORKGROUP_SIZE_Y: u32 = 64;

/// Workgroups per dispatch along `y`.
pub const MANDELBROT_DISPATCH_SIZE_Y: u32 = 1024;

/// Invocations per unit of dispatch `x`. Corresponds to the `65536u` stride in
/// `mandelbrot.wgsl#mandelbrot`.
pub const MANDELBROT_ROW_STRIDE: u32 = MANDELBROT_DISPATCH_SIZE_Y * MANDELBROT_WORKGROUP_SIZE_Y;

/// Largest workgroup count per dimension guaranteed by `wgpu::Limits::default()`.
const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535;

/**
Dispatch size for `mandelbrot.wgsl#mandelbrot`, which runs once per pixel.

A single dispatch dimension is capped at 65535 workgroups, so the pixels are spread
over two: `y` covers 1024 workgroups of `(1, 64, 1)` invocations, 65536 pixels in
all, and `x` counts how many of those blocks are needed. The kernel recovers the
pixel index as `global_invocation_id.x * 65536 + global_invocation_id.y` and skips
invocations past the last pixel.

[WGSL compute shader workgroups reference](https://www.w3.org/TR/WGSL/#compute-shader-workgroups)
*/
pub fn mandelbrot_dispatch_size(total_work: usize) -> Result<(u32, u32, u32)> {
    let blocks = total_work.div_ceil(MANDELBROT_ROW_STRIDE as usize).max(1);
    let x = u32::try_from(blocks)
        .ok()
        .filter(|x| *x <= MAX_WORKGROUPS_PER_DIMENSION)
        .ok_or_else(|| Error::Dispatch(format!("{} pixels exceed one dispatch", total_work)))?;
    Ok((x, MANDELBROT_DISPATCH_SIZE_Y, 1))
}
