/*!
The view window: a bounding box in the complex plane, a pixel grid and an
iteration budget.

Image coordinates put row 0 at the top (`ymax`) and grow downwards, while the
imaginary axis grows upwards:

```text
real = xmin + (px / W) * (xmax - xmin)
imag = ymax - (py / H) * (ymax - ymin)
```

The escape kernel samples device row `gy` (0 = bottom) at
`ymin + gy * step` and stores it in output row `H - 1 - gy`, so each sample lies
inside the pixel cell that [`View::complex_to_pixel`] maps it back to.

Views are mutated in place by zoom and pan, so a caller keeps one identity across
navigation. A view is not shared between concurrent renders.
*/

use std::fmt;

use crate::{
    error::{Error, Result},
    fixed::FixedPoint,
    screen::Size,
};

/// Ties a tile to its parent grid, so the tile's pixel coordinates are derived in
/// fixed point from the parent's origin rather than from rounded `f64` sums.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Anchor {
    xmin: f64,
    ymin: f64,
    step_re: f64,
    step_im: f64,
    /// Parent columns left of the tile.
    column: u32,
    /// Parent device rows below the tile.
    row: u32,
}

/// Fixed-point sampling grid of a view: device pixel `(gx, gy)` samples
/// `(origin_re + gx * step_re, origin_im + gy * step_im)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedGrid {
    pub origin_re: FixedPoint,
    pub origin_im: FixedPoint,
    pub step_re: FixedPoint,
    pub step_im: FixedPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct View {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    size: Size,
    max_iter: u32,
    anchor: Option<Anchor>,
}

impl View {
    /// The bounding box is taken as is: no aspect-ratio correction. Use
    /// [`View::from_bounds`] for an undistorted view of an arbitrary box.
    pub fn new(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        width: u32,
        height: u32,
        max_iter: u32,
    ) -> Result<Self> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(Error::invalid_region(format!(
                "pixel dimensions {width}x{height} are empty"
            )));
        }
        validate_bounds(xmin, xmax, ymin, ymax)?;

        Ok(View {
            xmin,
            xmax,
            ymin,
            ymax,
            size,
            max_iter,
            anchor: None,
        })
    }

    /// Keeps the center and the real extent, and derives the imaginary extent
    /// from `height / width` so that pixels are square.
    pub fn from_bounds(
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
        width: u32,
        height: u32,
        max_iter: u32,
    ) -> Result<Self> {
        if width == 0 {
            return Err(Error::invalid_region("pixel width is zero"));
        }
        let xwidth = xmax - xmin;
        let yheight = f64::from(height) / f64::from(width) * xwidth;
        let xcenter = xmin + xwidth / 2.0;
        let ycenter = ymin + (ymax - ymin) / 2.0;

        Self::new(
            xcenter - xwidth / 2.0,
            xcenter + xwidth / 2.0,
            ycenter - yheight / 2.0,
            ycenter + yheight / 2.0,
            width,
            height,
            max_iter,
        )
    }

    pub fn from_center(
        xcenter: f64,
        ycenter: f64,
        step_size: f64,
        width: u32,
        height: u32,
        max_iter: u32,
    ) -> Result<Self> {
        let xwidth = f64::from(width) * step_size;
        let yheight = f64::from(height) * step_size;

        Self::new(
            xcenter - xwidth / 2.0,
            xcenter + xwidth / 2.0,
            ycenter - yheight / 2.0,
            ycenter + yheight / 2.0,
            width,
            height,
            max_iter,
        )
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn max_iter(&self) -> u32 {
        self.max_iter
    }

    /// Does not trigger any recomputation.
    pub fn set_max_iter(&mut self, max_iter: u32) {
        self.max_iter = max_iter;
    }

    pub fn x_extent(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn y_extent(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Width of one pixel in the complex plane.
    pub fn step_size(&self) -> f64 {
        match self.anchor {
            Some(anchor) => anchor.step_re,
            None => self.x_extent() / f64::from(self.size.width),
        }
    }

    /// Height of one pixel in the complex plane. Equal to [`View::step_size`]
    /// unless the view was built with non-square pixels.
    pub fn step_size_imag(&self) -> f64 {
        match self.anchor {
            Some(anchor) => anchor.step_im,
            None => self.y_extent() / f64::from(self.size.height),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.xmin + self.x_extent() / 2.0,
            self.ymin + self.y_extent() / 2.0,
        )
    }

    /// Whether this view was cut from a parent by [`View::sub_view`] and still
    /// shares its grid.
    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Replaces the bounding box (pan to an arbitrary region).
    pub fn set_bounds(&mut self, xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<()> {
        validate_bounds(xmin, xmax, ymin, ymax)?;
        self.xmin = xmin;
        self.xmax = xmax;
        self.ymin = ymin;
        self.ymax = ymax;
        self.anchor = None;
        Ok(())
    }

    pub fn pixel_to_complex(&self, px: f64, py: f64) -> (f64, f64) {
        let real = self.xmin + (px / f64::from(self.size.width)) * self.x_extent();
        let imag = self.ymax - (py / f64::from(self.size.height)) * self.y_extent();
        (real, imag)
    }

    /// Inverse of [`View::pixel_to_complex`], floored to whole pixels. Results
    /// outside `[0, W) x [0, H)` are off screen, not errors.
    pub fn complex_to_pixel(&self, real: f64, imag: f64) -> (i64, i64) {
        let px = (real - self.xmin) / self.x_extent() * f64::from(self.size.width);
        let py = (self.ymax - imag) / self.y_extent() * f64::from(self.size.height);
        (px.floor() as i64, py.floor() as i64)
    }

    pub fn contains_pixel(&self, px: i64, py: i64) -> bool {
        (0..i64::from(self.size.width)).contains(&px)
            && (0..i64::from(self.size.height)).contains(&py)
    }

    /// Rescales both extents around the center. `factor < 1` zooms in.
    pub fn zoom(&mut self, factor: f64) -> Result<()> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::invalid_region(format!(
                "zoom factor {factor} is not a positive number"
            )));
        }
        if factor == 1.0 {
            return Ok(());
        }

        let (xcenter, ycenter) = self.center();
        let xwidth = self.x_extent() * factor;
        let yheight = self.y_extent() * factor;
        self.set_bounds(
            xcenter - xwidth / 2.0,
            xcenter + xwidth / 2.0,
            ycenter - yheight / 2.0,
            ycenter + yheight / 2.0,
        )
    }

    /**
    Recenters on a pixel-space rectangle and rescales by the larger of its width
    and height ratios, so the aspect ratio never changes.

    A zero-area rectangle is rejected with [`Error::InvalidRegion`]; callers that
    treat a click as "inspect this point" handle that case before zooming.
    */
    pub fn zoom_by_bbox(&mut self, x1: f64, x2: f64, y1: f64, y2: f64) -> Result<()> {
        if ![x1, x2, y1, y2].iter().all(|value| value.is_finite()) {
            return Err(Error::invalid_region("zoom rectangle is not finite"));
        }
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        if x2 == x1 || y2 == y1 {
            return Err(Error::invalid_region(format!(
                "zoom rectangle ({x1}, {y1})-({x2}, {y2}) has zero area"
            )));
        }

        let (xcenter, ycenter) = self.pixel_to_complex((x1 + x2) / 2.0, (y1 + y2) / 2.0);
        let factor = ((x2 - x1) / f64::from(self.size.width))
            .max((y2 - y1) / f64::from(self.size.height));
        let xwidth = self.x_extent() * factor;
        let yheight = self.y_extent() * factor;

        self.set_bounds(
            xcenter - xwidth / 2.0,
            xcenter + xwidth / 2.0,
            ycenter - yheight / 2.0,
            ycenter + yheight / 2.0,
        )
    }

    /// Moves the window by whole pixels. Positive `dy` moves towards the bottom
    /// of the image.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<()> {
        let xshift = dx * self.x_extent() / f64::from(self.size.width);
        let yshift = dy * self.y_extent() / f64::from(self.size.height);
        self.set_bounds(
            self.xmin + xshift,
            self.xmax + xshift,
            self.ymin - yshift,
            self.ymax - yshift,
        )
    }

    /// Changes the pixel grid, keeping the center and the step size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let size = Size::new(width, height);
        if size.is_empty() {
            return Err(Error::invalid_region(format!(
                "pixel dimensions {width}x{height} are empty"
            )));
        }

        let step = self.step_size();
        let (xcenter, ycenter) = self.center();
        let xwidth = f64::from(width) * step;
        let yheight = f64::from(height) * step;
        self.set_bounds(
            xcenter - xwidth / 2.0,
            xcenter + xwidth / 2.0,
            ycenter - yheight / 2.0,
            ycenter + yheight / 2.0,
        )?;
        self.size = size;
        Ok(())
    }

    /// A `width` x `height` window whose top-left pixel is `(x_offset, y_offset)`
    /// of this view, sampling exactly the same points as this view does.
    pub fn sub_view(&self, x_offset: u32, y_offset: u32, width: u32, height: u32) -> Result<View> {
        let fits = width > 0
            && height > 0
            && u64::from(x_offset) + u64::from(width) <= u64::from(self.size.width)
            && u64::from(y_offset) + u64::from(height) <= u64::from(self.size.height);
        if !fits {
            return Err(Error::invalid_region(format!(
                "tile {width}x{height}+{x_offset}+{y_offset} does not fit in {}x{}",
                self.size.width, self.size.height
            )));
        }

        Ok(self.cut(x_offset, y_offset, width, height))
    }

    /// [`View::sub_view`] for a rectangle already known to fit.
    pub(crate) fn cut(&self, x_offset: u32, y_offset: u32, width: u32, height: u32) -> View {
        debug_assert!(x_offset + width <= self.size.width);
        debug_assert!(y_offset + height <= self.size.height);

        let base = self.anchor();
        let anchor = Anchor {
            column: base.column + x_offset,
            row: base.row + (self.size.height - y_offset - height),
            ..base
        };

        let xmin = anchor.xmin + f64::from(anchor.column) * anchor.step_re;
        let ymin = anchor.ymin + f64::from(anchor.row) * anchor.step_im;

        View {
            xmin,
            xmax: xmin + f64::from(width) * anchor.step_re,
            ymin,
            ymax: ymin + f64::from(height) * anchor.step_im,
            size: Size::new(width, height),
            max_iter: self.max_iter,
            anchor: Some(anchor),
        }
    }

    /// The sampling grid in fixed point. Fails with
    /// [`Error::PrecisionExceeded`] when the step size falls below the
    /// fixed-point resolution or a coordinate leaves its range.
    pub fn fixed_grid(&self) -> Result<FixedGrid> {
        let anchor = self.anchor();
        let step_re = fixed_step(anchor.step_re)?;
        let step_im = fixed_step(anchor.step_im)?;

        let offset = |origin: f64, step: FixedPoint, pixels: u32| -> Result<FixedPoint> {
            FixedPoint::from_native(origin)?
                .checked_add(step.mul_u32(pixels).ok_or_else(overflow)?)
                .ok_or_else(overflow)
        };

        Ok(FixedGrid {
            origin_re: offset(anchor.xmin, step_re, anchor.column)?,
            origin_im: offset(anchor.ymin, step_im, anchor.row)?,
            step_re,
            step_im,
        })
    }

    fn anchor(&self) -> Anchor {
        self.anchor.unwrap_or(Anchor {
            xmin: self.xmin,
            ymin: self.ymin,
            step_re: self.step_size(),
            step_im: self.step_size_imag(),
            column: 0,
            row: 0,
        })
    }
}

fn fixed_step(step: f64) -> Result<FixedPoint> {
    let fixed = FixedPoint::from_native(step)?;
    if fixed.is_zero() {
        return Err(Error::precision_exceeded(format!(
            "step size {:e} is below the fixed-point resolution",
            step
        )));
    }
    Ok(fixed)
}

fn overflow() -> Error {
    Error::precision_exceeded("view origin overflows the fixed-point range")
}

fn validate_bounds(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<()> {
    if ![xmin, xmax, ymin, ymax].iter().all(|value| value.is_finite()) {
        return Err(Error::invalid_region("bounds are not finite"));
    }
    if xmax <= xmin || ymax <= ymin {
        return Err(Error::invalid_region(format!(
            "bounds x: [{xmin}, {xmax}] y: [{ymin}, {ymax}] have no area"
        )));
    }
    Ok(())
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "View(xmin={}, xmax={}, ymin={}, ymax={}, width={}, height={}, maxiter={})",
            self.xmin, self.xmax, self.ymin, self.ymax, self.size.width, self.size.height, self.max_iter
        )
    }
}
