//! Saved positions: center, step size and budget, independent of the frame size.

use serde::{Deserialize, Serialize};

use crate::{error::Result, view::View};

/**
A view reduced to what survives a change of window size.

Pixels are square, so one `step_size` serves both axes:

```json
{ "xcenter": -0.75, "ycenter": 0.1, "step_size": 1e-05, "maxiter": 1000 }
```
*/
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub xcenter: f64,
    pub ycenter: f64,
    pub step_size: f64,
    pub maxiter: u32,
}

impl Bookmark {
    pub fn from_view(view: &View) -> Self {
        let (xcenter, ycenter) = view.center();
        Bookmark {
            xcenter,
            ycenter,
            step_size: view.step_size(),
            maxiter: view.max_iter(),
        }
    }

    /// The view at this position for a `width` x `height` frame.
    pub fn to_view(&self, width: u32, height: u32) -> Result<View> {
        View::from_center(
            self.xcenter,
            self.ycenter,
            self.step_size,
            width,
            height,
            self.maxiter,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
