//! Engine configuration, loadable from JSON.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    colour::PaletteScheme,
    engine::PrecisionMode,
    error::{Error, Result},
    kernel::MAX_HORIZON,
};

/// Where the escape kernel runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// The compute shader. Failing to open a device is an error.
    #[default]
    Gpu,
    /// The rayon thread pool.
    Host,
    /// The compute shader when a device opens, otherwise the thread pool.
    GpuOrHost,
}

/**
Settings shared by every render of an [`EscapeEngine`](crate::EscapeEngine).

Missing JSON fields take their default:

```json
{
    "horizon": 2.0,
    "precision": "auto",
    "palette": { "scheme": "log" },
    "backend": "gpu",
    "tile_size": 256,
    "iter_step": 100
}
```
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Escape radius.
    pub horizon: f64,
    pub precision: PrecisionMode,
    pub palette: PaletteScheme,
    pub backend: Backend,
    /// Edge length of a progressive-rendering tile, in pixels.
    pub tile_size: u32,
    /// Iteration budget added by each progressive pass.
    pub iter_step: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            horizon: 2.0,
            precision: PrecisionMode::Auto,
            palette: PaletteScheme::Log,
            backend: Backend::Gpu,
            tile_size: 256,
            iter_step: 100,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|error| Error::Config(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|error| Error::Config(error.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(Error::Config(format!(
                "horizon {} is not a positive number",
                self.horizon
            )));
        }
        if self.horizon > MAX_HORIZON {
            return Err(Error::Config(format!(
                "horizon {} is above the limit of {}",
                self.horizon, MAX_HORIZON
            )));
        }
        if self.tile_size == 0 {
            return Err(Error::Config("tile_size must be positive".into()));
        }
        if self.iter_step == 0 {
            return Err(Error::Config("iter_step must be positive".into()));
        }
        if let PaletteScheme::CosineWheel { revolutions: 0 } = self.palette {
            return Err(Error::Config("a cosine wheel needs at least one revolution".into()));
        }
        Ok(())
    }
}
