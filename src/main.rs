use std::{env, fs, process};

use log::{error, info, warn};
use mandelzoom::{
    Backend, Bookmark, EngineConfig, EscapeEngine, PixelCounts, Progressive, Result, View,
};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// Usage: `mandelzoom [BOOKMARK_JSON] [CONFIG_JSON]`
fn main() {
    env_logger::init();

    if let Err(error) = run() {
        error!("{}", error);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);

    let view = match args.next() {
        Some(path) => Bookmark::from_json(&fs::read_to_string(path)?)?.to_view(WIDTH, HEIGHT)?,
        None => View::from_bounds(-2.0, 1.0, -1.5, 1.5, WIDTH, HEIGHT, 500)?,
    };
    let config = match args.next() {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig {
            backend: Backend::GpuOrHost,
            ..EngineConfig::default()
        },
    };

    let mut engine = EscapeEngine::from_config(config.clone())?;
    info!("rendering {} on the {} dispatcher", view, engine.dispatcher_name());

    let mut progressive = Progressive::with_config(view, &config)?;
    let mut counts = PixelCounts::default();
    while let Some(report) = progressive.step(&mut engine)? {
        for notice in &report.outcome.notices {
            warn!("{:?}", notice);
        }
        counts += report.outcome.counts;

        if report.pass_complete {
            info!(
                "pass {}/{}: maxiter {} ({:?}), {} escaped, {} bounded",
                report.pass + 1,
                progressive.tiler().pass_count(),
                report.outcome.max_iter,
                report.outcome.precision,
                counts.escaped,
                counts.bounded
            );
            counts = PixelCounts::default();
        }
    }

    info!(
        "bookmark: {}",
        Bookmark::from_view(progressive.view()).to_json()?
    );
    Ok(())
}
