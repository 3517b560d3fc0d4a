use mandelzoom::{
    EscapeEngine, Palette, PaletteCache, PaletteScheme, PixelStatus, Precision, PrecisionMode,
    Progressive, ResumableState, Rgb, View,
};

fn host_engine(precision: PrecisionMode) -> EscapeEngine {
    let mut engine = EscapeEngine::host();
    engine.set_precision(precision);
    engine
}

// ============================================================================
// Palette
// ============================================================================

#[test]
fn last_palette_entry_and_beyond_are_black() {
    let palette = Palette::build(10);
    assert_eq!(palette.len(), 10);
    assert_eq!(palette.get(9), Rgb::BLACK);
    assert_eq!(palette.get(10), Rgb::BLACK);
    assert_eq!(palette.get(1000), Rgb::BLACK);
    assert_ne!(palette.get(5), Rgb::BLACK);

    let wheel = Palette::with_scheme(10, PaletteScheme::cosine_wheel());
    assert_eq!(wheel.get(9), Rgb::BLACK);
}

#[test]
fn empty_palette_colours_everything_black() {
    let palette = Palette::build(0);
    assert!(palette.is_empty());
    assert_eq!(palette.get(0), Rgb::BLACK);
    assert_eq!(palette.colour(PixelStatus::Escaped(0)), Rgb::BLACK);
}

// ============================================================================
// Escape statuses
// ============================================================================

// Unit steps from -2 to 2 on both axes: (2, 2) samples c = 0, (4, 0) samples
// c = 2 + 2i and (0, 2) samples c = -2.
fn unit_grid() -> View {
    View::new(-2.0, 3.0, -2.0, 3.0, 5, 5, 50).unwrap()
}

fn assert_seed_statuses(precision: PrecisionMode) {
    let mut engine = host_engine(precision);
    let mut state = ResumableState::new();
    let frame = engine.compute(&unit_grid(), Some(&mut state)).unwrap();

    assert_eq!(state.status(2, 2, 50), Some(PixelStatus::Bounded));
    assert_eq!(state.status(4, 0, 50), Some(PixelStatus::Escaped(0)));
    assert_eq!(state.status(0, 2, 50), Some(PixelStatus::Bounded));
    assert_eq!(frame.colours.pixel(2, 2), Some(Rgb::BLACK));
    assert_eq!(frame.outcome.counts.active, 0);
}

#[test]
fn seed_points_native() {
    assert_seed_statuses(PrecisionMode::Native);
}

#[test]
fn seed_points_fixed() {
    assert_seed_statuses(PrecisionMode::Fixed);
}

#[test]
fn frame_is_row_major_rgb() {
    let mut engine = host_engine(PrecisionMode::Auto);
    let frame = engine.compute(&unit_grid(), None).unwrap();
    assert_eq!(frame.as_bytes().len(), 5 * 5 * 3);
    assert_eq!(frame.outcome.precision, Precision::Native);
}

// ============================================================================
// Resuming
// ============================================================================

fn detail_view(max_iter: u32) -> View {
    View::from_bounds(-0.76, -0.73, 0.09, 0.12, 32, 24, max_iter).unwrap()
}

#[test]
fn resumed_fixed_frame_matches_a_direct_one() {
    let mut engine = host_engine(PrecisionMode::Fixed);
    let mut state = ResumableState::new();

    let first = engine.compute(&detail_view(100), Some(&mut state)).unwrap();
    assert!(!first.outcome.resumed);
    let resumed = engine.compute(&detail_view(200), Some(&mut state)).unwrap();
    assert!(resumed.outcome.resumed);

    let direct = engine.compute(&detail_view(200), None).unwrap();
    assert_eq!(resumed.as_bytes(), direct.as_bytes());
    assert_eq!(resumed.outcome.counts, direct.outcome.counts);
}

#[test]
fn changing_the_view_discards_progress() {
    let mut engine = host_engine(PrecisionMode::Native);
    let mut state = ResumableState::new();
    engine.compute(&detail_view(100), Some(&mut state)).unwrap();

    let mut moved = detail_view(200);
    moved.pan(3.0, 0.0).unwrap();
    let frame = engine.compute(&moved, Some(&mut state)).unwrap();
    assert!(!frame.outcome.resumed);
}

#[test]
fn progressive_frame_matches_a_direct_fixed_frame() {
    let view = View::from_bounds(-0.8, -0.7, 0.05, 0.15, 40, 24, 120).unwrap();
    let mut engine = host_engine(PrecisionMode::Fixed);

    let mut progressive = Progressive::new(view.clone(), 16, 50).unwrap();
    let tiles = progressive.run_to_completion(&mut engine).unwrap();
    assert_eq!(tiles, 3 * 3 * 2);
    assert!(progressive.is_complete());
    assert_eq!(progressive.completed_pass(), Some(2));

    let direct = engine.compute(&view, None).unwrap();
    assert_eq!(progressive.frame().as_bytes(), direct.as_bytes());
}

#[test]
fn seed_view_origin_is_inside_and_far_point_escapes_immediately() {
    let view = View::new(-2.0, 1.0, -1.5, 1.5, 100, 100, 100).unwrap();
    let mut engine = host_engine(PrecisionMode::Auto);
    let mut state = ResumableState::new();
    engine.compute(&view, Some(&mut state)).unwrap();

    let (px, py) = view.complex_to_pixel(0.0, 0.0);
    assert!(view.contains_pixel(px, py));
    assert_eq!(
        state.status(px as u32, py as u32, 100),
        Some(PixelStatus::Bounded)
    );

    assert_eq!(
        mandelzoom::escape_time(mandelzoom::Complex::new(0.0, 0.0), 100, 2.0),
        PixelStatus::Bounded
    );
    assert_eq!(
        mandelzoom::escape_time(mandelzoom::Complex::new(2.0, 2.0), 100, 2.0),
        PixelStatus::Escaped(0)
    );
}

#[test]
fn resumed_seed_view_matches_a_direct_one_in_auto_mode() {
    let seed = |max_iter| View::new(-2.0, 1.0, -1.5, 1.5, 100, 100, max_iter).unwrap();
    let mut engine = EscapeEngine::host();
    let mut state = ResumableState::new();

    engine.compute(&seed(100), Some(&mut state)).unwrap();
    let resumed = engine.compute(&seed(200), Some(&mut state)).unwrap();
    assert!(resumed.outcome.resumed);
    assert_eq!(resumed.outcome.precision, Precision::Native);

    let direct = engine.compute(&seed(200), None).unwrap();
    assert_eq!(resumed.as_bytes(), direct.as_bytes());
    assert_eq!(resumed.outcome.counts, direct.outcome.counts);
}

#[test]
fn resumed_native_state_matches_a_direct_one_on_a_chaotic_view() {
    let mut engine = host_engine(PrecisionMode::Native);
    let mut resumed = ResumableState::new();
    let mut direct = ResumableState::new();

    engine.compute(&detail_view(100), Some(&mut resumed)).unwrap();
    engine.compute(&detail_view(200), Some(&mut resumed)).unwrap();
    engine.compute(&detail_view(200), Some(&mut direct)).unwrap();
    assert_eq!(resumed.pixels(), direct.pixels());
}

#[test]
fn progressive_run_keeps_few_palettes() {
    let view = View::from_bounds(-2.0, 1.0, -1.5, 1.5, 4, 4, 2000).unwrap();
    let mut engine = EscapeEngine::host();
    let mut progressive = Progressive::new(view, 4, 10).unwrap();

    assert_eq!(progressive.run_to_completion(&mut engine).unwrap(), 200);
    assert!(engine.palette_cache().len() <= PaletteCache::CAPACITY);
    assert!(engine.palette_cache().contains(2000, PaletteScheme::Log));
}
