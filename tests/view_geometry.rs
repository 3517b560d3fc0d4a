use mandelzoom::{Error, Tiler, View};

fn seed_view() -> View {
    View::from_bounds(-2.0, 1.0, -1.5, 1.5, 640, 480, 200).unwrap()
}

// ============================================================================
// Pixel mapping
// ============================================================================

#[test]
fn pixel_round_trip_is_exact_on_whole_pixels() {
    let view = seed_view();
    for &(px, py) in &[(0, 0), (1, 0), (320, 240), (639, 479), (17, 400)] {
        let (real, imag) = view.pixel_to_complex(f64::from(px) + 0.5, f64::from(py) + 0.5);
        assert_eq!(view.complex_to_pixel(real, imag), (i64::from(px), i64::from(py)));
    }
}

#[test]
fn row_zero_is_the_top_of_the_image() {
    let view = seed_view();
    let (_, top) = view.pixel_to_complex(0.0, 0.0);
    let (_, bottom) = view.pixel_to_complex(0.0, 480.0);
    assert_eq!(top, view.ymax());
    assert_eq!(bottom, view.ymin());
}

#[test]
fn points_off_screen_are_not_contained() {
    let view = seed_view();
    let (px, py) = view.complex_to_pixel(5.0, 0.0);
    assert!(!view.contains_pixel(px, py));
    let (px, py) = view.complex_to_pixel(-0.5, 0.0);
    assert!(view.contains_pixel(px, py));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn unit_zoom_leaves_the_view_untouched() {
    let mut view = seed_view();
    let before = view.clone();
    view.zoom(1.0).unwrap();
    assert_eq!(view, before);
}

#[test]
fn zoom_keeps_the_center() {
    let mut view = seed_view();
    let center = view.center();
    view.zoom(0.25).unwrap();
    assert_eq!(view.center(), center);
    assert_eq!(view.x_extent(), 0.75);
}

#[test]
fn zero_area_rectangle_is_an_invalid_region() {
    let mut view = seed_view();
    let before = view.clone();
    assert!(matches!(
        view.zoom_by_bbox(100.0, 100.0, 50.0, 80.0),
        Err(Error::InvalidRegion(_))
    ));
    assert_eq!(view, before);
}

#[test]
fn bbox_corners_in_any_order_give_the_same_view() {
    let mut forward = seed_view();
    let mut backward = seed_view();
    forward.zoom_by_bbox(100.0, 300.0, 40.0, 200.0).unwrap();
    backward.zoom_by_bbox(300.0, 100.0, 200.0, 40.0).unwrap();
    assert_eq!(forward, backward);
}

#[test]
fn empty_frames_are_rejected() {
    assert!(matches!(
        View::new(-2.0, 1.0, -1.5, 1.5, 0, 480, 100),
        Err(Error::InvalidRegion(_))
    ));
    assert!(matches!(
        View::new(1.0, -2.0, -1.5, 1.5, 640, 480, 100),
        Err(Error::InvalidRegion(_))
    ));
}

// ============================================================================
// Tiling
// ============================================================================

fn assert_partition(tile_size: u32) {
    let view = View::from_bounds(-2.0, 1.0, -1.5, 1.5, 50, 30, 100).unwrap();
    let tiler = Tiler::new(view, tile_size, 100).unwrap();
    assert_eq!(tiler.pass_count(), 1);

    let mut covered = vec![0u32; 50 * 30];
    for tile in tiler {
        for y in tile.y_offset..tile.y_offset + tile.view.height() {
            for x in tile.x_offset..tile.x_offset + tile.view.width() {
                covered[(y * 50 + x) as usize] += 1;
            }
        }
    }
    assert!(covered.iter().all(|&count| count == 1));
}

#[test]
fn tiles_partition_the_frame_when_the_size_divides() {
    assert_partition(10);
}

#[test]
fn tiles_partition_the_frame_when_the_size_does_not_divide() {
    assert_partition(16);
    assert_partition(7);
}

#[test]
fn passes_raise_the_budget_up_to_the_view_budget() {
    let view = View::from_bounds(-2.0, 1.0, -1.5, 1.5, 50, 30, 250).unwrap();
    let tiler = Tiler::new(view, 16, 100).unwrap();
    assert_eq!(tiler.pass_count(), 3);
    assert_eq!(tiler.pass_max_iter(0), 100);
    assert_eq!(tiler.pass_max_iter(1), 200);
    assert_eq!(tiler.pass_max_iter(2), 250);
    assert_eq!(tiler.len(), 3 * 4 * 2);
}
