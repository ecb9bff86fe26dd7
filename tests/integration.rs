use std::fs;
use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use poisson_blend::{
    find_case_files, BlendPolicy, Coordinate, Error, Mask, PoissonEditor, ProcessOptions,
    SolverOptions, RESULT_FILE_NAME,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 3x3 single-channel case with the mask on the centre pixel only.
fn cross_case() -> (GrayImage, GrayImage, Mask) {
    let source = GrayImage::from_pixel(3, 3, Luma([100]));
    let mut target = GrayImage::new(3, 3);
    // image coordinates are (x, y) = (col, row)
    target.put_pixel(1, 0, Luma([10]));
    target.put_pixel(1, 2, Luma([20]));
    target.put_pixel(0, 1, Luma([30]));
    target.put_pixel(2, 1, Luma([40]));
    let mask = Mask::from_fn(3, 3, |c| c == Coordinate::new(1, 1));
    (source, target, mask)
}

fn textured(width: u32, height: u32, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = |k: u32| u8::try_from((x * 37 + y * 91 + seed * k) % 256).unwrap();
        Rgb([v(13), v(29), v(53)])
    })
}

fn disc_mask(height: usize, width: usize) -> Mask {
    let (cy, cx) = (height / 2, width / 2);
    let r2 = (height.min(width) / 3).pow(2);
    Mask::from_fn(height, width, |c| {
        c.row.abs_diff(cy).pow(2) + c.col.abs_diff(cx).pow(2) <= r2
    })
}

#[test]
fn importing_gradients_solves_worked_example() {
    let (source, target, mask) = cross_case();
    let out = PoissonEditor::new()
        .edit(&source, &target, &mask, BlendPolicy::ImportingGradients)
        .unwrap();

    assert_eq!(out.get_pixel(1, 1)[0], 25);
    for (x, y, px) in out.enumerate_pixels() {
        if (x, y) != (1, 1) {
            assert_eq!(px, target.get_pixel(x, y));
        }
    }
}

#[test]
fn mixing_prefers_steep_source_edge_over_flat_target() {
    let mut source = GrayImage::new(3, 3);
    source.put_pixel(1, 1, Luma([200]));
    let target = GrayImage::from_pixel(3, 3, Luma([50]));
    let mask = Mask::from_fn(3, 3, |c| c == Coordinate::new(1, 1));
    let editor = PoissonEditor::new();

    let importing = editor
        .edit(&source, &target, &mask, BlendPolicy::ImportingGradients)
        .unwrap();
    let mixing = editor
        .edit(&source, &target, &mask, BlendPolicy::MixingGradients)
        .unwrap();

    // 4x = 4 * 200 + 4 * 50
    assert_eq!(importing.get_pixel(1, 1)[0], 250);
    assert_eq!(mixing, importing);
}

#[test]
fn identical_source_and_target_are_reproduced() {
    init_logging();
    let img = textured(24, 18, 3);
    let mask = disc_mask(18, 24);
    assert!(mask.interior_count() > 0);

    let out = PoissonEditor::new()
        .edit(&img, &img, &mask, BlendPolicy::ImportingGradients)
        .unwrap();
    assert_eq!(out, img);
}

#[test]
fn pixels_outside_the_mask_keep_target_values() {
    let source = textured(20, 16, 7);
    let target = textured(20, 16, 11);
    let mask = disc_mask(16, 20);
    let editor = PoissonEditor::new();

    for policy in [BlendPolicy::ImportingGradients, BlendPolicy::MixingGradients] {
        let out = editor.edit(&source, &target, &mask, policy).unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            if !mask.get(Coordinate::new(y as usize, x as usize)) {
                assert_eq!(px, target.get_pixel(x, y), "({x}, {y}) under {policy}");
            }
        }
    }
}

#[test]
fn repeated_edits_are_bit_identical() {
    let source = textured(16, 16, 5);
    let target = textured(16, 16, 9);
    let mask = disc_mask(16, 16);
    let editor = PoissonEditor::new();

    let first = editor
        .edit(&source, &target, &mask, BlendPolicy::MixingGradients)
        .unwrap();
    let second = editor
        .edit(&source, &target, &mask, BlendPolicy::MixingGradients)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn mask_touching_the_corner_still_solves() {
    let source = GrayImage::from_pixel(4, 4, Luma([90]));
    let target = GrayImage::from_pixel(4, 4, Luma([60]));
    let mask = Mask::from_fn(4, 4, |c| c.row < 2 && c.col < 2);

    let out = PoissonEditor::new()
        .edit(&source, &target, &mask, BlendPolicy::ImportingGradients)
        .unwrap();
    // Flat source: the region relaxes to the flat boundary value.
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(out.get_pixel(x, y)[0], 60);
        }
    }
}

#[test]
fn full_mask_yields_zero_mean_solution() {
    // No boundary pixels: the solve is only fixed up to a constant, and the
    // zero-mean solution is clamped into range.
    let mut img = GrayImage::new(2, 2);
    img.put_pixel(0, 0, Luma([10]));
    img.put_pixel(1, 0, Luma([20]));
    img.put_pixel(0, 1, Luma([30]));
    img.put_pixel(1, 1, Luma([40]));
    let mask = Mask::from_fn(2, 2, |_| true);

    let out = PoissonEditor::new()
        .edit(&img, &img, &mask, BlendPolicy::ImportingGradients)
        .unwrap();
    let values: Vec<u8> = out.pixels().map(|px| px[0]).collect();
    assert_eq!(values, vec![0, 0, 5, 15]);

    let flat = GrayImage::from_pixel(3, 3, Luma([120]));
    let out = PoissonEditor::new()
        .edit(&flat, &flat, &Mask::from_fn(3, 3, |_| true), BlendPolicy::MixingGradients)
        .unwrap();
    assert!(out.pixels().all(|px| px[0] == 0));
}

#[test]
fn shape_mismatch_is_reported() {
    let source = textured(8, 8, 1);
    let target = textured(8, 8, 2);
    let mask = Mask::from_fn(7, 8, |_| true);
    let err = PoissonEditor::new()
        .edit(&source, &target, &mask, BlendPolicy::ImportingGradients)
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn exhausted_iteration_budget_is_an_error() {
    let source = textured(30, 30, 4);
    let target = textured(30, 30, 8);
    let mask = disc_mask(30, 30);
    let editor = PoissonEditor::with_solver(SolverOptions {
        tolerance: 1e-12,
        max_iterations: Some(1),
    });
    let err = editor
        .edit(&source, &target, &mask, BlendPolicy::ImportingGradients)
        .unwrap_err();
    assert!(matches!(err, Error::SolverDivergence { .. }));
}

fn write_case(dir: &Path, prefix: &str) {
    fs::create_dir_all(dir).unwrap();
    textured(12, 10, 2)
        .save(dir.join(format!("{prefix}source.png")))
        .unwrap();
    textured(12, 10, 6)
        .save(dir.join(format!("{prefix}target.png")))
        .unwrap();
    GrayImage::from_fn(12, 10, |x, y| {
        Luma([if (3..9).contains(&x) && (2..8).contains(&y) { 255 } else { 0 }])
    })
    .save(dir.join(format!("{prefix}mask.png")))
    .unwrap();
}

#[test]
fn find_case_files_matches_name_suffixes() {
    let tmp = tempfile::tempdir().unwrap();
    write_case(tmp.path(), "beach_");
    fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

    let files = find_case_files(tmp.path()).unwrap();
    assert_eq!(files.sources.len(), 1);
    assert_eq!(files.targets.len(), 1);
    assert_eq!(files.masks.len(), 1);
    assert!(files.single().is_some());
}

#[test]
fn process_directory_mirrors_cases_and_skips_malformed_ones() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("SRC");
    let output = tmp.path().join("RES");

    write_case(&input.join("ImportingGradients"), "");
    write_case(&input.join("nested").join("MixingGradients"), "a_");
    let broken = input.join("broken");
    write_case(&broken, "");
    fs::remove_file(broken.join("mask.png")).unwrap();

    let editor = PoissonEditor::new();
    let results = editor.process_directory(&input, &output, &ProcessOptions::default());
    assert_eq!(results.len(), 3);

    let ok: Vec<_> = results.iter().filter(|r| r.success).collect();
    assert_eq!(ok.len(), 2);
    assert!(ok.iter().all(|r| r.unknowns == 36));

    let failed = results.iter().find(|r| !r.success).unwrap();
    assert!(failed.path.ends_with("broken"));
    assert!(failed.message.contains("one source, one target and one mask"));

    let importing = output.join("ImportingGradients").join(RESULT_FILE_NAME);
    let mixing = output
        .join("nested")
        .join("MixingGradients")
        .join(RESULT_FILE_NAME);
    assert!(importing.is_file());
    assert!(mixing.is_file());
    assert!(!output.join("broken").join(RESULT_FILE_NAME).exists());

    let written = image::open(&importing).unwrap().to_rgb8();
    assert_eq!(written.dimensions(), (12, 10));

    let policies: Vec<_> = results.iter().filter_map(|r| r.policy).collect();
    assert!(policies.contains(&BlendPolicy::ImportingGradients));
    assert!(policies.contains(&BlendPolicy::MixingGradients));
}

#[test]
fn edit_files_writes_result() {
    let tmp = tempfile::tempdir().unwrap();
    write_case(tmp.path(), "");
    let out = tmp.path().join("out").join("blend.png");

    let n = PoissonEditor::new()
        .edit_files(
            &tmp.path().join("source.png"),
            &tmp.path().join("target.png"),
            &tmp.path().join("mask.png"),
            &out,
            BlendPolicy::MixingGradients,
        )
        .unwrap();
    assert_eq!(n, 36);
    assert!(out.is_file());
}
