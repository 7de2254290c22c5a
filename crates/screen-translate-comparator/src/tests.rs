use std::time::Instant;

use screen_translate_types::Frame;

use crate::{
    ChangeGate, ComparatorFactory, ComparatorKind, ComparatorSettings, FrameComparator,
    SampledExactComparator, SampledLumaComparator,
};

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Frame {
    Frame::from_rgba(
        width,
        height,
        Instant::now(),
        rgba.repeat(width as usize * height as usize),
    )
    .unwrap()
}

/// Copy of `frame` with the listed pixels replaced by `rgba`.
fn with_pixels(frame: &Frame, pixels: &[(u32, u32)], rgba: [u8; 4]) -> Frame {
    let mut data = frame.data().to_vec();
    for &(x, y) in pixels {
        let offset = (y * frame.width() + x) as usize * 4;
        data[offset..offset + 4].copy_from_slice(&rgba);
    }
    Frame::from_rgba(frame.width(), frame.height(), Instant::now(), data).unwrap()
}

fn gradient(width: u32, height: u32) -> Frame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[(x * 3) as u8, (y * 5) as u8, (x ^ y) as u8, 255]);
        }
    }
    Frame::from_rgba(width, height, Instant::now(), data).unwrap()
}

#[test]
fn identical_frames_are_similar_for_any_threshold() {
    let frame = gradient(37, 23);
    let copy = Frame::from_rgba(37, 23, Instant::now(), frame.data().to_vec()).unwrap();
    for stride in [1, 3, 8, 64] {
        let comparator = SampledExactComparator::new(stride);
        for threshold in [0.0, 0.5, 0.9, 0.999, 1.0] {
            assert!(comparator.is_similar(&frame, &copy, threshold));
        }
    }
}

#[test]
fn differing_dimensions_are_never_similar() {
    let a = solid(16, 16, [9, 9, 9, 255]);
    let b = solid(16, 17, [9, 9, 9, 255]);
    let exact = SampledExactComparator::new(1);
    let luma = SampledLumaComparator::new(1, 255);
    assert!(exact.compare(&a, &b).is_none());
    assert!(!exact.is_similar(&a, &b, 0.0));
    assert!(!luma.is_similar(&b, &a, 0.0));
}

#[test]
fn small_sampled_difference_passes_default_threshold() {
    let base = solid(80, 80, [200, 200, 200, 255]);
    // 10x10 grid at stride 8; four sampled points differ.
    let changed = with_pixels(&base, &[(0, 0), (8, 0), (16, 0), (24, 0)], [0, 0, 0, 255]);
    let comparator = SampledExactComparator::new(8);
    let report = comparator.compare(&base, &changed).unwrap();
    assert_eq!(report.sampled, 100);
    assert_eq!(report.matched, 96);
    assert!(comparator.is_similar(&base, &changed, 0.9));
}

#[test]
fn large_sampled_difference_fails_threshold() {
    let base = solid(80, 80, [200, 200, 200, 255]);
    let pixels: Vec<(u32, u32)> = (0..20).map(|i| ((i % 10) * 8, (i / 10) * 8)).collect();
    let changed = with_pixels(&base, &pixels, [0, 0, 0, 255]);
    let comparator = SampledExactComparator::new(8);
    assert!(!comparator.is_similar(&base, &changed, 0.9));
}

#[test]
fn unsampled_pixels_do_not_count() {
    let base = solid(32, 32, [1, 2, 3, 255]);
    let changed = with_pixels(&base, &[(1, 1), (3, 5), (7, 7)], [250, 250, 250, 255]);
    let comparator = SampledExactComparator::new(8);
    assert!(comparator.is_similar(&base, &changed, 1.0));
}

#[test]
fn luma_comparator_tolerates_jitter() {
    let base = solid(16, 16, [120, 120, 120, 255]);
    let jitter = solid(16, 16, [123, 121, 119, 255]);
    let exact = SampledExactComparator::new(2);
    let luma = SampledLumaComparator::new(2, 4);
    assert!(!exact.is_similar(&base, &jitter, 0.9));
    assert!(luma.is_similar(&base, &jitter, 0.9));
}

#[test]
fn factory_builds_requested_kind() {
    let exact = ComparatorFactory::new(ComparatorSettings::default()).build();
    assert_eq!(exact.name(), "sampled-exact");
    let luma = ComparatorFactory::new(ComparatorSettings {
        kind: ComparatorKind::SampledLuma,
        ..ComparatorSettings::default()
    })
    .build();
    assert_eq!(luma.name(), "sampled-luma");
    assert_eq!(
        "Sampled-Luma".parse::<ComparatorKind>().unwrap(),
        ComparatorKind::SampledLuma
    );
    assert!("bitset".parse::<ComparatorKind>().is_err());
}

#[test]
fn gate_tracks_baseline() {
    let comparator = ComparatorFactory::new(ComparatorSettings::default()).build();
    let mut gate = ChangeGate::new(comparator, 0.9);
    let first = gradient(40, 40);
    assert!(!gate.is_unchanged(&first));

    gate.accept(first.clone());
    let same = Frame::from_rgba(40, 40, Instant::now(), first.data().to_vec()).unwrap();
    assert!(gate.is_unchanged(&same));
    assert!(!gate.is_unchanged(&solid(40, 40, [0, 0, 0, 255])));
    assert!(!gate.is_unchanged(&gradient(41, 40)));

    gate.reset();
    assert!(gate.baseline().is_none());
    assert!(!gate.is_unchanged(&same));
}

#[test]
fn gate_clamps_threshold() {
    let comparator = ComparatorFactory::new(ComparatorSettings::default()).build();
    assert_eq!(ChangeGate::new(comparator.clone(), 1.7).threshold(), 1.0);
    assert_eq!(ChangeGate::new(comparator, -0.2).threshold(), 0.0);
}
