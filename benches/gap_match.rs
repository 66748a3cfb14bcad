use captcha::{GapLocator, NccTemplateMatcher};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use image::{GenericImageView, Rgb, RgbImage};
use std::hint::black_box;

fn textured(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503) ^ (x * y);
        Rgb([(v % 251) as u8, ((v >> 8) % 241) as u8, ((v >> 16) % 239) as u8])
    })
}

/// Typical slider sizes: a 260-340 px background with a 40-60 px piece.
fn bench_ncc_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("ncc_match");

    for (bg_w, bg_h, piece) in [(260, 160, 40), (340, 200, 60), (600, 300, 60)] {
        let background = textured(bg_w, bg_h);
        let target = background.view(bg_w / 2, bg_h / 4, piece, piece).to_image();
        group.throughput(Throughput::Elements(u64::from(
            (bg_w - piece + 1) * (bg_h - piece + 1),
        )));

        for (label, matcher) in [
            ("parallel", NccTemplateMatcher::default()),
            ("sequential", NccTemplateMatcher::sequential()),
        ] {
            group.bench_function(format!("{label}/{bg_w}x{bg_h}/{piece}"), |b| {
                b.iter(|| {
                    matcher
                        .locate(black_box(&background), black_box(&target))
                        .expect("piece fits")
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_ncc_match);
criterion_main!(benches);
