use divan::bench;
use rand::prelude::*;
use visage_core::image::ImageView;
use visage_core::test_utils::{noisy_image, random_cascade_blob};
use visage_core::{Cascade, Detector, DetectorConfig};

fn main() {
    divan::main();
}

fn bench_cascade(depth: u32, ntrees: usize) -> Cascade {
    let mut rng = StdRng::seed_from_u64(42);
    Cascade::from_bytes(&random_cascade_blob(depth, ntrees, &mut rng)).unwrap()
}

#[bench]
fn bench_full_detect_vga(bencher: divan::Bencher) {
    let cascade = bench_cascade(6, 128);
    let data = noisy_image(640, 480, 128, 20.0, 7);
    let img = ImageView::new(&data, 640, 480, 640).unwrap();

    let config = DetectorConfig::builder()
        .min_size(60)
        .max_size(400)
        .build();
    let mut detector = Detector::with_config(cascade, config).unwrap();

    bencher.bench_local(move || detector.detect(&img));
}

#[bench]
fn bench_classify_region(bencher: divan::Bencher) {
    let cascade = bench_cascade(6, 128);
    let data = noisy_image(640, 480, 128, 20.0, 7);
    let img = ImageView::new(&data, 640, 480, 640).unwrap();

    bencher.bench_local(move || cascade.classify(240, 320, 200, &img));
}
