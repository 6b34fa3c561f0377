use criterion::{black_box, criterion_group, criterion_main, Criterion};
use giztoy_opus::{Application, Decoder, DecoderConfig, Encoder, EncoderConfig};

fn sine(frame_size: usize) -> Vec<i16> {
    (0..frame_size)
        .map(|i| ((i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 48000.0).sin() * 10000.0) as i16)
        .collect()
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("opus_create");
    group.bench_function("encoder", |b| {
        b.iter(|| {
            let mut enc = Encoder::new(black_box(EncoderConfig::default())).unwrap();
            enc.close();
        });
    });
    group.bench_function("decoder", |b| {
        b.iter(|| {
            let mut dec = Decoder::new(black_box(DecoderConfig::default())).unwrap();
            dec.close();
        });
    });
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let pcm = sine(960);
    let mut group = c.benchmark_group("opus_encode_20ms");
    for app in [Application::VoIP, Application::Audio, Application::RestrictedLowdelay] {
        let mut enc = Encoder::new(EncoderConfig::default().with_application(app)).unwrap();
        group.bench_function(format!("{:?}", app), |b| {
            b.iter(|| {
                let _ = black_box(enc.encode(black_box(&pcm)).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
    let packet = enc.encode(&sine(960)).unwrap();
    let mut dec = Decoder::new(DecoderConfig::default()).unwrap();

    c.bench_function("opus_decode_20ms", |b| {
        b.iter(|| {
            let _ = black_box(dec.decode(black_box(&packet)).unwrap());
        });
    });
}

criterion_group!(benches, bench_create, bench_encode, bench_decode);
criterion_main!(benches);
