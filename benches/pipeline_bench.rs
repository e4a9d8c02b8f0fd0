use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use snipshot::highlight::Highlighter;
use snipshot::rendering::layout::PreviewSurface;
use snipshot::rendering::theme::ThemeCatalog;
use snipshot::{CaptureEngine, CaptureOptions, LanguageSelection, PixmapCapture, RenderSettings, SyntectEngine};

const SAMPLE: &str = r#"import sys

def fib(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a

if __name__ == "__main__":
    print(fib(int(sys.argv[1])))
"#;

fn bench_highlight(c: &mut Criterion) {
    let highlighter = Highlighter::new(Arc::new(SyntectEngine::new()));

    c.bench_function("highlight_forced", |b| {
        let python = LanguageSelection::explicit("python");
        b.iter(|| highlighter.highlight(SAMPLE, &python))
    });
    c.bench_function("highlight_auto", |b| {
        b.iter(|| highlighter.highlight(SAMPLE, &LanguageSelection::Auto))
    });
}

fn bench_capture(c: &mut Criterion) {
    let settings = RenderSettings::default();
    let highlighter = Highlighter::new(Arc::new(SyntectEngine::new()));
    let result = highlighter.highlight(SAMPLE, &LanguageSelection::explicit("python"));
    let mut surface = PreviewSurface::new(
        settings.container_style(),
        ThemeCatalog::load().resolve(&settings.theme),
    );

    c.bench_function("apply_markup", |b| b.iter(|| surface.apply_markup(&result)));

    surface.apply_markup(&result);
    let options = CaptureOptions::default();
    c.bench_function("capture_png", |b| {
        b.iter(|| PixmapCapture.capture(&surface, &options).unwrap())
    });
}

criterion_group!(benches, bench_highlight, bench_capture);
criterion_main!(benches);
