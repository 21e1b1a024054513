//! Benchmarks for encoder progress parsing
//!
//! Measures per-line parsing and draining a full `-progress` transcript.

use clipforge_av::{parse_progress_line, progress_percent, ProgressStream};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

/// One `-progress` block as ffmpeg writes it.
const PROGRESS_BLOCK: &str = "frame=240
fps=59.94
stream_0_0_q=28.0
bitrate=1204.3kbits/s
total_size=1507328
out_time_us=10010000
out_time_ms=10010000
out_time=00:00:10.010000
dup_frames=0
drop_frames=0
speed=2.49x
progress=continue
";

/// Transcript of `blocks` progress blocks, one per second of output.
fn transcript(blocks: usize) -> String {
    let mut out = String::with_capacity(blocks * PROGRESS_BLOCK.len());
    for i in 0..blocks {
        out.push_str(&PROGRESS_BLOCK.replace("10010000", &(i * 1_000_000).to_string()));
    }
    out.push_str("progress=end\n");
    out
}

fn bench_line_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_parsing");

    for line in ["out_time_us=10010000", "progress=end", "speed=2.49x", "out_time_us=N/A"] {
        group.bench_with_input(BenchmarkId::new("parse", line), &line, |b, line| {
            b.iter(|| parse_progress_line(black_box(line)));
        });
    }

    group.bench_function("percent", |b| {
        b.iter(|| progress_percent(black_box(Duration::from_millis(10_010)), black_box(600.0)));
    });

    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("progress_stream");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let text = transcript(600);
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_with_input(BenchmarkId::new("drain", "600_blocks"), &text, |b, text| {
        b.iter(|| {
            rt.block_on(async {
                let mut stream = ProgressStream::new(text.as_bytes());
                let mut events = 0usize;
                while stream.next_event().await.is_some() {
                    events += 1;
                }
                black_box(events)
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_line_parsing, bench_stream);
criterion_main!(benches);
