//! 查询编译与事件流解码的性能基准测试
//!
//! 解码测试模拟一条实时围栏连接：先是确认帧，然后是大量事件，
//! 并以不同大小的分片喂给解码器。

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::Value;
use spatio_client::live::{GeofenceEvent, StreamDecoder};
use spatio_client::protocol::RespEncoder;
use spatio_client::{DetectKind, OutputFormat, Query};

const EVENT_COUNT: usize = 10_000;

/// 生成事件流
fn generate_stream(count: usize) -> Vec<u8> {
    let mut stream = RespEncoder::simple_string("OK");
    for i in 0..count {
        let event = format!(
            r#"{{"command":"set","detect":"inside","key":"fleet","time":"2024-01-01T00:00:00Z","id":"truck{}","object":{{"type":"Point","coordinates":[{},{}]}}}}"#,
            i,
            -112.0 - (i % 100) as f64 * 0.01,
            33.0 + (i % 50) as f64 * 0.01
        );
        stream.push_str(&RespEncoder::bulk_string(Some(&event)));
    }
    stream.into_bytes()
}

/// 简单查询
fn bench_render_simple(c: &mut Criterion) {
    c.bench_function("render_simple", |b| {
        b.iter(|| {
            Query::nearby(black_box("fleet"))
                .limit(10)
                .point(33.46, -112.27)
                .render()
        });
    });
}

/// 多值子句较多的查询
fn bench_render_complex(c: &mut Criterion) {
    c.bench_function("render_complex", |b| {
        b.iter(|| {
            let mut query = Query::within(black_box("fleet"))
                .cursor(100)
                .limit(50)
                .match_pattern("truck*")
                .desc()
                .no_fields()
                .bounds(33.0, -113.0, 34.0, -112.0);
            for i in 0..8 {
                query = query.where_range(format!("speed{}", i), i, i * 10);
            }
            query
                .where_eval("return FIELDS.speed > ARGV[1]", ["10"])
                .fence()
                .detect(&[DetectKind::Enter, DetectKind::Exit])
                .and_then(|q| q.output(OutputFormat::Points))
                .map(|q| q.render())
        });
    });
}

/// 整块输入解码
fn bench_decode_whole(c: &mut Criterion) {
    let stream = generate_stream(EVENT_COUNT);

    c.bench_function("decode_whole", |b| {
        b.iter(|| {
            let mut decoder = StreamDecoder::<GeofenceEvent>::new();
            decoder.command_sent("NEARBY");
            decoder.feed(&stream);
            let mut events = 0;
            while decoder.next_event().is_some() {
                events += 1;
            }
            events
        });
    });
}

/// 小分片输入解码，覆盖缓冲区压缩路径
fn bench_decode_fragmented(c: &mut Criterion) {
    let stream = generate_stream(EVENT_COUNT);

    let mut group = c.benchmark_group("decode_fragmented");
    for chunk_size in [16usize, 256, 4096] {
        group.bench_function(format!("chunk_{}", chunk_size), |b| {
            b.iter(|| {
                let mut decoder = StreamDecoder::<Value>::new();
                decoder.command_sent("NEARBY");
                let mut events = 0;
                for chunk in stream.chunks(chunk_size) {
                    decoder.feed(chunk);
                    while decoder.next_event().is_some() {
                        events += 1;
                    }
                }
                events
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_render_simple,
    bench_render_complex,
    bench_decode_whole,
    bench_decode_fragmented
);
criterion_main!(benches);
