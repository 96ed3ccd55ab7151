//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use keybridge_common::decoder::decode_all;
use keybridge_common::markup;
use keybridge_common::terminal::Color;
use std::hint::black_box;

/// Benchmark decoding of mixed text, UTF-8 and escape sequences
fn bench_decoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder");

    let ascii = "The quick brown fox jumps over the lazy dog. ".repeat(32);
    let unicode = "Grüße aus Köln, ¿qué tal? 🦀 ".repeat(32);
    let keys = "\x1b[A\x1b[B\x1b[1;5C\x1b[15~\x1bOP".repeat(64);

    for (name, input) in [("ascii", &ascii), ("unicode", &unicode), ("escapes", &keys)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| decode_all(black_box(input.as_bytes())));
        });
    }

    group.finish();
}

/// Benchmark markup formatting with and without rendition support
fn bench_formatter(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatter");

    let text = format!(
        "{} {} {}",
        markup::colorize_text("status", Color::Green),
        markup::bold_text("ready"),
        markup::colorize_text_on("alert", Color::White, Color::Red)
    )
    .repeat(16);

    for supported in [true, false] {
        group.bench_with_input(
            BenchmarkId::new("format", supported),
            &supported,
            |b, &supported| {
                b.iter(|| markup::format(black_box(&text), supported, false));
            },
        );
    }

    group.bench_function("visible_length", |b| {
        b.iter(|| markup::visible_length(black_box(&text)));
    });

    group.finish();
}

criterion_group!(benches, bench_decoder, bench_formatter);
criterion_main!(benches);
