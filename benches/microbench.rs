use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sechist::extractor::ReferenceExtractor;
use sechist::profile::ProjectProfile;

/// A commit message in the style of the given project, padded with `filler_lines` lines of prose.
fn message(project: &str, filler_lines: usize) -> String {
    let mut m = match project {
        "webkit" => String::from(
            "[JSC] Fix type confusion in Array.prototype.sort\n\
             https://bugs.webkit.org/show_bug.cgi?id=246543\n\
             rdar://100812042\n\n\
             Reviewed by Nobody.\n\n",
        ),
        _ => String::from("Bug 1812042 - Fix use-after-free in nsFrame::Destroy r=nobody\n\n"),
    };
    for i in 0..filler_lines {
        m.push_str(&format!("* Source/WebCore/file{i}.cpp: (WebCore::Thing::doIt): Updated.\n"));
    }
    m
}

pub fn extract_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reference extraction");

    for project in ["webkit", "firefox"] {
        let profile = ProjectProfile::builtin(project).expect("built-in profile should load");
        let extractor = ReferenceExtractor::from_profile(&profile).expect("profile should compile");

        for filler_lines in [0, 16, 256] {
            let input = message(project, filler_lines);
            group.throughput(Throughput::Bytes(input.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(project, filler_lines),
                &input,
                |b, input| b.iter(|| extractor.extract(black_box(input))),
            );
        }
    }
    group.finish();
}

criterion_group!(microbenchmarks, extract_benchmark);
criterion_main!(microbenchmarks);
