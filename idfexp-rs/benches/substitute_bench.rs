use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idfexp::script::expand::expand_env_with;
use idfexp::script::loops::{LoopFrame, LoopStack};

fn stack(depth: usize) -> LoopStack {
    let mut s = LoopStack::new();
    for d in 0..depth {
        if let Ok(Some(frame)) = LoopFrame::new(format!("v{d}"), 1, 100, 0) {
            s.push(frame);
        }
    }
    s
}

fn make_line(depth: usize) -> String {
    let refs: Vec<String> = (0..depth).map(|d| format!("kh_%%00v{d}.asc * %%(v{d}+1)")).collect();
    format!("KD_L%%v0 = {}", refs.join(" + "))
}

fn bench_substitute(c: &mut Criterion) {
    let mut g = c.benchmark_group("substitute");

    for depth in [1, 3, 6] {
        let s = stack(depth);
        let line = make_line(depth);
        g.bench_function(format!("loop_depth_{depth}"), |b| {
            b.iter(|| s.substitute(black_box(&line)))
        });
    }

    let plain = "KD = kh_l1.asc * top_l1.asc - bot_l1.asc".repeat(10);
    let s = stack(3);
    g.bench_function("no_references", |b| b.iter(|| s.substitute(black_box(&plain))));

    let env_line = r"K = %MODEL%\kh\kh_l%%i.asc * %FACTOR%".repeat(10);
    g.bench_function("env_expansion", |b| {
        b.iter(|| {
            expand_env_with(black_box(&env_line), |name| match name {
                "MODEL" => Some(r"D:\models\rijn".to_owned()),
                "FACTOR" => Some("2".to_owned()),
                _ => None,
            })
        })
    });

    g.finish();
}

criterion_group!(benches, bench_substitute);
criterion_main!(benches);
