// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Benchmarks for the SPEF and SDF readers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backanno::sdf::Sdf;
use backanno::spef::Spef;

fn synth_spef(nets: usize) -> String {
    let mut s = String::from(
        r#"*SPEF "IEEE 1481-1998"
*DESIGN "bench"
*DATE "now"
*VENDOR "bench"
*PROGRAM "bench"
*VERSION "1.0"
*DESIGN_FLOW "PIN_CAP NONE"
*DIVIDER /
*DELIMITER :
*BUS_DELIMITER [ ]
*T_UNIT 1 PS
*C_UNIT 1 FF
*R_UNIT 1 OHM
*L_UNIT 1 UH
*NAME_MAP
"#,
    );
    for i in 0..nets {
        s.push_str(&format!("*{} top/u{}/n\n", i + 1, i));
    }
    for i in 0..nets {
        s.push_str(&format!(
            "*D_NET *{} 1.5\n*CONN\n*I u{}:A I\n*I u{}:Z O\n*CAP\n1 *{}:1 0.25\n*RES\n1 *{}:1 *{}:2 12.5\n*END\n",
            i + 1,
            i,
            i + 1,
            i + 1,
            i + 1,
            i + 1,
        ));
    }
    s
}

fn synth_sdf(cells: usize) -> String {
    let mut s = String::from(
        r#"(DELAYFILE
  (SDFVERSION "3.0")
  (DESIGN "bench")
  (DIVIDER /)
  (TIMESCALE 1 ns)
"#,
    );
    for i in 0..cells {
        s.push_str(&format!(
            "  (CELL (CELLTYPE \"INVX1\") (INSTANCE u{})\n    (DELAY (ABSOLUTE (IOPATH A Y (0.04:0.05:0.06) (0.03:0.04:0.055)))))\n",
            i
        ));
    }
    s.push_str(")\n");
    s
}

fn bench_spef(c: &mut Criterion) {
    let mut group = c.benchmark_group("spef_parse");
    for nets in [100, 1000] {
        let input = synth_spef(nets);
        group.bench_with_input(BenchmarkId::new("nets", nets), &input, |b, input| {
            b.iter(|| {
                let mut spef = Spef::new(false);
                spef.read_str(black_box(input)).unwrap();
                black_box(spef.nets().len())
            });
        });
    }
    group.finish();
}

fn bench_sdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("sdf_parse");
    for cells in [100, 1000] {
        let input = synth_sdf(cells);
        group.bench_with_input(BenchmarkId::new("cells", cells), &input, |b, input| {
            b.iter(|| {
                let mut sdf = Sdf::new(false);
                sdf.read_str(black_box(input)).unwrap();
                black_box(sdf.celltypes().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spef, bench_sdf);
criterion_main!(benches);
