use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use edunes::{ChrMemory, Console, ConsoleConfig, FlatMemory, Mirroring, Ppu, RenderMode};

/// A PPU with a striped pattern, a filled name table and eight sprites.
fn busy_ppu() -> Ppu {
    let mut ppu = Ppu::new(ChrMemory::ram(Mirroring::Vertical).shared());
    let mem = ppu.memory_mut();
    for addr in 0..0x2000u16 {
        mem.write(addr, (addr as u8).rotate_left(3) ^ 0x5A);
    }
    for i in 0..0x3C0u16 {
        mem.write(0x2000 + i, i as u8);
    }
    for i in 0..32u16 {
        mem.write(0x3F00 + i, (i as u8 * 3) & 0x3F);
    }

    ppu.write_register(0x2003, 0);
    for i in 0..64u8 {
        let y = if i < 8 { 100 } else { 0xF0 };
        for b in [y, i, i & 3, i.wrapping_mul(24)] {
            ppu.write_register(0x2004, b);
        }
    }
    ppu.write_register(0x2001, 0x1E);
    ppu
}

fn bench_ppu_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("ppu_frame");

    group.bench_function("rendering", |b| {
        let mut ppu = busy_ppu();
        b.iter(|| {
            ppu.run_frame(|f| {
                black_box(f.pixels[0]);
            });
        });
    });

    group.bench_function("rendering_disabled", |b| {
        let mut ppu = busy_ppu();
        ppu.write_register(0x2001, 0x00);
        b.iter(|| {
            ppu.run_frame(|f| {
                black_box(f.pixels[0]);
            });
        });
    });

    group.bench_function("pattern_viewer", |b| {
        let mut ppu = busy_ppu();
        ppu.set_render_mode(RenderMode::PatternTableViewer);
        b.iter(|| {
            ppu.run_frame(|f| {
                black_box(f.pixels[0]);
            });
        });
    });

    group.finish();
}

fn bench_dmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("dmc_update");
    let mut memory = FlatMemory::new();
    memory.load(0xC000, &[0xA5; 0x1000]);

    for rate in [0u8, 15].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(rate), rate, |b, &rate| {
            b.iter(|| {
                let mut console = Console::new(
                    ChrMemory::ram(Mirroring::Vertical).shared(),
                    ConsoleConfig::default(),
                );
                console.write(0x4010, 0x40 | rate);
                console.write(0x4013, 0xFF);
                console.write(0x4015, 0x10);
                for _ in 0..10_000 {
                    console.step_audio(&memory);
                }
                black_box(console.apu().output());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ppu_frame, bench_dmc);
criterion_main!(benches);
