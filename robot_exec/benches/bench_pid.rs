//! # PID Controller Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use robot_lib::ctrl::{PidController, ProfileGains};

fn pid_benchmark(c: &mut Criterion) {
    let gains = ProfileGains::default().p(0.0085).i(0.0001).d(0.001);

    // Plain controller
    let mut pid = PidController::new(gains, -1000.0, 1000.0, 0.01);
    pid.set_setpoint(100.0);

    let mut t = 0.0;
    c.bench_function("PidController::calculate", |b| {
        b.iter(|| {
            t += 0.01;
            pid.calculate(black_box(42.0), t)
        })
    });

    // Continuous heading controller with a deadband, exercising the wrap
    let mut heading = PidController::new(gains, -180.0, 180.0, 0.01);
    heading.set_continuous(true);
    heading.set_deadband(0.5);
    heading.set_setpoint(175.0);

    let mut t = 0.0;
    c.bench_function("PidController::calculate::continuous", |b| {
        b.iter(|| {
            t += 0.01;
            heading.calculate(black_box(-170.0), t)
        })
    });
}

criterion_group!(benches, pid_benchmark);
criterion_main!(benches);
