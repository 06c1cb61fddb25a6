#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sparse_ecs::{System, World};

#[derive(Debug, Clone)]
struct Position(f32, f32, f32);

#[derive(Debug, Clone)]
struct Velocity(f32, f32, f32);

#[derive(Debug, Clone)]
struct Health(u32);

fn churn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn_bench");

    // Benchmark creating entities with 2 components
    group.bench_function("create_2_components", |b| {
        let mut world = World::new(4096);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(
                    world.create_entity_with((Position(1.0, 2.0, 3.0), Velocity(1.0, 0.0, 0.0))),
                );
            }
            world.clear();
        });
    });

    // Benchmark create/destroy recycling
    group.bench_function("create_destroy_recycle", |b| {
        let mut world = World::new(4096);
        b.iter(|| {
            for _ in 0..1000 {
                let e = world.create_entity_with((Position(1.0, 2.0, 3.0), Health(100)));
                world.destroy_entity(black_box(e)).unwrap();
            }
        });
    });

    // Benchmark add/remove churn on a fixed population
    group.bench_function("add_remove_component", |b| {
        let mut world = World::new(4096);
        let entities: Vec<_> = (0..1000)
            .map(|_| world.create_entity_with((Position(0.0, 0.0, 0.0),)))
            .collect();
        b.iter(|| {
            for &e in &entities {
                world.add_component(e, Velocity(1.0, 0.0, 0.0)).unwrap();
                world.remove_component::<Velocity>(e).unwrap();
            }
        });
    });

    group.finish();
}

fn iteration_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iteration_bench");

    // Iterate a system's matching set against a mixed population
    group.bench_function("matching_set_iteration", |b| {
        let mut world = World::new(8192);
        let mut movement = System::new(&mut world);
        movement.match_components::<(Position, Velocity)>();

        for i in 0..4096 {
            if i % 2 == 0 {
                world.create_entity_with((Position(i as f32, 0.0, 0.0), Velocity(1.0, 0.0, 0.0)));
            } else {
                world.create_entity_with((Position(i as f32, 0.0, 0.0),));
            }
        }

        b.iter(|| {
            let mut sum = 0.0f32;
            movement.with_matching(|matching| {
                for &index in matching.as_slice() {
                    let e = world.entity_from_index(index).unwrap();
                    sum += world.get_component::<Position>(e).unwrap().0;
                }
            });
            black_box(sum)
        });
    });

    // Mask-filtered store iteration
    group.bench_function("iter_components_of_type", |b| {
        let mut world = World::new(8192);
        for i in 0..4096 {
            world.create_entity_with((Position(i as f32, 0.0, 0.0),));
        }
        b.iter(|| {
            let mut sum = 0.0f32;
            for (_, pos) in world.iter_components_of_type::<Position>() {
                sum += pos.0;
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, churn_benchmark, iteration_benchmark);
criterion_main!(benches);
