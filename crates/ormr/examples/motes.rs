//! Motes — a headless simulation loop.
//!
//! Spawns drifting motes, runs a schedule for a fixed number of ticks, and
//! prints pool/archetype diagnostics at the end. Motes that drift past the
//! boundary freeze in place; frozen motes are excluded from the movement
//! query.
//!
//! Run with: `cargo run -p ormr --example motes`

use ormr::prelude::*;

const TICKS: u32 = 120;
const BOUNDARY: f32 = 100.0;

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}

struct Frozen;

struct Tick(u32);

fn main() {
    env_logger::init();

    let mut world = World::new();
    world.insert_resource(Tick(0));

    let mut schedule = Schedule::new();
    schedule.add_startup_system(spawn_motes);
    schedule.add_system(drift);
    schedule.add_system(freeze_escapees);
    schedule.add_system(count_tick);

    schedule.run_startup(&mut world);
    for _ in 0..TICKS {
        schedule.run(&mut world);
    }

    report(&mut world);
}

fn spawn_motes(world: &mut World) {
    for i in 0..64u32 {
        // Deterministic fan of directions, no RNG needed.
        let angle = (i as f32) * 0.37;
        world.spawn_bundle((
            Position { x: 0.0, y: 0.0 },
            Velocity {
                dx: angle.cos() * (1.0 + (i % 7) as f32 * 0.4),
                dy: angle.sin() * (1.0 + (i % 5) as f32 * 0.4),
            },
        ));
    }
}

fn drift(world: &mut World) {
    let mut moving = QueryBuilder::new()
        .include::<Position>()
        .include::<Velocity>()
        .exclude::<Frozen>()
        .build();
    moving.for_each::<(&mut Position, &Velocity)>(world, |_, (pos, vel)| {
        pos.x += vel.dx;
        pos.y += vel.dy;
    });
}

fn freeze_escapees(world: &mut World) {
    let mut escaped = Vec::new();
    world.query::<(&Position,)>(|entity, (pos,)| {
        if pos.x.abs() > BOUNDARY || pos.y.abs() > BOUNDARY {
            escaped.push(entity);
        }
    });
    for entity in escaped {
        if !world.has::<Frozen>(entity) {
            world.insert(entity, Frozen).expect("mote is alive");
        }
    }
}

fn count_tick(world: &mut World) {
    world.resource_mut::<Tick>().0 += 1;
}

fn report(world: &mut World) {
    let mut frozen = 0;
    world.query::<(&Frozen,)>(|_, _| frozen += 1);
    println!(
        "after {} ticks: {} motes, {} frozen",
        world.resource::<Tick>().0,
        world.entity_count(),
        frozen
    );

    #[cfg(feature = "diagnostics")]
    {
        let stats = world.entity_pool_stats();
        println!(
            "pool: {} slots, {} alive, {} free",
            stats.total_slots, stats.alive_count, stats.free_count
        );
        for snapshot in world.archetype_snapshots() {
            println!(
                "archetype [{}] x{}",
                snapshot.component_names.join(", "),
                snapshot.entity_count
            );
        }
    }
}
