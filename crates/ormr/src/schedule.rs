//! # Schedule — Running Systems in Order
//!
//! A system is any `FnMut(&mut World)`. No parameter injection, no
//! dependency graph, no parallelism: systems run one after another in the
//! order they were added, once per tick. The update loop is synchronous and
//! single-threaded by design.
//!
//! Startup systems are a separate list that [`Schedule::run_startup`]
//! executes once, before the first tick.

use crate::world::World;

/// Something that can be executed against a [`World`].
///
/// Blanket-implemented for closures and function pointers, so plain
/// `fn movement(world: &mut World)` works directly.
pub trait System {
    fn run(&mut self, world: &mut World);
}

impl<F: FnMut(&mut World)> System for F {
    fn run(&mut self, world: &mut World) {
        (self)(world);
    }
}

/// A boxed system plus a short name for diagnostics output.
struct NamedSystem {
    #[cfg(any(feature = "diagnostics", test))]
    name: String,
    system: Box<dyn System>,
}

/// Wall-clock time one system took during the most recent tick.
#[cfg(feature = "diagnostics")]
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: String,
    pub duration_us: f64,
}

/// Ordered lists of startup and per-tick systems.
pub struct Schedule {
    startup: Vec<NamedSystem>,
    systems: Vec<NamedSystem>,
    /// Per-system timings from the most recent [`run`](Self::run).
    #[cfg(feature = "diagnostics")]
    timings: Vec<SystemTiming>,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            startup: Vec::new(),
            systems: Vec::new(),
            #[cfg(feature = "diagnostics")]
            timings: Vec::new(),
        }
    }

    /// Add a system to run once, before the first tick.
    pub fn add_startup_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.startup.push(NamedSystem {
            #[cfg(any(feature = "diagnostics", test))]
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
        self
    }

    /// Add a system to the end of the per-tick list.
    pub fn add_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.systems.push(NamedSystem {
            #[cfg(any(feature = "diagnostics", test))]
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
        self
    }

    /// Run all startup systems in order. Call once.
    pub fn run_startup(&mut self, world: &mut World) {
        for ns in &mut self.startup {
            ns.system.run(world);
        }
    }

    /// Run all per-tick systems in order.
    pub fn run(&mut self, world: &mut World) {
        #[cfg(feature = "diagnostics")]
        {
            self.timings.clear();
            for ns in &mut self.systems {
                let start = std::time::Instant::now();
                ns.system.run(world);
                self.timings.push(SystemTiming {
                    name: ns.name.clone(),
                    duration_us: start.elapsed().as_secs_f64() * 1_000_000.0,
                });
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            for ns in &mut self.systems {
                ns.system.run(world);
            }
        }
    }

    /// Number of per-tick systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Timings captured during the most recent [`run`](Self::run).
    #[cfg(feature = "diagnostics")]
    pub fn timings(&self) -> &[SystemTiming] {
        &self.timings
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim a closure's type name down to something printable
/// (`ormr::motes::main::{{closure}}` → `main::{{closure}}`).
#[cfg(any(feature = "diagnostics", test))]
fn short_system_name(full: &str) -> String {
    let parts: Vec<&str> = full.rsplit("::").take(2).collect();
    parts.into_iter().rev().collect::<Vec<_>>().join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Log(Vec<&'static str>);

    #[test]
    fn systems_run_in_order() {
        let mut world = World::new();
        world.insert_resource(Log(Vec::new()));

        let mut schedule = Schedule::new();
        schedule.add_system(|w: &mut World| w.resource_mut::<Log>().0.push("first"));
        schedule.add_system(|w: &mut World| w.resource_mut::<Log>().0.push("second"));
        schedule.add_system(|w: &mut World| w.resource_mut::<Log>().0.push("third"));

        schedule.run(&mut world);
        assert_eq!(world.resource::<Log>().0, vec!["first", "second", "third"]);
    }

    #[test]
    fn startup_runs_separately() {
        let mut world = World::new();
        world.insert_resource(0u32);

        let mut schedule = Schedule::new();
        schedule.add_startup_system(|w: &mut World| *w.resource_mut::<u32>() += 100);
        schedule.add_system(|w: &mut World| *w.resource_mut::<u32>() += 1);

        schedule.run_startup(&mut world);
        schedule.run(&mut world);
        schedule.run(&mut world);
        assert_eq!(*world.resource::<u32>(), 102);
    }

    #[test]
    fn fn_pointers_are_systems() {
        fn bump(world: &mut World) {
            *world.resource_mut::<u32>() += 1;
        }

        let mut world = World::new();
        world.insert_resource(0u32);
        let mut schedule = Schedule::new();
        schedule.add_system(bump);
        schedule.run(&mut world);
        assert_eq!(*world.resource::<u32>(), 1);
    }

    #[test]
    fn short_names_keep_the_tail() {
        assert_eq!(short_system_name("a::b::c::d"), "c::d");
        assert_eq!(short_system_name("plain"), "plain");
    }
}
