//! # Loop manager
//!
//! The loop manager runs the registered [`Module`]s on a fixed period. Each
//! tick, with the task lock held, it:
//!
//! 1. Latches one cycle time from the [`Clock`].
//! 2. Calls `periodic_input` on every module, in registration order.
//! 3. Calls `update` on every module, in registration order.
//! 4. Calls `periodic_output` on every module, in registration order.
//!
//! and then compares the wall time the tick took against the period,
//! counting an overrun if it was exceeded.
//!
//! `start` and `stop` take the same lock as the tick, so a tick never sees a
//! half started or half stopped loop.
//!
//! A fault in one module's hook (an error or a panic) is logged and recorded
//! in the tick's [`TickRecord`], and the remaining hooks still run. A faulting
//! module can never stop the loop.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod stats;
mod ticker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

// Internal
pub use stats::{LoopStats, ModuleFault, TickRecord};
pub use ticker::{FireFn, ManualTicker, Notifier, Ticker};
use util::{
    logger,
    module::{Module, ModuleError},
    time::Clock,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs the registered modules on a fixed period.
pub struct LoopManager {
    period_s: f64,
    shared: Arc<Shared>,
    ticker: Box<dyn Ticker>,
}

/// State shared between the owner and the ticker thread.
struct Shared {
    period_s: f64,

    /// The task lock, held for the whole of every tick
    task: Mutex<Task>,

    running: AtomicBool,
    num_loops: AtomicU64,
    num_overruns: AtomicU64,

    /// Bits of the last tick's duration in seconds
    last_dt_s: AtomicU64,
}

/// Everything only touched with the task lock held.
struct Task {
    running: bool,
    clock: Clock,
    modules: Vec<Box<dyn Module>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while managing the loop.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("The module list cannot be changed while the loop is running")]
    Running,

    #[error("Could not start the loop timer: {0}")]
    TimerStart(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoopManager {
    /// Create a new loop manager ticking every `period_s` seconds on a
    /// dedicated [`Notifier`] thread.
    pub fn new(period_s: f64, clock: Clock) -> Self {
        Self::with_ticker(period_s, clock, Box::new(Notifier::new("loop_mgr")))
    }

    /// Create a new loop manager with the given ticker.
    pub fn with_ticker(period_s: f64, clock: Clock, ticker: Box<dyn Ticker>) -> Self {
        Self {
            period_s,
            shared: Arc::new(Shared {
                period_s,
                task: Mutex::new(Task {
                    running: false,
                    clock,
                    modules: Vec::new(),
                }),
                running: AtomicBool::new(false),
                num_loops: AtomicU64::new(0),
                num_overruns: AtomicU64::new(0),
                last_dt_s: AtomicU64::new(0f64.to_bits()),
            }),
            ticker,
        }
    }

    /// Set the modules run by the loop, in the order they will be run.
    ///
    /// Rejected while running.
    pub fn set_modules(&mut self, modules: Vec<Box<dyn Module>>) -> Result<(), LoopError> {
        let mut task = self.shared.lock_task();
        if task.running {
            return Err(LoopError::Running);
        }
        task.modules = modules;
        Ok(())
    }

    /// Append a module to the end of the run order.
    ///
    /// Rejected while running.
    pub fn add_module(&mut self, module: Box<dyn Module>) -> Result<(), LoopError> {
        let mut task = self.shared.lock_task();
        if task.running {
            return Err(LoopError::Running);
        }
        task.modules.push(module);
        Ok(())
    }

    /// Number of registered modules.
    pub fn num_modules(&self) -> usize {
        self.shared.lock_task().modules.len()
    }

    /// Start the loop.
    ///
    /// Does nothing if already running. Otherwise every module is initialised
    /// and takes its first input sample before the timer is armed, so the
    /// first scheduled `update` always follows an input.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.is_running() {
            debug!("Control loop already running");
            return Ok(());
        }

        info!("Starting control loop ({} s period)", self.period_s);

        {
            let mut guard = self.shared.lock_task();
            let task = &mut *guard;
            let now = task.clock.current_time();

            for module in task.modules.iter_mut() {
                if let Err(f) = run_hook(module, "init", |m| m.init(now)) {
                    error!("{}", f);
                }
            }
            for module in task.modules.iter_mut() {
                if let Err(f) = run_hook(module, "periodic_input", |m| m.periodic_input(now)) {
                    error!("{}", f);
                }
            }

            task.running = true;
            self.shared.running.store(true, Ordering::SeqCst);
            task.clock.cycle_ended();
        }

        let shared = self.shared.clone();
        let armed = self.ticker.arm(
            Duration::from_secs_f64(self.period_s),
            Box::new(move || {
                shared.tick();
            }),
        );

        if let Err(e) = armed {
            error!("Could not arm the loop timer: {}", e);

            // Modules were started, so they must be shut down again
            let mut task = self.shared.lock_task();
            task.running = false;
            self.shared.running.store(false, Ordering::SeqCst);
            task.shutdown_all();

            return Err(LoopError::TimerStart(e));
        }

        Ok(())
    }

    /// Stop the loop, shutting down every module, and return the timing
    /// statistics.
    ///
    /// Does nothing but return the statistics if not running.
    pub fn stop(&mut self) -> LoopStats {
        if !self.is_running() {
            return self.stats();
        }

        info!("Stopping control loop");

        // Disarm first, an in-flight tick finishes before this returns
        self.ticker.disarm();

        {
            let mut guard = self.shared.lock_task();
            let task = &mut *guard;

            task.running = false;
            self.shared.running.store(false, Ordering::SeqCst);
            task.shutdown_all();
        }

        let stats = self.stats();
        if stats.num_loops != 0 {
            let msg = format!(
                "Experienced {}/{} timing overruns, or {:.2}%",
                stats.num_overruns,
                stats.num_loops,
                stats.overrun_ratio * 100.0
            );
            if stats.num_overruns > 0 {
                warn!("{}", msg);
            } else {
                info!("{}", msg);
            }
        }

        stats
    }

    /// Run one tick now. Returns `None` if the loop isn't running.
    ///
    /// This is what the ticker calls on each fire event. Calling it by hand
    /// (with a [`ManualTicker`]) allows the loop to be stepped
    /// deterministically.
    pub fn tick(&self) -> Option<TickRecord> {
        self.shared.tick()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    /// Current timing statistics.
    pub fn stats(&self) -> LoopStats {
        LoopStats::new(
            self.shared.num_loops.load(Ordering::SeqCst),
            self.shared.num_overruns.load(Ordering::SeqCst),
            f64::from_bits(self.shared.last_dt_s.load(Ordering::SeqCst)),
        )
    }

    /// Run each module's self-test. Only allowed while stopped.
    ///
    /// Returns true if every module passed.
    pub fn check_modules(&mut self) -> Result<bool, LoopError> {
        let mut guard = self.shared.lock_task();
        let task = &mut *guard;
        if task.running {
            return Err(LoopError::Running);
        }

        let now = task.clock.current_time();
        let mut all_ok = true;
        for module in task.modules.iter_mut() {
            let ok = match panic::catch_unwind(AssertUnwindSafe(|| module.check_module(now))) {
                Ok(ok) => ok,
                Err(_) => false,
            };
            if !ok {
                warn!("Module {} failed its self-test", module.name());
                all_ok = false;
            }
        }
        task.clock.cycle_ended();

        Ok(all_ok)
    }

    /// Zero every module's sensors. Only allowed while stopped.
    pub fn zero_sensors(&mut self) -> Result<Vec<ModuleFault>, LoopError> {
        let mut guard = self.shared.lock_task();
        let task = &mut *guard;
        if task.running {
            return Err(LoopError::Running);
        }

        let now = task.clock.current_time();
        let mut faults = Vec::new();
        for module in task.modules.iter_mut() {
            if let Err(f) = run_hook(module, "zero_sensors", |m| m.zero_sensors(now)) {
                error!("{}", f);
                faults.push(f);
            }
        }
        task.clock.cycle_ended();

        Ok(faults)
    }

    /// Access the loop's clock with the task lock held, for example to move
    /// a simulated clock between ticks.
    pub fn with_clock<R, F: FnOnce(&mut Clock) -> R>(&self, f: F) -> R {
        let mut task = self.shared.lock_task();
        f(&mut task.clock)
    }
}

impl Drop for LoopManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    /// Lock the task, recovering the data if a previous holder panicked.
    fn lock_task(&self) -> MutexGuard<'_, Task> {
        match self.task.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Loop task lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn tick(&self) -> Option<TickRecord> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }

        let start = Instant::now();

        let (start_s, faults) = {
            let mut guard = self.lock_task();
            let task = &mut *guard;

            // Stopped while waiting for the lock
            if !task.running {
                return None;
            }

            logger::set_cycle(self.num_loops.load(Ordering::SeqCst) + 1);
            let now = task.clock.current_time();
            let faults = task.run_cycle(now);
            task.clock.cycle_ended();
            logger::clear_cycle();

            (now, faults)
        };

        let elapsed_s = start.elapsed().as_secs_f64();
        let num_loops = self.num_loops.fetch_add(1, Ordering::SeqCst) + 1;
        let overran = elapsed_s > self.period_s;
        let num_overruns = if overran {
            self.num_overruns.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.num_overruns.load(Ordering::SeqCst)
        };
        self.last_dt_s.store(elapsed_s.to_bits(), Ordering::SeqCst);

        Some(TickRecord {
            start_s,
            elapsed_s,
            overran,
            num_loops,
            num_overruns,
            faults,
        })
    }
}

impl Task {
    /// Run every module's shutdown hook, logging any faults.
    fn shutdown_all(&mut self) {
        let now = self.clock.current_time();
        for module in self.modules.iter_mut() {
            if let Err(f) = run_hook(module, "shutdown", |m| m.shutdown(now)) {
                error!("{}", f);
            }
        }
        self.clock.cycle_ended();
    }

    /// Run every module through one cycle.
    fn run_cycle(&mut self, now: f64) -> Vec<ModuleFault> {
        let mut faults = Vec::new();

        for module in self.modules.iter_mut() {
            if let Err(f) = run_hook(module, "periodic_input", |m| m.periodic_input(now)) {
                faults.push(f);
            }
        }
        for module in self.modules.iter_mut() {
            if let Err(f) = run_hook(module, "update", |m| m.update(now)) {
                faults.push(f);
            }
        }
        for module in self.modules.iter_mut() {
            if let Err(f) = run_hook(module, "periodic_output", |m| m.periodic_output(now)) {
                faults.push(f);
            }
        }

        for f in faults.iter() {
            error!("Module fault at t = {:.3} s: {}", now, f);
        }

        faults
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Run one hook of a module, converting both errors and panics into a
/// [`ModuleFault`].
fn run_hook<F>(module: &mut Box<dyn Module>, hook: &'static str, f: F) -> Result<(), ModuleFault>
where
    F: FnOnce(&mut dyn Module) -> Result<(), ModuleError>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| f(module.as_mut())));

    let reason = match result {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    Err(ModuleFault {
        module: module.name().to_string(),
        hook,
        reason,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}
