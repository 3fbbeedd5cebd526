//! # Commands
//!
//! Commands are one-shot behaviours, such as driving a fixed distance, which
//! run until they report that they are done. They are run in order by a
//! [`CommandQueue`], which is itself a [`Module`] registered with the loop
//! manager.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod collect_velocity_data;
mod drive_straight;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// Internal
pub use collect_velocity_data::{
    CollectVelocityData, CollectVelocityDataParams, VelocityData, VelocityDataPoint,
};
pub use drive_straight::{
    DriveControlMode, DriveStraight, DriveStraightParams, DriveStraightState,
    DriveStraightTelemetry,
};
use util::module::{Module, ModuleError};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A one-shot behaviour.
pub trait Command: Send {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called on the first cycle the command runs. Calling it again starts
    /// the command afresh.
    fn init(&mut self, now: f64) -> Result<(), ModuleError>;

    /// Called every cycle, returns true once the command is done.
    fn update(&mut self, now: f64) -> Result<bool, ModuleError>;

    /// Called once after `update` reports the command is done, or when the
    /// command is interrupted.
    fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs a list of commands one after the other.
pub struct CommandQueue {
    commands: VecDeque<Box<dyn Command>>,

    /// True once the command at the front of the queue has been initialised
    current_started: bool,

    status: CommandQueueStatus,
}

/// Progress of a [`CommandQueue`], readable from any thread.
#[derive(Debug, Clone, Default)]
pub struct CommandQueueStatus {
    finished: Arc<AtomicBool>,
    num_completed: Arc<AtomicUsize>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CommandQueue {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Self {
        let status = CommandQueueStatus::default();
        status.finished.store(commands.is_empty(), Ordering::SeqCst);

        Self {
            commands: commands.into(),
            current_started: false,
            status,
        }
    }

    /// Get a handle to the queue's status.
    pub fn status(&self) -> CommandQueueStatus {
        self.status.clone()
    }

    pub fn num_remaining(&self) -> usize {
        self.commands.len()
    }
}

impl Module for CommandQueue {
    fn name(&self) -> &str {
        "command_queue"
    }

    fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
        self.current_started = false;
        self.status
            .finished
            .store(self.commands.is_empty(), Ordering::SeqCst);
        Ok(())
    }

    fn update(&mut self, now: f64) -> Result<(), ModuleError> {
        let cmd = match self.commands.front_mut() {
            Some(c) => c,
            None => return Ok(()),
        };

        if !self.current_started {
            debug!("Starting command {}", cmd.name());
            cmd.init(now)?;
            self.current_started = true;
        }

        if !cmd.update(now)? {
            return Ok(());
        }

        // A completed command leaves the queue even if its shutdown fails, so
        // it is never run a second time
        let mut done = match self.commands.pop_front() {
            Some(c) => c,
            None => return Ok(()),
        };
        info!("Command {} complete", done.name());
        self.current_started = false;
        self.status.num_completed.fetch_add(1, Ordering::SeqCst);

        if self.commands.is_empty() {
            info!("Command queue finished");
            self.status.finished.store(true, Ordering::SeqCst);
        }

        done.shutdown(now)
    }

    fn shutdown(&mut self, now: f64) -> Result<(), ModuleError> {
        // Interrupt whatever is running, it will be started afresh next time
        if self.current_started {
            self.current_started = false;
            if let Some(cmd) = self.commands.front_mut() {
                info!("Interrupting command {}", cmd.name());
                cmd.shutdown(now)?;
            }
        }
        Ok(())
    }
}

impl CommandQueueStatus {
    /// True once every command has completed.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn num_completed(&self) -> usize {
        self.num_completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    /// Completes after a set number of updates, recording its calls.
    struct Countdown {
        name: String,
        remaining: usize,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Countdown {
        fn boxed(name: &str, updates: usize, events: &Arc<Mutex<Vec<String>>>) -> Box<dyn Command> {
            Box::new(Self {
                name: String::from(name),
                remaining: updates,
                events: events.clone(),
            })
        }

        fn record(&self, what: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}.{}", self.name, what));
        }
    }

    impl Command for Countdown {
        fn name(&self) -> &str {
            &self.name
        }

        fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
            self.record("init");
            Ok(())
        }

        fn update(&mut self, _now: f64) -> Result<bool, ModuleError> {
            self.record("update");
            self.remaining = self.remaining.saturating_sub(1);
            Ok(self.remaining == 0)
        }

        fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
            self.record("shutdown");
            Ok(())
        }
    }

    #[test]
    fn test_runs_in_order() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new(vec![
            Countdown::boxed("a", 2, &events),
            Countdown::boxed("b", 1, &events),
        ]);
        let status = queue.status();

        queue.init(0.0).unwrap();
        assert!(!status.is_finished());

        for i in 0..5 {
            queue.update(i as f64 * 0.02).unwrap();
        }

        assert!(status.is_finished());
        assert_eq!(status.num_completed(), 2);
        assert_eq!(queue.num_remaining(), 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "a.init",
                "a.update",
                "a.update",
                "a.shutdown",
                "b.init",
                "b.update",
                "b.shutdown"
            ]
        );
    }

    /// Completes on its first update, then fails to shut down.
    struct FailingShutdown {
        inits: Arc<AtomicUsize>,
    }

    impl Command for FailingShutdown {
        fn init(&mut self, _now: f64) -> Result<(), ModuleError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn update(&mut self, _now: f64) -> Result<bool, ModuleError> {
            Ok(true)
        }

        fn shutdown(&mut self, _now: f64) -> Result<(), ModuleError> {
            Err(ModuleError::HardwareFault(String::from("drive not responding")))
        }
    }

    #[test]
    fn test_completed_command_not_rerun_after_failed_shutdown() {
        let inits = Arc::new(AtomicUsize::new(0));
        let mut queue = CommandQueue::new(vec![Box::new(FailingShutdown {
            inits: inits.clone(),
        })]);
        let status = queue.status();

        queue.init(0.0).unwrap();

        // The shutdown fault is reported, but the command is still done
        assert!(queue.update(0.0).is_err());
        queue.update(0.02).unwrap();
        queue.update(0.04).unwrap();

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(status.num_completed(), 1);
        assert!(status.is_finished());
        assert_eq!(queue.num_remaining(), 0);
    }

    #[test]
    fn test_empty_queue_finished() {
        let mut queue = CommandQueue::new(Vec::new());
        queue.init(0.0).unwrap();
        queue.update(0.0).unwrap();
        assert!(queue.status().is_finished());
    }

    #[test]
    fn test_interrupted_command_restarts() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new(vec![Countdown::boxed("a", 10, &events)]);

        queue.init(0.0).unwrap();
        queue.update(0.0).unwrap();
        queue.shutdown(0.02).unwrap();

        queue.init(1.0).unwrap();
        queue.update(1.0).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["a.init", "a.update", "a.shutdown", "a.init", "a.update"]
        );
        assert!(!queue.status().is_finished());
    }

    #[test]
    fn test_drive_straight_on_sim() {
        use crate::ctrl::ProfileGains;
        use crate::data_store;
        use crate::drive::{Drive, SensorId, SensorSource, SimDriveHardware, SimDriveParams};
        use crate::loop_mgr::{LoopManager, ManualTicker};
        use util::time::Clock;

        const DT: f64 = 0.01;

        let data = data_store::shared();
        let hardware = SimDriveHardware::new(SimDriveParams {
            heading_drift_deg_s: 3.0,
            ..Default::default()
        });
        let drive = Drive::new(hardware, data.clone());

        let cmd = DriveStraight::new(
            data.clone(),
            data.clone(),
            DriveControlMode::PercentOutput,
            120.0,
            ProfileGains::default().p(0.0085).d(0.001),
            DT,
        );
        let commands: Vec<Box<dyn Command>> = vec![Box::new(cmd)];
        let queue = CommandQueue::new(commands);
        let status = queue.status();
        let modules: Vec<Box<dyn Module>> = vec![Box::new(drive), Box::new(queue)];

        let mut lm =
            LoopManager::with_ticker(DT, Clock::simulated(), Box::new(ManualTicker::new()));
        lm.set_modules(modules).unwrap();
        lm.start().unwrap();

        let mut cycles = 0;
        while !status.is_finished() {
            cycles += 1;
            assert!(cycles < 1000, "Drive straight never completed");

            lm.with_clock(|c| c.advance(DT)).unwrap();
            let record = lm.tick().unwrap();
            assert!(record.faults.is_empty(), "{:?}", record.faults);
        }

        let left = data.get(SensorId::LeftPosInches).unwrap();
        let right = data.get(SensorId::RightPosInches).unwrap();
        assert!(((left + right) / 2.0 - 120.0).abs() <= 3.0);
        assert!(data.get(SensorId::YawDeg).unwrap().abs() < 5.0);

        // The neutral request has been consumed by the drive
        assert!(data_store::lock(&data).drive_message.is_none());

        lm.stop();
    }
}
