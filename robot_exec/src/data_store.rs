//! # Data Store
//!
//! Data shared between the modules of the control loop. The drive module
//! writes sensor readings into it and commands write drive requests back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

// Internal
use crate::drive::{ActuatorSink, DriveMessage, SensorId, SensorSource};
use util::module::ModuleError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DataStore {
    /// Latest sensor readings
    pub sensors: HashMap<SensorId, f64>,

    /// Drive request to be sent to the hardware at the end of the cycle
    pub drive_message: Option<DriveMessage>,

    /// Number of drive requests written since startup
    pub num_drive_messages: u64,
}

/// Handle to a data store shared between modules.
pub type SharedDataStore = Arc<Mutex<DataStore>>;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a new empty shared data store.
pub fn shared() -> SharedDataStore {
    Arc::new(Mutex::new(DataStore::default()))
}

/// Lock the store, recovering the data if a previous holder panicked.
///
/// The store only ever holds plain values so a panic part way through an
/// update cannot leave it structurally broken.
pub fn lock(store: &SharedDataStore) -> MutexGuard<'_, DataStore> {
    match store.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            warn!("Data store lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn set_sensor(&mut self, id: SensorId, value: f64) {
        self.sensors.insert(id, value);
    }

    /// Take the pending drive request, leaving none in its place.
    pub fn take_drive_message(&mut self) -> Option<DriveMessage> {
        self.drive_message.take()
    }
}

impl SensorSource for SharedDataStore {
    fn get(&self, id: SensorId) -> Result<f64, ModuleError> {
        lock(self)
            .sensors
            .get(&id)
            .copied()
            .ok_or_else(|| ModuleError::SensorUnavailable(format!("{:?}", id)))
    }
}

impl ActuatorSink for SharedDataStore {
    fn set_drive_message(&mut self, msg: DriveMessage) -> Result<(), ModuleError> {
        let mut ds = lock(self);
        ds.drive_message = Some(msg);
        ds.num_drive_messages += 1;
        Ok(())
    }
}
