//! Periodic fire-event sources for the loop manager

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The fire event delivered by a [`Ticker`].
pub type FireFn = Box<dyn FnMut() + Send + 'static>;

/// Something which calls a closure once per period until disarmed.
pub trait Ticker: Send {
    /// Start firing `fire` every `period`.
    fn arm(&mut self, period: Duration, fire: FireFn) -> std::io::Result<()>;

    /// Stop firing. Once this returns `fire` will not be called again.
    fn disarm(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A ticker backed by a dedicated thread.
///
/// Fire events are never queued or coalesced: if one fire overruns the
/// period the next one happens immediately after it, and the schedule
/// continues from there without trying to catch up.
pub struct Notifier {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// A ticker that never fires by itself, the owner drives the loop by hand.
#[derive(Debug, Default)]
pub struct ManualTicker {
    armed: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Notifier {
    /// Create a new notifier whose thread will be given `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            stop_tx: None,
            handle: None,
        }
    }
}

impl Ticker for Notifier {
    fn arm(&mut self, period: Duration, mut fire: FireFn) -> std::io::Result<()> {
        // Re-arming replaces the running thread
        self.disarm();

        let (stop_tx, stop_rx) = channel::<()>();

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let mut next = Instant::now() + period;

                loop {
                    // Wait for the next deadline, waking early if disarmed
                    let now = Instant::now();
                    if next > now {
                        match stop_rx.recv_timeout(next - now) {
                            Err(RecvTimeoutError::Timeout) => (),
                            _ => break,
                        }
                    } else {
                        match stop_rx.try_recv() {
                            Err(TryRecvError::Empty) => (),
                            _ => break,
                        }
                    }

                    fire();

                    next += period;
                    let now = Instant::now();
                    if next < now {
                        next = now;
                    }
                }
            })?;

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);

        debug!("Notifier \"{}\" armed with period {:?}", self.name, period);

        Ok(())
    }

    fn disarm(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // The thread may already have gone, which is fine
            tx.send(()).ok();
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Notifier \"{}\" thread panicked", self.name);
            }
            debug!("Notifier \"{}\" disarmed", self.name);
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Ticker for ManualTicker {
    fn arm(&mut self, _period: Duration, _fire: FireFn) -> std::io::Result<()> {
        self.armed = true;
        Ok(())
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_notifier_fires_until_disarmed() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let mut notifier = Notifier::new("test_notifier");
        notifier
            .arm(
                Duration::from_millis(5),
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        notifier.disarm();

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3, "only fired {} times", fired);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), fired);
    }

    #[test]
    fn test_slow_fire_is_not_queued() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let mut notifier = Notifier::new("test_slow_notifier");
        notifier
            .arm(
                Duration::from_millis(2),
                Box::new(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                }),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(110));
        notifier.disarm();

        // Each fire takes ~10 periods, the missed deadlines must not be
        // replayed afterwards
        assert!(count.load(Ordering::SeqCst) <= 7);
    }
}
