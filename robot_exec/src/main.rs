//! Robot executable entry point.
//!
//! # Architecture
//!
//! The executable runs one manoeuvre on the simulated drivetrain:
//!
//!     - Start the session and logging
//!     - Load the executable parameters
//!     - Register the modules with the loop manager, in order:
//!         - Drive, so sensors are fresh and requests go out at the end of
//!           the cycle
//!         - Command queue, running the requested manoeuvre
//!     - Run the loop until the queue finishes or the timeout expires
//!     - Save the loop statistics (and any collected data) to the session

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use robot_lib::{
    commands::{
        CollectVelocityData, Command, CommandQueue, DriveControlMode, DriveStraight,
    },
    data_store,
    drive::{Drive, SimDriveHardware},
    loop_mgr::LoopManager,
    params::ExecParams,
};
use util::{
    diag::Observable,
    logger::{logger_init, LevelFilter},
    module::Module,
    session::Session,
    time::Clock,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// How often the main thread checks whether the commands have finished.
const WAIT_POLL_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "robot_exec",
    about = "Run the robot control loop against the simulated drivetrain"
)]
struct Opt {
    /// Parameter file to use instead of `params/robot_exec.toml` in the
    /// software root
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Stop waiting for the manoeuvre to finish after this many seconds
    #[structopt(long, default_value = "60")]
    timeout_s: f64,

    #[structopt(subcommand)]
    mnvr: Mnvr,
}

#[derive(Debug, StructOpt)]
enum Mnvr {
    /// Drive a distance in a straight line, holding heading.
    #[structopt(name = "straight")]
    Straight {
        /// Distance in inches, negative to reverse
        distance_in: f64,

        /// Follow a position target rather than ramping percent output
        #[structopt(long)]
        motion_profile: bool,

        /// Heading to hold in degrees, defaults to the heading at the start
        #[structopt(long)]
        heading_deg: Option<f64>,
    },

    /// Ramp up power while recording velocity, for drivetrain
    /// characterisation.
    #[structopt(name = "characterise")]
    Characterise {
        /// Drive backwards
        #[structopt(long)]
        reverse: bool,

        /// Spin in place
        #[structopt(long)]
        turn: bool,
    },
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("robot_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Robot Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: ExecParams = match &opt.params {
        Some(p) => util::params::load_from(p),
        None => util::params::load("robot_exec.toml"),
    }
    .wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let data = data_store::shared();

    let drive = Drive::new(SimDriveHardware::new(params.sim), data.clone());

    let mut velocity_data = None;
    let command: Box<dyn Command> = match opt.mnvr {
        Mnvr::Straight {
            distance_in,
            motion_profile,
            heading_deg,
        } => {
            let mode = if motion_profile {
                DriveControlMode::MotionProfile
            } else {
                DriveControlMode::PercentOutput
            };

            let mut cmd = DriveStraight::new(
                data.clone(),
                data.clone(),
                mode,
                distance_in,
                params.drive_heading_gains,
                params.default_dt_s,
            )
            .with_params(params.drive_straight);

            if let Some(h) = heading_deg {
                cmd = cmd.with_target_heading(h);
            }

            Box::new(cmd)
        }
        Mnvr::Characterise { reverse, turn } => {
            let cmd = CollectVelocityData::new(
                data.clone(),
                data.clone(),
                params.collect_velocity_data,
                reverse,
                turn,
            );
            velocity_data = Some(cmd.data());

            Box::new(cmd)
        }
    };

    let queue = CommandQueue::new(vec![command]);
    let queue_status = queue.status();

    let modules: Vec<Box<dyn Module>> = vec![Box::new(drive), Box::new(queue)];

    let mut loop_mgr = LoopManager::new(params.control_loop_period_s, Clock::new());
    loop_mgr
        .set_modules(modules)
        .wrap_err("Failed to register modules")?;

    for fault in loop_mgr.zero_sensors()? {
        warn!("{}", fault);
    }

    if !loop_mgr.check_modules()? {
        return Err(eyre!("One or more modules failed their self-test"));
    }

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    loop_mgr.start().wrap_err("Failed to start the control loop")?;

    let start = Instant::now();
    let timeout = Duration::from_secs_f64(opt.timeout_s);

    while !queue_status.is_finished() {
        if start.elapsed() > timeout {
            warn!(
                "Manoeuvre not finished after {:.1} s, stopping",
                opt.timeout_s
            );
            break;
        }

        thread::sleep(WAIT_POLL_PERIOD);
    }

    let stats = loop_mgr.stop();

    // ---- SHUTDOWN ----

    for (name, value) in stats.observations() {
        info!("{}: {}", name, value);
    }
    session.save("loop_stats.json", stats);

    if let Some(d) = velocity_data {
        match d.lock() {
            Ok(d) => session.save("velocity_data.json", d.clone()),
            Err(_) => warn!("Velocity data lock poisoned, not saved"),
        }
    }

    info!("End of execution");

    session.exit();

    Ok(())
}
