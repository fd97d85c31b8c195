//! Main trajectory controller executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the simulated arm and start the trajectory controller, which
//!       runs its follow loop on a dedicated thread
//!     - Main loop:
//!         - Telecommand processing from the script, goals are dispatched on
//!           their own threads
//!     - Wait for outstanding goals, then shut the controller down

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use traj_lib::{
    feedback::JointFeedback,
    sim::{LinearGenerator, SimActuator},
    traj_ctrl::{Params, TrajCtrl},
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use structopt::StructOpt;

// Internal
use tc_processor::GoalThreads;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
    time::secs_to_duration,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which the script is checked for pending TCs.
const TC_POLL_PERIOD: Duration = Duration::from_millis(10);

/// Default parameter file, relative to `$TRAJ_SW_ROOT/params`.
const PARAMS_FILE: &str = "traj_ctrl.toml";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "traj_exec", about = "Joint trajectory controller")]
struct Opts {
    /// Telecommand script to execute
    #[structopt(parse(from_os_str))]
    script: PathBuf,

    /// Parameter file to use instead of the default in the params directory
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Minimum log level, one of info, debug or trace
    #[structopt(short, long, default_value = "debug")]
    log_level: LevelFilter,

    /// Delay before the simulated arm confirms a mode request
    ///
    /// Units: seconds
    #[structopt(long, default_value = "0.2")]
    sim_mode_delay: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("traj_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Trajectory Controller Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let params: Params = match opts.params {
        Some(ref path) => util::params::load_from_path(path),
        None => util::params::load(PARAMS_FILE),
    }
    .wrap_err("Could not load trajectory control params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    info!("Loading script from {:?}", opts.script);

    let mut si = ScriptInterpreter::new(&opts.script).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} TCs\n",
        si.get_duration(),
        si.get_num_tcs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let feedback = Arc::new(JointFeedback::new(
        params.joint_names.clone(),
        params.operation_mode,
    ));

    let actuator = Arc::new(SimActuator::new(
        feedback.clone(),
        params.cycle_period(),
        Some(secs_to_duration(opts.sim_mode_delay)),
    ));

    let generator = Box::new(LinearGenerator::new(params.cycle_period()));

    let traj_ctrl = Arc::new(
        TrajCtrl::new(params, generator, actuator, feedback)
            .wrap_err("Failed to initialise TrajCtrl")?,
    );
    info!("TrajCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut goals = GoalThreads::default();

    loop {
        match si.get_pending_tcs(session::get_elapsed_seconds()) {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(&traj_ctrl, tc, &mut goals);
                }
            }
            // Exit if end of script reached
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                break;
            }
        }

        thread::sleep(TC_POLL_PERIOD);
    }

    // ---- SHUTDOWN ----

    info!("Waiting for {} goal(s) to finish", goals.num_pending());
    goals.join_all();

    traj_ctrl
        .shutdown()
        .wrap_err("Failed to shut down TrajCtrl")?;

    info!("End of execution");

    session.exit();

    Ok(())
}
