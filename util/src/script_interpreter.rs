//! # Telecommand script interpreter module
//!
//! This module provides an interpreter for trajectory controller scripts,
//! allowing telecommands (goals, preemptions, parameter changes) to be
//! executed at scripted times.
//!
//! Scripts contain one command per line in the form `<time_s>: <tc json>;`,
//! any other line is ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use comms_if::tc::{Tc, TcParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
pub struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    /// The Telecommand to run
    tc: Tc,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use
/// `.get_pending_tcs` to acquire a list of telecommands that need executing.
pub struct ScriptInterpreter {
    _script_path: PathBuf,
    cmds: VecDeque<Command>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)"
    )]
    InvalidTimestamp(String),

    #[error("Script contains an invalid TC at {0} s: {1}")]
    InvalidTc(f64, TcParseError),

    #[error("Script timestamps must not decrease, found {1} s after {0} s")]
    OutOfOrder(f64, f64),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error),
}

pub enum PendingTcs {
    None,
    Some(Vec<Tc>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());

        // Check that the script file exists.
        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        // Load the script into a string
        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        Ok(ScriptInterpreter {
            _script_path: path,
            cmds: parse_script(&script)?,
        })
    }

    /// Create a new interpreter directly from script text.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        Ok(ScriptInterpreter {
            _script_path: PathBuf::new(),
            cmds: parse_script(script)?,
        })
    }

    /// Return the TCs whose execution time is before `current_time_s`.
    pub fn get_pending_tcs(&mut self, current_time_s: f64) -> PendingTcs {
        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.cmds.is_empty() {
            return PendingTcs::EndOfScript;
        }

        let mut tc_vec: Vec<Tc> = vec![];

        // Pop items from the queue while the head's exec time is lower than
        // the current time.
        while let Some(cmd) = self.cmds.front() {
            if cmd.exec_time_s >= current_time_s {
                break;
            }
            if let Some(cmd) = self.cmds.pop_front() {
                tc_vec.push(cmd.tc);
            }
        }

        if tc_vec.is_empty() {
            PendingTcs::None
        } else {
            PendingTcs::Some(tc_vec)
        }
    }

    /// Get the number of TCs remaining in the script
    pub fn get_num_tcs(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_script(script: &str) -> Result<VecDeque<Command>, ScriptError> {
    let mut tc_queue: VecDeque<Command> = VecDeque::new();

    // Timestamp, colon, then everything up to the terminating semicolon
    let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
        .multi_line(true)
        .build()
        .map_err(ScriptError::PatternError)?;

    for cap in re.captures_iter(script) {
        let (time_str, tc_str) = match (cap.get(1), cap.get(3)) {
            (Some(t), Some(c)) => (t.as_str(), c.as_str()),
            _ => continue,
        };

        let exec_time_s: f64 = time_str
            .parse()
            .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

        // The scripts contain JSON only.
        let tc = Tc::from_json(tc_str).map_err(|e| ScriptError::InvalidTc(exec_time_s, e))?;

        if let Some(prev) = tc_queue.back() {
            if exec_time_s < prev.exec_time_s {
                return Err(ScriptError::OutOfOrder(prev.exec_time_s, exec_time_s));
            }
        }

        tc_queue.push_back(Command { exec_time_s, tc });
    }

    if tc_queue.is_empty() {
        return Err(ScriptError::ScriptEmpty);
    }

    Ok(tc_queue)
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::TcType;

    const SCRIPT: &str = r#"
# Two goals, the second preempts the first
0.5: {"type": "GOAL", "payload": {"points": [{"positions": [0.1, 0.2]}]}};
1.0: {"type": "PREEMPT"};
1.0: {"type": "GOAL", "payload": {"points": [{"positions": [0.3, 0.4]}, {"positions": [0.5, 0.6]}]}};
2.5: {"type": "SET_VEL", "payload": 0.3};
"#;

    #[test]
    fn test_parse_script() {
        let mut si = ScriptInterpreter::from_str(SCRIPT).unwrap();
        assert_eq!(si.get_num_tcs(), 4);
        assert_eq!(si.get_duration(), 2.5);

        assert!(matches!(si.get_pending_tcs(0.1), PendingTcs::None));

        match si.get_pending_tcs(1.1) {
            PendingTcs::Some(tcs) => {
                let types: Vec<TcType> = tcs.iter().map(|t| t.tc_type).collect();
                assert_eq!(types, vec![TcType::Goal, TcType::Preempt, TcType::Goal]);
            }
            _ => panic!("Expected pending TCs"),
        }

        assert!(matches!(si.get_pending_tcs(3.0), PendingTcs::Some(_)));
        assert!(matches!(si.get_pending_tcs(4.0), PendingTcs::EndOfScript));
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            ScriptInterpreter::from_str("# nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_str("1.0: {\"type\": \"JUMP\"};"),
            Err(ScriptError::InvalidTc(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_str("2.0: {\"type\": \"STOP\"};\n1.0: {\"type\": \"STOP\"};"),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::new("/no/such/script.tcs"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
