//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod traj_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the trajectory controller by
/// whoever owns the goal interface (an operator, a script, a planner).
#[derive(Debug, Serialize, Deserialize)]
pub struct Tc {
    /// The type of the telecommand
    pub tc_type: TcType,

    /// The payload associated with this TC
    pub payload: TcPayload,
}

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static TYPE_HAS_NO_PAYLOAD: [TcType; 2] = [TcType::Preempt, TcType::Stop];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Telecommand types.
///
/// The type is used to identify the purpose of the telecommand, and should be
/// used by the telecommand processor to determine what to do with it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum TcType {
    /// Follow the trajectory in the payload.
    Goal,

    /// Abandon the currently running goal so that the next one is spliced on.
    Preempt,

    /// Halt execution immediately.
    Stop,

    SetVel,
    SetAcc,
    SetMaxError,
    SetOverlapTime,
    SetOperationMode,
}

/// Telecommand payload.
///
/// The payload only indicates which serialisation format the data is in.
/// Use [`Tc::decode_payload`] to get at the data.
#[derive(Debug, Serialize, Deserialize)]
pub enum TcPayload {
    None,
    Json(String),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),

    #[error("TC of type {0:?} is expected to have a payload but it doesn't")]
    MissingPayload(TcType),

    #[error("TC of type {0:?} has an invalid payload: {1}")]
    InvalidPayload(TcType, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        // Parse the JSON string into a value
        let val: Value = match serde_json::from_str(json_str) {
            Ok(v) => v,
            Err(e) => return Err(TcParseError::InvalidJson(e)),
        };

        // Get the type of the TC
        let type_str = match val["type"].as_str() {
            Some(s) => s,
            None => {
                return Err(TcParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };
        let tc_type = match TcType::from_str(type_str) {
            Some(t) => t,
            None => {
                return Err(TcParseError::InvalidType(format!(
                    "{} is not a recognised TC type",
                    type_str
                )))
            }
        };

        // Get the payload. If it's null and the type is expected to have one
        // then an error is returned
        if val["payload"].is_null() {
            if !TYPE_HAS_NO_PAYLOAD.contains(&tc_type) {
                return Err(TcParseError::MissingPayload(tc_type));
            }

            return Ok(Tc {
                tc_type,
                payload: TcPayload::None,
            });
        }

        Ok(Tc {
            tc_type,
            payload: TcPayload::Json(val["payload"].to_string()),
        })
    }

    /// Deserialise the payload into the type expected for this TC.
    pub fn decode_payload<T>(&self) -> Result<T, TcParseError>
    where
        T: DeserializeOwned,
    {
        match &self.payload {
            TcPayload::None => Err(TcParseError::MissingPayload(self.tc_type)),
            TcPayload::Json(s) => serde_json::from_str(s)
                .map_err(|e| TcParseError::InvalidPayload(self.tc_type, e)),
        }
    }
}

impl TcType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "GOAL" => Some(TcType::Goal),
            "PREEMPT" => Some(TcType::Preempt),
            "STOP" => Some(TcType::Stop),
            "SET_VEL" => Some(TcType::SetVel),
            "SET_ACC" => Some(TcType::SetAcc),
            "SET_MAX_ERROR" => Some(TcType::SetMaxError),
            "SET_OVERLAP_TIME" => Some(TcType::SetOverlapTime),
            "SET_OPERATION_MODE" => Some(TcType::SetOperationMode),
            _ => None,
        }
    }
}
