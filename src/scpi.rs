//! The fixed SCPI-style command vocabulary and the verified set-command
//! type.
//!
//! The instruments only understand a small fixed set of ASCII commands;
//! there is no general SCPI grammar here.

use std::io::{Read, Write};

use snafu::Snafu;

use crate::reply;
use crate::transport::{self, Transport};

/// `*IDN?` identity query.
pub const IDENTIFY: &str = "*IDN?";
/// `*CLS` clear status.
pub const CLEAR_STATUS: &str = "*CLS";
/// `*STB?` summary (status byte) register.
pub const READ_SUMMARY: &str = "*STB?";
/// `*ESR?` event status register.
pub const READ_EVENT: &str = "*ESR?";
/// `:STAT:QUES:EVEN?` questionable-status event register.
pub const READ_QUEUE: &str = ":STAT:QUES:EVEN?";
/// `:STAT:OPER:EVEN?` operation status event register.
pub const READ_OPERATION: &str = ":STAT:OPER:EVEN?";
/// `:SYST:ERR?` system error queue drain.
pub const SYSTEM_ERROR: &str = ":SYST:ERR?";
/// `:CONT:EXEC` start the programmed control operation.
pub const CONTROL_EXECUTE: &str = ":CONT:EXEC";
/// `:CONT:GTGR` go to ground (safe vented idle).
pub const GO_TO_GROUND: &str = ":CONT:GTGR";
/// `:MEAS:PS?` measured static pressure.
pub const MEASURE_PS: &str = ":MEAS:PS?";
/// `:MEAS:PT?` measured total pressure.
pub const MEASURE_PT: &str = ":MEAS:PT?";

/// Error type for this module.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(context(false))]
    Transport { source: transport::Error },
    /// The argument of a float-verified command isn't numeric.
    #[snafu(display("not a numeric command argument: {arg:?}"))]
    BadArgument { arg: String },
    /// The instrument's read-back doesn't match the commanded value.
    #[snafu(display("{verify} returned {actual:?}, expected {expected:?}"))]
    VerifyMismatch {
        verify: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Expected {
    /// Exact byte match, line terminator excluded.
    Text(String),
    /// Exact numeric equality of the parsed read-back.
    Reading(f64),
}

/// One outgoing instruction with an optional read-back verification.
///
/// Mirrors the instruments' convention that a `:X:Y VALUE` command is
/// confirmed by the `:X:Y?` query echoing the value.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCommand {
    cmd: String,
    verify: String,
    expected: Expected,
}

impl SetCommand {
    /// A command whose read-back must byte-for-byte equal `arg`.
    pub fn expect_str(cmd: &str, arg: &str, verify: &str) -> SetCommand {
        SetCommand {
            cmd: format!("{cmd} {arg}"),
            verify: verify.to_owned(),
            expected: Expected::Text(arg.to_owned()),
        }
    }

    /// A command whose read-back is compared numerically to `arg`.
    ///
    /// # Errors
    /// [`Error::BadArgument`] if `arg` doesn't parse as a number.
    pub fn expect_float(cmd: &str, arg: &str, verify: &str) -> Result<SetCommand, Error> {
        let expected =
            reply::reading(arg).map_err(|_| Error::BadArgument { arg: arg.to_owned() })?;
        Ok(SetCommand {
            cmd: format!("{cmd} {arg}"),
            verify: verify.to_owned(),
            expected: Expected::Reading(expected),
        })
    }

    /// The full command text as sent on the wire (terminator excluded).
    pub fn text(&self) -> &str {
        &self.cmd
    }

    /// Issue the command, then the verify query, and check the read-back.
    ///
    /// A mismatch is a setup failure and is not retried here; retry is
    /// caller policy.
    pub fn apply<IO: Read + Write>(&self, transport: &mut Transport<IO>) -> Result<(), Error> {
        transport.send(&self.cmd)?;
        let actual = transport.query(&self.verify)?;

        let matches = match &self.expected {
            // exact length and content, terminator already stripped
            Expected::Text(expected) => actual.as_bytes() == expected.as_bytes(),
            Expected::Reading(expected) => match reply::reading(&actual) {
                #[allow(clippy::float_cmp)] // exact equality is the contract
                Ok(value) => value == *expected,
                Err(_) => false,
            },
        };

        if matches {
            Ok(())
        } else {
            let expected = match &self.expected {
                Expected::Text(s) => s.clone(),
                Expected::Reading(v) => v.to_string(),
            };
            VerifyMismatchSnafu {
                verify: self.verify.clone(),
                expected,
                actual,
            }
            .fail()
        }
    }
}
