//! Operations against the auxiliary load-simulation unit (LSU), a bank
//! of eight solenoid valves used for load tests.
//!
//! Only the programmatic side lives here; confirming an indicator light
//! with the operator is the caller's business.

use std::io::{Read, Write};

use log::info;
use snafu::Snafu;

use crate::scpi::{self, SetCommand};
use crate::transport::{self, Transport};

/// Product-name token the LSU reports in its identity reply. It carries
/// no serial number, which is how discovery tells it apart from the
/// pressure-control units.
pub const PRODUCT_TOKEN: &str = "LSU";

/// Number of output valves fitted to a healthy unit.
pub const VALVE_COUNT: &str = "8";

/// Error type for this module.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(context(false))]
    Transport { source: transport::Error },
    #[snafu(context(false))]
    Command { source: scpi::Error },
    #[snafu(display("LSU power-on self test failed: {detail}"))]
    SelfTestFailed { detail: String },
    #[snafu(display("expected {VALVE_COUNT} valves, unit reports {actual}"))]
    WrongValveCount { actual: String },
    #[snafu(display("valve {valve} is not fitted"))]
    NotFitted { valve: String },
    #[snafu(display("valve {valve} reports an error"))]
    ValveFault { valve: String },
    #[snafu(display("valve {valve} is {actual}, expected {expected}"))]
    UnexpectedState {
        valve: String,
        expected: String,
        actual: String,
    },
}

/// Commanded position of a valve.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValveState {
    Open,
    Close,
}

impl ValveState {
    const fn arg(self) -> &'static str {
        match self {
            ValveState::Open => "OPEN",
            ValveState::Close => "CLOSE",
        }
    }
}

/// Clear the unit's status registers.
pub fn clear_status<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    transport.send(scpi::CLEAR_STATUS)?;
    Ok(())
}

/// Check the power-on self test result; on failure the unit's error
/// queue is drained into the error detail.
pub fn power_on_self_test<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    let result = transport.query("*TST?")?;
    if result == "1" {
        return Ok(());
    }
    let detail = transport
        .query("SYST:ERR?")
        .unwrap_or_else(|err| format!("error queue unreadable: {err}"));
    SelfTestFailedSnafu { detail }.fail()
}

/// Confirm the expected number of output valves is fitted.
pub fn check_valve_count<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    let actual = transport.query("OUTP:VALV:MAX?")?;
    if actual == VALVE_COUNT {
        Ok(())
    } else {
        WrongValveCountSnafu { actual }.fail()
    }
}

/// Run the switch-activation self test. The read-back is numeric.
pub fn switch_self_test<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    let result = transport.query_reading("TEST:SWIT:ACT?")?;
    #[allow(clippy::float_cmp)]
    if result == 1.0 {
        Ok(())
    } else {
        SelfTestFailedSnafu {
            detail: format!("TEST:SWIT:ACT? returned {result}"),
        }
        .fail()
    }
}

/// Check that `valve` is physically fitted.
pub fn check_fitted<IO: Read + Write>(
    transport: &mut Transport<IO>,
    valve: &str,
) -> Result<(), Error> {
    let conf = transport.query(&format!("OUTP:VALV:CONF? {valve}"))?;
    if conf == "*** Not Fitted***" {
        NotFittedSnafu { valve }.fail()
    } else {
        Ok(())
    }
}

/// Read the reported state of `valve` (`OPEN` or `CLOSE`).
pub fn valve_state<IO: Read + Write>(
    transport: &mut Transport<IO>,
    valve: &str,
) -> Result<String, Error> {
    Ok(transport.query(&format!("OUTP:VALV:STAT? {valve}"))?)
}

/// Check that `valve` reports no error flag.
pub fn check_valve_error<IO: Read + Write>(
    transport: &mut Transport<IO>,
    valve: &str,
) -> Result<(), Error> {
    let flag = transport.query(&format!("OUTP:VALV:ERR? {valve}"))?;
    if flag == "0" {
        Ok(())
    } else {
        ValveFaultSnafu { valve }.fail()
    }
}

/// Drive `valve` to `state` and verify the read-back.
pub fn set_valve<IO: Read + Write>(
    transport: &mut Transport<IO>,
    valve: &str,
    state: ValveState,
) -> Result<(), Error> {
    info!("valve {valve}: commanding {}", state.arg());
    SetCommand::expect_str(
        &format!("OUTP:VALV:STAT {valve}"),
        state.arg(),
        &format!("OUTP:VALV:STAT? {valve}"),
    )
    .apply(transport)?;
    Ok(())
}

/// Open every valve at once. Not individually verified.
pub fn open_all<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    transport.send("OUTP:ALL OPEN")?;
    Ok(())
}

/// Close every valve at once. Not individually verified.
pub fn close_all<IO: Read + Write>(transport: &mut Transport<IO>) -> Result<(), Error> {
    transport.send("OUTP:ALL CLOSE")?;
    Ok(())
}
