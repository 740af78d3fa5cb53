//! Goal-seeking control operations.
//!
//! [`run`] drives one instrument toward a goal mask by polling the status
//! decoder, with timeout and hook-based error recovery. [`setup`]
//! programs the channel mode, units, setpoints and rates with verified
//! commands before a run.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use snafu::Snafu;

use crate::device::Device;
use crate::registers::Opr;
use crate::scpi::{self, SetCommand};
use crate::status::{self, Status};
use crate::transport::{self, Transport};

/// Error type for this module.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The deadline elapsed before the goal mask was reached.
    #[snafu(display("control not completed within {deadline:?}"))]
    TimedOut { deadline: Duration },
    /// Status classification reported an error and no hook recovered it.
    #[snafu(display("instrument entered an error state"))]
    InstrumentFault,
    /// The goal was reached but the cycle hook never accepted the
    /// measured values.
    #[snafu(display("goal reached but not within expected range"))]
    NotWithinRange,
    /// The per-cycle hook failed outright.
    #[snafu(display("cycle hook aborted the control operation: {detail}"))]
    CycleAborted { detail: String },
    #[snafu(context(false))]
    Transport { source: transport::Error },
    #[snafu(context(false))]
    Setup { source: scpi::Error },
}

/// Deadline and polling policy for one control operation.
#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Overall deadline; [`Duration::ZERO`] disables the timeout.
    pub deadline: Duration,
    /// Pause between status polls.
    pub poll_interval: Duration,
}

impl Default for ControlOptions {
    fn default() -> Self {
        ControlOptions {
            deadline: Duration::ZERO,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl ControlOptions {
    pub fn with_deadline(deadline: Duration) -> ControlOptions {
        ControlOptions {
            deadline,
            ..ControlOptions::default()
        }
    }
}

/// Optional callbacks for one control operation.
///
/// `on_start` replaces the default `:CONT:EXEC`. `on_error` may recover
/// from an error classification by returning `true`. `each_cycle` runs
/// once per non-terminal poll; returning `Ok(true)` latches its
/// acceptance condition, and an `Err` aborts the run.
pub struct Hooks<'a, IO> {
    pub on_start: Option<Box<dyn FnMut(&mut Transport<IO>) -> Result<(), transport::Error> + 'a>>,
    pub on_error: Option<Box<dyn FnMut(&mut Transport<IO>) -> bool + 'a>>,
    pub each_cycle: Option<Box<dyn FnMut(&mut Transport<IO>) -> Result<bool, Error> + 'a>>,
}

impl<'a, IO> Hooks<'a, IO> {
    pub fn none() -> Hooks<'a, IO> {
        Hooks {
            on_start: None,
            on_error: None,
            each_cycle: None,
        }
    }
}

impl<'a, IO> Default for Hooks<'a, IO> {
    fn default() -> Self {
        Hooks::none()
    }
}

/// Drive `device` until any bit of `goal` is reached, an unrecovered
/// error occurs, or the deadline passes.
pub fn run<IO: Read + Write>(
    device: &mut Device<IO>,
    goal: Opr,
    options: &ControlOptions,
    hooks: &mut Hooks<'_, IO>,
) -> Result<(), Error> {
    match hooks.on_start.as_mut() {
        Some(start) => start(&mut device.transport)?,
        None => device.transport.send(scpi::CONTROL_EXECUTE)?,
    }
    let started = Instant::now();
    debug!("{}: seeking goal mask {:#06x}", device.role, goal.bits());

    // With no cycle hook the acceptance condition is vacuously met.
    let mut accepted = hooks.each_cycle.is_none();

    loop {
        let classification =
            status::classify(&mut device.transport, &mut device.monitor, goal);

        if classification == Status::Error {
            let recovered = match hooks.on_error.as_mut() {
                Some(recover) => recover(&mut device.transport),
                None => false,
            };
            if !recovered {
                return InstrumentFaultSnafu.fail();
            }
            warn!("{}: error recovered, polling continues", device.role);
        }

        status::report_pressures_if_changed(&mut device.transport, &mut device.monitor);

        if classification == Status::AtGoal {
            if !accepted {
                return NotWithinRangeSnafu.fail();
            }
            info!("{}: goal reached after {:?}", device.role, started.elapsed());
            return Ok(());
        }

        if !options.deadline.is_zero() && started.elapsed() > options.deadline {
            return TimedOutSnafu {
                deadline: options.deadline,
            }
            .fail();
        }

        if let Some(cycle) = hooks.each_cycle.as_mut() {
            if cycle(&mut device.transport)? {
                accepted = true;
            }
        }

        std::thread::sleep(options.poll_interval);
    }
}

/// Drive the instrument back to its safe, vented ground state.
pub fn go_to_ground<IO: Read + Write>(
    device: &mut Device<IO>,
    options: &ControlOptions,
) -> Result<(), Error> {
    let mut hooks = Hooks::none();
    hooks.on_start = Some(Box::new(|transport| transport.send(scpi::GO_TO_GROUND)));
    run(device, Opr(Opr::GROUNDED), options, &mut hooks)
}

/// Which pressure channel(s) a control operation drives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Channel {
    Ps,
    Pt,
    Dual,
}

impl Channel {
    /// The operation-register bits that mean "setpoint reached" for this
    /// channel selection.
    pub const fn goal(self) -> Opr {
        match self {
            Channel::Ps => Opr(Opr::PS_STABLE),
            Channel::Pt => Opr(Opr::PT_STABLE),
            Channel::Dual => Opr(Opr::STABLE),
        }
    }

    const fn mode_arg(self) -> &'static str {
        match self {
            Channel::Ps => "PS",
            Channel::Pt => "PT",
            Channel::Dual => "DUAL",
        }
    }
}

/// Target setpoints and slew rates, as the ASCII text sent on the wire.
/// `None` leaves the instrument's current value untouched.
#[derive(Debug, Default, Copy, Clone)]
pub struct Setpoints<'a> {
    pub ps: Option<&'a str>,
    pub ps_rate: Option<&'a str>,
    pub pt: Option<&'a str>,
    pub pt_rate: Option<&'a str>,
}

/// Program control mode, channel selection, units, setpoints and rates,
/// verifying every command's read-back.
///
/// # Errors
/// The first failing exchange or verification mismatch aborts the setup.
pub fn setup<IO: Read + Write>(
    device: &mut Device<IO>,
    channel: Channel,
    ps_units: &str,
    pt_units: &str,
    setpoints: &Setpoints<'_>,
) -> Result<(), Error> {
    let mut commands = vec![
        SetCommand::expect_str(":SYST:MODE", "CTRL", ":SYST:MODE?"),
        SetCommand::expect_str(":CONT:MODE", channel.mode_arg(), ":CONT:MODE?"),
    ];

    if channel != Channel::Pt {
        commands.push(SetCommand::expect_str(
            ":CONT:PS:UNITS",
            ps_units,
            ":CONT:PS:UNITS?",
        ));
        if let Some(ps) = setpoints.ps {
            commands.push(SetCommand::expect_str(":CONT:PS:SETP", ps, ":CONT:PS:SETP?"));
        }
        if let Some(rate) = setpoints.ps_rate {
            commands.push(SetCommand::expect_str(":CONT:PS:RATE", rate, ":CONT:PS:RATE?"));
        }
    }

    if channel != Channel::Ps {
        commands.push(SetCommand::expect_str(
            ":CONT:PT:UNITS",
            pt_units,
            ":CONT:PT:UNITS?",
        ));
        if let Some(pt) = setpoints.pt {
            commands.push(SetCommand::expect_str(":CONT:PT:SETP", pt, ":CONT:PT:SETP?"));
        }
        if let Some(rate) = setpoints.pt_rate {
            // the Pt rate read-back is numeric, not a string echo
            commands.push(SetCommand::expect_float(
                ":CONT:PT:RATE",
                rate,
                ":CONT:PT:RATE?",
            )?);
        }
    }

    for command in &commands {
        command.apply(&mut device.transport)?;
    }
    Ok(())
}
