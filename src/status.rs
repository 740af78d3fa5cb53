//! Reduction of the four-register status hierarchy into one
//! classification against a goal mask.
//!
//! The summary register gates which detail registers are queried at all,
//! trading completeness for poll latency: if a summary bit isn't set,
//! that detail register is simply not read this cycle.

use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::registers::{Esb, Opr, Que, Stb};
use crate::scpi;
use crate::transport::Transport;

/// Classification of one status poll relative to a goal mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    /// A goal bit is set, or nothing is outstanding at all.
    AtGoal,
    /// A register read failed or a fault/error bit is set.
    Error,
    /// The instrument reports activity but no goal bit yet.
    NotIdle,
}

/// Last-seen register values and process readings for one device.
///
/// Retained purely to suppress repeated identical log lines; it never
/// affects the classification itself.
#[derive(Debug, Default)]
pub struct StatusMonitor {
    last_que: Option<Que>,
    last_esb: Option<Esb>,
    last_opr: Option<Opr>,
    last_ps: Option<String>,
    last_pt: Option<String>,
}

impl StatusMonitor {
    pub fn new() -> StatusMonitor {
        StatusMonitor::default()
    }

    /// Log each set queue fault bit, but only when its value changed
    /// since the previous poll.
    fn note_queue(&mut self, que: Que) {
        let changed = match self.last_que.replace(que) {
            Some(previous) => previous.bits() ^ que.bits(),
            None => que.bits(),
        };
        for (bit, cause) in Que::FAULT_CAUSES {
            if changed & bit != 0 {
                if que.contains(bit) {
                    warn!("instrument fault: {cause}");
                } else {
                    info!("instrument fault cleared: {cause}");
                }
            }
        }
    }

    fn note_event(&mut self, esb: Esb) {
        if self.last_esb.replace(esb) != Some(esb) {
            debug!("event status now {:#06x}", esb.bits());
        }
    }

    fn note_operation(&mut self, opr: Opr) {
        if self.last_opr.replace(opr) != Some(opr) {
            debug!("operation status now {:#06x}", opr.bits());
        }
    }
}

/// Classify the instrument's current status against `goal`.
///
/// Decoding order is fixed: the summary register first, then each detail
/// register only if its summary bit is set. A read failure anywhere, any
/// queue fault bit, or any event error bit is [`Status::Error`]; a goal
/// bit set in the operation register is [`Status::AtGoal`] and beats the
/// not-idle downgrade. Given the same register values the result is
/// always the same; `monitor` only dedups the logging.
pub fn classify<IO: Read + Write>(
    transport: &mut Transport<IO>,
    monitor: &mut StatusMonitor,
    goal: Opr,
) -> Status {
    let stb = match transport.query_register(scpi::READ_SUMMARY) {
        Ok(bits) => Stb(bits),
        Err(err) => {
            warn!("summary register unreadable: {err}");
            return Status::Error;
        }
    };

    // Nothing outstanding at all counts as "at goal".
    let mut status = if stb.is_clear() {
        Status::AtGoal
    } else {
        Status::NotIdle
    };

    if stb.contains(Stb::QUE) {
        let que = match transport.query_register(scpi::READ_QUEUE) {
            Ok(bits) => Que(bits),
            Err(err) => {
                warn!("queue register unreadable: {err}");
                return Status::Error;
            }
        };
        monitor.note_queue(que);
        if que.has_faults() {
            return Status::Error;
        }
    }

    if stb.contains(Stb::ESB) {
        let esb = match transport.query_register(scpi::READ_EVENT) {
            Ok(bits) => Esb(bits),
            Err(err) => {
                warn!("event register unreadable: {err}");
                return Status::Error;
            }
        };
        monitor.note_event(esb);
        if esb.has_errors() {
            // drain the instrument's own pending-error queue
            match transport.query(scpi::SYSTEM_ERROR) {
                Ok(detail) => warn!("instrument error: {detail}"),
                Err(err) => warn!("error queue unreadable: {err}"),
            }
            return Status::Error;
        }
    }

    if stb.contains(Stb::OPR) {
        let opr = match transport.query_register(scpi::READ_OPERATION) {
            Ok(bits) => Opr(bits),
            Err(err) => {
                warn!("operation register unreadable: {err}");
                return Status::Error;
            }
        };
        monitor.note_operation(opr);
        // reaching the goal always wins over the not-idle downgrade
        if opr.contains(goal.bits()) {
            status = Status::AtGoal;
        }
    }

    status
}

/// Report the measured static and total pressures, suppressing output
/// when neither value changed since the last report. Read failures only
/// degrade the reporting; they never fail the caller.
pub fn report_pressures_if_changed<IO: Read + Write>(
    transport: &mut Transport<IO>,
    monitor: &mut StatusMonitor,
) {
    let ps = match transport.query(scpi::MEASURE_PS) {
        Ok(value) => value,
        Err(err) => {
            warn!("Ps unreadable: {err}");
            return;
        }
    };
    let pt = match transport.query(scpi::MEASURE_PT) {
        Ok(value) => value,
        Err(err) => {
            warn!("Pt unreadable: {err}");
            return;
        }
    };

    let ps_changed = monitor.last_ps.replace(ps.clone()).as_deref() != Some(ps.as_str());
    let pt_changed = monitor.last_pt.replace(pt.clone()).as_deref() != Some(pt.as_str());
    if ps_changed || pt_changed {
        info!("Ps {ps} | Pt {pt}");
    }
}
