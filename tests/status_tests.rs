mod common;

use common::*;

use adts_proto::registers::{Esb, Opr, Que, Stb};
use adts_proto::status::{classify, Status, StatusMonitor};

#[test]
fn clear_summary_is_at_goal() {
    let (instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some("0".to_owned()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::AtGoal
    );
    // no detail register was worth reading
    assert_eq!(instrument.borrow().sent, vec!["*STB?"]);
}

#[test]
fn queue_fault_is_an_error() {
    let (instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::QUE.to_string()),
        ":STAT:QUES:EVEN?" => Some(Que::PS_OVERRANGE.to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::Error
    );
    // decoding stops at the first fault
    assert_eq!(instrument.borrow().sent, vec!["*STB?", ":STAT:QUES:EVEN?"]);
}

#[test]
fn event_error_is_drained_and_classified() {
    let (instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::ESB.to_string()),
        "*ESR?" => Some(Esb::DDE.to_string()),
        ":SYST:ERR?" => Some("-350, queue overflow".to_owned()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::Error
    );
    assert_eq!(
        instrument.borrow().sent,
        vec!["*STB?", "*ESR?", ":SYST:ERR?"]
    );
}

#[test]
fn benign_event_bits_are_not_errors() {
    let (_instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::ESB.to_string()),
        "*ESR?" => Some(Esb::OPC.to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::NotIdle
    );
}

#[test]
fn goal_bit_beats_not_idle() {
    let (_instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::OPR.to_string()),
        ":STAT:OPER:EVEN?" => Some((Opr::PS_STABLE | Opr::PS_RAMPING).to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::PS_STABLE)),
        Status::AtGoal
    );
}

#[test]
fn activity_without_goal_is_not_idle() {
    let (_instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::OPR.to_string()),
        ":STAT:OPER:EVEN?" => Some(Opr::PS_RAMPING.to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::PS_STABLE)),
        Status::NotIdle
    );
}

#[test]
fn classification_is_stable_across_polls() {
    let (_instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::OPR.to_string()),
        ":STAT:OPER:EVEN?" => Some(Opr::GROUNDED.to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    for _ in 0..3 {
        assert_eq!(
            classify(&mut transport, &mut monitor, Opr(Opr::GROUNDED)),
            Status::AtGoal
        );
    }
}

#[test]
fn unreadable_summary_is_an_error() {
    let (_instrument, mut transport) = sim_transport(|_| None);
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::Error
    );
}

#[test]
fn unreadable_detail_register_is_an_error() {
    let (instrument, mut transport) = sim_transport(|cmd| match cmd {
        "*STB?" => Some(Stb::QUE.to_string()),
        _ => None,
    });
    let mut monitor = StatusMonitor::new();

    assert_eq!(
        classify(&mut transport, &mut monitor, Opr(Opr::STABLE)),
        Status::Error
    );
    // the queue query was attempted (and retried) before giving up
    assert!(instrument.borrow().sent.len() > 1);
}
