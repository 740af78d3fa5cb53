#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use adts_proto::device::{Device, Role};
use adts_proto::reply::Identity;
use adts_proto::{Transport, TransportConfig};

/// Computes the instrument's reply to one received command line, or
/// `None` to stay silent.
pub type Responder = Box<dyn FnMut(&str) -> Option<String>>;

/// A scripted instrument on the other end of the line.
pub struct Instrument {
    responder: Responder,
    rx: VecDeque<u8>,
    partial: Vec<u8>,
    /// Every complete command line received, in order.
    pub sent: Vec<String>,
    /// Fail the next N reads with a hard I/O error.
    pub read_errors: u32,
    /// Fail the next N writes with a hard I/O error.
    pub write_errors: u32,
    /// Swallow the replies to the next N commands.
    pub drop_replies: u32,
}

impl Instrument {
    pub fn new(
        responder: impl FnMut(&str) -> Option<String> + 'static,
    ) -> Rc<RefCell<Instrument>> {
        Rc::new(RefCell::new(Instrument {
            responder: Box::new(responder),
            rx: VecDeque::new(),
            partial: Vec::new(),
            sent: Vec::new(),
            read_errors: 0,
            write_errors: 0,
            drop_replies: 0,
        }))
    }

    fn command(&mut self, line: String) {
        self.sent.push(line.clone());
        if self.drop_replies > 0 {
            self.drop_replies -= 1;
            return;
        }
        if let Some(reply) = (self.responder)(&line) {
            self.rx.extend(reply.bytes());
            self.rx.push_back(b'\n');
        }
    }
}

/// The host-side endpoint of the simulated serial line.
pub struct SerialSim(Rc<RefCell<Instrument>>);

impl SerialSim {
    pub fn new(instrument: &Rc<RefCell<Instrument>>) -> SerialSim {
        SerialSim(Rc::clone(instrument))
    }
}

impl Read for SerialSim {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.read_errors > 0 {
            inner.read_errors -= 1;
            return Err(Error::new(ErrorKind::PermissionDenied, "injected read error"));
        }
        if inner.rx.is_empty() {
            // a real serial handle blocks, then reports a timeout
            return Err(Error::new(ErrorKind::TimedOut, "no data"));
        }
        let mut n = 0;
        while n < buf.len() {
            match inner.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for SerialSim {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.write_errors > 0 {
            inner.write_errors -= 1;
            return Err(Error::new(ErrorKind::PermissionDenied, "injected write error"));
        }
        for &byte in buf {
            if byte == b'\n' {
                let line = String::from_utf8(std::mem::take(&mut inner.partial))
                    .expect("test sent non-UTF8 command");
                inner.command(line);
            } else {
                inner.partial.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Transport timings shrunk so the retry budget runs in milliseconds.
pub fn fast_config() -> TransportConfig {
    TransportConfig {
        attempts: 3,
        read_timeout: Duration::from_millis(10),
        write_retry_delay: Duration::from_millis(5),
        write_spacing: Duration::from_millis(1),
    }
}

/// A transport wired to a fresh scripted instrument.
pub fn sim_transport(
    responder: impl FnMut(&str) -> Option<String> + 'static,
) -> (Rc<RefCell<Instrument>>, Transport<SerialSim>) {
    let instrument = Instrument::new(responder);
    let transport = Transport::with_config(SerialSim::new(&instrument), fast_config());
    (instrument, transport)
}

pub fn test_identity(serial: Option<&str>) -> Identity {
    Identity {
        manufacturer: "DRUCK".to_owned(),
        model: "ADTS 25XX".to_owned(),
        serial: serial.map(str::to_owned),
        revision: Some("V1.02".to_owned()),
    }
}

/// A bound device backed by a scripted instrument.
pub fn sim_device(
    role: Role,
    responder: impl FnMut(&str) -> Option<String> + 'static,
) -> (Rc<RefCell<Instrument>>, Device<SerialSim>) {
    let (instrument, transport) = sim_transport(responder);
    let device = Device::new(role, test_identity(Some("SN0000")), transport);
    (instrument, device)
}
