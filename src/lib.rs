//! Serial SCPI control and monitoring of 25XX-series air data test sets.
//!
//! The crate drives pressure/altitude test instruments (plus an auxiliary
//! load-simulation unit) over half-duplex serial lines, using the
//! instruments' small fixed SCPI-style ASCII vocabulary. Four layers
//! build on each other:
//!
//! * [`transport`] — one command in, at most one response out, with
//!   bounded retries and the in-band `ERROR` sentinel handled.
//! * [`device`] — concurrent discovery of the physical instruments and
//!   binding to their master/slave/aux roles.
//! * [`status`] — the four-register status hierarchy reduced to a single
//!   goal/error/busy classification.
//! * [`control`] — the goal-seeking polling loop with timeout and
//!   hook-based error recovery.
//!
//! Everything but physical port opening is generic over
//! `std::io::Read + Write`, so the whole protocol stack can run against
//! a simulated line.
//!
//! # Example
//!
//! ```no_run
//! use adts_proto::control::{self, Channel, ControlOptions, Hooks, Setpoints};
//! use adts_proto::device::{DeviceManager, DiscoveryConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DiscoveryConfig::new("/dev/ttyUSB*", "SN1234", "SN5678");
//! let mut devices = DeviceManager::discover(&config)?;
//!
//! let setpoints = Setpoints {
//!     ps: Some("-2000"),
//!     ps_rate: Some("3000"),
//!     ..Setpoints::default()
//! };
//! control::setup(devices.master(), Channel::Ps, "FT", "KTS", &setpoints)?;
//! control::run(
//!     devices.master(),
//!     Channel::Ps.goal(),
//!     &ControlOptions::with_deadline(Duration::from_secs(300)),
//!     &mut Hooks::none(),
//! )?;
//! # Ok(()) }
//! ```

mod buffer;
pub mod control;
pub mod device;
pub mod lsu;
pub mod registers;
pub mod reply;
pub mod scpi;
pub mod status;
pub mod transport;

pub use crate::device::{Device, DeviceManager, DiscoveryConfig, Role};
pub use crate::registers::{Esb, Opr, Que, Stb};
pub use crate::reply::Identity;
pub use crate::status::{classify, Status, StatusMonitor};
pub use crate::transport::{Transport, TransportConfig};
