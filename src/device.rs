//! Discovery and role binding of the physical instruments.
//!
//! Candidate serial paths are enumerated by a glob pattern, probed
//! concurrently (one worker per candidate), identified with `*IDN?` and
//! bound to their roles. The role→handle binding is immutable once
//! discovery succeeds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::glob;
use log::{debug, warn};
use snafu::{ensure, Snafu};

use crate::lsu;
use crate::reply::{self, Identity};
use crate::scpi;
use crate::status::StatusMonitor;
use crate::transport::{self, Transport, TransportConfig};

/// An opened physical serial port.
pub type SerialHandle = Box<dyn serialport::SerialPort>;

/// The logical role an instrument plays in the test setup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// The leading pressure-control unit.
    Master,
    /// The measuring/mirroring unit.
    Slave,
    /// The auxiliary load-simulation valve bank.
    AuxLoadUnit,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
            Role::AuxLoadUnit => write!(f, "aux load unit"),
        }
    }
}

/// One identified instrument bound to its transport handle.
pub struct Device<IO> {
    pub role: Role,
    pub identity: Identity,
    pub transport: Transport<IO>,
    pub monitor: StatusMonitor,
}

impl<IO> Device<IO> {
    pub fn new(role: Role, identity: Identity, transport: Transport<IO>) -> Device<IO> {
        Device {
            role,
            identity,
            transport,
            monitor: StatusMonitor::new(),
        }
    }
}

impl<IO> fmt::Debug for Device<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("role", &self.role)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Error type for this module.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("bad serial device pattern {pattern:?}: {source}"))]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },
    /// The enumeration pattern matched nothing at all.
    #[snafu(display("no serial devices match {pattern:?}"))]
    NoCandidates { pattern: String },
    /// A responding device matched neither serial number nor the aux
    /// product token.
    #[snafu(display("unrecognized device on {path}: {identity:?}"))]
    UnrecognizedDevice { path: String, identity: String },
    /// Two devices claimed the same role.
    #[snafu(display("more than one device claims the {role} role"))]
    DuplicateRole { role: Role },
    /// A required role was never bound.
    #[snafu(display("no {role} instrument found"))]
    RoleUnbound { role: Role },
    /// A workflow asked for the aux load unit but none was discovered.
    #[snafu(display("aux load unit not connected"))]
    AuxUnitMissing,
    #[snafu(display("failed to clear status on {role}: {source}"))]
    ClearStatus {
        role: Role,
        source: transport::Error,
    },
}

/// Everything discovery needs to know about the expected hardware.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Glob pattern for candidate serial paths, e.g. `/dev/ttyUSB*`.
    pub pattern: String,
    /// Line rate; the instruments are fixed at 9600.
    pub baud: u32,
    /// Serial number expected in the master's identity reply.
    pub master_serial: String,
    /// Serial number expected in the slave's identity reply.
    pub slave_serial: String,
    /// Product-name token identifying the aux load unit, which reports
    /// no serial number.
    pub aux_product: String,
    pub transport: TransportConfig,
}

impl DiscoveryConfig {
    pub fn new(pattern: &str, master_serial: &str, slave_serial: &str) -> DiscoveryConfig {
        DiscoveryConfig {
            pattern: pattern.to_owned(),
            baud: 9600,
            master_serial: master_serial.to_owned(),
            slave_serial: slave_serial.to_owned(),
            aux_product: lsu::PRODUCT_TOKEN.to_owned(),
            transport: TransportConfig::default(),
        }
    }
}

/// Outcome of probing one candidate path.
#[derive(Debug)]
pub enum Probe<IO> {
    /// The candidate identified itself and claimed a role.
    Bound { path: String, device: Device<IO> },
    /// The candidate could not be opened or did not respond; it is
    /// excluded without failing discovery.
    Skipped { path: String },
    /// The candidate responded with an identity nobody expected.
    Unrecognized { path: String, identity: String },
}

/// Match an identity reply to a role, if any.
fn match_role(idn: &str, identity: &Identity, config: &DiscoveryConfig) -> Option<Role> {
    if idn.contains(&config.master_serial) {
        Some(Role::Master)
    } else if idn.contains(&config.slave_serial) {
        Some(Role::Slave)
    } else if identity.serial.is_none() && idn.contains(&config.aux_product) {
        Some(Role::AuxLoadUnit)
    } else {
        None
    }
}

// The port's own blocking-read timeout; the transport polls around it.
const PORT_TIMEOUT: Duration = Duration::from_millis(50);

fn probe_candidate(path: &Path, config: &DiscoveryConfig) -> Probe<SerialHandle> {
    let path = path.display().to_string();

    let port = match serialport::new(&path, config.baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::Software)
        .timeout(PORT_TIMEOUT)
        .open()
    {
        Ok(port) => port,
        Err(err) => {
            warn!("{path}: could not be opened: {err}");
            return Probe::Skipped { path };
        }
    };

    let mut transport = Transport::with_config(port, config.transport.clone());
    let idn = match transport.query(scpi::IDENTIFY) {
        Ok(idn) => idn,
        Err(err) => {
            warn!("{path}: no identity: {err}");
            return Probe::Skipped { path };
        }
    };
    debug!("{path}: identity {idn:?}");

    let identity = reply::identity(&idn).unwrap_or_else(|_| Identity::unparsed(&idn));
    match match_role(&idn, &identity, config) {
        Some(role) => Probe::Bound {
            path,
            device: Device::new(role, identity, transport),
        },
        None => Probe::Unrecognized {
            path,
            identity: idn,
        },
    }
}

/// Aggregate per-candidate probe results into the three role slots.
///
/// An unrecognized device or a duplicate role claim fails discovery as a
/// whole, even when the other probes succeeded. Master and slave are
/// required; the aux load unit is optional.
pub fn bind_roles<IO>(
    probes: Vec<Probe<IO>>,
) -> Result<(Device<IO>, Device<IO>, Option<Device<IO>>), Error> {
    let mut master = None;
    let mut slave = None;
    let mut aux = None;
    let mut failure: Option<Error> = None;

    for probe in probes {
        match probe {
            Probe::Bound { path, device } => {
                debug!("{path}: bound as {} ({})", device.role, device.identity);
                let slot = match device.role {
                    Role::Master => &mut master,
                    Role::Slave => &mut slave,
                    Role::AuxLoadUnit => &mut aux,
                };
                if slot.is_some() {
                    failure.get_or_insert(Error::DuplicateRole { role: device.role });
                } else {
                    *slot = Some(device);
                }
            }
            Probe::Skipped { path } => debug!("{path}: excluded from discovery"),
            Probe::Unrecognized { path, identity } => {
                failure.get_or_insert(Error::UnrecognizedDevice { path, identity });
            }
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }
    let master = master.ok_or(Error::RoleUnbound { role: Role::Master })?;
    let slave = slave.ok_or(Error::RoleUnbound { role: Role::Slave })?;
    Ok((master, slave, aux))
}

/// The immutable mapping of roles to bound devices.
pub struct DeviceManager {
    master: Device<SerialHandle>,
    slave: Device<SerialHandle>,
    aux: Option<Device<SerialHandle>>,
}

impl fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceManager")
            .field("master", &self.master)
            .field("slave", &self.slave)
            .field("aux", &self.aux)
            .finish()
    }
}

impl DeviceManager {
    /// Enumerate, probe and bind all instruments.
    ///
    /// Each candidate is probed on its own thread since identification
    /// blocks on multi-second serial timeouts; discovery completes only
    /// after every worker has been joined.
    pub fn discover(config: &DiscoveryConfig) -> Result<DeviceManager, Error> {
        let paths: Vec<PathBuf> = glob(&config.pattern)
            .map_err(|source| Error::BadPattern {
                pattern: config.pattern.clone(),
                source,
            })?
            .filter_map(Result::ok)
            .collect();
        ensure!(
            !paths.is_empty(),
            NoCandidatesSnafu {
                pattern: &config.pattern
            }
        );
        debug!("{} candidate device(s) match {}", paths.len(), config.pattern);

        let probes: Vec<Probe<SerialHandle>> = std::thread::scope(|scope| {
            let workers: Vec<_> = paths
                .iter()
                .map(|path| scope.spawn(move || probe_candidate(path, config)))
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().expect("BUG: probe worker panicked"))
                .collect()
        });

        let (mut master, mut slave, mut aux) = bind_roles(probes)?;

        for device in [&mut master, &mut slave].into_iter().chain(aux.as_mut()) {
            device
                .transport
                .send(scpi::CLEAR_STATUS)
                .map_err(|source| Error::ClearStatus {
                    role: device.role,
                    source,
                })?;
        }

        Ok(DeviceManager { master, slave, aux })
    }

    pub fn master(&mut self) -> &mut Device<SerialHandle> {
        &mut self.master
    }

    pub fn slave(&mut self) -> &mut Device<SerialHandle> {
        &mut self.slave
    }

    /// The aux load unit, if one was discovered.
    ///
    /// # Errors
    /// [`Error::AuxUnitMissing`] for workflows that require it.
    pub fn aux_unit(&mut self) -> Result<&mut Device<SerialHandle>, Error> {
        self.aux.as_mut().ok_or(Error::AuxUnitMissing)
    }
}
