mod common;

use common::*;

use adts_proto::device::{self, bind_roles, DeviceManager, DiscoveryConfig, Probe, Role};

fn bound(path: &str, role: Role) -> Probe<SerialSim> {
    let (_instrument, device) = sim_device(role, |_| None);
    Probe::Bound {
        path: path.to_owned(),
        device,
    }
}

#[test]
fn master_and_slave_bind() {
    let probes = vec![
        bound("/dev/ttyUSB0", Role::Master),
        bound("/dev/ttyUSB1", Role::Slave),
    ];

    let (master, slave, aux) = bind_roles(probes).unwrap();
    assert_eq!(master.role, Role::Master);
    assert_eq!(slave.role, Role::Slave);
    assert!(aux.is_none());
}

#[test]
fn aux_unit_is_optional_but_bound_when_present() {
    let probes = vec![
        bound("/dev/ttyUSB2", Role::AuxLoadUnit),
        bound("/dev/ttyUSB0", Role::Master),
        bound("/dev/ttyUSB1", Role::Slave),
    ];

    let (_, _, aux) = bind_roles(probes).unwrap();
    assert_eq!(aux.unwrap().role, Role::AuxLoadUnit);
}

#[test]
fn skipped_candidates_are_ignored() {
    let probes = vec![
        Probe::Skipped {
            path: "/dev/ttyUSB0".to_owned(),
        },
        bound("/dev/ttyUSB1", Role::Master),
        bound("/dev/ttyUSB2", Role::Slave),
    ];

    assert!(bind_roles(probes).is_ok());
}

#[test]
fn duplicate_role_fails_discovery() {
    let probes = vec![
        bound("/dev/ttyUSB0", Role::Master),
        bound("/dev/ttyUSB1", Role::Master),
        bound("/dev/ttyUSB2", Role::Slave),
    ];

    let err = bind_roles(probes).unwrap_err();
    assert!(matches!(
        err,
        device::Error::DuplicateRole { role: Role::Master }
    ));
}

#[test]
fn unrecognized_device_fails_discovery_even_when_roles_bind() {
    let probes = vec![
        bound("/dev/ttyUSB0", Role::Master),
        bound("/dev/ttyUSB1", Role::Slave),
        Probe::Unrecognized {
            path: "/dev/ttyUSB2".to_owned(),
            identity: "ACME,WIDGET,XX99".to_owned(),
        },
    ];

    let err = bind_roles(probes).unwrap_err();
    match err {
        device::Error::UnrecognizedDevice { path, identity } => {
            assert_eq!(path, "/dev/ttyUSB2");
            assert_eq!(identity, "ACME,WIDGET,XX99");
        }
        other => panic!("expected UnrecognizedDevice, got {other:?}"),
    }
}

#[test]
fn missing_slave_is_reported() {
    let probes = vec![bound("/dev/ttyUSB0", Role::Master)];

    let err = bind_roles(probes).unwrap_err();
    assert!(matches!(
        err,
        device::Error::RoleUnbound { role: Role::Slave }
    ));
}

#[test]
fn missing_master_is_reported() {
    let probes: Vec<Probe<SerialSim>> = vec![Probe::Skipped {
        path: "/dev/ttyUSB0".to_owned(),
    }];

    let err = bind_roles(probes).unwrap_err();
    assert!(matches!(
        err,
        device::Error::RoleUnbound { role: Role::Master }
    ));
}

#[test]
fn empty_enumeration_fails_fast() {
    let config = DiscoveryConfig::new("/nonexistent-dir-for-tests/tty*", "SN1", "SN2");
    let err = DeviceManager::discover(&config).unwrap_err();
    assert!(matches!(err, device::Error::NoCandidates { .. }));
}

#[test]
fn malformed_pattern_is_rejected() {
    let config = DiscoveryConfig::new("/dev/tty[", "SN1", "SN2");
    let err = DeviceManager::discover(&config).unwrap_err();
    assert!(matches!(err, device::Error::BadPattern { .. }));
}
