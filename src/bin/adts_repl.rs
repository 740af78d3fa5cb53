//! Interactive console for poking at the instruments: discover them,
//! then issue raw or canned commands from a prompt.

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use adts_proto::control::{self, ControlOptions, Hooks};
use adts_proto::device::{Device, DeviceManager, DiscoveryConfig, SerialHandle};
use adts_proto::registers::Opr;
use adts_proto::scpi;
use adts_proto::status;

#[derive(Copy, Clone, PartialEq)]
enum Target {
    Master,
    Slave,
    Aux,
}

fn select<'a>(
    devices: &'a mut DeviceManager,
    target: Target,
) -> Result<&'a mut Device<SerialHandle>, Box<dyn Error>> {
    Ok(match target {
        Target::Master => devices.master(),
        Target::Slave => devices.slave(),
        Target::Aux => devices.aux_unit()?,
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let pattern = args.next().unwrap_or_else(|| "/dev/ttyUSB*".to_owned());
    let master_sn = args.next().ok_or("usage: adts_repl <pattern> <master-sn> <slave-sn>")?;
    let slave_sn = args.next().ok_or("usage: adts_repl <pattern> <master-sn> <slave-sn>")?;

    let config = DiscoveryConfig::new(&pattern, &master_sn, &slave_sn);
    let mut devices = DeviceManager::discover(&config)?;
    println!("master: {}", devices.master().identity);
    println!("slave:  {}", devices.slave().identity);

    let mut target = Target::Master;
    let mut stdout = std::io::stdout();
    loop {
        print!(">> ");
        stdout.flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let result: Result<(), Box<dyn Error>> = match words.next() {
            None => continue,
            Some("quit") | Some("q") => break,
            Some("use") => match words.next() {
                Some("master") => {
                    target = Target::Master;
                    Ok(())
                }
                Some("slave") => {
                    target = Target::Slave;
                    Ok(())
                }
                Some("aux") => {
                    target = Target::Aux;
                    Ok(())
                }
                _ => Err("use master|slave|aux".into()),
            },
            Some("idn") => select(&mut devices, target).and_then(|dev| {
                println!("{}", dev.transport.query(scpi::IDENTIFY)?);
                Ok(())
            }),
            Some("status") => select(&mut devices, target).and_then(|dev| {
                let status =
                    status::classify(&mut dev.transport, &mut dev.monitor, Opr(Opr::STABLE));
                println!("{status:?}");
                Ok(())
            }),
            Some("exec") => select(&mut devices, target).and_then(|dev| {
                dev.transport.send(scpi::CONTROL_EXECUTE)?;
                Ok(())
            }),
            Some("gtg") => select(&mut devices, target).and_then(|dev| {
                control::go_to_ground(
                    dev,
                    &ControlOptions::with_deadline(Duration::from_secs(300)),
                )?;
                Ok(())
            }),
            Some("wait") => select(&mut devices, target).and_then(|dev| {
                control::run(
                    dev,
                    Opr(Opr::STABLE),
                    &ControlOptions::with_deadline(Duration::from_secs(300)),
                    &mut Hooks::none(),
                )?;
                Ok(())
            }),
            Some("send") => {
                let cmd = words.collect::<Vec<_>>().join(" ");
                select(&mut devices, target).and_then(|dev| {
                    dev.transport.send(&cmd)?;
                    Ok(())
                })
            }
            Some("query") | Some("?") => {
                let cmd = words.collect::<Vec<_>>().join(" ");
                select(&mut devices, target).and_then(|dev| {
                    println!("{}", dev.transport.query(&cmd)?);
                    Ok(())
                })
            }
            Some(other) => Err(format!("unknown command {other}").into()),
        };
        if let Err(err) = result {
            println!("error: {err}");
        }
    }
    Ok(())
}
