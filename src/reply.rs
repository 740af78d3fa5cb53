//! Parsers for the replies the instruments send back: decimal register
//! values, floating-point readings, `*IDN?` identity strings and the
//! in-band `ERROR` sentinel.

use nom::bytes::complete::take_while;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res, opt, rest};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;
use snafu::Snafu;

/// Error type for this module.
#[derive(Debug, Snafu, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The reply isn't a decimal register value.
    #[snafu(display("not a register value: {reply:?}"))]
    InvalidRegister { reply: String },
    /// The reply isn't a numeric reading.
    #[snafu(display("not a numeric reading: {reply:?}"))]
    InvalidReading { reply: String },
    /// The reply isn't a well-formed identity string.
    #[snafu(display("malformed identity reply: {reply:?}"))]
    InvalidIdentity { reply: String },
}

/// Leading literal of the reserved in-band error reply.
pub const ERROR_SENTINEL: &str = "ERROR";

/// True if `reply` is the instrument's in-band error signal.
pub fn is_error_sentinel(reply: &str) -> bool {
    reply.starts_with(ERROR_SENTINEL)
}

/// Parse a status register reply, a bare decimal integer.
pub fn register(reply: &str) -> Result<u16, Error> {
    let parsed: IResult<&str, u16> =
        all_consuming(map_res(digit1, str::parse::<u16>))(reply.trim());
    match parsed {
        Ok((_, value)) => Ok(value),
        Err(_) => InvalidRegisterSnafu { reply }.fail(),
    }
}

/// Parse a numeric reading, e.g. a pressure value or a rate readback.
pub fn reading(reply: &str) -> Result<f64, Error> {
    let parsed: IResult<&str, f64> =
        all_consuming(nom::number::complete::double)(reply.trim());
    match parsed {
        Ok((_, value)) => Ok(value),
        Err(_) => InvalidReadingSnafu { reply }.fail(),
    }
}

/// A parsed `*IDN?` reply.
///
/// The aux load unit reports no serial number, only a product name, which
/// is why `serial` is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial: Option<String>,
    pub revision: Option<String>,
}

impl Identity {
    /// Fallback for devices whose identity reply doesn't follow the
    /// comma-separated convention. The whole reply is kept as the model.
    pub fn unparsed(reply: &str) -> Self {
        Identity {
            manufacturer: String::new(),
            model: reply.trim().to_owned(),
            serial: None,
            revision: None,
        }
    }
}

impl core::fmt::Display for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.serial {
            Some(sn) => write!(f, "{} {} s/n {}", self.manufacturer, self.model, sn),
            None => write!(f, "{} {}", self.manufacturer, self.model),
        }
    }
}

fn field(buf: &str) -> IResult<&str, &str> {
    take_while(|c| c != ',')(buf)
}

/// Parse an identity reply of the form `manufacturer,model[,serial[,revision]]`.
pub fn identity(reply: &str) -> Result<Identity, Error> {
    let parsed: IResult<&str, (&str, &str, Option<&str>, Option<&str>)> =
        all_consuming(tuple((
            terminated(field, char(',')),
            field,
            opt(preceded(char(','), field)),
            opt(preceded(char(','), rest)),
        )))(reply.trim());

    let (_, (manufacturer, model, serial, revision)) = match parsed {
        Ok(ok) => ok,
        Err(_) => return InvalidIdentitySnafu { reply }.fail(),
    };

    let non_empty = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(s.to_owned())
        }
    };

    Ok(Identity {
        manufacturer: manufacturer.trim().to_owned(),
        model: model.trim().to_owned(),
        serial: serial.and_then(non_empty),
        revision: revision.and_then(non_empty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register() {
        assert_eq!(register("0"), Ok(0));
        assert_eq!(register("130"), Ok(130));
        assert_eq!(register(" 8 "), Ok(8));
        assert!(register("").is_err());
        assert!(register("-1").is_err());
        assert!(register("12a").is_err());
        assert!(register("70000").is_err());
    }

    #[test]
    fn test_reading() {
        assert_eq!(reading("-2000"), Ok(-2000.0));
        assert_eq!(reading("-2000.0"), Ok(-2000.0));
        assert_eq!(reading("29.92"), Ok(29.92));
        assert!(reading("CTRL").is_err());
    }

    #[test]
    fn test_identity() {
        let id = identity("DRUCK,ADTS 25XX,SN1234,V1.02").unwrap();
        assert_eq!(id.manufacturer, "DRUCK");
        assert_eq!(id.model, "ADTS 25XX");
        assert_eq!(id.serial.as_deref(), Some("SN1234"));
        assert_eq!(id.revision.as_deref(), Some("V1.02"));

        // aux load unit style reply without a serial number
        let id = identity("BARFIELD,LSU 100,,2.0").unwrap();
        assert_eq!(id.serial, None);
        assert_eq!(id.revision.as_deref(), Some("2.0"));

        let id = identity("ACME,WIDGET").unwrap();
        assert_eq!(id.serial, None);
        assert_eq!(id.revision, None);

        assert!(identity("just a name").is_err());
    }

    #[test]
    fn test_error_sentinel() {
        assert!(is_error_sentinel("ERROR"));
        assert!(is_error_sentinel("ERROR 113"));
        assert!(!is_error_sentinel("OK"));
        assert!(!is_error_sentinel(" ERROR"));
    }
}
