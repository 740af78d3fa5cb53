//! The four layered 16-bit status registers of the 25XX instruments.
//!
//! The summary register ([`Stb`]) indicates which of the three detail
//! registers ([`Que`], [`Esb`], [`Opr`]) currently have pending content.
//! All four are read over the wire as plain decimal integers.

/// Status byte summary register, read with `*STB?`.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct Stb(pub u16);

impl Stb {
    /// Questionable-status queue has data.
    pub const QUE: u16 = 1 << 3;
    /// Event status byte has data.
    pub const ESB: u16 = 1 << 5;
    /// Operation status register has data.
    pub const OPR: u16 = 1 << 7;

    /// The raw register value.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True if any bit of `mask` is set.
    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    /// True if no bit at all is set, i.e. nothing is outstanding.
    pub const fn is_clear(self) -> bool {
        self.0 == 0
    }
}

/// Questionable-status event register, read with `:STAT:QUES:EVEN?`.
///
/// The fault bits cover the two pressure channels, Ps (static) and
/// Pt (total/pitot).
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct Que(pub u16);

impl Que {
    pub const PS_OVERRANGE: u16 = 1 << 9;
    pub const PT_OVERRANGE: u16 = 1 << 10;
    pub const PS_TRACKING_LOSS: u16 = 1 << 11;
    pub const PT_TRACKING_LOSS: u16 = 1 << 12;
    pub const PS_COEFF_ERROR: u16 = 1 << 13;
    pub const PT_COEFF_ERROR: u16 = 1 << 14;

    /// All fault bits. Any of these set means the instrument is in trouble.
    pub const FAULTS: u16 = Self::PS_OVERRANGE
        | Self::PT_OVERRANGE
        | Self::PS_TRACKING_LOSS
        | Self::PT_TRACKING_LOSS
        | Self::PS_COEFF_ERROR
        | Self::PT_COEFF_ERROR;

    /// Fault bits with their human-readable causes, for change reporting.
    pub const FAULT_CAUSES: [(u16, &'static str); 6] = [
        (Self::PS_OVERRANGE, "Ps overrange"),
        (Self::PT_OVERRANGE, "Pt overrange"),
        (Self::PS_TRACKING_LOSS, "Ps tracking loss"),
        (Self::PT_TRACKING_LOSS, "Pt tracking loss"),
        (Self::PS_COEFF_ERROR, "Ps coefficient error"),
        (Self::PT_COEFF_ERROR, "Pt coefficient error"),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    /// True if any fault bit is set.
    pub const fn has_faults(self) -> bool {
        self.contains(Self::FAULTS)
    }
}

/// Standard event status register, read with `*ESR?`.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct Esb(pub u16);

impl Esb {
    /// Operation complete.
    pub const OPC: u16 = 1 << 0;
    /// Request control.
    pub const RQC: u16 = 1 << 1;
    /// Query error.
    pub const QYE: u16 = 1 << 2;
    /// Device-dependent error.
    pub const DDE: u16 = 1 << 3;
    /// Execution error.
    pub const EXE: u16 = 1 << 4;
    /// Command error.
    pub const CME: u16 = 1 << 5;
    /// User request.
    pub const URQ: u16 = 1 << 6;
    /// Power on.
    pub const PON: u16 = 1 << 7;

    /// The bits that constitute an error condition.
    pub const ERRORS: u16 = Self::DDE | Self::EXE | Self::CME;

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask != 0
    }

    pub const fn has_errors(self) -> bool {
        self.contains(Self::ERRORS)
    }
}

/// Operation status event register, read with `:STAT:OPER:EVEN?`.
///
/// Also doubles as the goal mask type for control operations: a control
/// operation is complete once any goal bit is set in this register.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
#[repr(transparent)]
pub struct Opr(pub u16);

impl Opr {
    /// Both channels settled at their setpoints.
    pub const STABLE: u16 = 1 << 1;
    pub const RAMPING: u16 = 1 << 3;
    pub const LEAK_TEST_STABLE: u16 = 1 << 4;
    pub const VOLUME_TEST_DONE: u16 = 1 << 5;
    pub const PS_STABLE: u16 = 1 << 8;
    pub const PS_RAMPING: u16 = 1 << 9;
    pub const PT_STABLE: u16 = 1 << 10;
    pub const PT_RAMPING: u16 = 1 << 11;
    pub const SELF_TEST_DONE: u16 = 1 << 12;
    /// Go-to-ground complete, instrument is vented at ambient pressure.
    pub const GROUNDED: u16 = 1 << 13;

    /// All bits that count as reportable activity.
    pub const ACTIVITY: u16 = Self::STABLE
        | Self::RAMPING
        | Self::LEAK_TEST_STABLE
        | Self::VOLUME_TEST_DONE
        | Self::PS_STABLE
        | Self::PS_RAMPING
        | Self::PT_STABLE
        | Self::PT_RAMPING
        | Self::SELF_TEST_DONE
        | Self::GROUNDED;

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, mask: u16) -> bool {
        self.0 & mask != 0
    }
}
