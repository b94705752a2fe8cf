//! Parameter descriptor table for the AT command dialect.
//!
//! Each configurable parameter has a two-letter AT command, a fixed
//! big-endian value width, and one statically assigned correlation tag per
//! direction. The tag travels in the first payload byte of the AT command
//! frame and is echoed in the response, which is how responses are matched
//! back to parameters. Tags identify a parameter-and-direction, not an
//! in-flight request: only one outstanding request per parameter is tracked
//! at a time, which is a property of the dialect itself.

/// A configurable device parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    /// Firmware version identifier (`VR`, read-only).
    FirmwareVersion,
    /// Hardware version identifier (`HV`, read-only).
    HardwareVersion,
    /// Operating channel (`CH`).
    Channel,
    /// Personal Area Network identifier (`ID`).
    PanId,
    /// Coordinator enabled flag (`CE`).
    CoordinatorEnabled,
    /// End-device association enabled flag (`A1`).
    EndDeviceAssociation,
    /// 16-bit source address (`MY`).
    SourceAddress,
    /// Serial number, upper 32 bits (`SH`, read-only).
    SerialHigh,
    /// Serial number, lower 32 bits (`SL`, read-only).
    SerialLow,
    /// Unicast retry count (`RR`).
    RetryCount,
    /// Random delay slots for CSMA backoff (`RN`).
    RandomDelaySlots,
    /// MAC mode (`MM`).
    MacMode,
}

/// Status byte of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtStatus {
    /// Command applied.
    Ok,
    /// Generic failure.
    Error,
    /// The command letters were not recognized.
    InvalidCommand,
    /// The supplied value was out of range.
    InvalidParameter,
    /// A status byte outside the documented set.
    Other(u8),
}

impl AtStatus {
    /// Decode the wire status byte.
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::InvalidCommand,
            3 => Self::InvalidParameter,
            other => Self::Other(other),
        }
    }

    /// Whether the device accepted the command.
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Which half of a request/set pair a correlation tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Get,
    Set,
}

/// Static description of one parameter's wire encoding.
pub(crate) struct Descriptor {
    pub param: Param,
    /// Two ASCII command letters.
    pub command: [u8; 2],
    /// Value width in bytes, big-endian on the wire.
    pub width: usize,
    /// Correlation tag for query frames.
    pub get_tag: u8,
    /// Correlation tag for set frames; `None` marks a read-only parameter.
    pub set_tag: Option<u8>,
}

/// The full parameter table, driving the generic engine.
pub(crate) const PARAMS: &[Descriptor] = &[
    Descriptor {
        param: Param::FirmwareVersion,
        command: *b"VR",
        width: 2,
        get_tag: b'1',
        set_tag: None,
    },
    Descriptor {
        param: Param::HardwareVersion,
        command: *b"HV",
        width: 2,
        get_tag: b'2',
        set_tag: None,
    },
    Descriptor {
        param: Param::Channel,
        command: *b"CH",
        width: 1,
        get_tag: b'3',
        set_tag: Some(b'4'),
    },
    Descriptor {
        param: Param::CoordinatorEnabled,
        command: *b"CE",
        width: 1,
        get_tag: b'6',
        set_tag: Some(b'5'),
    },
    Descriptor {
        param: Param::EndDeviceAssociation,
        command: *b"A1",
        width: 1,
        get_tag: b'8',
        set_tag: Some(b'7'),
    },
    Descriptor {
        param: Param::PanId,
        command: *b"ID",
        width: 2,
        get_tag: b'0',
        set_tag: Some(b'9'),
    },
    Descriptor {
        param: Param::SourceAddress,
        command: *b"MY",
        width: 2,
        get_tag: b'a',
        set_tag: Some(b'b'),
    },
    Descriptor {
        param: Param::SerialHigh,
        command: *b"SH",
        width: 4,
        get_tag: b'c',
        set_tag: None,
    },
    Descriptor {
        param: Param::SerialLow,
        command: *b"SL",
        width: 4,
        get_tag: b'd',
        set_tag: None,
    },
    Descriptor {
        param: Param::RetryCount,
        command: *b"RR",
        width: 1,
        get_tag: b'e',
        set_tag: Some(b'f'),
    },
    Descriptor {
        param: Param::RandomDelaySlots,
        command: *b"RN",
        width: 1,
        get_tag: b'g',
        set_tag: Some(b'h'),
    },
    Descriptor {
        param: Param::MacMode,
        command: *b"MM",
        width: 1,
        get_tag: b'i',
        set_tag: Some(b'j'),
    },
];

/// Look up a parameter's descriptor.
pub(crate) fn descriptor(param: Param) -> &'static Descriptor {
    PARAMS
        .iter()
        .find(|d| d.param == param)
        .expect("every Param variant has a table entry")
}

/// Resolve a response's correlation tag to its parameter and direction.
pub(crate) fn by_tag(tag: u8) -> Option<(&'static Descriptor, Direction)> {
    for d in PARAMS {
        if d.get_tag == tag {
            return Some((d, Direction::Get));
        }
        if d.set_tag == Some(tag) {
            return Some((d, Direction::Set));
        }
    }
    None
}
