use core::fmt;

use embedded_error::mci::MciError;

use crate::controller::State;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Operation not allowed in the current driver state, nothing was done
    InvalidState(State),
    /// No response or data token within the polling window
    NoResponse,
    /// Card answered with an error status
    Rejected(u8),
    /// Card kept signalling busy
    Busy,
    /// Card did not reach the expected state within the retry budget
    RetriesExhausted,
    /// Data response token other than "accepted"
    WriteRejected(u8),
    /// CSD could not be read or describes an empty card
    InvalidDescriptor,
    /// Card was removed while being connected
    Removed,
    /// Caller buffer does not fit whole blocks
    InvalidBuffer,
    /// Transport level failure
    Bus(BusError),
}

/// Transport failure kinds reported by a [`crate::bus::Transport`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusError {
    Read,
    Write,
    Select,
    PinLevel,
    /// Any other MCI error
    Other,
}

impl From<MciError> for BusError {
    fn from(error: MciError) -> Self {
        match error {
            MciError::ReadError | MciError::DataError(_) => Self::Read,
            MciError::WriteError | MciError::WriteProtected => Self::Write,
            MciError::CouldNotSelectDevice | MciError::NoCard => Self::Select,
            MciError::PinLevelReadError => Self::PinLevel,
            _ => Self::Other,
        }
    }
}

impl From<MciError> for Error {
    fn from(error: MciError) -> Self {
        Self::Bus(error.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(state) => write!(f, "not allowed in state {:?}", state),
            Self::NoResponse => f.write_str("card did not respond"),
            Self::Rejected(r1) => write!(f, "card rejected command, status {:#04x}", r1),
            Self::Busy => f.write_str("card stuck busy"),
            Self::RetriesExhausted => f.write_str("card did not become ready"),
            Self::WriteRejected(token) => write!(f, "data rejected, response {:#04x}", token),
            Self::InvalidDescriptor => f.write_str("unusable card specific data"),
            Self::Removed => f.write_str("card removed"),
            Self::InvalidBuffer => f.write_str("buffer length is not a multiple of the block size"),
            Self::Bus(error) => write!(f, "bus error: {:?}", error),
        }
    }
}
