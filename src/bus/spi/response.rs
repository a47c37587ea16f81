pub trait Field: Into<u8> {}

pub trait BitField<F: Field>: Copy + Into<u8> {
    fn has(&self, field: F) -> bool {
        let value: u8 = (*self).into();
        value & (1 << field.into()) > 0
    }
}

#[derive(Copy, Clone, Debug)]
#[allow(dead_code)]
pub enum R1ResponseField {
    Idle = 0,
    EraseReset,
    IllegalCommand,
    CommandCRC,
    EraseSequence,
    Address,
    Parameter,
}

impl Into<u8> for R1ResponseField {
    fn into(self) -> u8 {
        self as u8
    }
}

impl Field for R1ResponseField {}

/// R1 response, the single status byte every command answers with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct R1Response(pub u8);

impl R1Response {
    /// Card in ready state, no error
    pub const READY: Self = Self(0x00);
    /// Card in idle state, no error
    pub const IDLE: Self = Self(0x01);
    /// Idle and illegal command: the answer of a v1 card to CMD8
    pub const IDLE_ILLEGAL_COMMAND: Self = Self(0x05);
    /// Nothing but 0xFF on the line during the whole response window
    pub const TIMEOUT: Self = Self(0xFF);

    pub fn is_timeout(self) -> bool {
        self == Self::TIMEOUT
    }
}

impl From<u8> for R1Response {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl Into<u8> for R1Response {
    fn into(self) -> u8 {
        self.0
    }
}

impl BitField<R1ResponseField> for R1Response {}

/// R3/R7 response: R1 followed by 4 bytes, OCR or echoed interface condition
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct R3Response {
    pub r1: R1Response,
    pub payload: [u8; 4],
}

/// Start block token of a read data packet
pub const BLOCK_READ_DATA_TOKEN: u8 = 0xFE;

pub enum WriteToken {
    MultiWrite = 0xFC,
    StopTransmit = 0xFD,
}

/// Multiple block write data packet prologue: one stuff byte then the token
pub const MULTI_WRITE_PROLOGUE: [u8; 2] = [0xFF, WriteToken::MultiWrite as u8];
/// Stop transmission token followed by one stuff byte
pub const MULTI_WRITE_STOP: [u8; 2] = [WriteToken::StopTransmit as u8, 0xFF];
/// CRC is not checked in SPI mode, anything goes
pub const PLACEHOLDER_CRC: [u8; 2] = [0xFF, 0xFF];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    Accepted,
    CRCError,
    WriteError,
}

/// Data response token sent by the card after each written block
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DataResponse(pub u8);

impl DataResponse {
    pub fn response_code(self) -> Option<ResponseCode> {
        // 0bxxx0sss1
        if self.0 & 0b10001 != 0b00001 {
            return None;
        }
        match self.0 >> 1 & 0b111 {
            0x2 => Some(ResponseCode::Accepted),
            0x5 => Some(ResponseCode::CRCError),
            0x6 => Some(ResponseCode::WriteError),
            _ => None,
        }
    }
}
