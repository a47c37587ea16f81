//! Command indices and fixed arguments used in SPI mode

/// Resets the card to idle state
pub const CMD0_GO_IDLE_STATE: u8 = 0;
/// Starts the card initialization process
pub const CMD1_SEND_OP_COND: u8 = 1;
/// Sends interface condition, voltage range and check pattern
pub const CMD8_SEND_IF_COND: u8 = 8;
/// Asks the card to send its card specific data (CSD)
pub const CMD9_SEND_CSD: u8 = 9;
/// Forces the card to stop a multiple block read
pub const CMD12_STOP_TRANSMISSION: u8 = 12;
/// Sets the block length for all subsequent block commands
pub const CMD16_SET_BLOCKLEN: u8 = 16;
/// Continuously transfers data blocks from card to host
pub const CMD18_READ_MULTIPLE_BLOCK: u8 = 18;
/// Continuously writes blocks of data until a stop token is sent
pub const CMD25_WRITE_MULTIPLE_BLOCK: u8 = 25;
/// Next command is an application specific command
pub const CMD55_APP_CMD: u8 = 55;
/// Reads the OCR register of a card
pub const CMD58_READ_OCR: u8 = 58;
/// Sends host capacity support and asks for operating condition (after CMD55)
pub const ACMD41_SD_SEND_OP_COND: u8 = 41;

/// CMD8 argument: 2.7-3.6V supply, check pattern 0xAA
pub const CMD8_PATTERN: u32 = 0x0000_01AA;
/// ACMD41 argument: HCS set plus the voltage window
pub const ACMD41_ARGUMENT: u32 = 0x4000_01AA;

/// Frame start bits `01` ahead of the 6-bit command index
pub const COMMAND_START: u8 = 0x40;

/// Fixed CMD12 frame, trailed by one stuff byte the card skips
pub const STOP_TRANSMISSION_FRAME: [u8; 7] =
    [COMMAND_START | CMD12_STOP_TRANSMISSION, 0, 0, 0, 0, 0x01, 0xFF];

/// Card capacity status bit, in the first OCR byte
pub const OCR_CCS: u8 = 0x40;
