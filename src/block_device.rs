use embedded_hal::digital::v2::InputPin;

use crate::bus::{Transport, SD_MMC_BLOCK_SIZE};
use crate::controller::Controller;
use crate::error::Error;
use crate::kernel::Kernel;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockDeviceInfo {
    /// Number of blocks on the card
    pub block_count: u32,
    /// Bytes per block
    pub block_size: u32,
}

/// Generic block storage interface, buffers hold whole blocks
pub trait BlockDevice {
    type Error;

    fn is_inserted(&self) -> bool;
    fn is_write_protected(&self) -> Result<bool, Self::Error>;
    fn connect(&mut self) -> Result<(), Self::Error>;
    fn disconnect(&mut self) -> Result<(), Self::Error>;
    /// Read `buffer.len() / block_size` consecutive blocks starting at `start`
    fn read(&mut self, start: u32, buffer: &mut [u8]) -> Result<(), Self::Error>;
    /// Write `buffer.len() / block_size` consecutive blocks starting at `start`
    fn write(&mut self, start: u32, buffer: &[u8]) -> Result<(), Self::Error>;
    /// Wait for pending writes to complete
    fn sync(&mut self) -> Result<(), Self::Error>;
    fn info(&self) -> Result<BlockDeviceInfo, Self::Error>;
}

fn check_buffer(length: usize) -> Result<(), Error> {
    match length % SD_MMC_BLOCK_SIZE {
        0 => Ok(()),
        _ => Err(Error::InvalidBuffer),
    }
}

impl<'a, BUS, K, DETECT, WP> BlockDevice for Controller<'a, BUS, K, DETECT, WP>
where
    BUS: Transport,
    K: Kernel,
    DETECT: InputPin,
    WP: InputPin,
{
    type Error = Error;

    fn is_inserted(&self) -> bool {
        Controller::is_inserted(self)
    }

    fn is_write_protected(&self) -> Result<bool, Error> {
        Controller::is_write_protected(self)
    }

    fn connect(&mut self) -> Result<(), Error> {
        Controller::connect(self)
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        Controller::disconnect(self)
    }

    fn read(&mut self, start: u32, buffer: &mut [u8]) -> Result<(), Error> {
        check_buffer(buffer.len())?;
        if buffer.is_empty() {
            return Ok(());
        }
        self.start_sequential_read(start)?;
        for block in buffer.chunks_exact_mut(SD_MMC_BLOCK_SIZE) {
            self.sequential_read(block)?;
        }
        self.stop_sequential_read()
    }

    fn write(&mut self, start: u32, buffer: &[u8]) -> Result<(), Error> {
        check_buffer(buffer.len())?;
        if buffer.is_empty() {
            return Ok(());
        }
        self.start_sequential_write(start)?;
        for block in buffer.chunks_exact(SD_MMC_BLOCK_SIZE) {
            self.sequential_write(block)?;
        }
        self.stop_sequential_write()
    }

    fn sync(&mut self) -> Result<(), Error> {
        Controller::sync(self)
    }

    fn info(&self) -> Result<BlockDeviceInfo, Error> {
        Controller::info(self)
    }
}
