use log::warn;

use crate::bus::spi::response::{
    DataResponse, R1Response, ResponseCode, MULTI_WRITE_PROLOGUE, MULTI_WRITE_STOP,
    PLACEHOLDER_CRC,
};
use crate::bus::{Transport, SD_MMC_BLOCK_SIZE};
use crate::commands::STOP_TRANSMISSION_FRAME;
use crate::error::Error;
use crate::kernel::Kernel;

use super::card::Card;
use super::command::rejection;

impl<BUS: Transport, K: Kernel> Card<BUS, K> {
    /// Command argument addressing `block`
    ///
    /// SDSC cards (CCS=0) use byte unit addresses,
    /// SDHC and SDXC cards (CCS=1) use block unit addresses.
    pub fn address(&self, block: u32) -> u32 {
        if self.block_addressing() {
            block
        } else {
            block.wrapping_mul(SD_MMC_BLOCK_SIZE as u32)
        }
    }

    /// Select the card and issue a multiple block command starting at `block`.
    /// The card stays selected once the command is accepted.
    pub fn start_transfer(&mut self, cmd: u8, block: u32) -> Result<(), Error> {
        self.bus.select()?;
        self.send_header(cmd, self.address(block))?;
        let r1 = self.receive_r1()?;
        if r1 != R1Response::READY {
            return Err(rejection(r1));
        }
        Ok(())
    }

    /// Receive the next data packet of a multiple block read into
    /// `block[..SD_MMC_BLOCK_SIZE]`
    pub fn read_block(&mut self, block: &mut [u8]) -> Result<(), Error> {
        if !self.wait_data_token()? {
            return Err(Error::NoResponse);
        }
        self.bus.receive(&mut block[..SD_MMC_BLOCK_SIZE])?;
        // CRC ignored
        self.bus.ignore(2)?;
        Ok(())
    }

    /// Send `STOP_TRANSMISSION` in the middle of a multiple block read and
    /// deselect the card
    pub fn stop_read(&mut self) -> Result<(), Error> {
        let result = self.bus.send(&STOP_TRANSMISSION_FRAME).map_err(Error::from).and_then(|_| {
            // Some cards answer with a non-zero R1 here for no known reason,
            // the response is read but not checked
            self.receive_r1().map(|_| ())
        });
        let deselected = self.bus.deselect();
        result?;
        deselected?;
        Ok(())
    }

    /// Send one data packet of a multiple block write and wait until the
    /// card has programmed it
    pub fn write_block(&mut self, block: &[u8]) -> Result<(), Error> {
        self.bus.send(&MULTI_WRITE_PROLOGUE)?;
        self.bus.send(&block[..SD_MMC_BLOCK_SIZE])?;
        self.bus.send(&PLACEHOLDER_CRC)?;
        let response = DataResponse(self.read_byte()?);
        match response.response_code() {
            Some(ResponseCode::Accepted) => self.wait(),
            Some(code) => {
                warn!("data rejected: {:?}", code);
                Err(Error::WriteRejected(response.0))
            }
            None => {
                warn!("malformed data response {:#04x}", response.0);
                Err(Error::WriteRejected(response.0))
            }
        }
    }

    /// Send the stop token of a multiple block write and deselect the card
    pub fn stop_write(&mut self) -> Result<(), Error> {
        let sent = self.bus.send(&MULTI_WRITE_STOP);
        let deselected = self.bus.deselect();
        sent?;
        deselected?;
        Ok(())
    }
}
