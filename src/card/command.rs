use log::{trace, warn};

use crate::bus::spi::response::{
    BitField, R1Response, R1ResponseField, R3Response, BLOCK_READ_DATA_TOKEN,
};
use crate::bus::Transport;
use crate::commands::{CMD9_SEND_CSD, COMMAND_START};
use crate::config::BusyWait;
use crate::crc::frame_crc;
use crate::error::Error;
use crate::kernel::Kernel;
use crate::registers::csd::CsdRegister;

use super::card::Card;

/// Ncr: bytes polled for a command response
const R1_POLLS: u32 = 9;
/// Back to back polls of a busy card before the configured wait kicks in
const FAST_POLLS: u32 = 16;

/// Error for an R1 other than the one expected
pub(crate) fn rejection(r1: R1Response) -> Error {
    if r1.is_timeout() {
        return Error::NoResponse;
    }
    if r1.has(R1ResponseField::CommandCRC) {
        warn!("command CRC rejected, status {:#04x}", r1.0);
    } else if r1.has(R1ResponseField::Address) || r1.has(R1ResponseField::Parameter) {
        warn!("argument out of range, status {:#04x}", r1.0);
    }
    Error::Rejected(r1.0)
}

impl<BUS: Transport, K: Kernel> Card<BUS, K> {
    pub(crate) fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0xFF];
        self.bus.receive(&mut byte)?;
        Ok(byte[0])
    }

    /// Run `f` with the card selected, deselecting it whatever the outcome
    pub(crate) fn selected<R, F>(&mut self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Self) -> Result<R, Error>,
    {
        self.bus.select()?;
        let result = f(self);
        let deselected = self.bus.deselect();
        let value = result?;
        deselected?;
        Ok(value)
    }

    fn idle(&mut self) -> Result<bool, Error> {
        Ok(self.read_byte()? == 0xFF)
    }

    /// Poll until the card releases the line, i.e. it is no longer busy
    /// programming a previous write
    pub fn wait(&mut self) -> Result<(), Error> {
        for _ in 0..FAST_POLLS {
            if self.idle()? {
                return Ok(());
            }
        }
        match self.busy_wait {
            BusyWait::Spin { polls } => {
                for _ in FAST_POLLS..polls {
                    if self.idle()? {
                        return Ok(());
                    }
                }
            }
            BusyWait::Nice { timeout_ms } => {
                for _ in 0..timeout_ms {
                    self.kernel.sleep_ms(1);
                    if self.idle()? {
                        return Ok(());
                    }
                }
            }
        }
        warn!("card still busy");
        Err(Error::Busy)
    }

    /// Wait for an idle bus then send a command frame
    pub fn send_header(&mut self, cmd: u8, arg: u32) -> Result<(), Error> {
        self.wait()?;

        let mut frame = [0u8; 6];
        frame[0] = COMMAND_START | cmd;
        frame[1..5].copy_from_slice(&arg.to_be_bytes());
        frame[5] = frame_crc(&frame[..5]);
        trace!("CMD{} arg {:#010x}", cmd, arg);
        self.bus.send(&frame)?;
        Ok(())
    }

    /// Receive a single byte response, `R1Response::TIMEOUT` if none came
    pub fn receive_r1(&mut self) -> Result<R1Response, Error> {
        for _ in 0..R1_POLLS {
            let byte = self.read_byte()?;
            if byte != 0xFF {
                return Ok(R1Response(byte));
            }
        }
        Ok(R1Response::TIMEOUT)
    }

    /// Receive R1 plus 4 bytes, the trailing bytes are read even if R1
    /// reports an error so the link stays in step
    pub fn receive_r3(&mut self) -> Result<R3Response, Error> {
        let r1 = self.receive_r1()?;
        let mut payload = [0xFF; 4];
        self.bus.receive(&mut payload)?;
        Ok(R3Response { r1, payload })
    }

    pub fn send_command_r1(&mut self, cmd: u8, arg: u32) -> Result<R1Response, Error> {
        self.selected(|card| {
            card.send_header(cmd, arg)?;
            card.receive_r1()
        })
    }

    pub fn send_command_r3(&mut self, cmd: u8, arg: u32) -> Result<R3Response, Error> {
        self.selected(|card| {
            card.send_header(cmd, arg)?;
            card.receive_r3()
        })
    }

    /// Poll for the start block token, false if it never came
    pub fn wait_data_token(&mut self) -> Result<bool, Error> {
        for _ in 0..self.wait_data {
            if self.read_byte()? == BLOCK_READ_DATA_TOKEN {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// CMD9: card sends its card specific data (CSD)
    pub fn read_csd(&mut self) -> Result<CsdRegister, Error> {
        self.selected(|card| {
            card.send_header(CMD9_SEND_CSD, 0)?;
            let r1 = card.receive_r1()?;
            if r1 != R1Response::READY {
                return Err(rejection(r1));
            }
            if !card.wait_data_token()? {
                return Err(Error::NoResponse);
            }
            let mut bytes = [0u8; 16];
            card.bus.receive(&mut bytes)?;
            // CRC ignored
            card.bus.ignore(2)?;
            Ok(CsdRegister::from_bytes(&bytes))
        })
    }

    /// Wait with the card selected until it is idle
    pub fn sync(&mut self) -> Result<(), Error> {
        self.selected(|card| card.wait())
    }
}
