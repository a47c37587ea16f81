use embedded_hal::digital::v2::InputPin;

use crate::bus::{Transport, SD_MMC_BLOCK_SIZE};
use crate::commands::{CMD18_READ_MULTIPLE_BLOCK, CMD25_WRITE_MULTIPLE_BLOCK};
use crate::error::Error;
use crate::kernel::Kernel;

use super::controller::Controller;
use super::slot::State;

impl<'a, BUS, K, DETECT, WP> Controller<'a, BUS, K, DETECT, WP>
where
    BUS: Transport,
    K: Kernel,
    DETECT: InputPin,
    WP: InputPin,
{
    /// Back to `State::Ready` if still in `from`
    fn finish(&self, from: State) -> bool {
        self.slot.lock(|status| {
            if status.state != from {
                return false;
            }
            status.state = State::Ready;
            true
        })
    }

    /// Abort a failed transfer: release the card and return to `State::Ready`
    fn fall_back<T>(&mut self, from: State, result: Result<T, Error>) -> Result<T, Error> {
        if result.is_err() {
            self.card.bus.deselect().ok();
            self.finish(from);
        }
        result
    }

    /// Check the transfer still runs. A transfer cut short by a card removal
    /// still holds the card selected, it is released here.
    fn require_transfer(&mut self, state: State) -> Result<(), Error> {
        let result = self.require(state);
        if result.is_err() {
            self.card.bus.deselect().ok();
        }
        result
    }

    fn start_transfer(&mut self, cmd: u8, block: u32) -> Result<(), Error> {
        self.card.bus.activate(self.high_speed)?;
        self.card.start_transfer(cmd, block)
    }

    /// Start a multiple block read at `block`, leaves the card selected
    pub fn start_sequential_read(&mut self, block: u32) -> Result<(), Error> {
        self.transition(State::Ready, State::Reading)?;
        let result = self.start_transfer(CMD18_READ_MULTIPLE_BLOCK, block);
        self.fall_back(State::Reading, result)
    }

    /// Read the next block into `buffer[..512]`
    pub fn sequential_read(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.require_transfer(State::Reading)?;
        if buffer.len() < SD_MMC_BLOCK_SIZE {
            return Err(Error::InvalidBuffer);
        }
        let result = self.card.read_block(buffer);
        self.fall_back(State::Reading, result)
    }

    /// Stop a multiple block read.
    ///
    /// The card response to the stop command is not checked.
    pub fn stop_sequential_read(&mut self) -> Result<(), Error> {
        self.require_transfer(State::Reading)?;
        let result = self.card.stop_read();
        self.finish(State::Reading);
        result
    }

    /// Start a multiple block write at `block`, leaves the card selected
    pub fn start_sequential_write(&mut self, block: u32) -> Result<(), Error> {
        self.transition(State::Ready, State::Writing)?;
        let result = self.start_transfer(CMD25_WRITE_MULTIPLE_BLOCK, block);
        self.fall_back(State::Writing, result)
    }

    /// Write `buffer[..512]` as the next block
    pub fn sequential_write(&mut self, buffer: &[u8]) -> Result<(), Error> {
        self.require_transfer(State::Writing)?;
        if buffer.len() < SD_MMC_BLOCK_SIZE {
            return Err(Error::InvalidBuffer);
        }
        let result = self.card.write_block(buffer);
        self.fall_back(State::Writing, result)
    }

    /// Stop a multiple block write, fails if the card was removed meanwhile
    pub fn stop_sequential_write(&mut self) -> Result<(), Error> {
        self.require_transfer(State::Writing)?;
        let result = self.card.stop_write();
        let finished = self.finish(State::Writing);
        result?;
        if !finished {
            return Err(Error::Removed);
        }
        Ok(())
    }
}
