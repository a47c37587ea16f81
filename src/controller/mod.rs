#[allow(clippy::module_inception)]
mod controller;
mod init;
mod sequential;
mod slot;

use embedded_hal::digital::v2::InputPin;
use log::debug;

use crate::block_device::BlockDeviceInfo;
use crate::bus::{Transport, SD_MMC_BLOCK_SIZE};
use crate::error::Error;
use crate::kernel::Kernel;

pub use controller::Controller;
pub use slot::{Slot, State, Status};

impl<'a, BUS, K, DETECT, WP> Controller<'a, BUS, K, DETECT, WP>
where
    BUS: Transport,
    K: Kernel,
    DETECT: InputPin,
    WP: InputPin,
{
    /// Move from `from` to `to`, leaving the state untouched otherwise
    pub(crate) fn transition(&self, from: State, to: State) -> Result<(), Error> {
        self.slot.lock(|status| {
            if status.state != from {
                return Err(Error::InvalidState(status.state));
            }
            status.state = to;
            Ok(())
        })
    }

    pub(crate) fn require(&self, state: State) -> Result<(), Error> {
        match self.state() {
            current if current == state => Ok(()),
            current => Err(Error::InvalidState(current)),
        }
    }

    /// Start monitoring the slot for a card
    pub fn start(&mut self) -> Result<(), Error> {
        self.slot.start_monitor()
    }

    /// Stop monitoring the slot and shut the transport down
    pub fn stop(&mut self) -> Result<(), Error> {
        self.slot.stop_monitor()?;
        self.card.bus.deactivate()?;
        Ok(())
    }

    /// Bring the driver back to `State::Inserted`, a state safe for card
    /// removal, once pending writes are complete
    pub fn disconnect(&mut self) -> Result<(), Error> {
        match self.state() {
            State::Ready => {
                self.card.sync()?;
                self.slot.lock(|status| {
                    if status.state == State::Ready {
                        status.state = State::Inserted;
                    }
                });
                debug!("card disconnected");
            }
            State::Inserted => (),
            state => return Err(Error::InvalidState(state)),
        }
        self.card.bus.deactivate()?;
        Ok(())
    }

    /// Wait until the card is idle
    pub fn sync(&mut self) -> Result<(), Error> {
        self.require(State::Ready)?;
        self.card.sync()
    }

    pub fn info(&self) -> Result<BlockDeviceInfo, Error> {
        self.require(State::Ready)?;
        Ok(BlockDeviceInfo {
            block_count: self.card.capacity,
            block_size: SD_MMC_BLOCK_SIZE as u32,
        })
    }
}
