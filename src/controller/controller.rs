use embedded_hal::digital::v2::InputPin;

use crate::bus::Transport;
use crate::card::Card;
use crate::config::Config;
use crate::error::Error;
use crate::kernel::Kernel;

use super::slot::{Slot, State};

/// MMC/SD card driver over a byte transport.
///
/// The slot is borrowed so that the monitor timer can tick it while the
/// controller is busy with the card.
pub struct Controller<'a, BUS: Transport, K, DETECT, WP> {
    pub card: Card<BUS, &'a K>,
    pub(crate) slot: &'a Slot<K, DETECT, WP>,
    /// Link settings for the card identification phase
    pub(crate) low_speed: &'a BUS::Config,
    /// Link settings once the card is initialized
    pub(crate) high_speed: &'a BUS::Config,
    pub(crate) config: Config,
}

impl<'a, BUS, K, DETECT, WP> Controller<'a, BUS, K, DETECT, WP>
where
    BUS: Transport,
    K: Kernel,
    DETECT: InputPin,
    WP: InputPin,
{
    /// Bind a transport to a slot, the driver starts in `State::Stop`
    pub fn new(
        bus: BUS,
        slot: &'a Slot<K, DETECT, WP>,
        low_speed: &'a BUS::Config,
        high_speed: &'a BUS::Config,
        config: Config,
    ) -> Self {
        slot.lock(|status| status.state = State::Stop);
        let card = Card::new(bus, slot.kernel(), &config);
        Controller { card, slot, low_speed, high_speed, config }
    }

    pub fn slot(&self) -> &'a Slot<K, DETECT, WP> {
        self.slot
    }

    pub fn state(&self) -> State {
        self.slot.state()
    }

    pub fn is_inserted(&self) -> bool {
        self.slot.is_inserted()
    }

    pub fn is_write_protected(&self) -> Result<bool, Error> {
        self.slot.write_protected()
    }

    /// Give back the transport
    pub fn free(self) -> BUS {
        self.card.bus
    }
}
