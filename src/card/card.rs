use bit_field::BitField;

use crate::bus::Transport;
use crate::config::{BusyWait, Config};
use crate::kernel::Kernel;

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Type(u8);

impl Type {
    pub fn set_unknown(&mut self) -> &mut Self {
        self.0 = 0x0;
        self
    }

    /// Card answered CMD8, i.e. physical layer 2.00 or later
    pub fn set_sd_v2(&mut self, v2: bool) -> &mut Self {
        self.0.set_bit(1, v2);
        self
    }

    pub fn sd_v2(&self) -> bool {
        self.0.get_bit(1)
    }

    /// Block addressed card, CCS bit set in the OCR
    pub fn set_high_capacity(&mut self, hc: bool) -> &mut Self {
        self.0.set_bit(4, hc);
        self
    }

    pub fn high_capacity(&self) -> bool {
        self.0.get_bit(4)
    }
}

pub struct Card<BUS, K> {
    /// Byte link to the card
    pub bus: BUS,
    /// Sleeps while the card is busy
    pub(crate) kernel: K,
    /// Card capacity in blocks
    pub capacity: u32,
    /// Card type
    pub card_type: Type,
    /// Polls for a start block token before giving up
    pub wait_data: u32,
    pub busy_wait: BusyWait,
}

impl<BUS: Transport, K: Kernel> Card<BUS, K> {
    pub fn new(bus: BUS, kernel: K, config: &Config) -> Self {
        Self {
            bus,
            kernel,
            capacity: 0,
            card_type: Type::default(),
            wait_data: config.wait_data,
            busy_wait: config.busy_wait,
        }
    }

    /// Whether read and write arguments are block indexes rather than byte offsets
    pub fn block_addressing(&self) -> bool {
        self.card_type.high_capacity()
    }

    /// Forget everything learnt from the previous card
    pub fn reset(&mut self) {
        self.capacity = 0;
        self.card_type.set_unknown();
    }
}
