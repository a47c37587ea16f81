use embedded_hal::digital::v2::InputPin;
use log::{debug, warn};

use crate::bus::spi::response::R1Response;
use crate::bus::{Transport, SD_MMC_BLOCK_SIZE};
use crate::card::command::rejection;
use crate::card::Card;
use crate::commands::*;
use crate::error::Error;
use crate::kernel::Kernel;

use super::controller::Controller;
use super::slot::State;

/// Dummy bytes clocked with the card deselected before CMD0, at least 74 clocks
const POWER_UP_DUMMY_BYTES: usize = 16;

impl<'a, BUS, K, DETECT, WP> Controller<'a, BUS, K, DETECT, WP>
where
    BUS: Transport,
    K: Kernel,
    DETECT: InputPin,
    WP: InputPin,
{
    /// Run `attempt` until it reports success, sleeping between two attempts
    fn retry<F>(&mut self, attempts: u32, mut attempt: F) -> Result<(), Error>
    where
        F: FnMut(&mut Card<BUS, &'a K>) -> Result<bool, Error>,
    {
        for i in 0..attempts {
            if attempt(&mut self.card)? {
                return Ok(());
            }
            if i + 1 < attempts {
                self.slot.kernel().sleep_ms(self.config.retry_delay_ms);
            }
        }
        Err(Error::RetriesExhausted)
    }

    /// CMD0 until the card enters SPI mode in idle state
    fn go_idle_state(&mut self) -> Result<(), Error> {
        let attempts = self.config.cmd0_retries;
        self.retry(attempts, |card| {
            Ok(card.send_command_r1(CMD0_GO_IDLE_STATE, 0)? == R1Response::IDLE)
        })
        .map_err(|e| {
            warn!("no answer to CMD0");
            e
        })
    }

    /// CMD8, false for a legacy card rejecting the command
    fn send_if_cond(&mut self) -> Result<bool, Error> {
        let r7 = self.card.send_command_r3(CMD8_SEND_IF_COND, CMD8_PATTERN)?;
        if r7.r1 == R1Response::IDLE_ILLEGAL_COMMAND {
            return Ok(false);
        }
        if r7.payload[2] & 0x0F != 0x01 || r7.payload[3] != 0xAA {
            warn!("CMD8 echo {:02x?}", r7.payload);
        }
        Ok(true)
    }

    /// CMD55 + ACMD41 with HCS until initialization completes, then read the
    /// OCR to find the addressing mode
    fn sd_send_op_cond(&mut self) -> Result<(), Error> {
        let attempts = self.config.acmd41_retries;
        self.retry(attempts, |card| {
            if card.send_command_r1(CMD55_APP_CMD, 0)? != R1Response::IDLE {
                return Ok(false);
            }
            let r3 = card.send_command_r3(ACMD41_SD_SEND_OP_COND, ACMD41_ARGUMENT)?;
            Ok(r3.r1 == R1Response::READY)
        })
        .map_err(|e| {
            warn!("card did not leave idle state on ACMD41");
            e
        })?;

        let ocr = self.card.send_command_r3(CMD58_READ_OCR, 0)?;
        self.card.card_type.set_high_capacity(ocr.payload[0] & OCR_CCS != 0);
        Ok(())
    }

    /// CMD1 until the card is ready, any answer but idle is fatal
    fn send_op_cond(&mut self) -> Result<(), Error> {
        let attempts = self.config.cmd1_retries;
        self.retry(attempts, |card| match card.send_command_r1(CMD1_SEND_OP_COND, 0)? {
            R1Response::READY => Ok(true),
            R1Response::IDLE => Ok(false),
            r1 => Err(rejection(r1)),
        })
    }

    fn set_block_length(&mut self) -> Result<(), Error> {
        let r1 = self.card.send_command_r1(CMD16_SET_BLOCKLEN, SD_MMC_BLOCK_SIZE as u32)?;
        if r1 != R1Response::READY {
            return Err(rejection(r1));
        }
        Ok(())
    }

    fn load_capacity(&mut self) -> Result<(), Error> {
        let csd = self.card.read_csd().map_err(|e| match e {
            Error::Bus(_) => e,
            _ => {
                warn!("CSD unreadable: {}", e);
                Error::InvalidDescriptor
            }
        })?;
        let capacity = csd.capacity();
        if capacity == 0 {
            warn!("CSD describes an empty card");
            return Err(Error::InvalidDescriptor);
        }
        debug!("CSD {:?}, structure {:?}", csd, csd.sd_csd_structure_version());
        self.card.capacity = capacity;
        Ok(())
    }

    /// Bring an inserted card up to `State::Ready`.
    ///
    /// Already connected is a success. On failure the driver stays in
    /// `State::Inserted` and the call may be retried.
    pub fn connect(&mut self) -> Result<(), Error> {
        match self.state() {
            State::Inserted => (),
            State::Ready => return Ok(()),
            state => return Err(Error::InvalidState(state)),
        }

        self.card.reset();
        self.card.bus.activate(self.low_speed)?;
        self.card.bus.ignore(POWER_UP_DUMMY_BYTES)?;

        self.go_idle_state()?;
        if self.send_if_cond()? {
            self.card.card_type.set_sd_v2(true);
            self.sd_send_op_cond()?;
        }
        debug!(
            "card is {}, {} addressing",
            if self.card.card_type.sd_v2() { "SD v2" } else { "legacy" },
            if self.card.block_addressing() { "block" } else { "byte" }
        );
        self.send_op_cond()?;

        self.card.bus.activate(self.high_speed)?;
        self.set_block_length()?;
        self.load_capacity()?;
        debug!("card capacity {} blocks", self.card.capacity);

        self.slot.lock(|status| {
            if status.state != State::Inserted {
                return Err(Error::Removed);
            }
            status.state = State::Ready;
            Ok(())
        })
    }
}
