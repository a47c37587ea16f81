use embedded_error::mci::MciError;
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;

use crate::bus::Transport;

/// SPI peripheral plus a dedicated chip select pin.
///
/// Chip select is driven separately so bytes can be clocked with the card
/// deselected, which is how the card enters SPI mode. Reclocking is
/// peripheral specific, `configure` is called with the SPI peripheral on
/// every `activate`.
pub struct SpiBus<SPI, CS, C> {
    spi: SPI,
    cs: CS,
    configure: fn(&mut SPI, &C),
}

impl<SPI, CS, C, E, OE> SpiBus<SPI, CS, C>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = OE>,
{
    pub fn new(spi: SPI, cs: CS, configure: fn(&mut SPI, &C)) -> Self {
        Self { spi, cs, configure }
    }

    /// Give back the SPI peripheral and the chip select pin
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    fn transfer(&mut self, bytes: &mut [u8]) -> Result<(), MciError> {
        for b in bytes.iter_mut() {
            *b = 0xFF;
        }
        self.spi.transfer(bytes).map_err(|_| MciError::ReadError)?;
        Ok(())
    }
}

impl<SPI, CS, C, E, OE> Transport for SpiBus<SPI, CS, C>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = OE>,
{
    type Config = C;

    fn activate(&mut self, config: &C) -> Result<(), MciError> {
        (self.configure)(&mut self.spi, config);
        Ok(())
    }

    /// Chip select is released, the peripheral is left as is
    fn deactivate(&mut self) -> Result<(), MciError> {
        self.deselect()
    }

    fn select(&mut self) -> Result<(), MciError> {
        self.cs.set_low().map_err(|_| MciError::CouldNotSelectDevice)
    }

    fn deselect(&mut self) -> Result<(), MciError> {
        self.cs.set_high().map_err(|_| MciError::CouldNotSelectDevice)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MciError> {
        self.spi.write(bytes).map_err(|_| MciError::WriteError)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), MciError> {
        self.transfer(buffer)
    }

    fn ignore(&mut self, count: usize) -> Result<(), MciError> {
        let mut scratch = [0xFFu8; 16];
        let mut remain = count;
        while remain > 0 {
            let n = core::cmp::min(remain, scratch.len());
            self.transfer(&mut scratch[..n])?;
            remain -= n;
        }
        Ok(())
    }
}
