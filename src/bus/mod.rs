pub mod spi;

use embedded_error::mci::MciError;

pub const SD_MMC_BLOCK_SIZE: usize = 512;

/// Byte oriented link to the card.
///
/// Transfers are strictly sequential, the driver brackets every command and
/// every data step between `select` and `deselect`.
pub trait Transport {
    /// Link settings applied by `activate`, e.g. the clock rate
    type Config;

    /// Configure and enable the link, may be called again to reconfigure it
    fn activate(&mut self, config: &Self::Config) -> Result<(), MciError>;

    /// Disable the link, chip select released
    fn deactivate(&mut self) -> Result<(), MciError>;

    /// Assert chip select
    fn select(&mut self) -> Result<(), MciError>;

    /// Release chip select
    fn deselect(&mut self) -> Result<(), MciError>;

    /// Clock out `bytes`, discarding whatever the card sends meanwhile
    fn send(&mut self, bytes: &[u8]) -> Result<(), MciError>;

    /// Clock in `buffer.len()` bytes while keeping the output line high
    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), MciError>;

    /// Clock `count` bytes with the output line high and drop the input
    fn ignore(&mut self, count: usize) -> Result<(), MciError>;
}
