//! Timing and retry settings

/// How long a busy card is polled before `Error::Busy`.
///
/// Both modes start with a few back to back polls, a card that is only
/// briefly busy never costs a sleep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusyWait {
    /// Poll without yielding, at most `polls` times
    Spin { polls: u32 },
    /// Sleep 1ms between two polls, for at least `timeout_ms` in total
    Nice { timeout_ms: u32 },
}

/// Card bring-up and data transfer settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Attempts at CMD0 before giving up on the card
    pub cmd0_retries: u32,
    /// Rounds of CMD55 + ACMD41 before giving up
    pub acmd41_retries: u32,
    /// Attempts at CMD1 before giving up
    pub cmd1_retries: u32,
    /// Sleep between two bring-up attempts
    pub retry_delay_ms: u32,
    /// Polls for a start block token before a read times out
    pub wait_data: u32,
    /// Waiting for a card programming data or otherwise busy
    pub busy_wait: BusyWait,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cmd0_retries: 10,
            acmd41_retries: 100,
            cmd1_retries: 100,
            retry_delay_ms: 10,
            wait_data: 10_000,
            // SDXC write busy limit
            busy_wait: BusyWait::Nice { timeout_ms: 500 },
        }
    }
}

/// Card presence monitor settings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Consecutive "inserted" readings required to accept an insertion
    pub polling_interval: u32,
    /// Delay between two presence polls
    pub polling_delay_ms: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { polling_interval: 10, polling_delay_ms: 10 }
    }
}
