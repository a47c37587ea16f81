use embedded_hal::digital::v2::InputPin;
use spin::Mutex;

use crate::config::MonitorConfig;
use crate::error::{BusError, Error};
use crate::kernel::{Event, Kernel};

/// Driver state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Slot not bound to a driver yet
    Uninit,
    /// Driver stopped, presence not monitored
    Stop,
    /// Waiting for a card
    Wait,
    /// Card inserted, not initialized
    Inserted,
    /// Card initialized and idle
    Ready,
    /// Multiple block read in progress
    Reading,
    /// Multiple block write in progress
    Writing,
}

/// State shared with the presence monitor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub state: State,
    /// Remaining "inserted" readings before an insertion is accepted
    pub counter: u32,
}

/// A physical card slot: presence and write protect sensors, plus the
/// driver state the presence monitor updates from timer context.
pub struct Slot<K, DETECT, WP> {
    status: Mutex<Status>,
    kernel: K,
    /// Card detection pin
    detect: DETECT,
    /// Whether a pulled high pin is logic true that a card is detected
    detect_high_activated: bool,
    /// Write protect pin
    write_protect: WP,
    /// Whether a pulled high pin is logic true that write protection is activated
    wp_high_activated: bool,
    config: MonitorConfig,
}

impl<K: Kernel, DETECT: InputPin, WP: InputPin> Slot<K, DETECT, WP> {
    pub fn new(
        kernel: K,
        detect: DETECT,
        detect_high_activated: bool,
        write_protect: WP,
        wp_high_activated: bool,
        config: MonitorConfig,
    ) -> Self {
        Self {
            status: Mutex::new(Status { state: State::Uninit, counter: config.polling_interval }),
            kernel,
            detect,
            detect_high_activated,
            write_protect,
            wp_high_activated,
            config,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Run `f` on the shared status from thread context
    pub(crate) fn lock<R>(&self, f: impl FnOnce(&mut Status) -> R) -> R {
        self.kernel.lock(|| f(&mut self.status.lock()))
    }

    pub fn status(&self) -> Status {
        self.lock(|status| *status)
    }

    pub fn state(&self) -> State {
        self.status().state
    }

    /// Card presence as reported by the detect pin.
    ///
    /// A pin that cannot be read reads as no card, so while the monitor runs
    /// a single faulty reading counts as a removal: an initialized card drops
    /// back to `State::Wait` and `Event::Removed` is broadcast. The card then
    /// has to be seen again for `polling_interval` readings.
    pub fn is_inserted(&self) -> bool {
        match self.detect.is_high() {
            Ok(level) => level == self.detect_high_activated,
            Err(_) => false,
        }
    }

    pub fn write_protected(&self) -> Result<bool, Error> {
        let level = self.write_protect.is_high().map_err(|_| Error::Bus(BusError::PinLevel))?;
        Ok(level == self.wp_high_activated)
    }

    /// Transition from stopped to waiting for a card and arm the monitor
    pub(crate) fn start_monitor(&self) -> Result<(), Error> {
        let delay = self.config.polling_delay_ms;
        let interval = self.config.polling_interval;
        self.kernel.lock(|| {
            let mut status = self.status.lock();
            if status.state != State::Stop {
                return Err(Error::InvalidState(status.state));
            }
            status.state = State::Wait;
            status.counter = interval;
            self.kernel.set_timer(delay);
            Ok(())
        })
    }

    /// Transition to stopped and disarm the monitor, not allowed mid transfer
    pub(crate) fn stop_monitor(&self) -> Result<(), Error> {
        self.kernel.lock(|| {
            let mut status = self.status.lock();
            match status.state {
                State::Uninit | State::Reading | State::Writing => {
                    Err(Error::InvalidState(status.state))
                }
                State::Stop => Ok(()),
                _ => {
                    status.state = State::Stop;
                    self.kernel.reset_timer();
                    Ok(())
                }
            }
        })
    }

    /// Presence monitor step, to be called each time the monitor timer fires.
    ///
    /// Insertion is accepted after `polling_interval` consecutive positive
    /// readings, removal on the first negative one.
    pub fn tick(&self) {
        self.kernel.lock_from_isr(|| {
            let mut status = self.status.lock();
            match status.state {
                State::Uninit | State::Stop => return,
                State::Wait => {
                    if self.is_inserted() {
                        status.counter = status.counter.saturating_sub(1);
                        if status.counter == 0 {
                            status.state = State::Inserted;
                            self.kernel.broadcast_from_isr(Event::Inserted);
                        }
                    } else {
                        status.counter = self.config.polling_interval;
                    }
                }
                _ => {
                    if !self.is_inserted() {
                        status.state = State::Wait;
                        status.counter = self.config.polling_interval;
                        self.kernel.broadcast_from_isr(Event::Removed);
                    }
                }
            }
            self.kernel.set_timer(self.config.polling_delay_ms);
        })
    }
}
