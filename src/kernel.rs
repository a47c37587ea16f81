/// Edge events raised by the card presence monitor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Inserted,
    Removed,
}

/// Services the driver needs from the surrounding real-time kernel.
///
/// Methods suffixed `_from_isr` are only called from the monitor tick, with
/// the ISR lock held.
pub trait Kernel {
    /// Run `f` in a critical section entered from thread context
    fn lock<R>(&self, f: impl FnOnce() -> R) -> R;

    /// Run `f` in a critical section entered from interrupt context
    fn lock_from_isr<R>(&self, f: impl FnOnce() -> R) -> R;

    /// Suspend the calling thread
    fn sleep_ms(&self, ms: u32);

    /// Arm the one-shot monitor timer, `Slot::tick` must run when it fires.
    /// Only called with one of the locks held.
    fn set_timer(&self, delay_ms: u32);

    /// Disarm the monitor timer if pending, with the thread lock held
    fn reset_timer(&self);

    /// Signal every listener of `event`
    fn broadcast_from_isr(&self, event: Event);
}

impl<K: Kernel> Kernel for &K {
    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        (**self).lock(f)
    }

    fn lock_from_isr<R>(&self, f: impl FnOnce() -> R) -> R {
        (**self).lock_from_isr(f)
    }

    fn sleep_ms(&self, ms: u32) {
        (**self).sleep_ms(ms)
    }

    fn set_timer(&self, delay_ms: u32) {
        (**self).set_timer(delay_ms)
    }

    fn reset_timer(&self) {
        (**self).reset_timer()
    }

    fn broadcast_from_isr(&self, event: Event) {
        (**self).broadcast_from_isr(event)
    }
}
