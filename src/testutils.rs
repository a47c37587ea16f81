//! Test doubles: a fake kernel, shared input pins and a byte level
//! simulated SD card.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::iter;
use std::boxed::Box;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_error::mci::MciError;
use embedded_hal::digital::v2::InputPin;

use crate::bus::Transport;
use crate::kernel::{Event, Kernel};

pub const LOW_SPEED: u32 = 400_000;
pub const HIGH_SPEED: u32 = 25_000_000;

/// CSD version 1.0, 1000 blocks
pub const V1_CSD: [u8; 16] =
    [0x00, 0x26, 0x00, 0x32, 0x5F, 0x59, 0x80, 0x1F, 0x00, 0x00, 0x80, 0, 0, 0, 0, 0];

/// CSD version 2.0 of an 8GB card, 15523840 blocks
pub const V2_CSD: [u8; 16] =
    [0x40, 0x0E, 0x00, 0x32, 0x5B, 0x59, 0x00, 0x00, 0x3B, 0x37, 0x7F, 0x80, 0x0A, 0x40, 0x00, 0x23];

/// Content of a block nobody wrote
pub fn pattern(block: u32) -> Vec<u8> {
    (0..512u32).map(|i| (block.wrapping_mul(37).wrapping_add(i) ^ (block >> 3)) as u8).collect()
}

/// Bitwise CRC7, x^7 + x^3 + 1
fn crc7(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        for bit in (0..8).rev() {
            let feedback = ((crc >> 6) ^ (byte >> bit)) & 1;
            crc = (crc << 1) & 0x7F;
            if feedback != 0 {
                crc ^= 0x09;
            }
        }
    }
    crc
}

/// Simulated time in nanoseconds, shared by a kernel and a card
#[derive(Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ns: u64) {
        self.0.set(self.0.get() + ns)
    }
}

/// Records what the driver asks from the kernel
#[derive(Default)]
pub struct FakeKernel {
    clock: Clock,
    locked: Cell<bool>,
    timer: Cell<Option<u32>>,
    timer_sets: Cell<usize>,
    isr_locks: Cell<usize>,
    sleeps: RefCell<Vec<u32>>,
    events: RefCell<Vec<Event>>,
    sleep_hook: RefCell<Option<Box<dyn Fn()>>>,
}

impl FakeKernel {
    /// Time line advanced by every sleep
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// Pending timer delay
    pub fn timer(&self) -> Option<u32> {
        self.timer.get()
    }

    pub fn timer_sets(&self) -> usize {
        self.timer_sets.get()
    }

    pub fn isr_locks(&self) -> usize {
        self.isr_locks.get()
    }

    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.borrow().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Run `hook` after every sleep
    pub fn on_sleep(&self, hook: Box<dyn Fn()>) {
        *self.sleep_hook.borrow_mut() = Some(hook);
    }

    fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        assert!(!self.locked.replace(true), "nested critical section");
        let result = f();
        self.locked.set(false);
        result
    }
}

impl Kernel for FakeKernel {
    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        self.critical(f)
    }

    fn lock_from_isr<R>(&self, f: impl FnOnce() -> R) -> R {
        self.isr_locks.set(self.isr_locks.get() + 1);
        self.critical(f)
    }

    fn sleep_ms(&self, ms: u32) {
        assert!(!self.locked.get(), "sleep in critical section");
        self.sleeps.borrow_mut().push(ms);
        self.clock.advance(u64::from(ms) * 1_000_000);
        if let Some(hook) = self.sleep_hook.borrow().as_ref() {
            hook();
        }
    }

    fn set_timer(&self, delay_ms: u32) {
        assert!(self.locked.get(), "timer armed outside critical section");
        self.timer.set(Some(delay_ms));
        self.timer_sets.set(self.timer_sets.get() + 1);
    }

    fn reset_timer(&self) {
        self.timer.set(None);
    }

    fn broadcast_from_isr(&self, event: Event) {
        assert!(self.locked.get());
        self.events.borrow_mut().push(event);
    }
}

/// Input pin whose level the test changes through any clone
#[derive(Clone)]
pub struct FakePin(Rc<Cell<bool>>);

impl FakePin {
    pub fn new(high: bool) -> Self {
        Self(Rc::new(Cell::new(high)))
    }

    pub fn set(&self, high: bool) {
        self.0.set(high)
    }
}

impl InputPin for FakePin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

pub(crate) enum Mode {
    Command,
    /// Multiple block read, blocks are queued as they are clocked out
    Reading,
    /// Multiple block write, with the data packet being received if any
    Writing(Option<Vec<u8>>),
}

/// SD card answering in SPI mode
pub struct SimCard {
    /// Whether CMD0 gets an answer at all
    pub responds_to_reset: bool,
    /// Card rejects CMD8 as an illegal command
    pub legacy: bool,
    /// CCS bit reported in the OCR
    pub high_capacity: bool,
    /// ACMD41 rounds answered with idle state
    pub acmd41_busy: u32,
    /// CMD1 attempts answered with idle state
    pub cmd1_busy: u32,
    /// Fixed CMD1 answer
    pub cmd1_response: Option<u8>,
    pub blocklen_response: u8,
    /// CSD register, CMD9 is rejected without one
    pub csd: Option<[u8; 16]>,
    /// R1 of CMD18 and CMD25
    pub transfer_response: u8,
    /// Filler bytes ahead of every read data token
    pub read_stalls: usize,
    pub write_response: u8,
    /// Busy bytes after an accepted data packet
    pub write_busy: usize,
    /// Programming time after an accepted data packet, on top of `write_busy`
    pub write_busy_ms: u32,
    /// R1 of CMD12
    pub stop_response: u8,
    pub fail_receive: bool,
    /// Advanced by every clocked byte at the active link rate
    pub clock: Clock,

    pub active: Option<u32>,
    pub activations: Vec<u32>,
    pub selected: bool,
    /// Index of every command executed
    pub commands: Vec<u8>,
    /// Argument of the last CMD18 or CMD25
    pub transfer_argument: u32,
    /// CMD0 or CMD8 frames refused for a bad CRC
    pub crc_errors: usize,
    /// Bytes clocked with the card deselected
    pub dummy_clocks: usize,
    /// Accepted blocks in write order
    pub written: Vec<(u32, Vec<u8>)>,
    pub stop_tokens: usize,

    pub(crate) mode: Mode,
    pub(crate) frame: Vec<u8>,
    pub(crate) outgoing: VecDeque<u8>,
    pub(crate) idle: bool,
    pub(crate) app_command: bool,
    pub(crate) acmd41_rounds: u32,
    pub(crate) cmd1_rounds: u32,
    pub(crate) next_block: u32,
    pub(crate) busy_until: u64,
}

impl Default for SimCard {
    fn default() -> Self {
        Self {
            responds_to_reset: true,
            legacy: false,
            high_capacity: true,
            acmd41_busy: 0,
            cmd1_busy: 0,
            cmd1_response: None,
            blocklen_response: 0x00,
            csd: Some(V2_CSD),
            transfer_response: 0x00,
            read_stalls: 0,
            write_response: 0xE5,
            write_busy: 0,
            write_busy_ms: 0,
            stop_response: 0x00,
            fail_receive: false,
            clock: Clock::default(),
            active: None,
            activations: Vec::new(),
            selected: false,
            commands: Vec::new(),
            transfer_argument: 0,
            crc_errors: 0,
            dummy_clocks: 0,
            written: Vec::new(),
            stop_tokens: 0,
            mode: Mode::Command,
            frame: Vec::new(),
            outgoing: VecDeque::new(),
            idle: false,
            app_command: false,
            acmd41_rounds: 0,
            cmd1_rounds: 0,
            next_block: 0,
            busy_until: 0,
        }
    }
}

impl SimCard {
    /// Keep the data line low for `bytes` bytes
    pub fn busy(&mut self, bytes: usize) {
        self.outgoing.extend(iter::repeat(0x00).take(bytes));
    }

    /// Bytes queued but not clocked out yet
    pub fn pending(&self) -> usize {
        self.outgoing.len()
    }

    /// Current content of `index`
    pub fn block(&self, index: u32) -> Vec<u8> {
        match self.written.iter().rev().find(|(block, _)| *block == index) {
            Some((_, data)) => data.clone(),
            None => pattern(index),
        }
    }

    fn block_addressed(&self) -> bool {
        !self.legacy && self.high_capacity
    }

    fn respond(&mut self, bytes: &[u8]) {
        self.outgoing.push_back(0xFF);
        self.outgoing.extend(bytes);
    }

    fn queue_block(&mut self) {
        let data = self.block(self.next_block);
        self.next_block += 1;
        self.outgoing.extend(iter::repeat(0xFF).take(self.read_stalls));
        self.outgoing.push_back(0xFE);
        self.outgoing.extend(data);
        self.outgoing.extend([0x12, 0x34].iter());
    }

    fn next_byte(&mut self) -> u8 {
        let hz = u64::from(self.active.unwrap_or(LOW_SPEED));
        self.clock.advance(8_000_000_000 / hz);
        if !self.selected {
            self.dummy_clocks += 1;
            return 0xFF;
        }
        if self.outgoing.is_empty() && self.clock.now() < self.busy_until {
            return 0x00;
        }
        if self.outgoing.is_empty() {
            if let Mode::Reading = self.mode {
                self.queue_block();
            }
        }
        self.outgoing.pop_front().unwrap_or(0xFF)
    }

    fn accept(&mut self, byte: u8) {
        match core::mem::replace(&mut self.mode, Mode::Command) {
            Mode::Writing(packet) => self.mode = self.accept_data(packet, byte),
            mode => {
                self.mode = mode;
                self.accept_command(byte);
            }
        }
    }

    fn accept_data(&mut self, packet: Option<Vec<u8>>, byte: u8) -> Mode {
        let mut data = match packet {
            Some(data) => data,
            None => {
                return match byte {
                    0xFC => Mode::Writing(Some(Vec::with_capacity(514))),
                    0xFD => {
                        self.stop_tokens += 1;
                        Mode::Command
                    }
                    _ => Mode::Writing(None),
                }
            }
        };
        data.push(byte);
        if data.len() < 514 {
            return Mode::Writing(Some(data));
        }
        data.truncate(512);
        self.outgoing.push_back(self.write_response);
        if self.write_response & 0x1F == 0x05 {
            self.written.push((self.next_block, data));
            self.next_block += 1;
            self.outgoing.extend(iter::repeat(0x00).take(self.write_busy));
            self.busy_until = self.clock.now() + u64::from(self.write_busy_ms) * 1_000_000;
        }
        Mode::Writing(None)
    }

    fn accept_command(&mut self, byte: u8) {
        if self.frame.is_empty() && byte & 0xC0 != 0x40 {
            return;
        }
        self.frame.push(byte);
        if self.frame.len() < 6 {
            return;
        }
        let frame = core::mem::replace(&mut self.frame, Vec::new());
        let index = frame[0] & 0x3F;
        // SPI mode runs with CRC off, only CMD0 and CMD8 are checked
        if (index == 0 || index == 8) && (crc7(&frame[..5]) << 1) | 1 != frame[5] {
            self.crc_errors += 1;
            self.respond(&[0x08]);
            return;
        }
        let argument = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
        self.commands.push(index);
        let app = core::mem::replace(&mut self.app_command, false);
        self.execute(index, argument, app);
    }

    fn execute(&mut self, index: u8, argument: u32, app: bool) {
        let r1 = if self.idle { 0x01 } else { 0x00 };
        match index {
            0 => {
                if self.responds_to_reset {
                    self.idle = true;
                    self.acmd41_rounds = self.acmd41_busy;
                    self.cmd1_rounds = self.cmd1_busy;
                    self.respond(&[0x01]);
                }
            }
            8 if self.legacy => self.respond(&[0x05]),
            8 => {
                let echo = argument.to_be_bytes();
                self.respond(&[r1, 0x00, 0x00, echo[2] & 0x0F, echo[3]]);
            }
            55 => {
                self.app_command = true;
                self.respond(&[r1]);
            }
            41 if app => {
                if self.acmd41_rounds > 0 {
                    self.acmd41_rounds -= 1;
                    self.respond(&[0x01]);
                } else {
                    self.idle = false;
                    self.respond(&[0x00]);
                }
            }
            58 => {
                let ccs = if self.high_capacity { 0x40 } else { 0x00 };
                self.respond(&[r1, 0x80 | ccs, 0xFF, 0x80, 0x00]);
            }
            1 => match self.cmd1_response {
                Some(response) => self.respond(&[response]),
                None if self.cmd1_rounds > 0 => {
                    self.cmd1_rounds -= 1;
                    self.respond(&[0x01]);
                }
                None => {
                    self.idle = false;
                    self.respond(&[0x00]);
                }
            },
            16 => self.respond(&[self.blocklen_response]),
            9 => match self.csd {
                Some(csd) => {
                    self.respond(&[0x00, 0xFF, 0xFE]);
                    self.outgoing.extend(csd.iter());
                    self.outgoing.extend([0x56, 0x78].iter());
                }
                None => self.respond(&[0x04]),
            },
            18 | 25 => {
                self.transfer_argument = argument;
                if self.transfer_response != 0x00 {
                    self.respond(&[self.transfer_response]);
                    return;
                }
                let addressed = self.block_addressed();
                self.next_block = if addressed { argument } else { argument / 512 };
                self.respond(&[0x00]);
                self.mode = if index == 18 { Mode::Reading } else { Mode::Writing(None) };
            }
            12 => {
                self.mode = Mode::Command;
                self.outgoing.clear();
                self.respond(&[self.stop_response]);
            }
            _ => self.respond(&[r1 | 0x04]),
        }
    }
}

impl Transport for SimCard {
    type Config = u32;

    fn activate(&mut self, config: &u32) -> Result<(), MciError> {
        self.active = Some(*config);
        self.activations.push(*config);
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), MciError> {
        self.active = None;
        self.deselect()
    }

    fn select(&mut self) -> Result<(), MciError> {
        self.selected = true;
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), MciError> {
        self.selected = false;
        self.outgoing.clear();
        self.frame.clear();
        self.mode = Mode::Command;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MciError> {
        if self.selected {
            for &byte in bytes {
                self.accept(byte);
            }
        }
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), MciError> {
        if self.fail_receive {
            return Err(MciError::ReadError);
        }
        for byte in buffer.iter_mut() {
            *byte = self.next_byte();
        }
        Ok(())
    }

    fn ignore(&mut self, count: usize) -> Result<(), MciError> {
        if self.fail_receive {
            return Err(MciError::ReadError);
        }
        for _ in 0..count {
            self.next_byte();
        }
        Ok(())
    }
}
