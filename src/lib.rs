//! MMC/SD card driver over SPI for small real-time kernels.
//!
//! A [`controller::Slot`] watches the card detect pin from a periodic timer,
//! a [`controller::Controller`] brings the card up and runs multiple block
//! transfers on a [`bus::Transport`].

#![no_std]

#[cfg(test)]
extern crate std;

pub mod block_device;
pub mod bus;
pub mod card;
pub mod commands;
pub mod config;
pub mod controller;
pub mod crc;
pub mod error;
pub mod kernel;
pub mod registers;
#[cfg(test)]
mod testutils;

pub use block_device::{BlockDevice, BlockDeviceInfo};
pub use controller::{Controller, Slot, State};
pub use error::Error;
