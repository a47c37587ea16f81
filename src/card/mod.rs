#[allow(clippy::module_inception)]
mod card;
pub mod command;
pub mod data;

pub use card::{Card, Type};
