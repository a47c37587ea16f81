pub mod bus;
pub mod response;

pub use bus::SpiBus;
