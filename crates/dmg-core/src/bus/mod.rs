#[allow(clippy::module_inception)]
mod bus;

pub use bus::Bus;
