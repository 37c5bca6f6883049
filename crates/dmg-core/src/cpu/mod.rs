mod cb_ops;
#[allow(clippy::module_inception)]
mod cpu;
mod ops;

pub use cpu::{Cpu, Flag, R8};
