//! Row views over blocks

mod input;
mod output;

pub use input::InputRow;
pub use output::{CopyRowBehaviour, OutputRow};
