mod abbrev;
mod builtin;
mod registry;

pub use abbrev::Abbreviations;
pub use builtin::builtin_commands;
pub use registry::{CommandRegistry, parse_args};
