mod console;
mod context;

pub use console::*;
pub use context::*;
