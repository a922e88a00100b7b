mod bus;
mod emitter;

pub use bus::*;
pub use emitter::*;
