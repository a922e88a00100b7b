mod claims;
mod headers;
mod session;

pub use claims::*;
pub use headers::*;
pub use session::*;
