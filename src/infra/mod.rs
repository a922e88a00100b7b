// store

mod file_store;
mod memory_store;

pub use file_store::*;
pub use memory_store::*;

// transport

mod fake_renewal_transport;
mod http_renewal_transport;

pub use fake_renewal_transport::*;
pub use http_renewal_transport::*;
