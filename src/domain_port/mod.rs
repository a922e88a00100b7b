// store

mod key_value_store;

pub use key_value_store::*;

// collaborators

mod renewal_transport;
mod token_codec;

pub use renewal_transport::*;
pub use token_codec::*;
