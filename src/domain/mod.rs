mod auth_gate;
mod credential_store;
mod jwt_token_codec;
mod login_flight;

pub use auth_gate::*;
pub use credential_store::*;
pub use jwt_token_codec::*;
pub use login_flight::*;
