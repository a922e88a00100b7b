pub mod logger;
pub mod settings;

pub mod session;

pub mod domain;
pub mod domain_model;
pub mod domain_port;
pub mod event;
pub mod infra;

#[cfg(test)]
mod testutil;
