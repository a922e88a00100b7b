use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(about = "Inspect and manage the stored API session")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the Authorization header, logging in if needed
    Headers,
    /// Show the signed-in user
    Whoami,
    /// Check whether the session carries admin rights
    Admin,
    /// Forget the stored credentials
    Logout,
}
