use gatekeep::logger::*;
use gatekeep::session::*;
use gatekeep::settings::*;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;
    debug!(filter = ?logger.current_filter(), "log filter reloaded");

    let context = SessionContext::try_new(&project_settings)?;
    let cancel = CancellationToken::new();
    let console =
        context.spawn_console_login(BufReader::new(tokio::io::stdin()), cancel.clone());

    let gate = context.gate.clone();
    let outcome = match cli.command {
        Command::Headers => match gate.get_auth_headers().await {
            Some(headers) => {
                for (name, value) in headers.iter() {
                    println!("{name}: {value}");
                }
                Ok(())
            }
            None => Err(anyhow::anyhow!("no credential available")),
        },
        Command::Whoami => match gate.load_user().await {
            Some(user) => {
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            None => Err(anyhow::anyhow!("not logged in")),
        },
        Command::Admin => {
            let admin = gate.require_admin().await;
            println!("{admin}");
            Ok(())
        }
        Command::Logout => {
            gate.clear_session().await;
            Ok(())
        }
    };

    cancel.cancel();
    if let Err(e) = console.await {
        error!("console login task failed: {e}");
    }

    outcome
}
