use crate::domain::AuthGate;
use crate::domain_model::LoginTokens;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

/// Console stand-in for a login form. Each prompt reads a refresh token and
/// an optional access token, one per line; an empty first line cancels.
pub async fn run_console_login<R>(
    gate: Arc<AuthGate>,
    mut prompts: Receiver<()>,
    input: R,
    cancel: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(()) = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        prompt = prompts.recv() => prompt,
    } {
        let success = match read_login(&mut lines).await {
            Ok(Some(tokens)) => match gate.save_login(&tokens) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("login rejected: {e}");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                tracing::error!("failed to read login input: {e}");
                false
            }
        };
        gate.notify_login_complete(success).await;
    }
    tracing::debug!("console login stopped");
}

async fn read_login<R>(lines: &mut Lines<R>) -> io::Result<Option<LoginTokens>>
where
    R: AsyncBufRead + Unpin,
{
    eprintln!("login required: paste a refresh token (empty line cancels)");
    let refresh_raw = match next_non_blank(lines).await? {
        Some(refresh_raw) => refresh_raw,
        None => return Ok(None),
    };
    eprintln!("access token (optional, empty line skips)");
    let access_raw = next_non_blank(lines).await?;

    Ok(Some(LoginTokens {
        access_raw,
        refresh_raw,
    }))
}

async fn next_non_blank<R>(lines: &mut Lines<R>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_owned())
        .filter(|line| !line.is_empty()))
}
