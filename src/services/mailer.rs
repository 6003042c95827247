use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};

/// Outbound plain-text mail.
#[allow(async_fn_in_trait)]
pub trait Mailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Hands messages to the local MTA through `sendmail -t -i`.
pub struct SendmailMailer {
    sendmail_path: String,
    recipient: String,
}

impl SendmailMailer {
    pub fn new(sendmail_path: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            sendmail_path: sendmail_path.into(),
            recipient: recipient.into(),
        }
    }

    fn render(&self, subject: &str, body: &str) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.recipient,
            sanitize_header(subject),
            body
        )
    }
}

fn sanitize_header(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

impl Mailer for SendmailMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.render(subject, body);

        let mut child = Command::new(&self.sendmail_path)
            .args(["-t", "-i"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Mail(format!("failed to start {}: {}", self.sendmail_path, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AppError::Mail(format!(
                "{} exited with {}: {}",
                self.sendmail_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Best-effort notification channel. Failures are logged and never propagate.
pub struct Notifier<M> {
    mailer: Option<M>,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: Option<M>) -> Self {
        Self { mailer }
    }

    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    /// Returns whether the message was handed off.
    pub async fn notify(&self, subject: &str, body: &str) -> bool {
        let Some(mailer) = &self.mailer else {
            tracing::warn!("No alert email configured, dropping notification: {}", subject);
            return false;
        };

        match mailer.send(subject, body).await {
            Ok(()) => {
                tracing::info!("Sent notification: {}", subject);
                true
            }
            Err(e) => {
                tracing::error!("Failed to send notification {:?}: {}", subject, e);
                false
            }
        }
    }
}

impl Notifier<SendmailMailer> {
    pub fn from_config(config: &crate::config::Config) -> Self {
        let mailer = config
            .alert_email
            .as_deref()
            .map(|to| SendmailMailer::new(config.sendmail_path.clone(), to));
        Self::new(mailer)
    }
}
