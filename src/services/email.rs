//! Outgoing mail for one-time codes.
//!
//! Uses SMTP via lettre when configured. Without SMTP settings the service
//! logs the message instead, which keeps local development self-contained.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

#[derive(Clone)]
enum Transport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
    },
    Log,
}

#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
}

impl EmailService {
    pub fn new(config: Option<&SmtpConfig>) -> Result<Self, SmtpError> {
        let transport = match config {
            Some(smtp) => {
                let credentials = Credentials::new(smtp.username.clone(), smtp.password.clone());
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
                    .port(smtp.port)
                    .credentials(credentials)
                    .build();
                Transport::Smtp {
                    mailer,
                    from_address: smtp.from_address.clone(),
                }
            }
            None => {
                log::warn!("SMTP is not configured; emails will be written to the log");
                Transport::Log
            }
        };
        Ok(Self { transport })
    }

    pub fn log_only() -> Self {
        Self {
            transport: Transport::Log,
        }
    }

    pub async fn send_otp(&self, to: &str, code: &str) -> Result<(), EmailError> {
        self.send(to, "Your OTP", &format!("Your OTP is {code}"))
            .await
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        match &self.transport {
            Transport::Smtp {
                mailer,
                from_address,
            } => {
                let email = Message::builder()
                    .from(
                        from_address
                            .parse()
                            .map_err(|_| EmailError::InvalidAddress(from_address.clone()))?,
                    )
                    .to(to
                        .parse()
                        .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
                    .subject(subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body.to_string())?;

                mailer.send(email).await?;
                log::debug!("Sent \"{subject}\" to {to}");
                Ok(())
            }
            Transport::Log => {
                log::info!("Email to {to}: {subject}: {body}");
                Ok(())
            }
        }
    }
}
