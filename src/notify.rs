//! Delivers [`Notification`]s after the transaction that produced them committed.

use anyhow::{Context, Result};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sqlx::MySqlPool;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::authz::Capability;
use crate::domain::notification::Notification;
use crate::model::role::Role;
use crate::repo::employee_repo;

#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    site_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let from = config
            .mail_from
            .parse::<Mailbox>()
            .context("MAIL_FROM is not a valid mailbox")?;

        let transport = match &config.smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .context("Failed to create SMTP relay")?
                    .port(config.smtp_port);
                if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                info!(%host, port = config.smtp_port, "SMTP notifications enabled");
                Some(builder.build())
            }
            None => {
                info!("SMTP_HOST not set, notifications will only be logged");
                None
            }
        };

        Ok(Self {
            transport,
            from,
            site_url: config.site_url.clone(),
        })
    }

    /// Sends in the background so the HTTP response does not wait on SMTP.
    pub fn spawn_dispatch(&self, pool: MySqlPool, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let mailer = self.clone();
        actix_web::rt::spawn(async move {
            mailer.dispatch(&pool, notifications).await;
        });
    }

    /// Sends every notification. Failures are logged and never returned.
    pub async fn dispatch(&self, pool: &MySqlPool, notifications: Vec<Notification>) {
        for notification in notifications {
            let recipients = match resolve_recipients(pool, &notification).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, ?notification, "Failed to resolve notification recipients");
                    continue;
                }
            };
            if recipients.is_empty() {
                debug!(?notification, "Notification has no recipients");
                continue;
            }

            let subject = notification.subject();
            let body = notification.body(&self.site_url);

            let Some(transport) = &self.transport else {
                info!(?recipients, %subject, "Notification (mail disabled)");
                continue;
            };

            let result = match build_message(&self.from, &recipients, &subject, body) {
                Ok(message) => transport.send(message).await.map(|_| ()).map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => info!(?recipients, %subject, "Notification sent"),
                Err(e) => warn!(error = %e, ?recipients, %subject, "Failed to send notification"),
            }
        }
    }
}

/// Roles whose holders review every request and so hear about each new one.
pub fn reviewer_role_ids() -> Vec<u8> {
    Role::iter()
        .filter(|r| r.capabilities().has(Capability::ReviewAll))
        .map(Role::id)
        .collect()
}

async fn resolve_recipients(pool: &MySqlPool, notification: &Notification) -> Result<Vec<String>> {
    let mut emails = Vec::new();
    match notification {
        Notification::RequestCreated { manager_id, .. } => {
            if let Some(manager_id) = manager_id {
                emails.extend(employee_repo::email_of(pool, *manager_id).await?);
            }
            emails.extend(employee_repo::emails_for_roles(pool, &reviewer_role_ids()).await?);
        }
        Notification::RequestDecided { employee_id, .. } => {
            emails.extend(employee_repo::email_of(pool, *employee_id).await?);
        }
    }
    Ok(dedup_emails(emails))
}

fn dedup_emails(emails: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    emails
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty() && seen.insert(e.to_lowercase()))
        .collect()
}

fn build_message(from: &Mailbox, to: &[String], subject: &str, body: String) -> Result<Message> {
    let mut builder = Message::builder().from(from.clone());
    for address in to {
        builder = builder.to(address
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient {address}"))?);
    }
    builder
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .context("Failed to build email")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reviewers_are_admin_and_hr() {
        let mut ids = reviewer_role_ids();
        ids.sort();
        assert_eq!(ids, vec![Role::Admin.id(), Role::Hr.id()]);
    }

    #[test]
    fn recipients_are_deduplicated_case_insensitively() {
        let emails = dedup_emails(vec![
            "boss@example.com".into(),
            "HR@example.com".into(),
            "Boss@Example.com".into(),
            " ".into(),
        ]);
        assert_eq!(emails, vec!["boss@example.com", "HR@example.com"]);
    }

    #[test]
    fn message_addresses_every_recipient() {
        let from: Mailbox = "Leave Tracker <noreply@example.com>".parse().unwrap();
        let msg = build_message(
            &from,
            &["a@example.com".into(), "b@example.com".into()],
            "Holiday Request Approved",
            "ok".into(),
        )
        .unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: Holiday Request Approved"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
    }

    #[test]
    fn invalid_recipient_is_an_error() {
        let from: Mailbox = "noreply@example.com".parse().unwrap();
        assert!(build_message(&from, &["not an address".into()], "s", "b".into()).is_err());
    }

    #[test]
    fn mailer_without_smtp_host_only_logs() {
        let mailer = Mailer::from_config(&Config::for_tests()).unwrap();
        assert!(mailer.transport.is_none());
    }
}
