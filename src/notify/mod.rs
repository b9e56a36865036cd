//! Fire-and-forget email notifications, delivered through an HTTP mail
//! relay. Sends happen after the triggering state change has committed and
//! never block or fail the request that caused them.

use reqwest::Client;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Clone)]
pub struct Mailer {
    http: Client,
    relay_url: Option<String>,
    relay_token: Option<String>,
    from: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            http: Client::new(),
            relay_url: cfg.relay_url.clone(),
            relay_token: cfg.relay_token.clone(),
            from: cfg.from.clone(),
        }
    }

    /// Queue a send on a background task and return immediately. Without a
    /// configured relay this logs and drops the message.
    pub fn send(&self, email: Email) {
        let Some(url) = self.relay_url.clone() else {
            warn!(to = %email.to, subject = %email.subject, "mail relay not configured; dropping email");
            return;
        };
        let http = self.http.clone();
        let token = self.relay_token.clone();
        let payload = serde_json::json!({
            "from": self.from,
            "to": email.to,
            "subject": email.subject,
            "body": email.body,
        });

        tokio::spawn(async move {
            let mut req = http.post(&url).json(&payload);
            if let Some(token) = token {
                req = req.header("Authorization", format!("Bearer {token}"));
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(to = %payload["to"], "notification email sent");
                }
                Ok(resp) => {
                    warn!(
                        to = %payload["to"],
                        status = %resp.status(),
                        "mail relay rejected email"
                    );
                }
                Err(e) => {
                    warn!(to = %payload["to"], error = %e, "failed to reach mail relay");
                }
            }
        });
    }

    pub fn warning_email(to: &str, name: &str, warning_count: i32) -> Email {
        Email {
            to: to.to_string(),
            subject: "Warning Notification".to_string(),
            body: format!(
                "Hello {name},\n\nYou have received a warning for violating our marketplace \
                 policies. This is warning {warning_count} of 3. Please review our guidelines.\n"
            ),
        }
    }

    pub fn deactivation_email(to: &str, name: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Account Deactivated".to_string(),
            body: format!(
                "Hello {name},\n\nYour account has been deactivated after reaching 3 warnings. \
                 Contact support if you believe this is a mistake.\n"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_email_names_the_count() {
        let email = Mailer::warning_email("seller@example.com", "Ada", 2);
        assert_eq!(email.to, "seller@example.com");
        assert!(email.body.contains("warning 2 of 3"));
    }

    #[test]
    fn unconfigured_relay_drops_without_panicking() {
        let mailer = Mailer::new(&MailConfig {
            relay_url: None,
            relay_token: None,
            from: "Test <noreply@test>".into(),
        });
        mailer.send(Mailer::deactivation_email("seller@example.com", "Ada"));
    }
}
