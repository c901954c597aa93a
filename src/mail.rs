use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::MailConfig;

/// Outbound mail transport. Injected into the auth service so tests can
/// substitute a fake; delivery failure never fails the calling request.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Transport posting JSON to an HTTP mail API (Resend/Mailgun-style).
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = OutboundMessage {
            from: &self.config.from_address,
            to,
            subject,
            text: body,
        };
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&message)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("mail API returned {}", response.status());
        }
        debug!(to = %to, subject = %subject, "mail delivered");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records sent messages; optionally fails every send.
    #[derive(Default)]
    pub struct FakeMailer {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("fake mailer down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }
}
