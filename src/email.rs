use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Transactional mail via SESv2 simple content.
#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(region: &str, from: &str) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Ok(Self {
            client: Client::new(&shared),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .context("build subject content")?;
        let body_content = Content::builder()
            .data(html)
            .charset("UTF-8")
            .build()
            .context("build body content")?;

        let message = Message::builder()
            .subject(subject_content)
            .body(Body::builder().html(body_content).build())
            .build();

        let result = self
            .client
            .send_email()
            .from_email_address(&self.from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;

        info!(to = %to, message_id = ?result.message_id(), "email sent");
        Ok(())
    }
}

// ---- Templates ----

pub fn welcome_body(firstname: &str) -> String {
    format!(
        r#"<html><body>
<h2>Welcome aboard, {firstname}!</h2>
<p>Your account has been created. Verify your email to start booking rides.</p>
</body></html>"#
    )
}

pub fn verify_email_body(firstname: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<html><body>
<p>Hi {firstname},</p>
<p>Your verification code is <strong>{code}</strong>.</p>
<p>It expires in {ttl_minutes} minutes.</p>
</body></html>"#
    )
}

pub fn reset_password_body(firstname: &str, code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<html><body>
<p>Hi {firstname},</p>
<p>Use code <strong>{code}</strong> to reset your password.</p>
<p>It expires in {ttl_minutes} minutes. If you did not request this, ignore this email.</p>
</body></html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_name_and_code() {
        let body = verify_email_body("Jane", "482913", 10);
        assert!(body.contains("Jane"));
        assert!(body.contains("482913"));
        assert!(body.contains("10 minutes"));

        let body = reset_password_body("Jane", "771204", 10);
        assert!(body.contains("771204"));
        assert!(body.contains("reset"));
    }

    #[test]
    fn welcome_body_greets_by_firstname() {
        assert!(welcome_body("Sam").contains("Welcome aboard, Sam"));
    }
}
