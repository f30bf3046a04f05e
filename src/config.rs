use serde::Deserialize;

use crate::notify::{DeliveryConfig, SmtpConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub webhook_url: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>, // Defaults to 587; unparseable values disable the channel
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub to_email: Option<String>,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_url: std::env::var("LEAD_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .and_then(|raw| match url::Url::parse(&raw) {
                    Ok(_) => Some(raw),
                    Err(e) => {
                        tracing::warn!(
                            "LEAD_WEBHOOK_URL is not a valid URL ({}), webhook delivery disabled",
                            e
                        );
                        None
                    }
                }),
            smtp_host: std::env::var("SMTP_HOST")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            smtp_port: match std::env::var("SMTP_PORT").ok().filter(|s| !s.trim().is_empty()) {
                None => Some(587),
                Some(raw) => match raw.parse() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        tracing::warn!(
                            "SMTP_PORT is not a valid port ({}), email delivery disabled",
                            raw
                        );
                        None
                    }
                },
            },
            smtp_user: std::env::var("SMTP_USER")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            smtp_pass: std::env::var("SMTP_PASS")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            to_email: std::env::var("LEAD_TO_EMAIL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            rate_limit_max_requests: std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_MAX_REQUESTS must be a valid number"))
                .and_then(|value| {
                    if value == 0 {
                        anyhow::bail!("RATE_LIMIT_MAX_REQUESTS must be at least 1");
                    }
                    Ok(value)
                })?,
            rate_limit_window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_WINDOW_SECS must be a number of seconds"))
                .and_then(|value| {
                    if value == 0 {
                        anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be at least 1");
                    }
                    Ok(value)
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Rate limit: {} requests / {}s window",
            config.rate_limit_max_requests,
            config.rate_limit_window_secs
        );
        match &config.webhook_url {
            Some(url) => tracing::info!("Webhook delivery configured: {}", url),
            None => tracing::info!("LEAD_WEBHOOK_URL not set, webhook delivery disabled"),
        }
        if let (Some(host), Some(port), Some(_), Some(_), Some(to)) = (
            &config.smtp_host,
            config.smtp_port,
            &config.smtp_user,
            &config.smtp_pass,
            &config.to_email,
        ) {
            tracing::info!("Email delivery configured: {}:{} -> {}", host, port, to);
        } else {
            tracing::warn!(
                "Email configuration incomplete, email delivery disabled. Missing: {:?}",
                config.missing_email_vars()
            );
        }

        Ok(config)
    }

    fn missing_email_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.smtp_host.is_none() {
            missing.push("SMTP_HOST");
        }
        if self.smtp_port.is_none() {
            missing.push("SMTP_PORT");
        }
        if self.smtp_user.is_none() {
            missing.push("SMTP_USER");
        }
        if self.smtp_pass.is_none() {
            missing.push("SMTP_PASS");
        }
        if self.to_email.is_none() {
            missing.push("LEAD_TO_EMAIL");
        }
        missing
    }

    /// Assembles the delivery configuration handed to the dispatcher.
    ///
    /// The SMTP block is present only when every transport value is set; the
    /// dispatcher itself never reads the environment.
    pub fn delivery(&self) -> DeliveryConfig {
        let smtp = match (
            &self.smtp_host,
            self.smtp_port,
            &self.smtp_user,
            &self.smtp_pass,
        ) {
            (Some(host), Some(port), Some(user), Some(pass)) => Some(SmtpConfig {
                host: host.clone(),
                port,
                user: user.clone(),
                pass: pass.clone(),
            }),
            _ => None,
        };

        DeliveryConfig {
            webhook_url: self.webhook_url.clone(),
            smtp,
            to_address: self.to_email.clone(),
        }
    }
}
