//! Secret redaction (C3): keep JWT/API secrets and webhook secrets out of
//! logs, both as a callable helper and as a `tracing_subscriber::Layer` that
//! masks any field whose name looks secret-shaped before the line is
//! written, so a call site that forgets to redact doesn't leak cleartext.

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Replaces a secret with a fixed-width mask, keeping only enough of the
/// prefix to distinguish values in logs without exposing them.
pub fn redact(secret: &str) -> String {
    if secret.len() <= 8 {
        return "***".to_string();
    }
    format!("{}***", &secret[..4])
}

/// Field names treated as secret-shaped (matched as a substring,
/// case-insensitive): `jwt_secret`, `webhookSecret`, `apiKey`, etc. all match.
const SECRET_FIELD_MARKERS: &[&str] = &["secret", "token", "password", "apikey", "api_key"];

fn looks_like_secret(field_name: &str) -> bool {
    let lower = field_name.to_ascii_lowercase();
    SECRET_FIELD_MARKERS.iter().any(|marker| lower.contains(marker))
}

struct RedactingVisitor {
    fields: Vec<(&'static str, String)>,
}

impl RedactingVisitor {
    fn push(&mut self, field: &Field, value: String) {
        let value = if looks_like_secret(field.name()) { redact(&value) } else { value };
        self.fields.push((field.name(), value));
    }
}

impl Visit for RedactingVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

/// Drop-in event formatter that masks secret-shaped fields before a line is
/// written. Registered in place of a bare `fmt::layer()` so nothing
/// downstream ever sees an unredacted line.
pub struct RedactingLayer;

impl<S> Layer<S> for RedactingLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = RedactingVisitor { fields: Vec::new() };
        event.record(&mut visitor);

        let mut message = String::new();
        let mut rest = Vec::with_capacity(visitor.fields.len());
        for (name, value) in visitor.fields {
            if name == "message" {
                message = value;
            } else {
                rest.push(format!("{name}={value}"));
            }
        }

        println!(
            "{} {:>5} {}: {}{}{}",
            Utc::now().to_rfc3339(),
            level_label(*metadata.level()),
            metadata.target(),
            message,
            if rest.is_empty() { "" } else { " " },
            rest.join(" "),
        );
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_fully_masked() {
        assert_eq!(redact("short"), "***");
    }

    #[test]
    fn long_secrets_keep_a_prefix() {
        let masked = redact("wss_live_abcdef1234567890");
        assert_eq!(masked, "wss_***");
        assert!(!masked.contains("abcdef"));
    }

    #[test]
    fn secret_shaped_field_names_are_detected() {
        assert!(looks_like_secret("jwt_secret"));
        assert!(looks_like_secret("webhookSecret"));
        assert!(looks_like_secret("apiKey"));
        assert!(!looks_like_secret("agent_id"));
    }
}
