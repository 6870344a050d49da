//! Validation notifications.

use subval_model::SubmissionState;
use tracing::{info, warn};

/// Outgoing notifications. Delivery problems never reach the caller.
pub trait MailService: Send + Sync {
    fn send_validation_started(&self, release_name: &str, project_key: &str, recipients: &[String]);

    fn send_validation_result(
        &self,
        release_name: &str,
        project_key: &str,
        recipients: &[String],
        state: SubmissionState,
    );

    /// Reports an operational problem to the administrators.
    fn send_support_problem(&self, subject: &str, message: &str);
}

/// Keeps the addresses that look deliverable and warns about the rest.
pub fn valid_recipients(recipients: &[String]) -> Vec<&str> {
    recipients
        .iter()
        .map(|recipient| recipient.trim())
        .filter(|recipient| {
            let valid = is_address(recipient);
            if !valid {
                warn!(recipient, "skipping malformed email address");
            }
            valid
        })
        .collect()
}

fn is_address(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !candidate.chars().any(char::is_whitespace)
}

/// Writes every notification to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailService {
    admin: Option<String>,
}

impl LogMailService {
    pub fn new(admin: Option<String>) -> Self {
        Self { admin }
    }
}

impl MailService for LogMailService {
    fn send_validation_started(&self, release_name: &str, project_key: &str, recipients: &[String]) {
        for recipient in valid_recipients(recipients) {
            info!(
                recipient,
                release = release_name,
                project = project_key,
                "mail: validation started"
            );
        }
    }

    fn send_validation_result(
        &self,
        release_name: &str,
        project_key: &str,
        recipients: &[String],
        state: SubmissionState,
    ) {
        for recipient in valid_recipients(recipients) {
            info!(
                recipient,
                release = release_name,
                project = project_key,
                %state,
                "mail: validation finished"
            );
        }
    }

    fn send_support_problem(&self, subject: &str, message: &str) {
        match &self.admin {
            Some(admin) => warn!(recipient = %admin, subject, message, "mail: support issue"),
            None => warn!(subject, message, "support issue with no admin address configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_addresses_are_dropped() {
        let recipients = vec![
            "ops@example.org".to_string(),
            "not-an-address".to_string(),
            " lead@example.org ".to_string(),
            "a@b@c".to_string(),
            "@example.org".to_string(),
        ];
        assert_eq!(
            valid_recipients(&recipients),
            vec!["ops@example.org", "lead@example.org"]
        );
    }
}
