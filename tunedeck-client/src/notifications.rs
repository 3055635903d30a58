//! User-facing notifications and the error-handling facade.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tunedeck_core::{flatten_validation_errors, ApiError, ErrorKind};

use crate::error::ConsoleError;
use crate::events::ClientEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Retry,
    Login,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// The notification shown for an API error.
    pub fn for_error(error: &ApiError) -> Self {
        let notification = Self::new(NotificationLevel::Error, error.message.clone());
        match error.kind() {
            ErrorKind::NetworkFailure | ErrorKind::ServerFailure => {
                notification.with_action(NotificationAction::Retry)
            }
            ErrorKind::AuthFailure => notification.with_action(NotificationAction::Login),
            _ => notification,
        }
    }
}

/// Maps failures to [`ApiError`] and emits exactly one notification each.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    events: broadcast::Sender<ClientEvent>,
}

impl ErrorHandler {
    pub fn new(events: broadcast::Sender<ClientEvent>) -> Self {
        Self { events }
    }

    /// Notify about a structured error and hand it back for branching.
    pub fn handle(&self, error: ApiError) -> ApiError {
        self.show(Notification::for_error(&error));
        error
    }

    /// Normalize an arbitrary fault, notify, and return the normalized error.
    ///
    /// Structured errors, bare or wrapped in [`ConsoleError::Api`], pass
    /// through with their code intact.
    pub fn handle_fault(&self, fault: &(dyn std::error::Error + 'static)) -> ApiError {
        match fault.downcast_ref::<ConsoleError>() {
            Some(ConsoleError::Api(err)) => self.handle(err.clone()),
            _ => self.handle(ApiError::from_fault(fault)),
        }
    }

    /// Show field validation failures as one message, one line per field.
    pub fn handle_validation<I, K, M>(&self, errors: I)
    where
        I: IntoIterator<Item = (K, M)>,
        K: AsRef<str>,
        M: IntoIterator,
        M::Item: AsRef<str>,
    {
        let message = flatten_validation_errors(errors);
        self.show(Notification::new(NotificationLevel::Error, message));
    }

    fn show(&self, notification: Notification) {
        tracing::error!(message = %notification.message, "API error");
        // No subscribers is fine: the notification is best-effort.
        let _ = self.events.send(ClientEvent::Notify(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ClientEvent::Notify(n) = event {
                out.push(n);
            }
        }
        out
    }

    #[test]
    fn test_handle_emits_one_notification() {
        let (tx, mut rx) = broadcast::channel(16);
        let handler = ErrorHandler::new(tx);

        let err = handler.handle(ApiError::new(404, "artist not found"));
        assert!(err.is_not_found());

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "artist not found");
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert_eq!(notes[0].action, None);
    }

    #[test]
    fn test_handle_fault_normalizes_to_network_code() {
        let (tx, mut rx) = broadcast::channel(16);
        let handler = ErrorHandler::new(tx);

        let fault = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = handler.handle_fault(&fault);
        assert!(err.is_network());

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].action, Some(NotificationAction::Retry));
    }

    #[test]
    fn test_handle_fault_keeps_structured_codes() {
        let (tx, mut rx) = broadcast::channel(16);
        let handler = ErrorHandler::new(tx);

        let err = handler.handle_fault(&ApiError::new(404, "artist not found"));
        assert_eq!(err.code, 404);
        assert_eq!(err.message, "artist not found");

        let wrapped = ConsoleError::Api(ApiError::new(401, "unauthorized"));
        let err = handler.handle_fault(&wrapped);
        assert!(err.is_auth());

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].message, "artist not found");
        assert_eq!(notes[1].action, Some(NotificationAction::Login));
    }

    #[test]
    fn test_handle_validation_flattens_fields() {
        let (tx, mut rx) = broadcast::channel(16);
        let handler = ErrorHandler::new(tx);

        handler.handle_validation(vec![
            ("name", vec!["is required"]),
            ("slug", vec!["is taken", "is too short"]),
        ]);

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "name: is required\nslug: is taken, is too short");
    }

    #[test]
    fn test_auth_notification_suggests_login() {
        let note = Notification::for_error(&ApiError::new(401, "unauthorized"));
        assert_eq!(note.action, Some(NotificationAction::Login));
    }

    #[test]
    fn test_handle_without_subscribers_does_not_fail() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let handler = ErrorHandler::new(tx);
        let err = handler.handle(ApiError::new(500, "boom"));
        assert!(err.is_server());
    }
}
