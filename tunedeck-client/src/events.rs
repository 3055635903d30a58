//! Signals pushed from the data-access layer to the UI.

use crate::notifications::Notification;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The backend rejected our credentials; the UI should show its login surface.
    LoginRequired,
    /// A user-facing notification produced by the error-handling facade.
    Notify(Notification),
    SignedIn { username: String },
    SignedOut,
}
