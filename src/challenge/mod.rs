/// Email one-time-code challenges
///
/// A challenge runs in two requests. `start` issues a code, mails it and
/// records what is being attempted under an opaque holder id (carried by the
/// client in a cookie). `verify` looks the attempt up by holder id, redeems
/// the code exactly once and establishes a session.
mod code_store;
mod login;
mod pending;
mod registration;

pub use code_store::CodeStore;
pub use login::LoginFlow;
pub use pending::{PendingLogin, PendingRegistration, PendingStore};
pub use registration::RegistrationFlow;
