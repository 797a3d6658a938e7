//! Session lifecycle: credential persistence, login/restore/logout, and the
//! event loop reacting to channel events and cross-component signals.

mod manager;
mod store;

pub use manager::{
    AppPhase, AuthGateway, BuilderError, SessionError, SessionManager, SessionManagerBuilder,
};
pub use store::{
    clear_session, load_session, save_session, CredentialStore, FileStore, MemoryStore,
    StoreError, KEY_DRIVER_ID, KEY_PROFILE, KEY_ROLE, KEY_TOKEN,
};
