//! TicketSmith persistence: the JSON codec for template/ticket aggregates,
//! the directory-backed active database with its sequence numbering and
//! annual rollover policy, the credential store and login model, and the
//! per-installation system database.

pub mod auth;
pub mod codec;
mod fsutil;
pub mod settings;
pub mod store;
pub mod system;

pub use auth::{AddUserOutcome, CredentialStore, LoginOutcome, Privilege};
pub use codec::{load_template, load_ticket, save_template, save_ticket, CodecError};
pub use settings::StoreSettings;
pub use store::{
    ticket_stem, ActiveStore, SavedTicket, Session, StoreError, DEFAULT_STORE_DIR, TEMPLATE_DIR,
    TICKET_DIR,
};
pub use system::SystemDatabase;
