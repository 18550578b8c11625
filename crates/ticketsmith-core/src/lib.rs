//! TicketSmith core engine: field model, merge-order composition, and the
//! template/ticket aggregates with their static-field resolution.
//!
//! Pure data and algorithms — persistence and the credential/store model
//! live in `ticketsmith-store`, presentation in the consumers.

pub mod compose;
pub mod field;
pub mod resolve;
pub mod template;
pub mod ticket;

pub use compose::{merge_by_priority, Merged, Prioritized};
pub use field::{
    sanitize_name, Change, Checkbox, FieldError, PageBounds, StaticField, StaticKind, Textbox,
};
pub use resolve::{resolve_statics, TicketSeed};
pub use template::Template;
pub use ticket::{CheckboxValue, StaticValue, TextboxValue, Ticket, TicketInput, LINE_BREAK};
