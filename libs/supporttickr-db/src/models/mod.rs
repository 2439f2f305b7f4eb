pub mod activity;
pub mod conversion;
pub mod invoice;
pub mod message;
pub mod org;
pub mod ticket;
pub mod time_entry;
pub mod user;

pub use activity::ActivityItem;
pub use conversion::{ApprovalSide, ConversionRequest};
pub use invoice::Invoice;
pub use message::Message;
pub use org::Organization;
pub use ticket::{Ticket, TicketStats};
pub use time_entry::TimeEntry;
pub use user::{Role, User};
