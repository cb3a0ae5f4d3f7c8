// Entity Models
// Plain persisted records. Every tenant row carries the church_id it belongs to.

pub mod category;
pub mod church;
pub mod event;
pub mod member;
pub mod transaction;
pub mod user;

pub use category::{Category, TransactionType};
pub use church::{Church, ChurchSettings};
pub use event::Event;
pub use member::{Family, Member, MemberDetails, MemberStatus};
pub use transaction::{Transaction, TransactionDraft, TransactionView};
pub use user::{Role, UserProfile, UserUpdate};
