pub mod discount_code;
pub mod entitlement;
pub mod event;
pub mod pending_transaction;
pub mod product;
pub mod transaction_record;

pub use discount_code::DiscountCode;
pub use entitlement::{Entitlement, SubscriptionStatus};
pub use event::{Channel, PaymentEvent, PaymentEventKind};
pub use pending_transaction::{PendingStatus, PendingTransaction};
pub use product::ProductKind;
pub use transaction_record::TransactionRecord;
