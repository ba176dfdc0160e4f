pub mod dispatcher;
pub mod dto;
pub mod notify_service;
pub mod order_builder;
pub mod payment_service;
pub mod profit_sharing_service;
pub mod response;
pub mod verifier;

pub use dispatcher::{DispatchPolicy, Dispatcher, EventSubscription};
pub use dto::*;
pub use notify_service::PayNotifyService;
pub use order_builder::{OrderBuilder, PrepayRequest};
pub use payment_service::PaymentService;
pub use profit_sharing_service::ProfitSharingService;
pub use response::{ResponseVerification, read_result};
pub use verifier::{MAX_CLOCK_OFFSET, NotificationVerifier};
