//! 微信支付 API v3 网关：回调验签分发与统一下单

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{
    DispatchPolicy, Dispatcher, EventSubscription, NotificationVerifier, PayNotifyService,
    PaymentService,
};
pub use domain::{PaymentError, PaymentResult, SignatureError};
