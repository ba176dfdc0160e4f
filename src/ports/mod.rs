pub mod notification_port;
pub mod pay_config_port;
pub mod wechat_pay_port;

pub use notification_port::{
    FnHandler, HandlerOutcome, HandlerResult, NotificationHandler, NotifyReply, handler_fn,
};
pub use pay_config_port::{PayConfigPort, StaticPayConfig};
pub use wechat_pay_port::{
    HttpMethod, SignatureHeaders, UpstreamRequest, UpstreamResponse, WeChatPayPort,
};
