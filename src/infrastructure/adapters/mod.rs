pub mod wechat_pay_adapter;

pub use wechat_pay_adapter::WeChatPayAdapter;
