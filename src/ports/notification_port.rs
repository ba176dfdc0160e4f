use crate::domain::PaymentEvent;
use async_trait::async_trait;
use serde::Serialize;

/// 回调应答（状态码 + 微信要求的 code/message 报文）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyReply {
    #[serde(skip)]
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl NotifyReply {
    /// 微信要求的默认成功应答
    pub fn success() -> Self {
        Self {
            status: 200,
            code: "SUCCESS".to_string(),
            message: "成功".to_string(),
        }
    }

    /// 失败应答，微信会按退避策略重发通知
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            code: "FAIL".to_string(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == "SUCCESS"
    }
}

/// 处理器的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// 不干预应答
    Continue,
    /// 以此作为回调应答
    Respond(NotifyReply),
}

/// 处理器错误只记录日志，不影响应答
pub type HandlerResult = anyhow::Result<HandlerOutcome>;

/// 支付事件处理器
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, event: &PaymentEvent) -> HandlerResult;
}

/// 同步闭包处理器
pub struct FnHandler<F>(F);

/// 将闭包包装为处理器
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&PaymentEvent) -> HandlerResult + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> NotificationHandler for FnHandler<F>
where
    F: Fn(&PaymentEvent) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, event: &PaymentEvent) -> HandlerResult {
        (self.0)(event)
    }
}
