use crate::domain::{PaymentEvent, PaymentEventKind};
use crate::ports::notification_port::{HandlerOutcome, NotificationHandler, NotifyReply};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

/// 处理器关心的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubscription {
    Any,
    PaymentSucceeded,
    RefundSucceeded,
    /// 除支付成功、退款成功以外的通知
    Other,
}

impl EventSubscription {
    pub fn matches(&self, kind: &PaymentEventKind) -> bool {
        match self {
            EventSubscription::Any => true,
            EventSubscription::PaymentSucceeded => *kind == PaymentEventKind::PaymentSucceeded,
            EventSubscription::RefundSucceeded => *kind == PaymentEventKind::RefundSucceeded,
            EventSubscription::Other => matches!(kind, PaymentEventKind::Other(_)),
        }
    }
}

/// 有处理器给出应答后是否继续执行后续处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// 全部执行，第一个应答生效
    #[default]
    RunAll,
    /// 第一个应答后停止
    StopOnResponse,
}

/// 支付事件分发器
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Vec<(EventSubscription, Arc<dyn NotificationHandler>)>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn subscribe<H>(self, subscription: EventSubscription, handler: H) -> Self
    where
        H: NotificationHandler + 'static,
    {
        self.subscribe_arc(subscription, Arc::new(handler))
    }

    pub fn subscribe_arc(mut self, subscription: EventSubscription, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handlers.push((subscription, handler));
        self
    }

    pub fn on_payment_succeeded<H: NotificationHandler + 'static>(self, handler: H) -> Self {
        self.subscribe(EventSubscription::PaymentSucceeded, handler)
    }

    pub fn on_refund_succeeded<H: NotificationHandler + 'static>(self, handler: H) -> Self {
        self.subscribe(EventSubscription::RefundSucceeded, handler)
    }

    pub fn on_any<H: NotificationHandler + 'static>(self, handler: H) -> Self {
        self.subscribe(EventSubscription::Any, handler)
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 按注册顺序执行订阅了该事件的处理器
    ///
    /// 处理器报错或 panic 只记录日志；没有处理器应答时返回默认成功应答。
    pub async fn dispatch(&self, event: &PaymentEvent) -> NotifyReply {
        let mut reply: Option<NotifyReply> = None;

        let subscribed = self
            .handlers
            .iter()
            .enumerate()
            .filter(|(_, (subscription, _))| subscription.matches(event.kind()));

        for (index, (_, handler)) in subscribed {
            let outcome = match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    error!(
                        index,
                        event_id = %event.envelope().id,
                        event_type = %event.envelope().event_type,
                        panic = panic_message(panic.as_ref()),
                        "notification handler panicked"
                    );
                    continue;
                }
            };

            match outcome {
                Ok(HandlerOutcome::Continue) => {}
                Ok(HandlerOutcome::Respond(response)) => {
                    if reply.is_none() {
                        reply = Some(response);
                    } else {
                        debug!(index, "later handler response ignored");
                    }
                    if self.policy == DispatchPolicy::StopOnResponse {
                        break;
                    }
                }
                Err(e) => {
                    error!(
                        index,
                        event_id = %event.envelope().id,
                        event_type = %event.envelope().event_type,
                        error = ?e,
                        "notification handler failed"
                    );
                }
            }
        }

        reply.unwrap_or_else(NotifyReply::success)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
