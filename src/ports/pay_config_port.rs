use crate::domain::errors::PaymentResult;
use crate::domain::{MerchantIdentity, Terminal};
use std::collections::HashMap;
use std::sync::Arc;

/// 微信支付配置端口
///
/// 宿主应用按终端（或租户）提供商户身份；`None` 表示回调等与终端无关的场景。
pub trait PayConfigPort: Send + Sync {
    fn get(&self, terminal: Option<Terminal>) -> PaymentResult<Arc<MerchantIdentity>>;

    /// 所有可能收到回调的商户，默认只有 `get(None)` 的那一个
    fn merchants(&self) -> Vec<Arc<MerchantIdentity>> {
        self.get(None).map(|merchant| vec![merchant]).unwrap_or_default()
    }
}

impl<F> PayConfigPort for F
where
    F: Fn(Option<Terminal>) -> PaymentResult<Arc<MerchantIdentity>> + Send + Sync,
{
    fn get(&self, terminal: Option<Terminal>) -> PaymentResult<Arc<MerchantIdentity>> {
        self(terminal)
    }
}

/// 固定配置：一个默认商户，可按终端覆盖
#[derive(Debug, Clone)]
pub struct StaticPayConfig {
    default: Arc<MerchantIdentity>,
    overrides: HashMap<Terminal, Arc<MerchantIdentity>>,
}

impl StaticPayConfig {
    pub fn new(default: MerchantIdentity) -> PaymentResult<Self> {
        default.validate()?;
        Ok(Self {
            default: Arc::new(default),
            overrides: HashMap::new(),
        })
    }

    pub fn with_terminal(mut self, terminal: Terminal, merchant: MerchantIdentity) -> PaymentResult<Self> {
        merchant.validate()?;
        self.overrides.insert(terminal, Arc::new(merchant));
        Ok(self)
    }
}

impl PayConfigPort for StaticPayConfig {
    fn get(&self, terminal: Option<Terminal>) -> PaymentResult<Arc<MerchantIdentity>> {
        Ok(terminal
            .and_then(|t| self.overrides.get(&t))
            .unwrap_or(&self.default)
            .clone())
    }

    /// 默认商户在前，按商户号去重
    fn merchants(&self) -> Vec<Arc<MerchantIdentity>> {
        let mut all = vec![self.default.clone()];
        for merchant in self.overrides.values() {
            if !all.iter().any(|m| m.mchid == merchant.mchid) {
                all.push(merchant.clone());
            }
        }
        all
    }
}
