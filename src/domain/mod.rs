pub mod entities;
pub mod errors;
pub mod events;
pub mod profit_sharing;
pub mod value_objects;

pub use entities::{MerchantIdentity, OrderDescriptor, RefundDescriptor};
pub use errors::{PaymentError, PaymentResult, SignatureError};
pub use events::*;
pub use profit_sharing::{
    BillDownload, ReceiverDescriptor, ReceiverType, RelationType, ReturnOrderDescriptor, SharingOrderDescriptor,
    SharingReceiver, TarType, UnfreezeDescriptor,
};
pub use value_objects::{AppSdkConfig, BridgeConfig, LaunchPayload, Money, Terminal, TradeType};
