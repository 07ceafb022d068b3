// ==========================================
// 库存台账系统 - 业务引擎层
// ==========================================
// 分层: 引擎做业务规则与事务编排, 仓储只做数据映射
// ==========================================

pub mod alert;
pub mod lifecycle;
pub mod sku;
pub mod stock_ledger;

pub use alert::{AdminDirectory, AlertEngine, AlertTransition, RecipientDirectory};
pub use lifecycle::{LifecycleManager, PurgeReport};
pub use sku::SkuGenerator;
pub use stock_ledger::{InventorySummary, StockLedger};
