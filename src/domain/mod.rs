// ==========================================
// 库存台账系统 - 领域层
// ==========================================
// 职责: 实体与类型定义, 不含数据访问与业务流程
// ==========================================

pub mod alert;
pub mod audit_log;
pub mod product;
pub mod stock_transaction;
pub mod types;
pub mod user;

pub use alert::{AlertSummary, LowStockAlert, NewLowStockAlert};
pub use audit_log::{AuditLog, NewAuditLog};
pub use product::{NewProduct, Product};
pub use stock_transaction::{NewStockTransaction, StockTransaction, TransactionQuery};
pub use types::{LifecycleState, MovementKind, Role, UserStatus};
pub use user::{NewUser, User};
