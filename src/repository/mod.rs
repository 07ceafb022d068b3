// ==========================================
// 库存台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 约定: 带 `_with` 后缀的关联函数接受外部连接/事务,
//       供台账引擎把多表写入组合进同一个事务
// ==========================================

pub mod alert_repo;
pub mod audit_log_repo;
pub mod error;
pub mod product_repo;
pub mod transaction_log_repo;
pub mod user_repo;

pub use alert_repo::AlertRepository;
pub use audit_log_repo::AuditLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use product_repo::ProductRepository;
pub use transaction_log_repo::TransactionLogRepository;
pub use user_repo::UserRepository;
