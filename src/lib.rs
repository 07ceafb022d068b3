// ==========================================
// 库存台账系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 库存流水台账 + 低库存预警 + 软删除生命周期
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 审计留痕
pub mod audit;

// 通知投递
pub mod notify;

// 后台调度
pub mod scheduler;

// API 层 - 错误与对外口径
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{LifecycleState, MovementKind, Role, UserStatus};

// 领域实体
pub use domain::{
    AlertSummary, AuditLog, LowStockAlert, NewProduct, NewStockTransaction, NewUser, Product,
    StockTransaction, TransactionQuery, User,
};

// 引擎
pub use engine::{
    AdminDirectory, AlertEngine, AlertTransition, InventorySummary, LifecycleManager, PurgeReport,
    SkuGenerator, StockLedger,
};

// API
pub use api::{ApiError, ApiResult};

// 调度
pub use scheduler::{PurgeScheduler, ReconciliationScheduler, SweepReport};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "库存台账系统";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
