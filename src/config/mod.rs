// ==========================================
// 库存台账系统 - 配置模块
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, ConfigManager};
