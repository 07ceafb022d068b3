// ==========================================
// 库存台账系统 - 应用组装层
// ==========================================

pub mod state;

pub use state::{default_db_path, AppState};
