// ==========================================
// 库存台账系统 - 对外接口层
// ==========================================

pub mod error;

pub use error::{ApiError, ApiResult};
