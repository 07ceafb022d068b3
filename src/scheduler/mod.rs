// ==========================================
// 库存台账系统 - 后台调度层
// ==========================================
// 约定: 巡检/清除的单轮执行与周期循环分离,
//       单轮入口同步可测, 循环只负责节拍与停机
// ==========================================

pub mod purge;
pub mod reconciliation;

pub use purge::PurgeScheduler;
pub use reconciliation::{ReconciliationScheduler, SweepReport};
