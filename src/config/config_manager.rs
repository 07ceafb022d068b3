// ==========================================
// 库存台账系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 连接: 独立连接, 与主连接互不阻塞
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 覆写 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 审计排障时记录当时的配置口径
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
            ))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 低库存预警配置 =====

    /// 获取默认低库存阈值（商品未单独设置阈值时生效）
    pub fn get_low_stock_default_threshold(&self) -> Result<i64, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::LOW_STOCK_DEFAULT_THRESHOLD, "10")?;
        Ok(value.parse::<i64>().unwrap_or(10))
    }

    // ===== 生命周期保留期配置 =====

    /// 获取软删除恢复窗口（天）
    pub fn get_restore_window_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::RESTORE_WINDOW_DAYS, "30")?;
        Ok(value.parse::<i64>().unwrap_or(30))
    }

    /// 获取自动清除窗口（天）
    pub fn get_purge_window_days(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PURGE_WINDOW_DAYS, "30")?;
        Ok(value.parse::<i64>().unwrap_or(30))
    }

    /// 校验保留期配置: 自动清除窗口不得短于恢复窗口
    ///
    /// 否则会出现"仍在恢复期内却已被物理删除"的数据丢失窗口。
    pub fn validate_retention_windows(&self) -> Result<(), Box<dyn Error>> {
        let restore = self.get_restore_window_days()?;
        let purge = self.get_purge_window_days()?;
        if purge < restore {
            return Err(format!(
                "保留期配置冲突: purge_window_days({}) 不得小于 restore_window_days({})",
                purge, restore
            )
            .into());
        }
        Ok(())
    }

    // ===== 调度周期配置 =====

    /// 获取预警核对巡检周期（小时）
    pub fn get_reconcile_interval_hours(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::RECONCILE_INTERVAL_HOURS, "6")?;
        Ok(value.parse::<i64>().unwrap_or(6))
    }

    /// 获取低库存日报周期（小时）
    pub fn get_daily_report_interval_hours(&self) -> Result<i64, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::DAILY_REPORT_INTERVAL_HOURS, "24")?;
        Ok(value.parse::<i64>().unwrap_or(24))
    }

    /// 获取自动清除巡检周期（小时）
    pub fn get_purge_interval_hours(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PURGE_INTERVAL_HOURS, "24")?;
        Ok(value.parse::<i64>().unwrap_or(24))
    }

    // ===== SKU 编号配置 =====

    /// 获取 SKU 前缀
    pub fn get_sku_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::SKU_PREFIX, "SKU-")
    }

    /// 获取 SKU 序号位宽（零填充位数）
    pub fn get_sku_number_width(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::SKU_NUMBER_WIDTH, "6")?;
        Ok(value.parse::<usize>().unwrap_or(6))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 低库存预警
    pub const LOW_STOCK_DEFAULT_THRESHOLD: &str = "low_stock_default_threshold";

    // 生命周期保留期
    pub const RESTORE_WINDOW_DAYS: &str = "restore_window_days";
    pub const PURGE_WINDOW_DAYS: &str = "purge_window_days";

    // 调度周期
    pub const RECONCILE_INTERVAL_HOURS: &str = "reconcile_interval_hours";
    pub const DAILY_REPORT_INTERVAL_HOURS: &str = "daily_report_interval_hours";
    pub const PURGE_INTERVAL_HOURS: &str = "purge_interval_hours";

    // SKU 编号
    pub const SKU_PREFIX: &str = "sku_prefix";
    pub const SKU_NUMBER_WIDTH: &str = "sku_number_width";
}
