// ==========================================
// 库存台账系统 - SKU 分配器
// ==========================================
// 规则: 固定前缀 + 零填充十进制序号, 单调递增
// 红线: 序号永不复用; 分配必须与建档同事务
// 发号依据: sku_sequence 表的权威计数, 不从现存商品行反推
// (商品物理清除后, 现存最大 SKU 会回退, 计数不会)
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ProductRepository;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SkuGenerator {
    prefix: String,
    width: usize,
}

impl SkuGenerator {
    pub fn new(prefix: String, width: usize) -> Self {
        Self { prefix, width }
    }

    /// 在事务内分配下一个 SKU
    ///
    /// 读改写 sku_sequence 的权威计数; 计数行不存在时（存量库迁移）
    /// 从现存最大 SKU 反推一次, 此后一律走计数。
    pub fn next_sku_with(&self, conn: &Connection) -> RepositoryResult<String> {
        let last: Option<i64> = conn
            .query_row(
                "SELECT last_number FROM sku_sequence WHERE prefix = ?1",
                params![self.prefix],
                |row| row.get(0),
            )
            .optional()?;

        let next_number = match last {
            Some(n) => n + 1,
            None => match ProductRepository::find_last_sku_with(conn, &self.prefix)? {
                Some(last_sku) => self.next_from(&last_sku)?,
                None => 1,
            },
        };

        conn.execute(
            "INSERT INTO sku_sequence (prefix, last_number) VALUES (?1, ?2)
             ON CONFLICT(prefix) DO UPDATE SET last_number = ?2",
            params![self.prefix, next_number],
        )?;

        Ok(format!(
            "{}{:0width$}",
            self.prefix,
            next_number,
            width = self.width
        ))
    }

    /// 从已分配的最大 SKU 解析出下一个序号
    fn next_from(&self, last_sku: &str) -> RepositoryResult<i64> {
        let suffix = last_sku.strip_prefix(&self.prefix).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "sku".to_string(),
                message: format!("SKU 前缀不匹配: {}", last_sku),
            }
        })?;

        let number: i64 = suffix
            .parse()
            .map_err(|_| RepositoryError::FieldValueError {
                field: "sku".to_string(),
                message: format!("SKU 序号不是数字: {}", last_sku),
            })?;

        Ok(number + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_next_from_increments_suffix() {
        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert_eq!(generator.next_from("SKU-000041").unwrap(), 42);
    }

    #[test]
    fn test_next_from_rejects_foreign_prefix() {
        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert!(generator.next_from("ITEM-000041").is_err());
    }

    #[test]
    fn test_next_from_rejects_non_numeric_suffix() {
        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert!(generator.next_from("SKU-ABCDEF").is_err());
    }

    #[test]
    fn test_first_sku_on_empty_table() {
        let conn = test_conn();
        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert_eq!(generator.next_sku_with(&conn).unwrap(), "SKU-000001");
        assert_eq!(generator.next_sku_with(&conn).unwrap(), "SKU-000002");
    }

    #[test]
    fn test_migrates_from_existing_products() {
        // 存量库没有计数行时, 从现存最大 SKU 反推一次
        let conn = test_conn();
        conn.execute(
            "INSERT INTO products (sku, product_name, category, supplier, unit_price, \
             quantity, lifecycle_state, created_at, updated_at) \
             VALUES ('SKU-000007', '存量商品', '五金', '供应商', 1.0, 3, 'ACTIVE', \
             '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert_eq!(generator.next_sku_with(&conn).unwrap(), "SKU-000008");
    }

    #[test]
    fn test_counter_survives_row_deletion() {
        // 清除现存最大 SKU 的商品后, 计数不回退, 序号不复用
        let conn = test_conn();
        let generator = SkuGenerator::new("SKU-".to_string(), 6);
        assert_eq!(generator.next_sku_with(&conn).unwrap(), "SKU-000001");
        conn.execute("DELETE FROM products", []).unwrap();
        assert_eq!(generator.next_sku_with(&conn).unwrap(), "SKU-000002");
    }

    #[test]
    fn test_width_overflow_continues_sequence() {
        // 序号超出位宽后格式化结果直接变长, 序列不中断
        let generator = SkuGenerator::new("SKU-".to_string(), 3);
        assert_eq!(generator.next_from("SKU-999").unwrap(), 1000);
        assert_eq!(generator.next_from("SKU-1000").unwrap(), 1001);
    }
}
