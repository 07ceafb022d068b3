// ==========================================
// 库存台账系统 - API层错误类型
// ==========================================
// 职责: 定义对外错误类型, 转换Repository错误为用户友好的错误消息
// 约定: 每个错误带稳定错误码, 供外围调用方分支处理
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    Validation(String),

    #[error("库存不足: {product_name} 现存 {available}, 申请出库 {requested}")]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    #[error("已处于删除状态: {0}")]
    AlreadyDeleted(String),

    #[error("未处于删除状态: {0}")]
    NotDeleted(String),

    #[error("恢复窗口已过期: {0}")]
    Expired(String),

    #[error("操作被禁止: {0}")]
    Forbidden(String),

    // ==========================================
    // 配置与数据访问错误
    // ==========================================
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),
}

impl ApiError {
    /// 稳定错误码（外围调用方按码分支, 不解析中文消息）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ApiError::AlreadyDeleted(_) => "ALREADY_DELETED",
            ApiError::NotDeleted(_) => "NOT_DELETED",
            ApiError::Expired(_) => "EXPIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Config(_) => "CONFIG",
            ApiError::Database(_) => "DATABASE",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Validation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Validation(format!("字段{}错误: {}", field, message))
            }
            other => ApiError::Database(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "商品".to_string(),
            id: "SKU-000001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("商品"));
                assert!(msg.contains("SKU-000001"));
            }
            _ => panic!("Expected NotFound"),
        }

        let repo_err = RepositoryError::UniqueConstraintViolation(
            "UNIQUE constraint failed: products.sku".to_string(),
        );
        let api_err: ApiError = repo_err.into();
        assert_eq!(api_err.code(), "VALIDATION");
    }

    #[test]
    fn test_error_codes_stable() {
        let err = ApiError::InsufficientStock {
            product_name: "螺丝".to_string(),
            available: 3,
            requested: 10,
        };
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert!(err.to_string().contains("现存 3"));

        assert_eq!(ApiError::Expired("x".into()).code(), "EXPIRED");
        assert_eq!(ApiError::Forbidden("x".into()).code(), "FORBIDDEN");
    }
}
