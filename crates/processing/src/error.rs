//! Processing 错误类型

use contracts::ContractError;
use ingestion::IngestionError;
use signal::SignalError;
use thiserror::Error;

/// Worker errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// 读取或解析录制文件失败
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// 信号处理失败
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// 配置不可用 (如时间段格式错误)
    #[error(transparent)]
    Config(#[from] ContractError),

    /// 目录下没有可处理的子目录
    #[error("no subfolders found in {path}")]
    NoSubfolders {
        /// 被扫描的目录
        path: String,
    },

    /// 列目录失败
    #[error("failed to list {path}: {source}")]
    Io {
        /// 目录路径
        path: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },
}

impl ProcessingError {
    /// 构造列目录错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Processing Result 类型别名
pub type Result<T> = std::result::Result<T, ProcessingError>;
