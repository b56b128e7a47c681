//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 记录格式错误：字段数不是 5，或字段不是整数
    #[error("malformed record at line {line_number}: {reason} (line: {line:?})")]
    MalformedRecord {
        /// 物理行号 (从 1 开始)
        line_number: u64,
        /// 原始行内容
        line: String,
        /// 错误原因
        reason: String,
    },

    /// 打开或读取数据源失败
    #[error("io failure on {source_name}: {source}")]
    Io {
        /// 数据源名称 (文件路径或流标签)
        source_name: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 文件不含任何样本
    #[error("no samples found in {source_name}")]
    EmptyRecording {
        /// 数据源名称
        source_name: String,
    },

    /// 增量格式缺少 info.txt 中的 start_time
    #[error("cannot find start_time in {info_path} for {source_name}")]
    MissingStartTime {
        /// 数据源名称
        source_name: String,
        /// 期望的 info.txt 路径
        info_path: String,
    },

    /// 第一列既不是增量也不是 unix 时间戳
    #[error("{source_name} does not match expected formats (first column max = {max_value})")]
    UnrecognizedTimeline {
        /// 数据源名称
        source_name: String,
        /// 第一列最大值
        max_value: u64,
    },

    /// 时间戳超出可表示的 UTC 范围
    #[error("{source_name} has a timestamp outside the representable range ({millis} ms)")]
    TimestampOutOfRange {
        /// 数据源名称
        source_name: String,
        /// 越界的 unix 毫秒值
        millis: f64,
    },
}

impl IngestionError {
    /// 构造 IO 错误
    pub fn io(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            source_name: source_name.into(),
            source,
        }
    }

    /// 是否为记录格式错误
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
