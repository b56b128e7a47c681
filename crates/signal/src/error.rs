//! Signal 错误类型

use thiserror::Error;

/// Signal processing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    /// 滤波器参数非法
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// 信号长度不足以进行零相位滤波
    #[error("signal too short: {len} samples, need more than {required}")]
    SignalTooShort {
        /// 输入长度
        len: usize,
        /// 最小长度 (不含)
        required: usize,
    },

    /// 无法从时间戳估计采样率
    #[error("unable to estimate sampling rate: {0}")]
    SamplingRate(String),

    /// 输入长度不一致
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// 左侧长度
        left: usize,
        /// 右侧长度
        right: usize,
    },
}

impl SignalError {
    /// 构造滤波器参数错误
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }
}

/// Signal Result 类型别名
pub type Result<T> = std::result::Result<T, SignalError>;
