//! 配置校验模块
//!
//! 校验规则：
//! - window_minutes 在 1..=60
//! - PPI 阈值：low 在 300..=1000，high 在 1000..=3000，且 low < high
//! - channels 非空、无重复、不含 ambient
//! - 滤波器 0 < lowcut < highcut，order >= 1
//! - time_range 为合法的 HH:MM
//! - sink 名称非空且唯一

use std::collections::HashSet;

use contracts::{ContractError, ProcessingConfig};

/// 校验 ProcessingConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ProcessingConfig) -> Result<(), ContractError> {
    validate_analysis(config)?;
    validate_channels(config)?;
    validate_ppi_thresholds(config)?;
    validate_filters(config)?;
    validate_time_range(config)?;
    validate_sinks(config)?;
    Ok(())
}

fn validate_analysis(config: &ProcessingConfig) -> Result<(), ContractError> {
    let analysis = &config.analysis;
    if !(1..=60).contains(&analysis.window_minutes) {
        return Err(ContractError::config_validation(
            "analysis.window_minutes",
            format!(
                "window_minutes must be within 1..=60, got {}",
                analysis.window_minutes
            ),
        ));
    }
    if !(analysis.gap_minutes > 0.0 && analysis.gap_minutes.is_finite()) {
        return Err(ContractError::config_validation(
            "analysis.gap_minutes",
            format!("gap_minutes must be finite and > 0, got {}", analysis.gap_minutes),
        ));
    }
    Ok(())
}

/// 校验通道列表
fn validate_channels(config: &ProcessingConfig) -> Result<(), ContractError> {
    let channels = &config.analysis.channels;
    if channels.is_empty() {
        return Err(ContractError::config_validation(
            "analysis.channels",
            "at least one channel must be selected",
        ));
    }

    let mut seen = HashSet::new();
    for channel in channels {
        if !channel.is_photodetector() {
            return Err(ContractError::config_validation(
                "analysis.channels",
                format!("{channel} is a reference channel and cannot be processed"),
            ));
        }
        if !seen.insert(channel) {
            return Err(ContractError::config_validation(
                format!("analysis.channels[{channel}]"),
                "duplicate channel",
            ));
        }
    }
    Ok(())
}

/// 校验 PPI 阈值
fn validate_ppi_thresholds(config: &ProcessingConfig) -> Result<(), ContractError> {
    let ppi = &config.ppi;
    if !(300.0..=1000.0).contains(&ppi.low_ms) {
        return Err(ContractError::config_validation(
            "ppi.low_ms",
            format!("low_ms must be within 300..=1000, got {}", ppi.low_ms),
        ));
    }
    if !(1000.0..=3000.0).contains(&ppi.high_ms) {
        return Err(ContractError::config_validation(
            "ppi.high_ms",
            format!("high_ms must be within 1000..=3000, got {}", ppi.high_ms),
        ));
    }
    if ppi.low_ms >= ppi.high_ms {
        return Err(ContractError::config_validation(
            "ppi.low_ms / ppi.high_ms",
            format!(
                "low_ms ({}) must be < high_ms ({})",
                ppi.low_ms, ppi.high_ms
            ),
        ));
    }
    Ok(())
}

/// 校验滤波器参数
fn validate_filters(config: &ProcessingConfig) -> Result<(), ContractError> {
    let bands = [
        (
            "filter",
            config.filter.lowcut_hz,
            config.filter.highcut_hz,
            config.filter.order,
        ),
        (
            "detection",
            config.detection.clean_lowcut_hz,
            config.detection.clean_highcut_hz,
            config.detection.clean_order,
        ),
    ];

    for (section, low, high, order) in bands {
        if !(low > 0.0 && low < high && high.is_finite()) {
            return Err(ContractError::config_validation(
                section,
                format!("cutoffs must satisfy 0 < low < high, got {low}..{high}"),
            ));
        }
        if order == 0 {
            return Err(ContractError::config_validation(
                format!("{section}.order"),
                "filter order must be >= 1",
            ));
        }
    }
    Ok(())
}

fn validate_time_range(config: &ProcessingConfig) -> Result<(), ContractError> {
    if let Some(range) = &config.time_range {
        range.bounds()?;
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(config: &ProcessingConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
