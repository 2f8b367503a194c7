use std::io::{BufRead, Write};
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::sensor::{Axis, DEFAULT_PORT};
use crate::squat::{
    CounterConfig, DEFAULT_BUFFER_SIZE, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_HEIGHT_THRESHOLD,
    DEFAULT_MIN_PEAK_INTERVAL_SEC, DEFAULT_TARGET_SQUATS,
};

// 可调范围（与原界面滑块/微调框一致）
pub const TARGET_RANGE: RangeInclusive<u32> = 0..=500;
pub const WINDOW_RANGE: RangeInclusive<usize> = 100..=500;
pub const HEIGHT_RANGE: RangeInclusive<f64> = 10.0..=15.0;
pub const INTERVAL_RANGE: RangeInclusive<f64> = 0.5..=2.0;

pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_SPEECH_RATE: u32 = 250;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange { name: &'static str, min: String, max: String, value: String },
    #[error("{0} must be at least 1")]
    NotPositive(&'static str),
}

pub fn check_range<T>(name: &'static str, range: &RangeInclusive<T>, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name,
            min: range.start().to_string(),
            max: range.end().to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "squat-o-meter")]
#[command(about = "Counts squats from a phone accelerometer (phyphox remote access) with spoken feedback")]
pub struct Cli {
    /// 手机 IPv4 地址；缺省时在终端提示输入
    #[arg(long, env = "SQUAT_PHONE_IP")]
    pub ip: Option<Ipv4Addr>,
    #[arg(long, env = "SQUAT_PHONE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// 使用合加速度而非 Z 轴
    #[arg(long, env = "SQUAT_ABSOLUTE")]
    pub absolute: bool,
    #[arg(long, env = "SQUAT_TARGET", default_value_t = DEFAULT_TARGET_SQUATS)]
    pub target: u32,
    /// 滑动窗口长度（样本数）
    #[arg(long, env = "SQUAT_WINDOW", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub window: usize,
    /// 峰值高度阈值 (m/s²)
    #[arg(long, env = "SQUAT_HEIGHT", default_value_t = DEFAULT_HEIGHT_THRESHOLD)]
    pub height: f64,
    /// 峰间最小样本距离
    #[arg(long, env = "SQUAT_DISTANCE", default_value_t = DEFAULT_DISTANCE_THRESHOLD)]
    pub distance: usize,
    /// 两次下蹲之间的最短时间（秒）
    #[arg(long = "min-interval", env = "SQUAT_MIN_INTERVAL", default_value_t = DEFAULT_MIN_PEAK_INTERVAL_SEC)]
    pub min_interval: f64,
    #[arg(long = "tick-ms", env = "SQUAT_TICK_MS", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,
    #[arg(long = "http-timeout-ms", env = "SQUAT_HTTP_TIMEOUT_MS", default_value_t = DEFAULT_HTTP_TIMEOUT_MS)]
    pub http_timeout_ms: u64,
    /// 关闭语音播报
    #[arg(long, env = "SQUAT_MUTE")]
    pub mute: bool,
    /// 语音名称（交给系统 TTS）
    #[arg(long, env = "SQUAT_VOICE")]
    pub voice: Option<String>,
    #[arg(long = "speech-rate", env = "SQUAT_SPEECH_RATE", default_value_t = DEFAULT_SPEECH_RATE)]
    pub speech_rate: u32,
    #[arg(long = "log-dir", env = "SQUAT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// 校验后的运行配置。
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub ip: Option<Ipv4Addr>,
    pub port: u16,
    pub axis: Axis,
    pub counter: CounterConfig,
    pub tick: Duration,
    pub http_timeout: Duration,
    pub voice_on: bool,
    pub voice_name: Option<String>,
    pub speech_rate: u32,
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let target = check_range("target", &TARGET_RANGE, self.target)?;
        let window = check_range("window", &WINDOW_RANGE, self.window)?;
        let height = check_range("height", &HEIGHT_RANGE, self.height)?;
        let interval = check_range("min-interval", &INTERVAL_RANGE, self.min_interval)?;
        if self.distance == 0 { return Err(ConfigError::NotPositive("distance")); }
        if self.tick_ms == 0 { return Err(ConfigError::NotPositive("tick-ms")); }
        if self.http_timeout_ms == 0 { return Err(ConfigError::NotPositive("http-timeout-ms")); }

        Ok(AppConfig {
            ip: self.ip,
            port: self.port,
            axis: if self.absolute { Axis::Absolute } else { Axis::AccZ },
            counter: CounterConfig {
                buffer_size: window,
                height_threshold: height,
                distance_threshold: self.distance,
                min_peak_interval: Duration::from_secs_f64(interval),
                target_squats: target,
            },
            tick: Duration::from_millis(self.tick_ms),
            http_timeout: Duration::from_millis(self.http_timeout_ms),
            voice_on: !self.mute,
            voice_name: self.voice,
            speech_rate: self.speech_rate,
            log_dir: self.log_dir,
        })
    }
}

/// 终端提示输入手机 IP，直到合法或输入结束（返回 None）。
pub fn prompt_ip<R: BufRead, W: Write>(mut input: R, mut output: W) -> std::io::Result<Option<Ipv4Addr>> {
    loop {
        write!(output, "Please enter the IP address: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 { return Ok(None); }
        match line.trim().parse::<Ipv4Addr>() {
            Ok(ip) => return Ok(Some(ip)),
            Err(_) => writeln!(output, "Invalid IP address entered")?,
        }
    }
}
