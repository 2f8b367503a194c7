mod phyphox;
mod service;

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

pub use phyphox::{parse_reading, PhyphoxSource};
pub use service::{Reading, SensorService};

pub const DEFAULT_PORT: u16 = 8080;

/// 计数所用的加速度通道。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
	/// Z 轴加速度（手机平放时竖直方向）
	AccZ,
	/// 合加速度
	Absolute,
}

impl Axis {
	pub fn buffer_name(self) -> &'static str {
		match self { Axis::AccZ => "accZ", Axis::Absolute => "acc" }
	}
}

#[derive(Debug, Error)]
pub enum SensorError {
	#[error("request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("malformed response: {0}")]
	Json(#[from] serde_json::Error),
	#[error("no reading in buffer `{0}`")]
	Missing(&'static str),
	#[error("reading in buffer `{0}` is not a number")]
	NotANumber(&'static str),
}

impl SensorError {
	/// 网络层失败（手机断开/超时），界面上显示 "Connection lost!"。
	pub fn is_connection(&self) -> bool { matches!(self, SensorError::Http(_)) }
}

pub trait SampleSource: Send {
	fn read(&mut self, axis: Axis) -> Result<f64, SensorError>;
}

pub fn make_source(ip: Ipv4Addr, port: u16, timeout: Duration) -> anyhow::Result<Box<dyn SampleSource>> {
	Ok(Box::new(PhyphoxSource::new(ip, port, timeout)?))
}
