use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;

use super::{Axis, SampleSource, SensorError};

/// phyphox "remote access" 接口：`GET /get?&<buffer>` 返回各缓冲区最新值。
pub struct PhyphoxSource {
    client: Client,
    base_url: String,
}

impl PhyphoxSource {
    pub fn new(ip: Ipv4Addr, port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, base_url: base_url(ip, port) })
    }

    pub fn url_for(&self, axis: Axis) -> String {
        format!("{}&{}", self.base_url, axis.buffer_name())
    }
}

pub fn base_url(ip: Ipv4Addr, port: u16) -> String { format!("http://{}:{}/get?", ip, port) }

impl SampleSource for PhyphoxSource {
    fn read(&mut self, axis: Axis) -> Result<f64, SensorError> {
        let body = self.client.get(self.url_for(axis)).send()?.error_for_status()?.text()?;
        parse_reading(&body, axis)
    }
}

/// 解析 `{"buffer": {"accZ": {"buffer": [v, ...]}}}`，取第一个值。
/// 数值字符串也接受；缺失或 `null` 视为无读数。
pub fn parse_reading(body: &str, axis: Axis) -> Result<f64, SensorError> {
    let name = axis.buffer_name();
    let data: Value = serde_json::from_str(body)?;
    let first = data
        .get("buffer")
        .and_then(|b| b.get(name))
        .and_then(|b| b.get("buffer"))
        .and_then(|b| b.get(0));
    match first {
        None | Some(Value::Null) => Err(SensorError::Missing(name)),
        Some(Value::Number(n)) => n.as_f64().ok_or(SensorError::NotANumber(name)),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| SensorError::NotANumber(name)),
        Some(_) => Err(SensorError::NotANumber(name)),
    }
}
