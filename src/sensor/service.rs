use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TrySendError};

use super::{Axis, SampleSource, SensorError};
use crate::lang::pick;
use crate::logging::{log_line, LogLevel};

pub type Reading = Result<f64, SensorError>;

/// 轮询线程：每个 tick 读一次手机，结果经有界通道送往计数循环。
pub struct SensorService {
    absolute: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorService {
    pub fn start(mut source: Box<dyn SampleSource>, axis: Axis, tick: Duration) -> (Self, Receiver<Reading>) {
        let (tx, rx) = bounded::<Reading>(16);
        let absolute = Arc::new(AtomicBool::new(axis == Axis::Absolute));
        let running = Arc::new(AtomicBool::new(true));

        let abs_flag = absolute.clone();
        let run_flag = running.clone();
        let handle = thread::spawn(move || {
            log_line(LogLevel::Info, format!("{} {}ms", pick("[采样] 轮询间隔", "[SENSOR] polling every"), tick.as_millis()));
            let mut was_lost = false;
            while run_flag.load(Ordering::SeqCst) {
                let started = Instant::now();
                let axis = if abs_flag.load(Ordering::SeqCst) { Axis::Absolute } else { Axis::AccZ };
                let reading = source.read(axis);
                match &reading {
                    Err(e) if e.is_connection() => {
                        if !was_lost { log_line(LogLevel::Info, format!("{} {}", pick("[采样] 连接断开：", "[SENSOR] connection lost:"), e)); }
                        was_lost = true;
                    }
                    Err(e) => log_line(LogLevel::Debug, format!("{} {}", pick("[采样]", "[SENSOR]"), e)),
                    Ok(_) => {
                        if was_lost { log_line(LogLevel::Info, pick("[采样] 连接恢复", "[SENSOR] connection restored")); }
                        was_lost = false;
                    }
                }
                // 计数循环落后时直接丢弃本次读数；接收端关闭则退出
                if let Err(TrySendError::Disconnected(_)) = tx.try_send(reading) { break; }
                if let Some(rest) = tick.checked_sub(started.elapsed()) { thread::sleep(rest); }
            }
            log_line(LogLevel::Info, pick("[采样] 轮询结束", "[SENSOR] polling stopped"));
        });

        (Self { absolute, running, handle: Some(handle) }, rx)
    }

    pub fn set_axis(&self, axis: Axis) {
        self.absolute.store(axis == Axis::Absolute, Ordering::SeqCst);
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() { let _ = h.join(); }
    }
}

impl Drop for SensorService {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
