use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{select, Receiver};

use crate::commands::{Control, HELP};
use crate::lang::{pick, set_log_lang_zh};
use crate::logging::{log_line, LogLevel};
use crate::sensor::{Axis, Reading, SensorService};
use crate::squat::{CountEvent, CountKind, CounterConfig, CounterState, SquatCounter};
use crate::state::{target_label, unset_target_label, DisplayCount, SUBTEXT_COMPLETED, SUBTEXT_DONE, SUBTEXT_LOST};
use crate::voice::VoiceService;

/// 控制消息处理后，需要由外层循环完成的动作。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Axis(Axis),
    Status,
    Help,
    Quit,
}

/// 计数会话：唯一持有并修改 [`CounterState`] 的地方。
pub struct Session {
    counter: SquatCounter,
    state: CounterState,
    display: DisplayCount,
    voice: VoiceService,
}

impl Session {
    pub fn new(config: CounterConfig, axis: Axis, voice: VoiceService, now: Instant) -> Self {
        let counter = SquatCounter::new(config);
        let state = counter.new_state(now);
        let display = DisplayCount::new(config.target_squats, axis.buffer_name(), voice.is_enabled());
        Self { counter, state, display, voice }
    }

    pub fn display(&self) -> &DisplayCount { &self.display }

    pub fn status_json(&self) -> String {
        serde_json::to_string(&self.display).unwrap_or_default()
    }

    pub fn config(&self) -> &CounterConfig { self.counter.config() }

    fn refresh(&mut self) { self.display.sync(&self.state); }

    /// 一个采样 tick。读数失败按空档处理；网络断开时提示 "Connection lost!"。
    pub fn on_reading(&mut self, reading: Reading, now: Instant) -> Option<CountEvent> {
        let sample = match reading {
            Ok(v) => {
                if self.state.count() < self.state.target() { self.display.subtext = SUBTEXT_DONE; }
                Some(v)
            }
            Err(e) => {
                if e.is_connection() { self.display.subtext = SUBTEXT_LOST; }
                None
            }
        };
        let event = self.counter.ingest(&mut self.state, sample, now);
        if let Some(ev) = event { self.on_event(ev); }
        self.refresh();
        event
    }

    fn on_event(&mut self, ev: CountEvent) {
        let target = self.state.target();
        match ev.kind {
            CountKind::Progress => {
                log_line(LogLevel::Info, format!("{} {}", pick("[计数] 检测到下蹲，次数：", "[REP] Squat detected! Count:"), ev.count));
                self.voice.speak(ev.count.to_string());
            }
            CountKind::TargetReached => {
                log_line(LogLevel::Info, format!("{} {}", pick("[目标] 已完成目标：", "[TARGET] target reached:"), target));
                self.display.subtext = SUBTEXT_COMPLETED;
                self.voice.speak(target.to_string());
                self.voice.speak(format!("Congratulations! You have reached your target of {} squats!", target));
            }
            CountKind::Reset => {
                log_line(LogLevel::Info, pick("[重置] 超出目标，计数清零", "[RESET] squat after target, count back to 0"));
                self.display.subtext = SUBTEXT_DONE;
                self.display.target_label = unset_target_label();
            }
        }
    }

    fn update_config(&mut self, f: impl FnOnce(&mut CounterConfig)) {
        let mut cfg = *self.counter.config();
        f(&mut cfg);
        self.counter.set_config(cfg);
    }

    pub fn apply(&mut self, ctl: Control) -> Flow {
        log_line(LogLevel::Debug, format!("[CTRL] {:?}", ctl));
        let flow = match ctl {
            Control::SetTarget(n) => {
                self.state.set_target(n);
                self.display.target_label = target_label(n);
                log_line(LogLevel::Info, format!("{} {}", pick("[设置] 目标次数", "[SET] target squats"), n));
                Flow::Continue
            }
            Control::OverrideCount(n) => {
                self.state.override_count(n);
                Flow::Continue
            }
            Control::SetHeight(h) => {
                self.update_config(|c| c.height_threshold = h);
                log_line(LogLevel::Info, format!("{} {:.2} m/s²", pick("[设置] 加速度阈值", "[SET] acceleration threshold"), h));
                Flow::Continue
            }
            Control::SetWindow(n) => {
                self.update_config(|c| c.buffer_size = n);
                log_line(LogLevel::Info, format!("{} {}", pick("[设置] 滑动窗口（样本）", "[SET] moving window (samples)"), n));
                Flow::Continue
            }
            Control::SetInterval(s) => {
                self.update_config(|c| c.min_peak_interval = Duration::from_secs_f64(s));
                log_line(LogLevel::Info, format!("{} {:.1}s", pick("[设置] 两次下蹲最短间隔", "[SET] min time between squats"), s));
                Flow::Continue
            }
            Control::SetDistance(n) => {
                self.update_config(|c| c.distance_threshold = n);
                log_line(LogLevel::Info, format!("{} {}", pick("[设置] 峰间最小距离（样本）", "[SET] min peak distance (samples)"), n));
                Flow::Continue
            }
            Control::SetAxis(axis) => {
                self.display.axis = axis.buffer_name();
                log_line(LogLevel::Info, format!("{} {}", pick("[设置] 加速度通道", "[SET] axis"), axis.buffer_name()));
                Flow::Axis(axis)
            }
            Control::Voice(on) => {
                self.voice.set_enabled(on);
                self.display.voice = on;
                log_line(LogLevel::Info, if on { pick("[语音] 开启", "[VOICE] on") } else { pick("[语音] 关闭", "[VOICE] off") });
                Flow::Continue
            }
            Control::VoiceName(name) => {
                self.voice.set_voice_name(name);
                Flow::Continue
            }
            Control::LogLang { zh } => {
                set_log_lang_zh(zh);
                Flow::Continue
            }
            Control::Status => Flow::Status,
            Control::Help => Flow::Help,
            Control::Quit => Flow::Quit,
        };
        self.refresh();
        flow
    }

    pub fn shutdown(&mut self) { self.voice.shutdown(); }
}

/// 主循环：同时等待读数与控制消息；计数表变化时向 `out` 打印一行。
/// `quit` 或控制台关闭（stdin EOF）都会结束会话。
pub fn run_session<W: Write>(
    mut session: Session,
    mut sensor: SensorService,
    readings: Receiver<Reading>,
    controls: Receiver<Control>,
    mut out: W,
) -> Result<()> {
    let mut last_line = String::new();
    log_line(LogLevel::Info, pick("[会话] 开始计数", "[SESSION] counting started"));

    loop {
        select! {
            recv(readings) -> msg => match msg {
                Ok(reading) => { session.on_reading(reading, Instant::now()); }
                Err(_) => {
                    log_line(LogLevel::Info, pick("[会话] 采样线程已结束", "[SESSION] sensor thread ended"));
                    break;
                }
            },
            recv(controls) -> msg => match msg {
                Ok(ctl) => match session.apply(ctl) {
                    Flow::Continue => {}
                    Flow::Axis(axis) => sensor.set_axis(axis),
                    Flow::Status => writeln!(out, "{}", session.status_json())?,
                    Flow::Help => writeln!(out, "{}", HELP)?,
                    Flow::Quit => break,
                },
                Err(_) => {
                    log_line(LogLevel::Info, pick("[会话] 控制台已关闭", "[SESSION] console closed"));
                    break;
                }
            },
        }
        let line = session.display().meter_line();
        if line != last_line {
            writeln!(out, "{}", line)?;
            last_line = line;
        }
    }

    sensor.stop();
    session.shutdown();
    log_line(LogLevel::Info, pick("[会话] 结束", "[SESSION] stopped"));
    Ok(())
}
