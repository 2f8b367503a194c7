use std::io;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::unbounded;

use squat_o_meter::commands::{spawn_console, HELP};
use squat_o_meter::config::{prompt_ip, Cli};
use squat_o_meter::lang::{detect_zh, pick, set_log_lang_zh};
use squat_o_meter::logging::{self, log_line, LogLevel};
use squat_o_meter::sensor::{make_source, SensorService};
use squat_o_meter::session::{run_session, Session};
use squat_o_meter::voice::{SystemSpeaker, VoiceService, VoiceSettings};

fn main() -> anyhow::Result<()> {
    // 尝试加载本地环境变量文件（SQUAT_* 覆盖）
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let config = Cli::parse().into_config()?;

    // 初始默认：根据系统语言判定一次（LANG/OSLANG）
    let lang = std::env::var("LANG").ok();
    let oslang = std::env::var("OSLANG").ok();
    set_log_lang_zh(detect_zh(lang.as_deref(), oslang.as_deref()));

    if let Some(file) = logging::setup_logging(config.log_dir.as_deref()) {
        log_line(LogLevel::Debug, format!("{} {}", pick("[启动] 日志文件", "[BOOT] log file"), file.display()));
    }

    let ip = match config.ip {
        Some(ip) => ip,
        None => match prompt_ip(io::stdin().lock(), io::stdout())? {
            Some(ip) => ip,
            // 输入结束，直接退出
            None => return Ok(()),
        },
    };
    log_line(LogLevel::Info, format!("{} {}:{} ({})", pick("[启动] 连接手机", "[BOOT] phone at"), ip, config.port, config.axis.buffer_name()));

    let source = make_source(ip, config.port, config.http_timeout).context("creating HTTP client")?;
    let (sensor, readings) = SensorService::start(source, config.axis, config.tick);

    let settings = VoiceSettings { rate: config.speech_rate, name: config.voice_name.clone() };
    let voice = VoiceService::start(Box::new(SystemSpeaker), settings, config.voice_on);
    let session = Session::new(config.counter, config.axis, voice, Instant::now());

    let (ctl_tx, ctl_rx) = unbounded();
    // 控制台线程阻塞在 stdin 上，不等待其结束
    let _console = spawn_console(ctl_tx);
    eprintln!("{}", HELP);

    run_session(session, sensor, readings, ctl_rx, io::stdout())
}
