use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub static LOG_FILE_PATH: OnceLock<PathBuf> = OnceLock::new();

// 控制台日志级别：0=静默，1=计数/连接等关键日志，2=全部（含每次读数失败）
pub const CONSOLE_LOG_LEVEL: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info = 1,
    Debug = 2,
}

pub fn append_log_line(line: &str) {
    if let Some(p) = LOG_FILE_PATH.get() {
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(p) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// 写日志文件；级别足够时同时输出到 stderr（stdout 留给计数表）。
pub fn log_line(level: LogLevel, line: impl Into<String>) {
    let line = line.into();
    append_log_line(&format!("ts={}ms {}", now_ms(), line));
    if (level as u8) <= CONSOLE_LOG_LEVEL {
        eprintln!("{}", line);
    }
}

pub fn default_log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|mut dir| {
        dir.push(".squat-o-meter");
        dir.push("logs");
        dir
    })
}

/// 初始化日志文件并安装 panic 钩子。返回实际使用的日志文件路径。
pub fn setup_logging(dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match dir { Some(d) => d.to_path_buf(), None => default_log_dir()? };
    fs::create_dir_all(&dir).ok()?;
    let file = dir.join("app.log");
    if LOG_FILE_PATH.set(file.clone()).is_err() {
        return LOG_FILE_PATH.get().cloned();
    }
    let _ = OpenOptions::new().create(true).append(true).open(&file);
    append_log_line(&format!("[BOOT] ts={}ms app starting", now_ms()));

    let hook_file = file.clone();
    std::panic::set_hook(Box::new(move |info| {
        let msg = format!("[PANIC] ts={}ms {}", now_ms(), info);
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&hook_file) {
            let _ = writeln!(f, "{}", msg);
        }
        eprintln!("{}", msg);
    }));
    Some(file)
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_for_console_filter() {
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!((LogLevel::Info as u8) <= CONSOLE_LOG_LEVEL);
        assert!((LogLevel::Debug as u8) > CONSOLE_LOG_LEVEL);
    }

    #[test]
    fn default_dir_is_app_specific() {
        if let Some(dir) = default_log_dir() {
            assert!(dir.ends_with(".squat-o-meter/logs"));
        }
    }
}
