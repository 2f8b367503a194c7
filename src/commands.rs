use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::config::{check_range, ConfigError, HEIGHT_RANGE, INTERVAL_RANGE, TARGET_RANGE, WINDOW_RANGE};
use crate::sensor::Axis;

/// 控制台可下发给计数会话的操作（对应原界面上的微调框、滑块与开关）。
#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    SetTarget(u32),
    OverrideCount(u32),
    SetHeight(f64),
    SetWindow(usize),
    SetInterval(f64),
    SetDistance(usize),
    SetAxis(Axis),
    Voice(bool),
    VoiceName(Option<String>),
    LogLang { zh: bool },
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{arg}` is not a valid value for `{cmd}`")]
    BadValue { cmd: &'static str, arg: String },
    #[error(transparent)]
    Range(#[from] ConfigError),
}

pub const HELP: &str = "commands: target N | count N | height X | window N | interval X | distance N | \
axis z|abs | voice on|off | voice-name NAME|default | lang zh|en | status | quit";

fn number<T: std::str::FromStr>(cmd: &'static str, arg: Option<&str>) -> Result<T, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(cmd))?;
    arg.parse::<T>().map_err(|_| CommandError::BadValue { cmd, arg: arg.to_string() })
}

fn choice(cmd: &'static str, arg: Option<&str>) -> Result<String, CommandError> {
    arg.map(|a| a.to_lowercase()).ok_or(CommandError::MissingArgument(cmd))
}

/// 解析一行控制台输入。空行返回 `Ok(None)`。
pub fn parse_command(line: &str) -> Result<Option<Control>, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else { return Ok(None) };
    let arg = parts.next();
    let ctl = match cmd.to_lowercase().as_str() {
        "target" => Control::SetTarget(check_range("target", &TARGET_RANGE, number("target", arg)?)?),
        "count" => Control::OverrideCount(number("count", arg)?),
        "height" => Control::SetHeight(check_range("height", &HEIGHT_RANGE, number("height", arg)?)?),
        "window" => Control::SetWindow(check_range("window", &WINDOW_RANGE, number("window", arg)?)?),
        "interval" => Control::SetInterval(check_range("interval", &INTERVAL_RANGE, number("interval", arg)?)?),
        "distance" => {
            let d: usize = number("distance", arg)?;
            if d == 0 { return Err(ConfigError::NotPositive("distance").into()); }
            Control::SetDistance(d)
        }
        "axis" => match choice("axis", arg)?.as_str() {
            "z" | "accz" => Control::SetAxis(Axis::AccZ),
            "abs" | "absolute" | "acc" => Control::SetAxis(Axis::Absolute),
            other => return Err(CommandError::BadValue { cmd: "axis", arg: other.to_string() }),
        },
        "voice" => match choice("voice", arg)?.as_str() {
            "on" => Control::Voice(true),
            "off" => Control::Voice(false),
            other => return Err(CommandError::BadValue { cmd: "voice", arg: other.to_string() }),
        },
        "voice-name" => {
            let name = arg.ok_or(CommandError::MissingArgument("voice-name"))?;
            if name.eq_ignore_ascii_case("default") { Control::VoiceName(None) } else { Control::VoiceName(Some(name.to_string())) }
        }
        "lang" => match choice("lang", arg)?.as_str() {
            "zh" => Control::LogLang { zh: true },
            "en" => Control::LogLang { zh: false },
            other => return Err(CommandError::BadValue { cmd: "lang", arg: other.to_string() }),
        },
        "status" => Control::Status,
        "help" | "?" => Control::Help,
        "quit" | "exit" | "q" => Control::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(ctl))
}

/// 逐行读取控制台命令并转发；`quit` 或接收端关闭时结束。
pub fn read_commands<R: BufRead>(input: R, tx: &Sender<Control>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Ok(Some(ctl)) => {
                let quit = ctl == Control::Quit;
                if tx.send(ctl).is_err() || quit { break; }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }
}

pub fn spawn_console(tx: Sender<Control>) -> JoinHandle<()> {
    thread::spawn(move || read_commands(io::stdin().lock(), &tx))
}
