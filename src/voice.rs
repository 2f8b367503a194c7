use std::io;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Sender};

use crate::lang::pick;
use crate::logging::{log_line, LogLevel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceSettings {
    /// 每分钟词数
    pub rate: u32,
    /// 系统 TTS 的语音名；None 为默认语音
    pub name: Option<String>,
}

pub trait Speaker: Send {
    fn say(&mut self, text: &str, settings: &VoiceSettings) -> Result<()>;
}

/// 调用系统自带的 TTS 命令行（Linux: espeak-ng/espeak，macOS: say，Windows: System.Speech）。
pub struct SystemSpeaker;

impl SystemSpeaker {
    fn run(program: &str, args: &[String]) -> io::Result<std::process::ExitStatus> {
        Command::new(program).args(args).stdout(Stdio::null()).stderr(Stdio::null()).status()
    }
}

impl Speaker for SystemSpeaker {
    fn say(&mut self, text: &str, settings: &VoiceSettings) -> Result<()> {
        let mut last_err = None;
        for (program, args) in tts_commands(text, settings) {
            match Self::run(program, &args) {
                Ok(status) if status.success() => return Ok(()),
                Ok(status) => return Err(anyhow!("{} exited with {}", program, status)),
                // 未安装则尝试下一个候选
                Err(e) if e.kind() == io::ErrorKind::NotFound => last_err = Some(anyhow!("{} not found", program)),
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no speech command for this platform")))
    }
}

/// 按平台生成候选 TTS 命令，依次尝试。
pub fn tts_commands(text: &str, settings: &VoiceSettings) -> Vec<(&'static str, Vec<String>)> {
    #[cfg(target_os = "macos")]
    {
        let mut args = vec!["-r".to_string(), settings.rate.to_string()];
        if let Some(name) = &settings.name { args.push("-v".into()); args.push(name.clone()); }
        args.push(text.to_string());
        vec![("say", args)]
    }
    #[cfg(target_os = "windows")]
    {
        // SAPI 语速 -10..10，约 180 wpm 为 0
        let sapi_rate = ((settings.rate as i32 - 180) / 20).clamp(-10, 10);
        let quote = |s: &str| s.replace('\'', "''");
        let mut script = format!(
            "Add-Type -AssemblyName System.Speech; $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; $s.Rate = {};",
            sapi_rate
        );
        if let Some(name) = &settings.name { script.push_str(&format!(" $s.SelectVoice('{}');", quote(name))); }
        script.push_str(&format!(" $s.Speak('{}')", quote(text)));
        vec![("powershell", vec!["-NoProfile".into(), "-Command".into(), script])]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut args = vec!["-s".to_string(), settings.rate.to_string()];
        if let Some(name) = &settings.name { args.push("-v".into()); args.push(name.clone()); }
        args.push(text.to_string());
        vec![("espeak-ng", args.clone()), ("espeak", args)]
    }
}

enum SpeechMsg {
    Say(String),
    SetName(Option<String>),
}

/// 语音播报队列：独立线程逐条朗读，计数循环只负责入队。
pub struct VoiceService {
    tx: Option<Sender<SpeechMsg>>,
    enabled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VoiceService {
    pub fn start(mut speaker: Box<dyn Speaker>, settings: VoiceSettings, enabled: bool) -> Self {
        let (tx, rx) = unbounded::<SpeechMsg>();
        let handle = thread::spawn(move || {
            let mut settings = settings;
            let mut reported = false;
            for msg in rx {
                match msg {
                    SpeechMsg::Say(text) => {
                        if let Err(e) = speaker.say(&text, &settings) {
                            // 只报告第一次失败，避免每个计数都刷屏
                            let level = if reported { LogLevel::Debug } else { LogLevel::Info };
                            log_line(level, format!("{} {}", pick("[语音] 播报失败：", "[VOICE] speech failed:"), e));
                            reported = true;
                        }
                    }
                    SpeechMsg::SetName(name) => settings.name = name,
                }
            }
        });
        Self { tx: Some(tx), enabled: Arc::new(AtomicBool::new(enabled)), handle: Some(handle) }
    }

    /// 静音时直接丢弃。
    pub fn speak(&self, text: impl Into<String>) {
        if !self.is_enabled() { return; }
        if let Some(tx) = &self.tx { let _ = tx.send(SpeechMsg::Say(text.into())); }
    }

    pub fn set_enabled(&self, on: bool) { self.enabled.store(on, Ordering::SeqCst); }

    pub fn is_enabled(&self) -> bool { self.enabled.load(Ordering::SeqCst) }

    pub fn set_voice_name(&self, name: Option<String>) {
        if let Some(tx) = &self.tx { let _ = tx.send(SpeechMsg::SetName(name)); }
    }

    /// 关闭队列并等待剩余语音播完。
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(h) = self.handle.take() { let _ = h.join(); }
    }
}

impl Drop for VoiceService {
    fn drop(&mut self) { self.tx.take(); }
}
