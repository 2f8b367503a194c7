use std::sync::{
    atomic::{AtomicBool, Ordering},
    OnceLock,
};

// 全局日志语言标志：true=中文，false=英文（可多次更新）
pub static LOG_ZH: OnceLock<AtomicBool> = OnceLock::new();

pub fn set_log_lang_zh(is_zh: bool) {
    LOG_ZH
        .get_or_init(|| AtomicBool::new(false))
        .store(is_zh, Ordering::SeqCst);
}

pub fn is_log_zh() -> bool {
    LOG_ZH
        .get_or_init(|| AtomicBool::new(false))
        .load(Ordering::SeqCst)
}

/// 根据 LANG / OSLANG 判定是否使用中文日志。
pub fn detect_zh(lang: Option<&str>, oslang: Option<&str>) -> bool {
    if let Some(l) = lang {
        let s = l.to_lowercase();
        if s.starts_with("zh") || s.contains("zh_cn") || s.contains("zh-hans") { return true; }
    }
    oslang.map_or(false, |l| l.to_lowercase().starts_with("zh"))
}

/// 按当前日志语言挑选文案。
pub fn pick<'a>(zh: &'a str, en: &'a str) -> &'a str {
    if is_log_zh() { zh } else { en }
}
