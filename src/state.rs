use serde::Serialize;

use crate::squat::{CounterState, Phase};

pub const SUBTEXT_DONE: &str = "Squats done";
pub const SUBTEXT_COMPLETED: &str = "Target completed!";
pub const SUBTEXT_LOST: &str = "Connection lost!";

// 计数表宽度（字符）
pub const METER_WIDTH: usize = 20;

/// 计数表展示状态，由会话维护，供计数表行与 `status` 命令使用。
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DisplayCount {
    pub count: u32,
    pub target: u32,
    pub phase: &'static str,
    pub subtext: &'static str,
    pub target_label: String,
    pub axis: &'static str,
    pub voice: bool,
}

impl DisplayCount {
    pub fn new(target: u32, axis: &'static str, voice: bool) -> Self {
        Self {
            count: 0,
            target,
            phase: if target == 0 { Phase::AtTarget.as_str() } else { Phase::BelowTarget.as_str() },
            subtext: SUBTEXT_DONE,
            target_label: unset_target_label(),
            axis,
            voice,
        }
    }

    pub fn sync(&mut self, state: &CounterState) {
        self.count = state.count();
        self.target = state.target();
        self.phase = state.phase().as_str();
    }

    pub fn meter_line(&self) -> String {
        let filled = if self.target == 0 {
            METER_WIDTH
        } else {
            ((self.count.min(self.target) as usize) * METER_WIDTH) / self.target as usize
        };
        format!(
            "[{}{}] {:>3}/{:<3} {}",
            "#".repeat(filled),
            "-".repeat(METER_WIDTH - filled),
            self.count,
            self.target,
            self.subtext
        )
    }
}

pub fn target_label(target: u32) -> String { format!("Target Squats: {}", target) }

pub fn unset_target_label() -> String { "Set Target Squats".to_string() }
