use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

pub const DEFAULT_BUFFER_SIZE: usize = 500;
pub const DEFAULT_HEIGHT_THRESHOLD: f64 = 11.5;
pub const DEFAULT_DISTANCE_THRESHOLD: usize = 8;
pub const DEFAULT_MIN_PEAK_INTERVAL_SEC: f64 = 1.0;
pub const DEFAULT_TARGET_SQUATS: u32 = 10;

/// 计数器参数，可在任意两次 tick 之间整体替换。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterConfig {
    pub buffer_size: usize,
    pub height_threshold: f64,
    pub distance_threshold: usize,
    pub min_peak_interval: Duration,
    pub target_squats: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            height_threshold: DEFAULT_HEIGHT_THRESHOLD,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            min_peak_interval: Duration::from_secs_f64(DEFAULT_MIN_PEAK_INTERVAL_SEC),
            target_squats: DEFAULT_TARGET_SQUATS,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    Progress,
    TargetReached,
    Reset,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountEvent {
    pub kind: CountKind,
    pub count: u32,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BelowTarget,
    AtTarget,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::BelowTarget => "below_target",
            Phase::AtTarget => "at_target",
        }
    }
}

/// 滑动窗口：`None` 表示读取失败的空档，保留以维持与采样节拍的对齐。
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    samples: VecDeque<Option<f64>>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity.saturating_add(1)) }
    }

    /// 追加后按 FIFO 截断到最近 `capacity` 个样本；容量为 0 时不保留任何样本。
    pub fn push(&mut self, sample: Option<f64>, capacity: usize) {
        self.samples.push_back(sample);
        while self.samples.len() > capacity { self.samples.pop_front(); }
    }

    pub fn len(&self) -> usize { self.samples.len() }

    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn as_slice(&mut self) -> &[Option<f64>] { self.samples.make_contiguous() }
}

/// 局部极大值检测（含高度与最小间距过滤）。
///
/// 平顶取中点（向下取整）；首尾样本不计；任一侧相邻为空档时不算峰。
/// 间距过滤按峰值从高到低保留，值相同时索引靠后的优先。
pub fn find_peaks(xs: &[Option<f64>], height: f64, distance: usize) -> Vec<usize> {
    let mut peaks = local_maxima(xs);
    peaks.retain(|&i| xs[i].map_or(false, |v| v >= height));
    if distance > 1 && peaks.len() > 1 {
        peaks = select_by_distance(xs, &peaks, distance);
    }
    peaks
}

fn local_maxima(xs: &[Option<f64>]) -> Vec<usize> {
    let mut out = Vec::new();
    if xs.len() < 3 { return out; }
    let i_max = xs.len() - 1;
    let mut i = 1usize;
    while i < i_max {
        if let (Some(prev), Some(cur)) = (xs[i - 1], xs[i]) {
            if prev < cur {
                let mut ahead = i + 1;
                while ahead < i_max && xs[ahead] == Some(cur) { ahead += 1; }
                if let Some(next) = xs[ahead] {
                    if next < cur {
                        out.push((i + ahead - 1) / 2);
                        i = ahead;
                    }
                }
            }
        }
        i += 1;
    }
    out
}

fn select_by_distance(xs: &[Option<f64>], peaks: &[usize], distance: usize) -> Vec<usize> {
    let value = |p: usize| xs[p].unwrap_or(f64::NEG_INFINITY);
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    // 稳定排序：同值时索引靠后者排在后面，即优先级更高
    order.sort_by(|&a, &b| value(peaks[a]).total_cmp(&value(peaks[b])));

    let mut keep = vec![true; peaks.len()];
    for &j in order.iter().rev() {
        if !keep[j] { continue; }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance { keep[k - 1] = false; k -= 1; }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance { keep[k] = false; k += 1; }
    }
    peaks.iter().zip(keep).filter(|(_, k)| *k).map(|(&p, _)| p).collect()
}

/// 调用方持有的计数状态，每个 tick 由 [`SquatCounter::ingest`] 修改一次。
#[derive(Clone, Debug)]
pub struct CounterState {
    buffer: SampleBuffer,
    count: u32,
    target: u32,
    last_peak_at: Instant,
    last_peak_index: usize,
}

impl CounterState {
    pub fn new(config: &CounterConfig, now: Instant) -> Self {
        Self {
            buffer: SampleBuffer::with_capacity(config.buffer_size),
            count: 0,
            target: config.target_squats,
            last_peak_at: now,
            last_peak_index: 0,
        }
    }

    pub fn count(&self) -> u32 { self.count }

    pub fn target(&self) -> u32 { self.target }

    pub fn last_peak_index(&self) -> usize { self.last_peak_index }

    pub fn buffer_len(&self) -> usize { self.buffer.len() }

    pub fn phase(&self) -> Phase {
        if self.count < self.target { Phase::BelowTarget } else { Phase::AtTarget }
    }

    /// 设定新目标并清零计数。
    pub fn set_target(&mut self, target: u32) {
        self.target = target;
        self.count = 0;
    }

    /// 外部（交互式仪表）改写当前计数，不超过目标。
    pub fn override_count(&mut self, count: u32) {
        self.count = count.min(self.target);
    }

    fn advance(&mut self) -> CountEvent {
        // 已到目标时再来一次即清零，不做加法
        if self.count >= self.target {
            self.count = 0;
            return CountEvent { kind: CountKind::Reset, count: 0 };
        }
        self.count += 1;
        if self.count < self.target {
            CountEvent { kind: CountKind::Progress, count: self.count }
        } else {
            CountEvent { kind: CountKind::TargetReached, count: self.count }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SquatCounter {
    config: CounterConfig,
}

impl SquatCounter {
    pub fn new(config: CounterConfig) -> Self { Self { config } }

    pub fn config(&self) -> &CounterConfig { &self.config }

    /// 下一个 tick 起生效。
    pub fn set_config(&mut self, config: CounterConfig) { self.config = config; }

    pub fn new_state(&self, now: Instant) -> CounterState { CounterState::new(&self.config, now) }

    /// 处理一个新样本。空档或非有限值只占位，不做峰值检测。
    pub fn ingest(&self, state: &mut CounterState, sample: Option<f64>, now: Instant) -> Option<CountEvent> {
        let sample = sample.filter(|v| v.is_finite());
        state.buffer.push(sample, self.config.buffer_size);
        if sample.is_none() { return None; }

        let peaks = find_peaks(state.buffer.as_slice(), self.config.height_threshold, self.config.distance_threshold);
        let candidate = *peaks.last()?;

        let elapsed = now.saturating_duration_since(state.last_peak_at);
        if candidate > state.last_peak_index && elapsed > self.config.min_peak_interval {
            state.last_peak_at = now;
            state.last_peak_index = candidate;
            Some(state.advance())
        } else {
            // 窗口滑动后旧峰索引前移，或峰来得太快：只重定位，不计数
            state.last_peak_index = candidate;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(xs: &[f64]) -> Vec<Option<f64>> { xs.iter().copied().map(Some).collect() }

    fn config(buffer_size: usize, target: u32) -> CounterConfig {
        CounterConfig {
            buffer_size,
            height_threshold: 11.5,
            distance_threshold: 3,
            min_peak_interval: Duration::from_millis(500),
            target_squats: target,
        }
    }

    /// 一次下蹲：基线 9.8，升到 13，再回落。
    const SQUAT: [f64; 6] = [10.5, 12.0, 13.0, 12.0, 10.5, 9.8];

    fn feed(counter: &SquatCounter, state: &mut CounterState, xs: &[f64], t: &mut Instant) -> Vec<CountEvent> {
        let mut events = Vec::new();
        for &x in xs {
            *t += Duration::from_millis(100);
            if let Some(ev) = counter.ingest(state, Some(x), *t) { events.push(ev); }
        }
        events
    }

    #[test]
    fn local_maxima_basic_and_edges() {
        let xs = some(&[5.0, 1.0, 3.0, 2.0, 4.0, 6.0]);
        assert_eq!(find_peaks(&xs, f64::NEG_INFINITY, 1), vec![2]);
    }

    #[test]
    fn plateau_reports_middle_rounded_down() {
        let xs = some(&[0.0, 2.0, 2.0, 2.0, 2.0, 1.0]);
        assert_eq!(find_peaks(&xs, 0.0, 1), vec![2]);
        let xs = some(&[0.0, 2.0, 2.0, 2.0, 1.0]);
        assert_eq!(find_peaks(&xs, 0.0, 1), vec![2]);
        // 平顶延伸到末尾不算峰
        let xs = some(&[0.0, 2.0, 2.0, 2.0]);
        assert!(find_peaks(&xs, 0.0, 1).is_empty());
    }

    #[test]
    fn height_is_inclusive() {
        let xs = some(&[0.0, 11.5, 0.0, 11.4, 0.0]);
        assert_eq!(find_peaks(&xs, 11.5, 1), vec![1]);
    }

    #[test]
    fn distance_keeps_higher_peak() {
        let xs = some(&[0.0, 12.0, 0.0, 14.0, 0.0, 0.0, 0.0, 0.0, 13.0, 0.0]);
        assert_eq!(find_peaks(&xs, 11.5, 3), vec![3, 8]);
        assert_eq!(find_peaks(&xs, 11.5, 6), vec![3]);
    }

    #[test]
    fn distance_tie_prefers_later_index() {
        let xs = some(&[0.0, 12.0, 0.0, 12.0, 0.0]);
        assert_eq!(find_peaks(&xs, 11.5, 3), vec![3]);
    }

    #[test]
    fn gap_next_to_candidate_disqualifies_it() {
        let xs = vec![Some(0.0), Some(12.0), None, Some(0.0), Some(13.0), Some(0.0)];
        assert_eq!(find_peaks(&xs, 11.5, 1), vec![4]);
    }

    #[test]
    fn buffer_truncates_to_most_recent() {
        let mut buf = SampleBuffer::default();
        for i in 0..10 { buf.push(Some(i as f64), 4); }
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.as_slice(), &[Some(6.0), Some(7.0), Some(8.0), Some(9.0)]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut buf = SampleBuffer::with_capacity(0);
        buf.push(Some(13.0), 0);
        buf.push(None, 0);
        assert!(buf.is_empty());

        let counter = SquatCounter::new(config(0, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        t += Duration::from_secs(2);
        assert!(feed(&counter, &mut state, &SQUAT, &mut t).is_empty());
        assert_eq!(state.buffer_len(), 0);
    }

    #[test]
    fn single_rise_and_fall_counts_once() {
        let counter = SquatCounter::new(config(50, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        t += Duration::from_secs(2);
        let mut events = feed(&counter, &mut state, &[9.8, 9.8], &mut t);
        events.extend(feed(&counter, &mut state, &SQUAT, &mut t));
        events.extend(feed(&counter, &mut state, &[9.8; 10], &mut t));
        assert_eq!(events, vec![CountEvent { kind: CountKind::Progress, count: 1 }]);
        assert_eq!(state.count(), 1);
    }

    #[test]
    fn peak_before_interval_since_start_is_swallowed() {
        let counter = SquatCounter::new(config(50, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        // 启动后 0.4s 内的峰：被去抖，但索引被记录
        let events = feed(&counter, &mut state, &[9.8, 13.0, 9.8, 9.8], &mut t);
        assert!(events.is_empty());
        assert_eq!(state.last_peak_index(), 1);
        // 同一个峰之后也不会再被计数
        let events = feed(&counter, &mut state, &[9.8; 20], &mut t);
        assert!(events.is_empty());
        assert_eq!(state.count(), 0);
    }

    #[test]
    fn two_peaks_within_min_interval_count_once() {
        let counter = SquatCounter::new(config(50, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        t += Duration::from_secs(2);
        // 两峰间隔 4 个 tick = 0.4s < 0.5s
        let events = feed(&counter, &mut state, &[9.8, 13.0, 9.8, 9.8, 9.8, 13.0, 9.8, 9.8], &mut t);
        assert_eq!(events.len(), 1);
        assert_eq!(state.count(), 1);
        let more = feed(&counter, &mut state, &[9.8; 20], &mut t);
        assert!(more.is_empty());
        assert_eq!(state.count(), 1);
    }

    #[test]
    fn target_reached_then_reset() {
        let counter = SquatCounter::new(config(200, 2));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        t += Duration::from_secs(2);
        let mut events = Vec::new();
        for _ in 0..3 {
            events.extend(feed(&counter, &mut state, &SQUAT, &mut t));
            events.extend(feed(&counter, &mut state, &[9.8; 6], &mut t));
            if events.len() == 2 {
                assert_eq!(state.phase(), Phase::AtTarget);
                assert_eq!(state.count(), 2);
            }
        }
        assert_eq!(
            events,
            vec![
                CountEvent { kind: CountKind::Progress, count: 1 },
                CountEvent { kind: CountKind::TargetReached, count: 2 },
                CountEvent { kind: CountKind::Reset, count: 0 },
            ]
        );
        assert_eq!(state.count(), 0);
        assert_eq!(state.phase(), Phase::BelowTarget);
    }

    #[test]
    fn shifting_window_rebases_without_increment() {
        let counter = SquatCounter::new(config(8, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        t += Duration::from_secs(2);
        let events = feed(&counter, &mut state, &[9.8, 9.8, 9.8, 13.0, 9.8], &mut t);
        assert_eq!(events.len(), 1);
        assert_eq!(state.last_peak_index(), 3);
        // 填满窗口后继续推入：峰索引逐 tick 前移
        let events = feed(&counter, &mut state, &[9.8, 9.8, 9.8, 9.8], &mut t);
        assert!(events.is_empty());
        assert_eq!(state.buffer_len(), 8);
        assert_eq!(state.last_peak_index(), 2);
        let events = feed(&counter, &mut state, &[9.8], &mut t);
        assert!(events.is_empty());
        assert_eq!(state.last_peak_index(), 1);
        assert_eq!(state.count(), 1);
    }

    #[test]
    fn gaps_never_count_or_panic() {
        let counter = SquatCounter::new(config(20, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        for i in 0..100 {
            t += Duration::from_secs(2);
            let s = match i % 3 { 0 => None, 1 => Some(f64::NAN), _ => Some(f64::INFINITY) };
            assert_eq!(counter.ingest(&mut state, s, t), None);
        }
        assert_eq!(state.count(), 0);
        assert_eq!(state.buffer_len(), 20);
    }

    #[test]
    fn smaller_window_applies_on_next_tick() {
        let mut counter = SquatCounter::new(config(50, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        feed(&counter, &mut state, &[9.8; 30], &mut t);
        assert_eq!(state.buffer_len(), 30);
        let smaller = CounterConfig { buffer_size: 10, ..*counter.config() };
        counter.set_config(smaller);
        feed(&counter, &mut state, &[9.8], &mut t);
        assert_eq!(state.buffer_len(), 10);
    }

    #[test]
    fn set_target_and_override() {
        let counter = SquatCounter::new(config(50, 10));
        let mut state = counter.new_state(Instant::now());
        state.override_count(7);
        assert_eq!(state.count(), 7);
        state.override_count(99);
        assert_eq!(state.count(), 10);
        assert_eq!(state.phase(), Phase::AtTarget);
        state.set_target(15);
        assert_eq!(state.count(), 0);
        assert_eq!(state.target(), 15);
    }

    #[test]
    fn zero_target_resets_every_rep() {
        let counter = SquatCounter::new(config(100, 0));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        assert_eq!(state.phase(), Phase::AtTarget);
        t += Duration::from_secs(2);
        let events = feed(&counter, &mut state, &SQUAT, &mut t);
        assert_eq!(events, vec![CountEvent { kind: CountKind::Reset, count: 0 }]);
    }

    #[test]
    fn full_count_at_max_target_resets_without_overflow() {
        let counter = SquatCounter::new(config(100, 10));
        let mut t = Instant::now();
        let mut state = counter.new_state(t);
        state.set_target(u32::MAX);
        state.override_count(u32::MAX);
        assert_eq!(state.phase(), Phase::AtTarget);
        t += Duration::from_secs(2);
        let events = feed(&counter, &mut state, &SQUAT, &mut t);
        assert_eq!(events, vec![CountEvent { kind: CountKind::Reset, count: 0 }]);
        assert_eq!(state.count(), 0);
    }
}
