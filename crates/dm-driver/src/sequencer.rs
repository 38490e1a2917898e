//! 寄存器扫描状态机
//!
//! 每个电机一个 [`RegisterSequencer`]，按 [`REGISTER_SCAN_ORDER`] 逐个读取寄存器：
//!
//! ```text
//! Idle --start()--> Reading(1) --reply(rid_1)--> Reading(2) --> ... --> Reading(45)
//! Reading(45) --reply(rid_45)--> Idle
//! Reading(n)  --reply(其他 rid)--> Reading(n)（失步，原地停住）
//! ```
//!
//! 只有收到与当前期望寄存器一致的读应答才会前进，并且前进后才发出下一次读请求，
//! 同一电机任何时刻最多只有一个未完成的读请求。失步时外层可通过
//! [`RegisterSequencer::cursor`] 发现游标长时间不动，再重发或重启扫描。

use dm_protocol::{ControlMode, MotorLimits, REGISTER_SCAN_ORDER, RegisterId, RegisterValue};

// ============================================================================
// 状态与纯转移函数
// ============================================================================

/// 扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// 未在扫描
    #[default]
    Idle,
    /// 正在等待第 n 个寄存器（1 起）的读应答
    Reading(usize),
}

impl ScanState {
    /// 数值游标：0 = Idle，n = Reading(n)
    pub fn cursor(self) -> usize {
        match self {
            ScanState::Idle => 0,
            ScanState::Reading(n) => n,
        }
    }

    /// 当前期望的寄存器
    pub fn expected(self) -> Option<RegisterId> {
        match self {
            ScanState::Idle => None,
            ScanState::Reading(n) => n
                .checked_sub(1)
                .and_then(|i| REGISTER_SCAN_ORDER.get(i).copied()),
        }
    }
}

/// 一次转移的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: ScanState,
    /// 需要写入缓存的值；失步时为 `None`
    pub cache_update: Option<(RegisterId, RegisterValue)>,
}

/// 纯转移函数：`(state, rid, value) -> (state', cache_update)`
pub fn transition(state: ScanState, rid: RegisterId, value: RegisterValue) -> Transition {
    match (state, state.expected()) {
        (ScanState::Reading(n), Some(expected)) if expected == rid => Transition {
            next: if n < REGISTER_SCAN_ORDER.len() {
                ScanState::Reading(n + 1)
            } else {
                ScanState::Idle
            },
            cache_update: Some((rid, value)),
        },
        _ => Transition {
            next: state,
            cache_update: None,
        },
    }
}

// ============================================================================
// 寄存器缓存
// ============================================================================

/// 寄存器值缓存（按扫描下标存放）
///
/// 值只会被新的应答覆盖，从不失效。
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterCache {
    values: [Option<RegisterValue>; RegisterId::COUNT],
}

impl Default for RegisterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterCache {
    pub fn new() -> Self {
        Self {
            values: [None; RegisterId::COUNT],
        }
    }

    pub fn get(&self, rid: RegisterId) -> Option<RegisterValue> {
        self.values[rid.scan_index()]
    }

    pub fn get_f32(&self, rid: RegisterId) -> Option<f32> {
        self.get(rid).and_then(|v| v.as_f32())
    }

    pub fn get_u32(&self, rid: RegisterId) -> Option<u32> {
        self.get(rid).and_then(|v| v.as_u32())
    }

    pub fn insert(&mut self, rid: RegisterId, value: RegisterValue) {
        self.values[rid.scan_index()] = Some(value);
    }

    /// 已缓存的寄存器数量
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按扫描顺序遍历已缓存的值
    pub fn iter(&self) -> impl Iterator<Item = (RegisterId, RegisterValue)> + '_ {
        REGISTER_SCAN_ORDER
            .iter()
            .zip(self.values.iter())
            .filter_map(|(&rid, value)| value.map(|v| (rid, v)))
    }

    /// 电机内部的控制模式（CTRL_MODE）
    pub fn control_mode(&self) -> Option<ControlMode> {
        self.get_u32(RegisterId::CtrlMode)
            .and_then(|v| ControlMode::try_from(v).ok())
    }

    /// 电机内部的量化范围（PMAX/VMAX/TMAX），三者齐全且合法时返回
    pub fn limits(&self) -> Option<MotorLimits> {
        MotorLimits::new(
            self.get_f32(RegisterId::Pmax)?,
            self.get_f32(RegisterId::Vmax)?,
            self.get_f32(RegisterId::Tmax)?,
        )
        .ok()
    }
}

// ============================================================================
// 扫描器
// ============================================================================

/// 读应答的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 匹配并前进；`next` 为下一个要读的寄存器，`None` 表示扫描完成
    Advanced {
        stored: RegisterId,
        next: Option<RegisterId>,
    },
    /// 与期望不符（或未在扫描），状态和缓存都不变
    Desync {
        expected: Option<RegisterId>,
        received: RegisterId,
    },
}

/// 寄存器扫描器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSequencer {
    state: ScanState,
}

impl RegisterSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor()
    }

    pub fn is_scanning(&self) -> bool {
        self.state != ScanState::Idle
    }

    /// 当前等待的寄存器
    pub fn expected(&self) -> Option<RegisterId> {
        self.state.expected()
    }

    /// 从第一个寄存器开始扫描（正在扫描时重新开始），返回要读的寄存器
    pub fn start(&mut self) -> RegisterId {
        self.state = ScanState::Reading(1);
        REGISTER_SCAN_ORDER[0]
    }

    /// 放弃扫描
    pub fn cancel(&mut self) {
        self.state = ScanState::Idle;
    }

    /// 处理一条读应答
    pub fn on_read_reply(
        &mut self,
        rid: RegisterId,
        value: RegisterValue,
        cache: &mut RegisterCache,
    ) -> ScanOutcome {
        let expected = self.state.expected();
        let step = transition(self.state, rid, value);
        match step.cache_update {
            Some((stored, value)) => {
                cache.insert(stored, value);
                self.state = step.next;
                ScanOutcome::Advanced {
                    stored,
                    next: self.state.expected(),
                }
            },
            None => ScanOutcome::Desync {
                expected,
                received: rid,
            },
        }
    }
}
