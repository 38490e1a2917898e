//! 寄存器协议
//!
//! 所有管理帧都发往 [`ID_MANAGEMENT`](crate::ids::ID_MANAGEMENT)，
//! 前两个字节是电机 ID（低 8 位、高 3 位），第三个字节是操作标记：
//!
//! | 操作 | 数据 |
//! |------|------|
//! | 读   | `[id_l, id_h, 0x33, rid]` |
//! | 写   | `[id_l, id_h, 0x55, rid, d0, d1, d2, d3]` |
//! | 保存 | `[id_l, id_h, 0xAA, 0x01]` |
//! | 刷新反馈 | `[id_l, id_h, 0xCC, 0x00]` |
//!
//! 电机以 Master ID 回复 8 字节帧：`[id_l, id_h, tag, rid, v0, v1, v2, v3]`，
//! 值为小端 32 位，按寄存器类型解释为 f32 或 u32。

use crate::ids::ID_MANAGEMENT;
use crate::{DmFrame, ProtocolError, bytes_to_u32_le, join_motor_id, split_motor_id};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 读寄存器标记
pub const TAG_READ: u8 = 0x33;
/// 写寄存器标记
pub const TAG_WRITE: u8 = 0x55;
/// 保存参数标记
pub const TAG_SAVE: u8 = 0xAA;
/// 刷新反馈标记
pub const TAG_REFRESH: u8 = 0xCC;

// ============================================================================
// 寄存器表
// ============================================================================

/// 寄存器值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Float,
    UInt,
}

/// 寄存器访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    ReadOnly,
    ReadWrite,
}

/// 寄存器 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RegisterId {
    /// 欠压保护值
    UvValue = 0,
    /// 扭矩系数
    KtValue = 1,
    /// 过温保护值
    OtValue = 2,
    /// 过流保护值
    OcValue = 3,
    /// 加速度
    Acc = 4,
    /// 减速度
    Dec = 5,
    /// 最大速度
    MaxSpd = 6,
    /// 反馈 ID
    MstId = 7,
    /// 接收 ID
    EscId = 8,
    /// 超时警报时间
    Timeout = 9,
    /// 控制模式
    CtrlMode = 10,
    /// 电机粘滞系数
    Damp = 11,
    /// 电机转动惯量
    Inertia = 12,
    /// 硬件版本
    HwVer = 13,
    /// 软件版本
    SwVer = 14,
    /// 序列号
    Sn = 15,
    /// 极对数
    Npp = 16,
    /// 相电阻
    Rs = 17,
    /// 相电感
    Ls = 18,
    /// 磁链
    Flux = 19,
    /// 减速比
    Gr = 20,
    /// 位置映射范围
    Pmax = 21,
    /// 速度映射范围
    Vmax = 22,
    /// 扭矩映射范围
    Tmax = 23,
    /// 电流环带宽
    IBw = 24,
    /// 速度环 Kp
    KpAsr = 25,
    /// 速度环 Ki
    KiAsr = 26,
    /// 位置环 Kp
    KpApr = 27,
    /// 位置环 Ki
    KiApr = 28,
    /// 过压保护值
    OvValue = 29,
    /// 齿轮力矩效率
    Gref = 30,
    /// 速度环阻尼系数
    Deta = 31,
    /// 速度环滤波带宽
    VBw = 32,
    /// 电流环增强系数
    IqCl = 33,
    /// 速度环增强系数
    VlCl = 34,
    /// CAN 波特率代码
    CanBr = 35,
    /// 子版本号
    SubVer = 36,
    /// U 相偏置
    UOff = 50,
    /// V 相偏置
    VOff = 51,
    /// 补偿因子 1
    K1 = 52,
    /// 补偿因子 2
    K2 = 53,
    /// 角度偏移
    MOff = 54,
    /// 方向
    Dir = 55,
    /// 电机位置
    PM = 80,
    /// 输出轴位置
    XOut = 81,
}

/// 扫描寄存器的固定顺序
pub const REGISTER_SCAN_ORDER: [RegisterId; 45] = [
    RegisterId::UvValue,
    RegisterId::KtValue,
    RegisterId::OtValue,
    RegisterId::OcValue,
    RegisterId::Acc,
    RegisterId::Dec,
    RegisterId::MaxSpd,
    RegisterId::MstId,
    RegisterId::EscId,
    RegisterId::Timeout,
    RegisterId::CtrlMode,
    RegisterId::Damp,
    RegisterId::Inertia,
    RegisterId::HwVer,
    RegisterId::SwVer,
    RegisterId::Sn,
    RegisterId::Npp,
    RegisterId::Rs,
    RegisterId::Ls,
    RegisterId::Flux,
    RegisterId::Gr,
    RegisterId::Pmax,
    RegisterId::Vmax,
    RegisterId::Tmax,
    RegisterId::IBw,
    RegisterId::KpAsr,
    RegisterId::KiAsr,
    RegisterId::KpApr,
    RegisterId::KiApr,
    RegisterId::OvValue,
    RegisterId::Gref,
    RegisterId::Deta,
    RegisterId::VBw,
    RegisterId::IqCl,
    RegisterId::VlCl,
    RegisterId::CanBr,
    RegisterId::SubVer,
    RegisterId::UOff,
    RegisterId::VOff,
    RegisterId::K1,
    RegisterId::K2,
    RegisterId::MOff,
    RegisterId::Dir,
    RegisterId::PM,
    RegisterId::XOut,
];

impl RegisterId {
    /// 寄存器数量
    pub const COUNT: usize = REGISTER_SCAN_ORDER.len();

    /// 寄存器地址
    pub fn rid(self) -> u8 {
        self.into()
    }

    /// 从寄存器地址解析
    pub fn from_rid(rid: u8) -> Result<Self, ProtocolError> {
        Self::try_from_primitive(rid).map_err(|_| ProtocolError::UnknownRegister { rid })
    }

    /// 在扫描顺序中的下标（0 起）
    pub fn scan_index(self) -> usize {
        REGISTER_SCAN_ORDER
            .iter()
            .position(|&r| r == self)
            .unwrap_or_default()
    }

    /// 值类型
    pub fn kind(self) -> RegisterKind {
        use RegisterId::*;
        match self {
            MstId | EscId | Timeout | CtrlMode | HwVer | SwVer | Sn | Npp | CanBr | SubVer => {
                RegisterKind::UInt
            },
            _ => RegisterKind::Float,
        }
    }

    /// 访问权限
    pub fn access(self) -> RegisterAccess {
        use RegisterId::*;
        match self {
            Damp | Inertia | HwVer | SwVer | Sn | Npp | Rs | Ls | Flux | Gr | SubVer | UOff
            | VOff | K1 | K2 | MOff | Dir | PM | XOut => RegisterAccess::ReadOnly,
            _ => RegisterAccess::ReadWrite,
        }
    }

    pub fn is_writable(self) -> bool {
        self.access() == RegisterAccess::ReadWrite
    }

    /// 寄存器名（与电机调试助手一致）
    pub fn name(self) -> &'static str {
        use RegisterId::*;
        match self {
            UvValue => "UV_Value",
            KtValue => "KT_Value",
            OtValue => "OT_Value",
            OcValue => "OC_Value",
            Acc => "ACC",
            Dec => "DEC",
            MaxSpd => "MAX_SPD",
            MstId => "MST_ID",
            EscId => "ESC_ID",
            Timeout => "TIMEOUT",
            CtrlMode => "CTRL_MODE",
            Damp => "Damp",
            Inertia => "Inertia",
            HwVer => "hw_ver",
            SwVer => "sw_ver",
            Sn => "SN",
            Npp => "NPP",
            Rs => "Rs",
            Ls => "LS",
            Flux => "Flux",
            Gr => "Gr",
            Pmax => "PMAX",
            Vmax => "VMAX",
            Tmax => "TMAX",
            IBw => "I_BW",
            KpAsr => "KP_ASR",
            KiAsr => "KI_ASR",
            KpApr => "KP_APR",
            KiApr => "KI_APR",
            OvValue => "OV_Value",
            Gref => "GREF",
            Deta => "Deta",
            VBw => "V_BW",
            IqCl => "IQ_cl",
            VlCl => "VL_cl",
            CanBr => "can_br",
            SubVer => "sub_ver",
            UOff => "u_off",
            VOff => "v_off",
            K1 => "k1",
            K2 => "k2",
            MOff => "m_off",
            Dir => "dir",
            PM => "p_m",
            XOut => "xout",
        }
    }

    /// 按名称查找（不区分大小写）
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTER_SCAN_ORDER
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// 寄存器值
// ============================================================================

/// 寄存器值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    Float(f32),
    UInt(u32),
}

impl RegisterValue {
    /// 按类型解释 32 位原始值
    pub fn from_raw(kind: RegisterKind, raw: u32) -> Self {
        match kind {
            RegisterKind::Float => RegisterValue::Float(f32::from_bits(raw)),
            RegisterKind::UInt => RegisterValue::UInt(raw),
        }
    }

    pub fn kind(&self) -> RegisterKind {
        match self {
            RegisterValue::Float(_) => RegisterKind::Float,
            RegisterValue::UInt(_) => RegisterKind::UInt,
        }
    }

    /// 32 位原始值
    pub fn to_raw(&self) -> u32 {
        match *self {
            RegisterValue::Float(v) => v.to_bits(),
            RegisterValue::UInt(v) => v,
        }
    }

    /// 小端字节
    pub fn to_bytes(&self) -> [u8; 4] {
        self.to_raw().to_le_bytes()
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            RegisterValue::Float(v) => Some(v),
            RegisterValue::UInt(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            RegisterValue::UInt(v) => Some(v),
            RegisterValue::Float(_) => None,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Float(v) => write!(f, "{}", v),
            RegisterValue::UInt(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// 出站管理帧
// ============================================================================

fn management_frame(motor_id: u16, tag: u8, rest: &[u8]) -> DmFrame {
    let (id_l, id_h) = split_motor_id(motor_id);
    let mut data = [0u8; 8];
    data[0] = id_l;
    data[1] = id_h;
    data[2] = tag;
    data[3..3 + rest.len()].copy_from_slice(rest);
    DmFrame::new_standard(ID_MANAGEMENT, &data[..3 + rest.len()])
}

/// 读寄存器指令（4 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRegisterCommand {
    pub motor_id: u16,
    pub rid: RegisterId,
}

impl ReadRegisterCommand {
    pub fn new(motor_id: u16, rid: RegisterId) -> Self {
        Self { motor_id, rid }
    }

    pub fn to_frame(self) -> DmFrame {
        management_frame(self.motor_id, TAG_READ, &[self.rid.rid()])
    }
}

/// 写寄存器指令（8 字节）
///
/// 只读寄存器和类型不符的值在构造时即被拒绝。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteRegisterCommand {
    pub motor_id: u16,
    pub rid: RegisterId,
    pub value: RegisterValue,
}

impl WriteRegisterCommand {
    pub fn new(
        motor_id: u16,
        rid: RegisterId,
        value: RegisterValue,
    ) -> Result<Self, ProtocolError> {
        if !rid.is_writable() {
            return Err(ProtocolError::ReadOnlyRegister { rid });
        }
        if rid.kind() != value.kind() {
            return Err(ProtocolError::RegisterKindMismatch { rid });
        }
        Ok(Self {
            motor_id,
            rid,
            value,
        })
    }

    pub fn to_frame(self) -> DmFrame {
        let [d0, d1, d2, d3] = self.value.to_bytes();
        management_frame(self.motor_id, TAG_WRITE, &[self.rid.rid(), d0, d1, d2, d3])
    }
}

/// 保存参数指令（4 字节），把写入的寄存器固化到 Flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveRegistersCommand {
    pub motor_id: u16,
}

impl SaveRegistersCommand {
    pub fn new(motor_id: u16) -> Self {
        Self { motor_id }
    }

    pub fn to_frame(self) -> DmFrame {
        management_frame(self.motor_id, TAG_SAVE, &[0x01])
    }
}

/// 刷新反馈指令（4 字节），请求电机立即回传一帧反馈
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshFeedbackCommand {
    pub motor_id: u16,
}

impl RefreshFeedbackCommand {
    pub fn new(motor_id: u16) -> Self {
        Self { motor_id }
    }

    pub fn to_frame(self) -> DmFrame {
        management_frame(self.motor_id, TAG_REFRESH, &[0x00])
    }
}

// ============================================================================
// 入站寄存器应答
// ============================================================================

/// 寄存器应答类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    /// 读应答（0x33）
    Read,
    /// 写回显（0x55）
    Write,
}

/// 寄存器应答
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterReply {
    pub motor_id: u16,
    pub op: RegisterOp,
    pub rid: RegisterId,
    pub value: RegisterValue,
}

impl RegisterReply {
    /// 标记字节是否为寄存器应答（不校验寄存器 ID）
    pub fn is_tagged(frame: &DmFrame) -> bool {
        frame.len == 8 && matches!(frame.data[2], TAG_READ | TAG_WRITE)
    }

    /// 按电机侧格式打包（用于模拟电机）
    pub fn to_frame(&self, master_id: u16) -> DmFrame {
        let (id_l, id_h) = split_motor_id(self.motor_id);
        let tag = match self.op {
            RegisterOp::Read => TAG_READ,
            RegisterOp::Write => TAG_WRITE,
        };
        let [v0, v1, v2, v3] = self.value.to_bytes();
        DmFrame::new_standard(master_id, &[id_l, id_h, tag, self.rid.rid(), v0, v1, v2, v3])
    }
}

impl TryFrom<DmFrame> for RegisterReply {
    type Error = ProtocolError;

    fn try_from(frame: DmFrame) -> Result<Self, Self::Error> {
        if frame.len < 8 {
            return Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: frame.len as usize,
            });
        }

        let data = &frame.data;
        let op = match data[2] {
            TAG_READ => RegisterOp::Read,
            TAG_WRITE => RegisterOp::Write,
            actual => {
                return Err(ProtocolError::UnexpectedTag {
                    expected: TAG_READ,
                    actual,
                });
            },
        };
        let rid = RegisterId::from_rid(data[3])?;
        let raw = bytes_to_u32_le([data[4], data[5], data[6], data[7]]);

        Ok(Self {
            motor_id: join_motor_id(data[0], data[1]),
            op,
            rid,
            value: RegisterValue::from_raw(rid.kind(), raw),
        })
    }
}
