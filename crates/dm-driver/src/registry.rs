//! 电机注册表
//!
//! [`MotorRegistry`] 是所有电机状态的唯一所有者：外层控制环通过它生成出站帧，
//! 传输层通过 [`MotorRegistry::on_frame_received`] 把入站帧交给它。
//! 注册表本身不做任何 IO，所有操作都是同步、有界的。

use crate::config::RegistryConfig;
use crate::error::DriverError;
use crate::motor::{ControlTarget, Motor};
use crate::sequencer::ScanOutcome;
use dm_protocol::*;
use smallvec::SmallVec;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// 电机 ID 上限（加上模式偏移后仍互不重叠）
pub const MAX_MOTOR_ID: u16 = 0xFF;

/// 一次批量生成的帧
///
/// 栈上预留 8 个位置，常见的单总线电机数量不会触发堆分配。
pub type FrameBuffer = SmallVec<[DmFrame; 8]>;

/// 入站帧被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 没有电机以该 ID 作为 Master ID
    UnknownId,
    /// 长度不对或无法解析
    Malformed,
    /// 多个电机共用 Master ID，且设备 ID 低 4 位无法区分
    AmbiguousFeedback,
}

/// 入站帧处理结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RxEvent {
    /// 反馈已更新
    Feedback { slot: usize, state: MotorState },
    /// 扫描前进；`next_read` 为下一个读请求，`None` 表示扫描完成
    RegisterAdvanced {
        slot: usize,
        rid: RegisterId,
        next_read: Option<DmFrame>,
    },
    /// 读应答与期望寄存器不符，游标不动
    RegisterDesync {
        slot: usize,
        expected: Option<RegisterId>,
        received: RegisterId,
    },
    /// 写回显，值已写入缓存
    RegisterWritten { slot: usize, rid: RegisterId },
    /// 帧被丢弃，没有任何状态变化
    Dropped(DropReason),
}

/// 电机注册表
#[derive(Debug, Clone)]
pub struct MotorRegistry {
    motors: Vec<Motor>,
    policy: OverflowPolicy,
}

impl MotorRegistry {
    /// 创建注册表并校验电机表
    pub fn new(motors: Vec<Motor>, policy: OverflowPolicy) -> Result<Self, DriverError> {
        let mut seen = HashSet::new();
        for motor in &motors {
            if motor.id() > MAX_MOTOR_ID {
                return Err(DriverError::InvalidMotorId { id: motor.id() });
            }
            if motor.master_id() > MAX_STANDARD_ID {
                return Err(DriverError::InvalidMotorId {
                    id: motor.master_id(),
                });
            }
            if !seen.insert(motor.id()) {
                return Err(DriverError::DuplicateMotorId { id: motor.id() });
            }
            motor.limits().validate()?;
        }

        debug!("Motor registry created with {} motors ({:?})", motors.len(), policy);
        Ok(Self { motors, policy })
    }

    /// 从配置创建
    pub fn from_config(config: &RegistryConfig) -> Result<Self, DriverError> {
        let motors = config.motors.iter().map(|m| m.to_motor()).collect();
        Self::new(motors, config.overflow_policy)
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }

    pub fn motor(&self, slot: usize) -> Result<&Motor, DriverError> {
        self.motors.get(slot).ok_or(DriverError::InvalidSlot {
            slot,
            len: self.motors.len(),
        })
    }

    fn motor_mut(&mut self, slot: usize) -> Result<&mut Motor, DriverError> {
        let len = self.motors.len();
        self.motors
            .get_mut(slot)
            .ok_or(DriverError::InvalidSlot { slot, len })
    }

    /// 按电机 ID 查找槽位
    pub fn slot_of(&self, id: u16) -> Option<usize> {
        self.motors.iter().position(|m| m.id() == id)
    }

    // ========================================================================
    // 控制
    // ========================================================================

    /// 更新设定值（下一次 `dispatch_control` 生效）
    pub fn set_target(&mut self, slot: usize, target: ControlTarget) -> Result<(), DriverError> {
        self.motor_mut(slot)?.set_target(target);
        Ok(())
    }

    /// 按当前模式编码控制帧
    pub fn dispatch_control(&self, slot: usize) -> Result<DmFrame, DriverError> {
        let motor = self.motor(slot)?;
        let frame = motor.encode_control(self.policy)?;
        trace!(
            "Control frame for motor 0x{:02X} ({:?}): 0x{:03X} {:02X?}",
            motor.id(),
            motor.control_mode(),
            frame.id,
            frame.data_slice()
        );
        Ok(frame)
    }

    /// 为所有电机编码控制帧，任何一个越界都不返回帧
    pub fn dispatch_all(&self) -> Result<FrameBuffer, DriverError> {
        (0..self.motors.len())
            .map(|slot| self.dispatch_control(slot))
            .collect()
    }

    pub fn enable(&mut self, slot: usize) -> Result<DmFrame, DriverError> {
        self.mode_command(slot, ModeCommand::Enable)
    }

    /// 失能并清零设定值
    pub fn disable(&mut self, slot: usize) -> Result<DmFrame, DriverError> {
        let frame = self.mode_command(slot, ModeCommand::Disable)?;
        self.motor_mut(slot)?.clear_target();
        Ok(frame)
    }

    pub fn clear_error(&mut self, slot: usize) -> Result<DmFrame, DriverError> {
        self.mode_command(slot, ModeCommand::ClearError)
    }

    /// 把当前位置设为零点
    pub fn save_zero(&mut self, slot: usize) -> Result<DmFrame, DriverError> {
        self.mode_command(slot, ModeCommand::SaveZero)
    }

    fn mode_command(&self, slot: usize, command: ModeCommand) -> Result<DmFrame, DriverError> {
        let motor = self.motor(slot)?;
        debug!(
            "{:?} motor 0x{:02X} in {:?} mode",
            command,
            motor.id(),
            motor.control_mode()
        );
        Ok(motor.encode_mode_command(command))
    }

    /// 切换控制模式：返回写 CTRL_MODE 的帧，并立即按新模式分发后续控制帧
    pub fn switch_control_mode(
        &mut self,
        slot: usize,
        mode: ControlMode,
    ) -> Result<DmFrame, DriverError> {
        let motor = self.motor_mut(slot)?;
        let frame = WriteRegisterCommand::new(
            motor.id(),
            RegisterId::CtrlMode,
            RegisterValue::UInt(mode.register_value()),
        )?
        .to_frame();
        debug!(
            "Motor 0x{:02X} control mode {:?} -> {:?}",
            motor.id(),
            motor.control_mode(),
            mode
        );
        motor.set_control_mode(mode);
        Ok(frame)
    }

    // ========================================================================
    // 寄存器
    // ========================================================================

    /// 开始（或重新开始）寄存器扫描，返回第一个读请求
    pub fn start_register_scan(&mut self, slot: usize) -> Result<DmFrame, DriverError> {
        let motor = self.motor_mut(slot)?;
        let id = motor.id();
        let rid = motor.sequencer_mut().start();
        debug!("Register scan started for motor 0x{:02X}", id);
        Ok(ReadRegisterCommand::new(id, rid).to_frame())
    }

    /// 当前未完成的读请求（用于失步后重发）
    pub fn pending_register_read(&self, slot: usize) -> Result<Option<DmFrame>, DriverError> {
        let motor = self.motor(slot)?;
        Ok(motor
            .sequencer()
            .expected()
            .map(|rid| ReadRegisterCommand::new(motor.id(), rid).to_frame()))
    }

    pub fn write_register(
        &mut self,
        slot: usize,
        rid: RegisterId,
        value: RegisterValue,
    ) -> Result<DmFrame, DriverError> {
        let motor = self.motor(slot)?;
        let frame = WriteRegisterCommand::new(motor.id(), rid, value)?.to_frame();
        debug!("Write register {:?} = {} on motor 0x{:02X}", rid, value, motor.id());
        Ok(frame)
    }

    pub fn save_registers(&self, slot: usize) -> Result<DmFrame, DriverError> {
        let motor = self.motor(slot)?;
        Ok(SaveRegistersCommand::new(motor.id()).to_frame())
    }

    pub fn refresh_feedback(&self, slot: usize) -> Result<DmFrame, DriverError> {
        let motor = self.motor(slot)?;
        Ok(RefreshFeedbackCommand::new(motor.id()).to_frame())
    }

    // ========================================================================
    // 入站路由
    // ========================================================================

    /// 处理一帧入站数据
    ///
    /// 反馈和寄存器应答都以电机的 Master ID 回传：
    /// 1. 没有电机使用该 Master ID：丢弃
    /// 2. 8 字节、Byte 2 为 0x33/0x55 且 Byte 0-1 匹配某个电机 ID：寄存器应答
    /// 3. 其他 8 字节帧：反馈，按设备 ID 低 4 位（或唯一候选）选择电机
    /// 4. 其余：丢弃
    pub fn on_frame_received(&mut self, frame: &DmFrame) -> RxEvent {
        trace!("RX 0x{:03X} {:02X?}", frame.id, frame.data_slice());

        if frame.is_extended || frame.id > MAX_STANDARD_ID as u32 {
            warn!("Dropping frame with unexpected id 0x{:X}", frame.id);
            return RxEvent::Dropped(DropReason::UnknownId);
        }
        let master_id = frame.id as u16;
        let candidates: SmallVec<[usize; 8]> = self
            .motors
            .iter()
            .enumerate()
            .filter(|(_, m)| m.master_id() == master_id)
            .map(|(slot, _)| slot)
            .collect();

        if candidates.is_empty() {
            warn!("Dropping frame for unknown master id 0x{:03X}", master_id);
            return RxEvent::Dropped(DropReason::UnknownId);
        }
        if frame.len != 8 {
            warn!(
                "Dropping malformed frame on 0x{:03X} (len {})",
                master_id, frame.len
            );
            return RxEvent::Dropped(DropReason::Malformed);
        }

        if RegisterReply::is_tagged(frame) {
            let id_bytes = (frame.data[0], frame.data[1]);
            if let Some(&slot) = candidates
                .iter()
                .find(|&&slot| self.motors[slot].id_bytes() == id_bytes)
            {
                // 反馈帧的位置字节也可能恰好形如应答，解析失败时按反馈处理
                match RegisterReply::try_from(*frame) {
                    Ok(reply) => return self.on_register_reply(slot, reply),
                    Err(e) => trace!("Not a register reply ({}), decoding as feedback", e),
                }
            }
        }

        self.on_feedback(&candidates, frame)
    }

    fn on_register_reply(&mut self, slot: usize, reply: RegisterReply) -> RxEvent {
        let motor = &mut self.motors[slot];
        let id = motor.id();
        match reply.op {
            RegisterOp::Write => {
                debug!("Motor 0x{:02X} acknowledged {:?} = {}", id, reply.rid, reply.value);
                motor.registers_mut().insert(reply.rid, reply.value);
                RxEvent::RegisterWritten {
                    slot,
                    rid: reply.rid,
                }
            },
            RegisterOp::Read => {
                let (sequencer, cache) = motor.sequencer_and_cache();
                match sequencer.on_read_reply(reply.rid, reply.value, cache) {
                    ScanOutcome::Advanced { stored, next } => {
                        match next {
                            Some(next) => debug!(
                                "Motor 0x{:02X} register {:?} = {}, next {:?}",
                                id, stored, reply.value, next
                            ),
                            None => debug!("Motor 0x{:02X} register scan finished", id),
                        }
                        RxEvent::RegisterAdvanced {
                            slot,
                            rid: stored,
                            next_read: next.map(|rid| ReadRegisterCommand::new(id, rid).to_frame()),
                        }
                    },
                    ScanOutcome::Desync { expected, received } => {
                        warn!(
                            "Motor 0x{:02X} register desync: expected {:?}, received {:?}",
                            id, expected, received
                        );
                        RxEvent::RegisterDesync {
                            slot,
                            expected,
                            received,
                        }
                    },
                }
            },
        }
    }

    fn on_feedback(&mut self, candidates: &[usize], frame: &DmFrame) -> RxEvent {
        let raw = match RawFeedback::try_from(*frame) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Dropping feedback frame: {}", e);
                return RxEvent::Dropped(DropReason::Malformed);
            },
        };

        let slot = match candidates {
            [only] => *only,
            _ => match candidates
                .iter()
                .find(|&&slot| (self.motors[slot].id() & 0x0F) as u8 == raw.device_id)
            {
                Some(&slot) => slot,
                None => {
                    warn!(
                        "Dropping feedback on 0x{:03X}: device id {} matches no motor",
                        frame.id, raw.device_id
                    );
                    return RxEvent::Dropped(DropReason::AmbiguousFeedback);
                },
            },
        };

        let motor = &mut self.motors[slot];
        let feedback = raw.decode(motor.limits());
        if feedback.state.is_fault() {
            warn!("Motor 0x{:02X} reports {:?}", motor.id(), feedback.state);
        }
        motor.apply_feedback(feedback);
        RxEvent::Feedback {
            slot,
            state: feedback.state,
        }
    }
}
