//! 解码抓到的入站帧

use crate::utils::parse_frame_hex;
use anyhow::Result;
use clap::Args;
use dm_protocol::{DmFrame, MotorFeedback, MotorLimits, RegisterReply};

/// 解码参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 帧数据（十六进制，可用空格分隔）
    #[arg(long)]
    pub hex: String,

    /// 按寄存器应答解码（默认按反馈帧解码）
    #[arg(long)]
    pub register: bool,

    #[arg(long, default_value_t = MotorLimits::DM4310.p_max)]
    pub p_max: f32,

    #[arg(long, default_value_t = MotorLimits::DM4310.v_max)]
    pub v_max: f32,

    #[arg(long, default_value_t = MotorLimits::DM4310.t_max)]
    pub t_max: f32,
}

impl DecodeCommand {
    pub fn render(&self) -> Result<Vec<String>> {
        let bytes = parse_frame_hex(&self.hex)?;
        let frame = DmFrame::new_standard(0, &bytes);

        if self.register {
            let reply = RegisterReply::try_from(frame)?;
            return Ok(vec![
                format!("motor:    0x{:03X}", reply.motor_id),
                format!("op:       {:?}", reply.op),
                format!("register: {} ({})", reply.rid.name(), reply.rid.rid()),
                format!("value:    {}", reply.value),
            ]);
        }

        let limits = MotorLimits::new(self.p_max, self.v_max, self.t_max)?;
        let fb = MotorFeedback::parse(&frame, &limits)?;
        Ok(vec![
            format!("device:   0x{:X}", fb.device_id),
            format!("state:    {:?} (0x{:X})", fb.state, fb.state.code()),
            format!("pos:      {:.4} rad (0x{:04X})", fb.pos, fb.p_int),
            format!("vel:      {:.4} rad/s (0x{:03X})", fb.vel, fb.v_int),
            format!("torque:   {:.4} N·m (0x{:03X})", fb.torque, fb.t_int),
            format!("t_mos:    {} ℃", fb.t_mos),
            format!("t_coil:   {} ℃", fb.t_coil),
        ])
    }

    pub fn execute(&self) -> Result<()> {
        for line in self.render()? {
            println!("{}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(hex: &str, register: bool) -> DecodeCommand {
        DecodeCommand {
            hex: hex.to_string(),
            register,
            p_max: 12.5,
            v_max: 30.0,
            t_max: 10.0,
        }
    }

    #[test]
    fn test_decode_feedback() {
        let lines = cmd("11 FF FF 7F F7 FF 28 23", false).render().unwrap();
        assert_eq!(lines[0], "device:   0x1");
        assert!(lines[1].starts_with("state:    Enabled"), "{}", lines[1]);
        assert!(lines[2].starts_with("pos:      12.5000"), "{}", lines[2]);
        assert_eq!(lines[5], "t_mos:    40 ℃");
    }

    #[test]
    fn test_decode_short_feedback_fails() {
        assert!(cmd("11 FF FF", false).render().is_err());
    }

    #[test]
    fn test_decode_register_reply() {
        let lines = cmd("01 00 33 15 00 00 48 41", true).render().unwrap();
        assert_eq!(lines[2], "register: PMAX (21)");
        assert_eq!(lines[3], "value:    12.5");
    }

    #[test]
    fn test_decode_invalid_limits() {
        let mut c = cmd("11 FF FF 7F F7 FF 28 23", false);
        c.p_max = 0.0;
        assert!(c.render().is_err());
    }
}
