//! 电机表配置
//!
//! TOML 格式：
//!
//! ```toml
//! overflow_policy = "saturate"   # 可选，默认 "reject"
//!
//! [[motors]]
//! id = 0x01
//! master_id = 0x11
//! p_max = 12.5
//! v_max = 30.0
//! t_max = 10.0
//! control_mode = "mit"           # mit / position / speed / position_speed_current
//! target = { kp = 20.0, kd = 0.5 }
//! ```

use crate::error::DriverError;
use crate::motor::{ControlTarget, Motor};
use dm_protocol::{ControlMode, MotorLimits, OverflowPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 单个电机的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// 接收 ID（ESC_ID）
    pub id: u16,
    /// 反馈 ID（MST_ID）
    #[serde(default)]
    pub master_id: u16,
    pub p_max: f32,
    pub v_max: f32,
    pub t_max: f32,
    #[serde(default)]
    pub control_mode: ControlMode,
    /// 初始设定值
    #[serde(default)]
    pub target: ControlTarget,
}

impl MotorConfig {
    pub fn limits(&self) -> MotorLimits {
        MotorLimits {
            p_max: self.p_max,
            v_max: self.v_max,
            t_max: self.t_max,
        }
    }

    pub fn to_motor(&self) -> Motor {
        Motor::new(self.id, self.master_id, self.limits())
            .with_mode(self.control_mode)
            .with_target(self.target)
    }
}

/// 注册表配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    #[serde(default)]
    pub motors: Vec<MotorConfig>,
}

impl RegistryConfig {
    /// 解析 TOML 文本（只做语法解析，取值校验在创建注册表时进行）
    pub fn from_toml_str(s: &str) -> Result<Self, DriverError> {
        toml::from_str(s).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MotorRegistry;
    use std::io::Write;

    const SAMPLE: &str = r#"
overflow_policy = "saturate"

[[motors]]
id = 0x01
master_id = 0x11
p_max = 12.5
v_max = 30.0
t_max = 10.0
target = { kp = 20.0, kd = 0.5 }

[[motors]]
id = 0x02
master_id = 0x12
p_max = 12.5
v_max = 45.0
t_max = 18.0
control_mode = "position_speed_current"
"#;

    #[test]
    fn test_parse_sample() {
        let config = RegistryConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.overflow_policy, OverflowPolicy::Saturate);
        assert_eq!(config.motors.len(), 2);

        let m0 = &config.motors[0];
        assert_eq!(m0.control_mode, ControlMode::Mit);
        assert_eq!(m0.target.kp, 20.0);
        assert_eq!(m0.target.pos, 0.0);
        assert_eq!(m0.limits(), MotorLimits::DM4310);

        assert_eq!(
            config.motors[1].control_mode,
            ControlMode::PositionSpeedCurrent
        );
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::from_toml_str(
            "[[motors]]\nid = 3\np_max = 1.0\nv_max = 2.0\nt_max = 3.0\n",
        )
        .unwrap();
        assert_eq!(config.overflow_policy, OverflowPolicy::Reject);
        assert_eq!(config.motors[0].master_id, 0);
        assert!(config.motors[0].target.is_zero());
    }

    #[test]
    fn test_syntax_error() {
        let err = RegistryConfig::from_toml_str("[[motors]]\nid = ").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));

        let err = RegistryConfig::from_toml_str("[[motors]]\nid = 1\n").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)), "missing limits: {}", err);

        let err = RegistryConfig::from_toml_str("overflow_policy = \"wrap\"").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[test]
    fn test_registry_validates_config() {
        let config = RegistryConfig::from_toml_str(
            "[[motors]]\nid = 1\np_max = 12.5\nv_max = 30.0\nt_max = -1.0\n",
        )
        .unwrap();
        assert!(MotorRegistry::from_config(&config).is_err());

        let config = RegistryConfig::from_toml_str(SAMPLE).unwrap();
        let registry = MotorRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.overflow_policy(), OverflowPolicy::Saturate);
        assert_eq!(registry.motor(0).unwrap().target().kd, 0.5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = RegistryConfig::load(file.path()).unwrap();
        assert_eq!(config.motors.len(), 2);

        let missing = RegistryConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(DriverError::Io(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RegistryConfig::from_toml_str(SAMPLE).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(RegistryConfig::from_toml_str(&text).unwrap(), config);
    }
}
