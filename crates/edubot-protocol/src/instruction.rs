//! 原子电机指令
//!
//! `Instruction` 是唯一可以在线路上传输的程序单元：不含重复次数、不含子程序引用。

use crate::ProtocolError;

/// 电机速度上限（百分比）
pub const MAX_MOTOR_SPEED: u8 = 100;

/// 单条电机指令（应用域，0–100）
///
/// # 设计特性
///
/// - **Copy**：两个字节，按值传递
/// - **不可变语义**：创建后不再修改，编解码总是产生新值
/// - **不做构造期校验**：上层（`Robot::upload_program`）在发送前统一调用
///   [`Instruction::validate`]，以便把非法值作为输入错误报告而不是在构造处崩溃
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Instruction {
    /// 左电机速度（0–100）
    pub left_motor_speed: u8,
    /// 右电机速度（0–100）
    pub right_motor_speed: u8,
}

impl Instruction {
    /// 两个电机都停止
    pub const STOP: Instruction = Instruction::new(0, 0);

    /// 创建指令
    pub const fn new(left_motor_speed: u8, right_motor_speed: u8) -> Self {
        Self {
            left_motor_speed,
            right_motor_speed,
        }
    }

    /// 检查两个速度是否都在 0..=100 内
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.left_motor_speed > MAX_MOTOR_SPEED {
            return Err(ProtocolError::SpeedOutOfRange {
                field: "left_motor_speed",
                value: self.left_motor_speed,
            });
        }
        if self.right_motor_speed > MAX_MOTOR_SPEED {
            return Err(ProtocolError::SpeedOutOfRange {
                field: "right_motor_speed",
                value: self.right_motor_speed,
            });
        }
        Ok(())
    }

    /// 转换为线上字节对 `(left, right)`
    pub fn to_wire(self) -> (u8, u8) {
        (
            crate::codec::encode_speed(self.left_motor_speed),
            crate::codec::encode_speed(self.right_motor_speed),
        )
    }

    /// 从线上字节对解码
    pub fn from_wire(left: u8, right: u8) -> Self {
        Self::new(
            crate::codec::decode_speed(left),
            crate::codec::decode_speed(right),
        )
    }
}
