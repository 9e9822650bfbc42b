//! 协议方言与固件版本映射
//!
//! 设备上报的固件版本号多对一地映射到三种互不兼容的线上方言之一。
//! 映射表是固定的：未知版本直接报错，**绝不**回退到"最接近"的方言。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::ops::RangeInclusive;

/// 协议方言
///
/// V6 与 V10 的线上行为完全一致（同一种二进制策略），保留两个变体是为了
/// 固件映射与将来的分化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProtocolVersion {
    /// 文本帧（固件 2–4）
    V3 = 3,
    /// 二进制帧（固件 6–9）
    V6 = 6,
    /// 二进制帧（固件 10）
    V10 = 10,
}

impl ProtocolVersion {
    /// 该方言设备可存储的最大指令数
    pub const fn max_instructions(self) -> usize {
        match self {
            ProtocolVersion::V3 => 100,
            ProtocolVersion::V6 | ProtocolVersion::V10 => 2400,
        }
    }

    /// 是否使用二进制帧
    pub const fn is_binary(self) -> bool {
        !matches!(self, ProtocolVersion::V3)
    }

    /// 方言名称（`"V3"` / `"V6"` / `"V10"`）
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V3 => "V3",
            ProtocolVersion::V6 => "V6",
            ProtocolVersion::V10 => "V10",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 固件版本 → 协议方言查找表
pub const FIRMWARE_TABLE: &[(RangeInclusive<u32>, ProtocolVersion)] = &[
    (2..=4, ProtocolVersion::V3),
    (6..=9, ProtocolVersion::V6),
    (10..=10, ProtocolVersion::V10),
];

/// 查找固件版本对应的协议方言
pub fn protocol_for_firmware(firmware_version: u32) -> Result<ProtocolVersion, ProtocolError> {
    FIRMWARE_TABLE
        .iter()
        .find(|(range, _)| range.contains(&firmware_version))
        .map(|(_, version)| *version)
        .ok_or(ProtocolError::UnsupportedFirmware(firmware_version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_lookup() {
        for fw in 2..=4 {
            assert_eq!(protocol_for_firmware(fw).unwrap(), ProtocolVersion::V3);
        }
        for fw in 6..=9 {
            assert_eq!(protocol_for_firmware(fw).unwrap(), ProtocolVersion::V6);
        }
        assert_eq!(protocol_for_firmware(10).unwrap(), ProtocolVersion::V10);
    }

    #[test]
    fn test_unknown_firmware_is_error() {
        for fw in [0, 1, 5, 11, 99] {
            assert_eq!(
                protocol_for_firmware(fw),
                Err(ProtocolError::UnsupportedFirmware(fw))
            );
        }
    }

    #[test]
    fn test_instruction_caps() {
        assert_eq!(ProtocolVersion::V3.max_instructions(), 100);
        assert_eq!(ProtocolVersion::V6.max_instructions(), 2400);
        assert_eq!(ProtocolVersion::V10.max_instructions(), 2400);
        assert!(!ProtocolVersion::V3.is_binary());
        assert!(ProtocolVersion::V10.is_binary());
    }

    #[test]
    fn test_repr_round_trip() {
        assert_eq!(u8::from(ProtocolVersion::V10), 10);
        assert_eq!(ProtocolVersion::try_from(6u8).unwrap(), ProtocolVersion::V6);
        assert!(ProtocolVersion::try_from(4u8).is_err());
        assert_eq!(ProtocolVersion::V10.to_string(), "V10");
    }
}
