//! 线上编解码
//!
//! 纯函数，无状态。所有舍入行为与固件逐位一致，**不要**试图"修正"有损量化。

use crate::{Instruction, ProtocolError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// 百分比 → 线上字节的比例
const WIRE_SCALE: f64 = 2.55;

/// 二进制下载时每个数据包携带的最大数据字节数（不含 1 字节序号）
///
/// 取偶数，保证一个指令对不会被拆到两个包里（解码端并不依赖这一点）。
pub const BINARY_PACKET_PAYLOAD: usize = 18;

/// 二进制下载头长度（大端 u32 总字节数）
pub const DOWNLOAD_HEADER_LEN: usize = 4;

/// 应用域速度（0–100）→ 线上字节（0–255）
///
/// `0 → 0`，其余 `floor(pct * 2.55 + 0.5)`（四舍五入，半值向上）。
/// 超过 100 的输入饱和到 255；调用方应先用 [`Instruction::validate`] 拦截。
pub fn encode_speed(percent: u8) -> u8 {
    if percent == 0 {
        return 0;
    }
    (f64::from(percent) * WIRE_SCALE + 0.5).floor() as u8
}

/// 线上字节（0–255）→ 应用域速度（0–100）
///
/// `floor(byte / 2.55 + 0.5)`。与 [`encode_speed`] 不严格互逆。
pub fn decode_speed(wire: u8) -> u8 {
    (f64::from(wire) / WIRE_SCALE + 0.5).floor() as u8
}

/// 上传长度头：`'d'` + `2n - 1` 的 4 位大写十六进制
///
/// "负载长度减一" 是固件的既有行为，必须原样保留。`n = 0` 时饱和为 `d0000`。
pub fn calculate_data_length(instruction_count: usize) -> String {
    format!("d{:04X}", (instruction_count * 2).saturating_sub(1))
}

/// 由长度头反推设备应接收的字节数（`value + 1`）
pub fn expected_upload_bytes(header: &str) -> Option<usize> {
    let hex = header.strip_prefix('d')?;
    if hex.len() != 4 {
        return None;
    }
    usize::from_str_radix(hex, 16).ok().map(|v| v + 1)
}

// ==================== V3 文本帧 ====================

/// V3 上传行：`"LLL,RRRxx"`（线上值，3 位补零，字面量 `xx` 结尾）
pub fn encode_text_instruction(instruction: &Instruction) -> String {
    let (left, right) = instruction.to_wire();
    format!("{:03},{:03}xx", left, right)
}

/// 解析 V3 上传行，返回线上字节对（设备端/模拟器使用）
pub fn parse_text_upload_line(line: &str) -> Option<(u8, u8)> {
    let body = line.trim().strip_suffix("xx")?;
    let (left, right) = body.split_once(',')?;
    Some((left.parse().ok()?, right.parse().ok()?))
}

/// V3 下载行：`"L,R"`（线上值，不补零）
pub fn encode_text_download_line(left: u8, right: u8) -> String {
    format!("{},{}", left, right)
}

/// 解析 V3 下载行并解码回应用域
pub fn parse_text_instruction(text: &str) -> Result<Instruction, ProtocolError> {
    let invalid = || ProtocolError::InvalidInstructionText(text.to_string());
    let (left, right) = text.trim().split_once(',').ok_or_else(invalid)?;
    let left: u8 = left.trim().parse().map_err(|_| invalid())?;
    let right: u8 = right.trim().parse().map_err(|_| invalid())?;
    Ok(Instruction::from_wire(left, right))
}

// ==================== V6/V10 二进制帧 ====================

/// 整个程序编码为一次二进制写入：每条指令 2 字节 `(left, right)`
pub fn encode_binary_program(instructions: &[Instruction]) -> Bytes {
    let mut buf = BytesMut::with_capacity(instructions.len() * 2);
    for instruction in instructions {
        let (left, right) = instruction.to_wire();
        buf.put_u8(left);
        buf.put_u8(right);
    }
    buf.freeze()
}

/// 解码连续的指令字节对，末尾的奇数字节被忽略
pub fn decode_binary_program(data: &[u8]) -> Vec<Instruction> {
    data.chunks_exact(2)
        .map(|pair| Instruction::from_wire(pair[0], pair[1]))
        .collect()
}

/// 下载头：大端 u32 总字节数
pub fn encode_download_header(total_bytes: u32) -> [u8; DOWNLOAD_HEADER_LEN] {
    total_bytes.to_be_bytes()
}

/// 解析下载头
pub fn parse_download_header(packet: &[u8]) -> Result<u32, ProtocolError> {
    if packet.len() < DOWNLOAD_HEADER_LEN {
        return Err(ProtocolError::InvalidDownloadHeader {
            actual: packet.len(),
        });
    }
    let mut buf = packet;
    Ok(buf.get_u32())
}

/// 把线上程序切成下载数据包：`[seq, data...]`
pub fn split_download_packets(wire: &[u8]) -> Vec<Bytes> {
    wire.chunks(BINARY_PACKET_PAYLOAD)
        .enumerate()
        .map(|(seq, chunk)| {
            let mut packet = BytesMut::with_capacity(chunk.len() + 1);
            packet.put_u8(seq as u8);
            packet.put_slice(chunk);
            packet.freeze()
        })
        .collect()
}
