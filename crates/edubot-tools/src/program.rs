//! # 程序源
//!
//! 用户编写的程序：有序语句列表，语句可以是电机动作，也可以是对其他
//! 程序的按名引用（子程序）。线上只传输展开后的 [`Instruction`]。

use edubot_protocol::Instruction;
use serde::{Deserialize, Serialize};

/// 一条语句
///
/// JSON 形式：
///
/// ```json
/// { "type": "move", "leftMotorSpeed": 50, "rightMotorSpeed": 50, "repetitions": 3 }
/// { "type": "subroutine", "programReference": "square", "repetitions": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Statement {
    /// 电机动作，重复 `repetitions` 次
    Move {
        left_motor_speed: u8,
        right_motor_speed: u8,
        repetitions: u32,
    },
    /// 按名引用另一个程序，整体重复 `repetitions` 次
    Subroutine {
        program_reference: String,
        repetitions: u32,
    },
}

impl Statement {
    pub fn movement(left: u8, right: u8, repetitions: u32) -> Self {
        Statement::Move {
            left_motor_speed: left,
            right_motor_speed: right,
            repetitions,
        }
    }

    pub fn subroutine(reference: impl Into<String>, repetitions: u32) -> Self {
        Statement::Subroutine {
            program_reference: reference.into(),
            repetitions,
        }
    }

    /// `Move` 语句对应的单条指令
    pub fn instruction(&self) -> Option<Instruction> {
        match self {
            Statement::Move {
                left_motor_speed,
                right_motor_speed,
                ..
            } => Some(Instruction::new(*left_motor_speed, *right_motor_speed)),
            Statement::Subroutine { .. } => None,
        }
    }
}

/// 程序源
///
/// `name` 同时是存储中的 id，子程序引用按它解析。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSource {
    pub name: String,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl ProgramSource {
    pub fn new(name: impl Into<String>, statements: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            statements,
        }
    }
}
