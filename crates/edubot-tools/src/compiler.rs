//! # 程序编译器
//!
//! 把 [`ProgramSource`] 展开为扁平的 [`Instruction`] 列表：
//!
//! - `Move` 语句产生 `repetitions` 条相同指令
//! - `Subroutine` 语句按名加载被引用的程序并递归编译，结果整体重复
//!
//! 环检测基于**调用路径**而不是已访问集合：同一个子程序可以出现在
//! 不重叠的两个分支里。每层递归都拿到路径的一份拷贝（`path + [name]`），
//! 兄弟分支之间互不影响。
//!
//! 指令总数按语句顺序增量累计，上限 [`MAX_INSTRUCTIONS`]。超过上限的
//! 语句块被丢弃并记一条 [`ProgramError::Complexity`]，后续语句照常处理。
//!
//! 编译错误是数据而不是 `Err`：结果总是 [`CompiledProgram`]。

use crate::program::{ProgramSource, Statement};
use crate::store::ProgramLoader;
use edubot_protocol::Instruction;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// 单个程序展开后的指令上限
pub const MAX_INSTRUCTIONS: usize = 1000;

/// 编译错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ProgramError {
    /// 累计指令数将超过上限；`statement_index` 是被丢弃的语句
    Complexity {
        statement_index: usize,
        max_instructions: usize,
    },
    /// 被引用的程序不存在
    MissingReference {
        statement_index: usize,
        program_reference: String,
    },
    /// 被引用的程序自身编译失败（内部错误不逐条上报）
    FaultyReference {
        statement_index: usize,
        program_reference: String,
    },
    /// 被引用的程序已在当前调用路径上
    CyclicReference {
        statement_index: usize,
        program_reference: String,
    },
}

impl ProgramError {
    pub fn statement_index(&self) -> usize {
        match self {
            ProgramError::Complexity { statement_index, .. }
            | ProgramError::MissingReference { statement_index, .. }
            | ProgramError::FaultyReference { statement_index, .. }
            | ProgramError::CyclicReference { statement_index, .. } => *statement_index,
        }
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Complexity {
                statement_index,
                max_instructions,
            } => write!(
                f,
                "statement {}: program exceeds {} instructions",
                statement_index, max_instructions
            ),
            ProgramError::MissingReference {
                statement_index,
                program_reference,
            } => write!(
                f,
                "statement {}: program '{}' not found",
                statement_index, program_reference
            ),
            ProgramError::FaultyReference {
                statement_index,
                program_reference,
            } => write!(
                f,
                "statement {}: program '{}' has errors",
                statement_index, program_reference
            ),
            ProgramError::CyclicReference {
                statement_index,
                program_reference,
            } => write!(
                f,
                "statement {}: program '{}' references itself",
                statement_index, program_reference
            ),
        }
    }
}

/// 编译结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CompiledProgram {
    Compiled { instructions: Vec<Instruction> },
    Faulty { errors: Vec<ProgramError> },
}

impl CompiledProgram {
    pub fn is_compiled(&self) -> bool {
        matches!(self, CompiledProgram::Compiled { .. })
    }

    /// 成功时的指令
    pub fn instructions(&self) -> Option<&[Instruction]> {
        match self {
            CompiledProgram::Compiled { instructions } => Some(instructions),
            CompiledProgram::Faulty { .. } => None,
        }
    }

    /// 失败时的错误（成功时为空）
    pub fn errors(&self) -> &[ProgramError] {
        match self {
            CompiledProgram::Compiled { .. } => &[],
            CompiledProgram::Faulty { errors } => errors,
        }
    }

    pub fn into_result(self) -> Result<Vec<Instruction>, Vec<ProgramError>> {
        match self {
            CompiledProgram::Compiled { instructions } => Ok(instructions),
            CompiledProgram::Faulty { errors } => Err(errors),
        }
    }
}

/// 编译一个程序
pub fn compile(source: &ProgramSource, loader: &dyn ProgramLoader) -> CompiledProgram {
    compile_on_path(source, loader, &[source.name.clone()])
}

fn compile_on_path(
    source: &ProgramSource,
    loader: &dyn ProgramLoader,
    path: &[String],
) -> CompiledProgram {
    let mut errors = Vec::new();
    let mut chunks: Vec<(usize, Chunk)> = Vec::with_capacity(source.statements.len());

    for (index, statement) in source.statements.iter().enumerate() {
        match expand(index, statement, loader, path) {
            Ok(chunk) => chunks.push((index, chunk)),
            Err(error) => errors.push(error),
        }
    }

    let mut instructions = Vec::new();
    for (index, chunk) in chunks {
        if instructions.len() + chunk.len() > MAX_INSTRUCTIONS {
            debug!(
                "{}: statement {} adds {} instructions, over the limit",
                source.name,
                index,
                chunk.len()
            );
            errors.push(ProgramError::Complexity {
                statement_index: index,
                max_instructions: MAX_INSTRUCTIONS,
            });
            continue;
        }
        chunk.append_to(&mut instructions);
    }

    if errors.is_empty() {
        CompiledProgram::Compiled { instructions }
    } else {
        errors.sort_by_key(ProgramError::statement_index);
        CompiledProgram::Faulty { errors }
    }
}

/// 一条语句的展开结果：`body` 重复 `repetitions` 次
///
/// 延迟物化，超限的块不会真的分配。
struct Chunk {
    body: Vec<Instruction>,
    repetitions: usize,
}

impl Chunk {
    fn len(&self) -> usize {
        self.body.len().saturating_mul(self.repetitions)
    }

    fn append_to(self, out: &mut Vec<Instruction>) {
        for _ in 0..self.repetitions {
            out.extend_from_slice(&self.body);
        }
    }
}

fn expand(
    index: usize,
    statement: &Statement,
    loader: &dyn ProgramLoader,
    path: &[String],
) -> Result<Chunk, ProgramError> {
    match statement {
        Statement::Move {
            left_motor_speed,
            right_motor_speed,
            repetitions,
        } => Ok(Chunk {
            body: vec![Instruction::new(*left_motor_speed, *right_motor_speed)],
            repetitions: *repetitions as usize,
        }),
        Statement::Subroutine {
            program_reference,
            repetitions,
        } => {
            if path.iter().any(|name| name == program_reference) {
                return Err(ProgramError::CyclicReference {
                    statement_index: index,
                    program_reference: program_reference.clone(),
                });
            }
            let Some(referenced) = loader.load_program_source(program_reference) else {
                return Err(ProgramError::MissingReference {
                    statement_index: index,
                    program_reference: program_reference.clone(),
                });
            };

            let mut nested_path = path.to_vec();
            nested_path.push(program_reference.clone());
            match compile_on_path(&referenced, loader, &nested_path) {
                CompiledProgram::Compiled { instructions } => Ok(Chunk {
                    body: instructions,
                    repetitions: *repetitions as usize,
                }),
                CompiledProgram::Faulty { .. } => Err(ProgramError::FaultyReference {
                    statement_index: index,
                    program_reference: program_reference.clone(),
                }),
            }
        },
    }
}
