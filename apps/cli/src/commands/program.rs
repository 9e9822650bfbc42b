//! 程序命令：编译、上传、下载
//!
//! 程序集文件是 `ProgramSource` 的 JSON 数组；子程序先在同一文件中查找，
//! 找不到时再查配置的程序目录。

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use edubot_sdk::prelude::*;
use std::path::{Path, PathBuf};

use crate::session::Session;
use crate::utils;

/// 编译程序集中的一个程序
pub fn compile_from_file(
    file: &Path,
    program: &str,
    store_dir: Option<&Path>,
) -> Result<CompiledProgram> {
    let set = MemoryProgramStore::from_json_file(file)
        .with_context(|| format!("failed to read program set {}", file.display()))?;
    let source = set
        .load_program_source(program)
        .ok_or_else(|| anyhow!("program {:?} not found in {}", program, file.display()))?;

    let fallback = store_dir.map(JsonProgramStore::new);
    let loader = |name: &str| {
        set.load_program_source(name)
            .or_else(|| fallback.as_ref().and_then(|store| store.load_program_source(name)))
    };
    Ok(compile(&source, &loader))
}

fn print_errors(compiled: &CompiledProgram) {
    for error in compiled.errors() {
        eprintln!("  ❌ {}", error);
    }
}

/// 编译命令参数
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// 程序集文件（JSON）
    pub file: PathBuf,

    /// 要编译的程序名
    #[arg(short, long, default_value = "main")]
    pub program: String,
}

impl CompileCommand {
    /// 只编译，不连接机器人；结果以 JSON 输出
    pub fn execute(&self, store_dir: Option<&Path>) -> Result<()> {
        let compiled = compile_from_file(&self.file, &self.program, store_dir)?;
        println!("{}", serde_json::to_string_pretty(&compiled)?);
        if !compiled.is_compiled() {
            print_errors(&compiled);
            bail!("program {:?} has {} errors", self.program, compiled.errors().len());
        }
        Ok(())
    }
}

/// 上传命令参数
#[derive(Args, Debug)]
pub struct UploadCommand {
    /// 程序集文件（JSON）
    pub file: PathBuf,

    /// 要上传的程序名
    #[arg(short, long, default_value = "main")]
    pub program: String,
}

impl UploadCommand {
    pub fn execute(&self, session: &Session) -> Result<()> {
        let compiled = compile_from_file(
            &self.file,
            &self.program,
            session.config().program_store.as_deref(),
        )?;
        let instructions = match compiled {
            CompiledProgram::Compiled { instructions } => instructions,
            faulty => {
                print_errors(&faulty);
                bail!("program {:?} does not compile", self.program);
            },
        };
        println!("📦 {} 条指令", instructions.len());

        let robot = session.connect()?;
        let mut progress = utils::progress_printer("上传中");
        robot.upload_program(&instructions, Some(&mut progress))?;
        println!("✅ 上传完成");
        Ok(())
    }
}

/// 下载命令参数
#[derive(Args, Debug)]
pub struct DownloadCommand {
    /// 输出文件（默认打印到标准输出）
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl DownloadCommand {
    pub fn execute(&self, session: &Session) -> Result<()> {
        let robot = session.connect()?;
        let mut progress = utils::progress_printer("下载中");
        let instructions = robot.download_program(Some(&mut progress))?;
        write_instructions(&instructions, self.output.as_deref())
    }
}

/// 输出指令（JSON）
pub fn write_instructions(instructions: &[Instruction], output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(instructions)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("💾 {} 条指令已保存到 {}", instructions.len(), path.display());
        },
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_set(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("programs.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_compile_from_file() {
        let dir = TempDir::new().unwrap();
        let file = write_set(
            &dir,
            r#"[
                { "name": "main", "statements": [
                    { "type": "subroutine", "programReference": "turn", "repetitions": 2 }
                ]},
                { "name": "turn", "statements": [
                    { "type": "move", "leftMotorSpeed": 100, "rightMotorSpeed": 0, "repetitions": 1 }
                ]}
            ]"#,
        );
        let compiled = compile_from_file(&file, "main", None).unwrap();
        assert_eq!(compiled.instructions().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_compile_falls_back_to_store_dir() {
        let dir = TempDir::new().unwrap();
        let store = JsonProgramStore::new(dir.path().join("store"));
        store
            .save(&ProgramSource::new("shared", vec![Statement::movement(10, 10, 4)]))
            .unwrap();
        let file = write_set(
            &dir,
            r#"[{ "name": "main", "statements": [
                { "type": "subroutine", "programReference": "shared", "repetitions": 1 }
            ]}]"#,
        );

        let without = compile_from_file(&file, "main", None).unwrap();
        assert!(!without.is_compiled());
        let with = compile_from_file(&file, "main", Some(store.root())).unwrap();
        assert_eq!(with.instructions().map(<[_]>::len), Some(4));
    }

    #[test]
    fn test_unknown_program_name() {
        let dir = TempDir::new().unwrap();
        let file = write_set(&dir, r#"[{ "name": "main", "statements": [] }]"#);
        assert!(compile_from_file(&file, "other", None).is_err());
    }
}
