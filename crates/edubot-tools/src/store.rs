//! # 程序存储
//!
//! - [`ProgramLoader`]: 编译器按名解析子程序所需的最小接口
//! - [`ProgramStore`]: 完整的增删查接口
//! - [`MemoryProgramStore`]: 内存实现（测试、CLI 的程序集文件）
//! - [`JsonProgramStore`]: 目录实现，每个程序一个 `<id>.json`

use crate::program::ProgramSource;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid program JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid program id: {0:?}")]
    InvalidId(String),
}

/// 子程序解析
///
/// 编译器只需要这一个方法；找不到返回 `None`。
pub trait ProgramLoader {
    fn load_program_source(&self, name: &str) -> Option<ProgramSource>;
}

impl<F> ProgramLoader for F
where
    F: Fn(&str) -> Option<ProgramSource>,
{
    fn load_program_source(&self, name: &str) -> Option<ProgramSource> {
        self(name)
    }
}

/// 程序存储
pub trait ProgramStore: ProgramLoader {
    fn load(&self, id: &str) -> Result<Option<ProgramSource>, StoreError>;

    /// 所有程序，按 id 排序
    fn load_all(&self) -> Result<Vec<ProgramSource>, StoreError>;

    /// 以 `program.name` 为 id 保存（覆盖同名）
    fn save(&self, program: &ProgramSource) -> Result<(), StoreError>;

    /// 一个尚未使用的 id
    fn generate_id(&self) -> Result<String, StoreError>;
}

/// 从已用 id 中挑出第一个空闲的 `program-N`
fn first_free_id<'a>(used: impl Iterator<Item = &'a str>) -> String {
    let taken: Vec<&str> = used.collect();
    (1..)
        .map(|n| format!("program-{}", n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_default()
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !id.chars().any(char::is_control);
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

// ==================== 内存存储 ====================

/// 内存程序存储
#[derive(Debug, Default)]
pub struct MemoryProgramStore {
    programs: RwLock<BTreeMap<String, ProgramSource>>,
}

impl MemoryProgramStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_programs(programs: impl IntoIterator<Item = ProgramSource>) -> Self {
        let store = Self::new();
        {
            let mut map = store.programs.write();
            for program in programs {
                map.insert(program.name.clone(), program);
            }
        }
        store
    }

    /// 读取程序集文件（JSON 数组）
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let programs: Vec<ProgramSource> =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded {} programs from {}", programs.len(), path.display());
        Ok(Self::from_programs(programs))
    }

    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.read().is_empty()
    }
}

impl ProgramLoader for MemoryProgramStore {
    fn load_program_source(&self, name: &str) -> Option<ProgramSource> {
        self.programs.read().get(name).cloned()
    }
}

impl ProgramStore for MemoryProgramStore {
    fn load(&self, id: &str) -> Result<Option<ProgramSource>, StoreError> {
        Ok(self.load_program_source(id))
    }

    fn load_all(&self) -> Result<Vec<ProgramSource>, StoreError> {
        Ok(self.programs.read().values().cloned().collect())
    }

    fn save(&self, program: &ProgramSource) -> Result<(), StoreError> {
        validate_id(&program.name)?;
        self.programs.write().insert(program.name.clone(), program.clone());
        Ok(())
    }

    fn generate_id(&self) -> Result<String, StoreError> {
        let programs = self.programs.read();
        Ok(first_free_id(programs.keys().map(String::as_str)))
    }
}

// ==================== JSON 目录存储 ====================

/// JSON 目录程序存储
///
/// 目录在首次保存时创建；不存在的目录视为空存储。
#[derive(Debug, Clone)]
pub struct JsonProgramStore {
    root: PathBuf,
}

impl JsonProgramStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    fn read(&self, path: &Path) -> Result<ProgramSource, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn ids(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                });
            },
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ProgramLoader for JsonProgramStore {
    fn load_program_source(&self, name: &str) -> Option<ProgramSource> {
        match self.load(name) {
            Ok(program) => program,
            Err(e) => {
                warn!("Failed to load program {:?}: {}", name, e);
                None
            },
        }
    }
}

impl ProgramStore for JsonProgramStore {
    fn load(&self, id: &str) -> Result<Option<ProgramSource>, StoreError> {
        validate_id(id)?;
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).map(Some)
    }

    fn load_all(&self) -> Result<Vec<ProgramSource>, StoreError> {
        self.ids()?.iter().map(|id| self.read(&self.path_for(id))).collect()
    }

    fn save(&self, program: &ProgramSource) -> Result<(), StoreError> {
        validate_id(&program.name)?;
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let path = self.path_for(&program.name);
        let content = serde_json::to_string_pretty(program).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, content).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Saved program {:?} to {}", program.name, path.display());
        Ok(())
    }

    fn generate_id(&self) -> Result<String, StoreError> {
        let ids = self.ids()?;
        Ok(first_free_id(ids.iter().map(String::as_str)))
    }
}
