use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpatioError};

/// geohash 的最大有效精度
pub const MAX_HASH_PRECISION: u8 = 12;

/// 结果排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// 查询结果的输出格式
///
/// 精度只属于 HASHES，其他格式没有参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Count,
    Ids,
    Objects,
    Points,
    Bounds,
    Hashes(u8),
}

impl OutputFormat {
    pub fn tokens(self) -> Vec<String> {
        match self {
            OutputFormat::Count => vec!["COUNT".to_string()],
            OutputFormat::Ids => vec!["IDS".to_string()],
            OutputFormat::Objects => vec!["OBJECTS".to_string()],
            OutputFormat::Points => vec!["POINTS".to_string()],
            OutputFormat::Bounds => vec!["BOUNDS".to_string()],
            OutputFormat::Hashes(precision) => {
                vec!["HASHES".to_string(), precision.to_string()]
            }
        }
    }

    pub fn validate(self) -> Result<Self> {
        if let OutputFormat::Hashes(precision) = self {
            if !(1..=MAX_HASH_PRECISION).contains(&precision) {
                return Err(SpatioError::invalid(format!(
                    "HASHES precision must be between 1 and {}, got {}",
                    MAX_HASH_PRECISION, precision
                )));
            }
        }
        Ok(self)
    }
}

/// 地理围栏检测的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectKind {
    Inside,
    Outside,
    Enter,
    Exit,
    Cross,
}

impl DetectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectKind::Inside => "inside",
            DetectKind::Outside => "outside",
            DetectKind::Enter => "enter",
            DetectKind::Exit => "exit",
            DetectKind::Cross => "cross",
        }
    }
}

impl fmt::Display for DetectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectKind {
    type Err = SpatioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "inside" => Ok(DetectKind::Inside),
            "outside" => Ok(DetectKind::Outside),
            "enter" => Ok(DetectKind::Enter),
            "exit" => Ok(DetectKind::Exit),
            "cross" => Ok(DetectKind::Cross),
            _ => Err(SpatioError::invalid(format!("unknown detect kind '{}'", s))),
        }
    }
}

/// 触发围栏通知的写命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceCommand {
    Set,
    Del,
    Drop,
}

impl FenceCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            FenceCommand::Set => "set",
            FenceCommand::Del => "del",
            FenceCommand::Drop => "drop",
        }
    }
}

impl fmt::Display for FenceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FenceCommand {
    type Err = SpatioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "set" => Ok(FenceCommand::Set),
            "del" => Ok(FenceCommand::Del),
            "drop" => Ok(FenceCommand::Drop),
            _ => Err(SpatioError::invalid(format!("unknown fence command '{}'", s))),
        }
    }
}

/// 逗号连接，用于 DETECT 和 COMMANDS
pub(crate) fn comma_list<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
