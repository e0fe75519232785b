use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SpatioError};

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 连接配置
    pub connection: ConnectionConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// 服务器地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 服务器端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// AUTH 密码，未设置时跳过认证
    #[serde(default)]
    pub password: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别：trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 日志输出：stdout, file
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志文件路径（当 output = file 时）
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// 默认值函数
// ============================================================================

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9851 // Tile38 默认端口
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

// ============================================================================
// 实现
// ============================================================================

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: default_host(),
                port: default_port(),
                password: None,
            },
            logging: LoggingConfig {
                level: default_log_level(),
                output: default_log_output(),
                log_file: None,
            },
        }
    }
}

impl ConnectionConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ClientConfig {
    /// 从文件加载配置
    ///
    /// 配置加载顺序（优先级从低到高）：
    /// 1. 默认配置（内嵌的 default.toml）
    /// 2. 用户配置文件（可选）
    /// 3. 环境变量（SPATIO__ 前缀，使用双下划线分隔嵌套）
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use spatio_client::config::ClientConfig;
    ///
    /// // 加载配置（如果文件不存在，使用默认配置）
    /// let config = ClientConfig::from_file("spatio-client.toml").unwrap();
    /// ```
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            // 1. 加载默认配置（内嵌）
            .add_source(config::File::from_str(
                include_str!("default.toml"),
                config::FileFormat::Toml,
            ))
            // 2. 加载用户配置（可选，不存在不报错）
            .add_source(config::File::with_name(path).required(false))
            // 3. 加载环境变量（SPATIO__ 前缀，双下划线分隔嵌套）
            .add_source(config::Environment::with_prefix("SPATIO").separator("__"))
            .build()
            .map_err(|e| SpatioError::Config(format!("Failed to load config: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| SpatioError::Config(format!("Failed to parse config: {}", e)))
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| SpatioError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| SpatioError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.connection.port == 0 {
            return Err("Port must be greater than 0".to_string());
        }

        if self.connection.host.trim().is_empty() {
            return Err("Host must not be empty".to_string());
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "Invalid log level: '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ))
            }
        }

        match self.logging.output.as_str() {
            "stdout" | "file" => {}
            _ => {
                return Err(format!(
                    "Invalid log output: '{}'. Must be one of: stdout, file",
                    self.logging.output
                ))
            }
        }

        if self.logging.output == "file" && self.logging.log_file.is_none() {
            return Err("Log output is 'file' but log_file path is not specified".to_string());
        }

        Ok(())
    }

    /// 配置摘要，密码不会出现在里面
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "📋 Spatio Client Configuration:".to_string(),
            format!("   Server:      {}", self.connection.address()),
            format!(
                "   Auth:        {}",
                if self.connection.password.is_some() {
                    "enabled"
                } else {
                    "disabled"
                }
            ),
            String::new(),
            format!("   Log Level:   {}", self.logging.level),
            format!("   Log Output:  {}", self.logging.output),
        ];
        if let Some(ref log_file) = self.logging.log_file {
            lines.push(format!("   Log File:    {}", log_file.display()));
        }
        lines.join("\n")
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        println!("{}", self.summary());
        println!();
    }
}
