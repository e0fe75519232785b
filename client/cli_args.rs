use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "spatio-cli",
    version,
    about = "A command line client for Tile38-compatible geospatial servers",
    long_about = "spatio-cli connects to a Tile38-compatible server and executes commands.\nRun a single command, stream live geofence events with --live, or use -i for interactive mode."
)]
pub struct CliArgs {
    /// 配置文件路径
    #[arg(short, long, default_value = "spatio-client.toml")]
    pub config: String,

    /// Server hostname (overrides config file)
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Server port (overrides config file)
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Password sent with AUTH (overrides config file)
    #[arg(short = 'a', long = "password")]
    pub password: Option<String>,

    /// Log level (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// 生成默认配置文件并退出
    #[arg(long)]
    pub generate_config: bool,

    /// 打印生效的配置（已合并文件、环境变量和命令行参数）
    #[arg(long)]
    pub show_config: bool,

    /// Enter interactive mode
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Treat the command as a geofence and print events until Ctrl+C
    #[arg(short = 'l', long = "live")]
    pub live: bool,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.live && self.interactive {
            return Err("--live and --interactive cannot be combined".to_string());
        }

        if self.live && self.command.is_empty() {
            return Err("--live requires a command, e.g. NEARBY fleet FENCE POINT 33 -112 500".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn should_run_interactive(&self) -> bool {
        self.interactive || (self.command.is_empty() && !self.live)
    }
}

/// 拆分一行命令
///
/// 空白分隔参数；引号内的内容作为一个参数（去掉引号）；
/// 以 `{` 或 `[` 开头的参数一直读到括号配平，便于直接粘贴 GeoJSON。
pub fn split_command_line(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        match c {
            '"' | '\'' => {
                chars.next();
                let mut terminated = false;
                for ch in chars.by_ref() {
                    if ch == c {
                        terminated = true;
                        break;
                    }
                    token.push(ch);
                }
                if !terminated {
                    return Err(format!("unterminated {} quote", c));
                }
            }
            '{' | '[' => {
                let mut depth = 0usize;
                let mut in_string = false;
                let mut escaped = false;
                for ch in chars.by_ref() {
                    token.push(ch);
                    if in_string {
                        match ch {
                            _ if escaped => escaped = false,
                            '\\' => escaped = true,
                            '"' => in_string = false,
                            _ => {}
                        }
                        continue;
                    }
                    match ch {
                        '"' => in_string = true,
                        '{' | '[' => depth += 1,
                        '}' | ']' => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if depth != 0 || in_string {
                    return Err("unbalanced JSON argument".to_string());
                }
            }
            _ => {
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() {
                        break;
                    }
                    token.push(ch);
                    chars.next();
                }
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}
