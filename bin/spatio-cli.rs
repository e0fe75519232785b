use std::io::Write;

use spatio_client::client::{split_command_line, CliArgs, Client, OutputFormatter};
use spatio_client::config::{ClientConfig, LoggingConfig};
use spatio_client::{Command, GeofenceEvent, LiveEvent, LiveFence, Result, SpatioError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse_args();

    // 验证参数
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // 生成默认配置文件
    if args.generate_config {
        ClientConfig::default().save_to_file(&args.config)?;
        println!("✅ Generated default configuration: {}", args.config);
        return Ok(());
    }

    // 加载配置，命令行参数覆盖配置文件
    let mut config = ClientConfig::from_file(&args.config)?;
    if let Some(host) = &args.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(password) = &args.password {
        config.connection.password = Some(password.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(&config.logging)?;
    debug!("Loaded configuration: {:?}", config.connection.address());

    if args.show_config {
        config.print_summary();
    }

    let outcome = if args.live {
        run_live_mode(&config, &args.command).await
    } else if args.should_run_interactive() {
        run_interactive_mode(&config).await
    } else {
        run_command_mode(&config, &args.command).await
    };

    if let Err(e) = outcome {
        eprintln!("{}", OutputFormatter::format_error(&e));
        std::process::exit(1);
    }
    Ok(())
}

fn parse_command(tokens: &[String]) -> Result<Command> {
    Command::from_tokens(tokens.iter().cloned())
        .ok_or_else(|| SpatioError::InvalidArgument("empty command".to_string()))
}

async fn run_command_mode(config: &ClientConfig, tokens: &[String]) -> Result<()> {
    let command = parse_command(tokens)?;
    let client = Client::connect(config);

    let response = client.execute(&command).await?;
    println!("{}", OutputFormatter::format_response(&response));

    client.close().await
}

async fn run_live_mode(config: &ClientConfig, tokens: &[String]) -> Result<()> {
    let command = parse_command(tokens)?;
    stream_events(config, &command).await
}

/// 打印围栏事件，直到服务端断开或收到 Ctrl+C
async fn stream_events(config: &ClientConfig, command: &Command) -> Result<()> {
    println!("{}", OutputFormatter::format_live_message(&command.to_string()));

    let handle = LiveFence::connect_command(config, command, |event: LiveEvent<GeofenceEvent>| {
        println!("{}", OutputFormatter::format_event(&event));
    })
    .await?;

    tokio::select! {
        _ = handle.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            handle.close();
            handle.wait().await;
        }
    }

    println!("{}", OutputFormatter::format_disconnected_message());
    Ok(())
}

async fn run_interactive_mode(config: &ClientConfig) -> Result<()> {
    let host = config.connection.host.as_str();
    let port = config.connection.port;

    println!("spatio-cli interactive mode");
    println!("{}", OutputFormatter::format_connecting_message(host, port));

    let client = Client::connect(config);
    if let Err(e) = client.wait_ready().await {
        eprintln!("Failed to connect: {}", e);
        return Ok(());
    }
    println!("{}", OutputFormatter::format_connected_message(host, port));
    println!("Type 'HELP' for available commands, 'QUIT' to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", OutputFormatter::format_prompt(host, port));
        std::io::stdout().flush()?;

        // EOF (Ctrl+D)
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let tokens = match split_command_line(&line) {
            Ok(tokens) if tokens.is_empty() => continue,
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        match tokens[0].to_uppercase().as_str() {
            "QUIT" | "EXIT" => break,
            "HELP" => {
                println!("{}", OutputFormatter::format_help_message());
            }
            "LIVE" => match parse_command(&tokens[1..]) {
                Ok(command) => {
                    if let Err(e) = stream_events(config, &command).await {
                        eprintln!("{}", OutputFormatter::format_error(&e));
                    }
                }
                Err(e) => eprintln!("{}", OutputFormatter::format_error(&e)),
            },
            _ => {
                let command = parse_command(&tokens)?;
                match client.execute(&command).await {
                    Ok(response) => println!("{}", OutputFormatter::format_response(&response)),
                    Err(e) => {
                        eprintln!("{}", OutputFormatter::format_error(&e));
                        if e.is_fatal() {
                            println!("Connection lost.");
                            break;
                        }
                    }
                }
            }
        }
    }

    println!("{}", OutputFormatter::format_disconnected_message());
    client.close().await
}

/// 初始化日志系统
///
/// 命令行输出占用 stdout，日志写到 stderr 或文件。
fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    match (config.output.as_str(), &config.log_file) {
        ("file", Some(log_file)) => {
            // 确保日志目录存在
            if let Some(parent) = log_file.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::sync::Mutex::new(file))
                        .with_ansi(false)
                        .with_target(false),
                )
                .with(tracing_subscriber::filter::LevelFilter::from_level(filter))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .with(tracing_subscriber::filter::LevelFilter::from_level(filter))
                .init();
        }
    }

    Ok(())
}
