use colored::*;
use serde_json::Value;

use crate::error::SpatioError;
use crate::live::{GeofenceEvent, LiveEvent};

pub struct OutputFormatter;

impl OutputFormatter {
    /// 格式化一条命令回复
    pub fn format_response(value: &Value) -> String {
        match value {
            Value::Null => "(nil)".red().to_string(),
            Value::String(s) => Self::format_simple_string(s),
            Value::Number(n) => format!("(integer) {}", n.to_string().cyan()),
            Value::Bool(b) => b.to_string().green().to_string(),
            Value::Array(values) => Self::format_array(values),
            Value::Object(_) => Self::format_object(value),
        }
    }

    fn format_simple_string(s: &str) -> String {
        if s.is_empty() {
            "(empty string)".yellow().to_string()
        } else {
            s.green().to_string()
        }
    }

    fn format_object(value: &Value) -> String {
        // elapsed 每次都不同，对阅读没有帮助
        let mut value = value.clone();
        if let Some(map) = value.as_object_mut() {
            map.remove("elapsed");
            if map.len() == 1 && map.get("ok") == Some(&Value::Bool(true)) {
                return "OK".green().to_string();
            }
        }
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }

    fn format_array(values: &[Value]) -> String {
        if values.is_empty() {
            return "(empty array)".yellow().to_string();
        }

        let mut result = String::new();
        for (i, value) in values.iter().enumerate() {
            let formatted = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result.push_str(&format!("{}) {}\n", (i + 1).to_string().blue(), formatted));
        }
        result.trim_end().to_string()
    }

    pub fn format_error(err: &SpatioError) -> String {
        format!("(error) {}", err.to_string().red())
    }

    /// 格式化一条实时围栏事件
    pub fn format_event(event: &LiveEvent<GeofenceEvent>) -> String {
        match event {
            LiveEvent::Object(fence) => Self::format_geofence(fence),
            LiveEvent::Raw(text) => format!("{} {}", "(raw)".yellow(), text),
            LiveEvent::Error(err) => format!("{} {}", "(decode error)".yellow(), err),
            LiveEvent::Fatal(err) => format!("{} {}", "(fatal)".red().bold(), err),
        }
    }

    fn format_geofence(event: &GeofenceEvent) -> String {
        let detect = match event.detect.as_deref() {
            Some(d @ ("enter" | "inside")) => d.green(),
            Some(d @ ("exit" | "outside")) => d.red(),
            Some(other) => other.yellow(),
            None => "-".normal(),
        };

        let mut line = format!(
            "[{}] {} {}/{}",
            detect,
            event.command.cyan(),
            event.key,
            event.id.bold(),
        );
        if let Some(time) = &event.time {
            line.push_str(&format!(" @ {}", time));
        }
        if let Some(object) = &event.object {
            line.push_str(&format!(" {}", object));
        }
        line
    }

    pub fn format_prompt(host: &str, port: u16) -> String {
        format!("{}:{}> ", host.blue(), port.to_string().blue())
    }

    pub fn format_connecting_message(host: &str, port: u16) -> String {
        format!("Connecting to {}:{}...", host.cyan(), port.to_string().cyan())
    }

    pub fn format_connected_message(host: &str, port: u16) -> String {
        format!("Connected to {}:{}", host.green(), port.to_string().green())
    }

    pub fn format_live_message(command: &str) -> String {
        format!(
            "Streaming {} (Ctrl+C to stop)",
            command.cyan()
        )
    }

    pub fn format_disconnected_message() -> String {
        "Disconnected".red().to_string()
    }

    pub fn format_help_message() -> String {
        let help = r#"
Available commands:
  PING                           - Test server connection
  SET key id OBJECT {geojson}    - Store an object
  SET key id POINT lat lon       - Store a point
  GET key id                     - Fetch an object
  DEL key id / DROP key          - Remove an object or collection
  NEARBY|WITHIN|INTERSECTS|SCAN|SEARCH key [clauses...]
                                 - Run a one-shot query
  LIVE <query with FENCE>        - Stream geofence events (Ctrl+C returns here)
  QUIT                           - Close connection and exit
  HELP                           - Show this help message

Quote arguments containing spaces. JSON objects may be pasted as-is.
Use Ctrl+D to exit interactive mode.
"#;
        help.trim().to_string()
    }
}
