use crate::protocol::parser::RespValue;

/// RESP 编码
///
/// 客户端写命令时用 `command_array` 或 `inline`，
/// 其余方法生成服务端回复帧，供测试里的假服务端和基准测试使用。
pub struct RespEncoder;

impl RespEncoder {
    /// 命令编码为 RESP 数组，参数里的空格会被完整保留
    pub fn command_array(tokens: &[String]) -> String {
        if tokens.is_empty() {
            return String::new();
        }

        let mut result = format!("*{}\r\n", tokens.len());
        for arg in tokens {
            result.push_str(&format!("${}\r\n{}\r\n", arg.len(), arg));
        }
        result
    }

    /// 命令编码为 inline 格式：空格连接，CRLF 结尾
    pub fn inline(line: &str) -> String {
        format!("{}\r\n", line)
    }

    pub fn simple_string(s: &str) -> String {
        format!("+{}\r\n", s)
    }

    pub fn error(msg: &str) -> String {
        format!("-{}\r\n", msg)
    }

    pub fn integer(n: i64) -> String {
        format!(":{}\r\n", n)
    }

    pub fn bulk_string(s: Option<&str>) -> String {
        match s {
            Some(s) => format!("${}\r\n{}\r\n", s.len(), s),
            None => "$-1\r\n".to_string(),
        }
    }

    pub fn array(items: Option<&[RespValue]>) -> String {
        match items {
            Some(items) => {
                let mut result = format!("*{}\r\n", items.len());
                for item in items {
                    result.push_str(&Self::value(item));
                }
                result
            }
            None => "*-1\r\n".to_string(),
        }
    }

    pub fn value(value: &RespValue) -> String {
        match value {
            RespValue::SimpleString(s) => Self::simple_string(s),
            RespValue::Error(s) => Self::error(s),
            RespValue::Integer(n) => Self::integer(*n),
            RespValue::BulkString(s) => Self::bulk_string(s.as_deref()),
            RespValue::Array(arr) => Self::array(arr.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_array() {
        let cmd = vec!["PING".to_string()];
        assert_eq!(RespEncoder::command_array(&cmd), "*1\r\n$4\r\nPING\r\n");

        let cmd = vec!["SET".to_string(), "fleet".to_string(), "a b".to_string()];
        assert_eq!(
            RespEncoder::command_array(&cmd),
            "*3\r\n$3\r\nSET\r\n$5\r\nfleet\r\n$3\r\na b\r\n"
        );
        assert_eq!(RespEncoder::command_array(&[]), "");
    }

    #[test]
    fn test_inline() {
        assert_eq!(
            RespEncoder::inline("NEARBY fleet FENCE POINT 1 2"),
            "NEARBY fleet FENCE POINT 1 2\r\n"
        );
    }

    #[test]
    fn test_error() {
        assert_eq!(
            RespEncoder::error("ERR unknown command"),
            "-ERR unknown command\r\n"
        );
    }

    #[test]
    fn test_bulk_string_counts_bytes() {
        assert_eq!(RespEncoder::bulk_string(Some("foobar")), "$6\r\nfoobar\r\n");
        assert_eq!(RespEncoder::bulk_string(Some("é")), "$2\r\né\r\n");
        assert_eq!(RespEncoder::bulk_string(None), "$-1\r\n");
    }

    #[test]
    fn test_nested_array() {
        let value = RespValue::Array(Some(vec![
            RespValue::Integer(1),
            RespValue::Array(Some(vec![RespValue::SimpleString("OK".to_string())])),
        ]));
        assert_eq!(RespEncoder::value(&value), "*2\r\n:1\r\n*1\r\n+OK\r\n");
    }
}
