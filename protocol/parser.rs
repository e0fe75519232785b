use crate::error::{Result, SpatioError};

/// 单个 bulk string 允许的最大长度（与 Redis 的 proto-max-bulk-len 一致）
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// 数组最大嵌套层数，超过后视为流已损坏
const MAX_ARRAY_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<String>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// 帧的文本内容（数组与 nil 没有文本）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) | RespValue::BulkString(Some(s)) => Some(s),
            _ => None,
        }
    }

    /// 转换为 JSON 值，数组递归转换
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            RespValue::SimpleString(s) | RespValue::Error(s) => Value::String(s.clone()),
            RespValue::Integer(n) => Value::from(*n),
            RespValue::BulkString(Some(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            RespValue::BulkString(None) | RespValue::Array(None) => Value::Null,
            RespValue::Array(Some(items)) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

/// 一个边界完整的帧
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Value(RespValue),
    /// 帧边界完整，但内容无法解码。调用方可以跳过它继续解析
    Malformed(String),
}

/// 增量 RESP 解析器
///
/// `parse_frame` 只看缓冲区开头的一个帧：
/// - `Ok(None)`：数据不完整，等待更多字节
/// - `Ok(Some((frame, consumed)))`：得到一个帧，以及它占用的字节数
/// - `Err(ProtocolFatal)`：帧边界无法确定，后续字节都不可信
pub struct RespParser;

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析一个完整的帧，数据不完整或内容损坏都视为错误
    pub fn parse(&self, input: &[u8]) -> Result<RespValue> {
        match self.parse_frame(input)? {
            Some((Frame::Value(value), _)) => Ok(value),
            Some((Frame::Malformed(reason), _)) => Err(SpatioError::ProtocolDecode(reason)),
            None => Err(SpatioError::ProtocolDecode("Unexpected EOF".to_string())),
        }
    }

    pub fn parse_frame(&self, input: &[u8]) -> Result<Option<(Frame, usize)>> {
        self.parse_at(input, 0, 0)
    }

    fn parse_at(&self, input: &[u8], pos: usize, depth: usize) -> Result<Option<(Frame, usize)>> {
        let Some((line, next)) = read_line(input, pos) else {
            return Ok(None);
        };

        let Some((&first, content)) = line.split_first() else {
            return Err(SpatioError::ProtocolFatal("Empty line".to_string()));
        };

        match first {
            b'+' => Ok(Some((text_frame(content, RespValue::SimpleString), next))),
            b'-' => Ok(Some((text_frame(content, RespValue::Error), next))),
            b':' => {
                let frame = match parse_number(content) {
                    Some(n) => Frame::Value(RespValue::Integer(n)),
                    None => Frame::Malformed(format!(
                        "invalid integer: {}",
                        String::from_utf8_lossy(content)
                    )),
                };
                Ok(Some((frame, next)))
            }
            b'$' => {
                let len = parse_length(content, "bulk")?;
                if len == -1 {
                    return Ok(Some((Frame::Value(RespValue::BulkString(None)), next)));
                }
                if len > MAX_BULK_LEN {
                    return Err(SpatioError::ProtocolFatal(format!(
                        "bulk length {} exceeds limit",
                        len
                    )));
                }

                let len = len as usize;
                let end = next + len;
                if input.len() < end + 2 {
                    return Ok(None);
                }
                if &input[end..end + 2] != b"\r\n" {
                    return Err(SpatioError::ProtocolFatal(
                        "bulk string is not terminated by CRLF".to_string(),
                    ));
                }

                let frame = match std::str::from_utf8(&input[next..end]) {
                    Ok(s) => Frame::Value(RespValue::BulkString(Some(s.to_string()))),
                    Err(e) => Frame::Malformed(format!("bulk string is not valid UTF-8: {}", e)),
                };
                Ok(Some((frame, end + 2)))
            }
            b'*' => {
                let len = parse_length(content, "array")?;
                if len == -1 {
                    return Ok(Some((Frame::Value(RespValue::Array(None)), next)));
                }
                if depth >= MAX_ARRAY_DEPTH {
                    return Err(SpatioError::ProtocolFatal(
                        "array nesting too deep".to_string(),
                    ));
                }

                let mut items = Vec::with_capacity((len as usize).min(1024));
                let mut malformed = None;
                let mut cursor = next;
                for _ in 0..len {
                    match self.parse_at(input, cursor, depth + 1)? {
                        None => return Ok(None),
                        Some((Frame::Value(value), end)) => {
                            items.push(value);
                            cursor = end;
                        }
                        Some((Frame::Malformed(reason), end)) => {
                            // 继续解析剩余元素，才能知道整个数组的边界
                            malformed.get_or_insert(reason);
                            cursor = end;
                        }
                    }
                }

                let frame = match malformed {
                    Some(reason) => Frame::Malformed(reason),
                    None => Frame::Value(RespValue::Array(Some(items))),
                };
                Ok(Some((frame, cursor)))
            }
            other => Err(SpatioError::ProtocolFatal(format!(
                "Unknown RESP type: {}",
                other as char
            ))),
        }
    }
}

/// 从 pos 开始找到下一个 CRLF，返回行内容和下一行的起始位置
fn read_line(input: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = input.get(pos..)?;
    let idx = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..idx], pos + idx + 2))
}

fn text_frame(content: &[u8], wrap: fn(String) -> RespValue) -> Frame {
    match std::str::from_utf8(content) {
        Ok(s) => Frame::Value(wrap(s.to_string())),
        Err(e) => Frame::Malformed(format!("line is not valid UTF-8: {}", e)),
    }
}

fn parse_number(content: &[u8]) -> Option<i64> {
    std::str::from_utf8(content).ok()?.parse::<i64>().ok()
}

/// 长度字段损坏时无法确定帧边界，因此是致命错误
fn parse_length(content: &[u8], what: &str) -> Result<i64> {
    match parse_number(content) {
        Some(len) if len >= -1 => Ok(len),
        _ => Err(SpatioError::ProtocolFatal(format!(
            "invalid {} length: {}",
            what,
            String::from_utf8_lossy(content)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string() {
        let parser = RespParser::new();
        let result = parser.parse(b"+OK\r\n").unwrap();
        assert_eq!(result, RespValue::SimpleString("OK".to_string()));
    }

    #[test]
    fn test_error() {
        let parser = RespParser::new();
        let result = parser.parse(b"-Error message\r\n").unwrap();
        assert_eq!(result, RespValue::Error("Error message".to_string()));
    }

    #[test]
    fn test_integer() {
        let parser = RespParser::new();
        let result = parser.parse(b":1000\r\n").unwrap();
        assert_eq!(result, RespValue::Integer(1000));
    }

    #[test]
    fn test_bulk_string() {
        let parser = RespParser::new();
        let result = parser.parse(b"$6\r\nfoobar\r\n").unwrap();
        assert_eq!(result, RespValue::BulkString(Some("foobar".to_string())));
    }

    #[test]
    fn test_bulk_string_with_crlf_inside() {
        let parser = RespParser::new();
        let result = parser.parse(b"$8\r\nfoo\r\nbar\r\n").unwrap();
        assert_eq!(result, RespValue::BulkString(Some("foo\r\nbar".to_string())));
    }

    #[test]
    fn test_null_bulk_string() {
        let parser = RespParser::new();
        let result = parser.parse(b"$-1\r\n").unwrap();
        assert_eq!(result, RespValue::BulkString(None));
    }

    #[test]
    fn test_array() {
        let parser = RespParser::new();
        let result = parser.parse(b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap();
        let expected = RespValue::Array(Some(vec![
            RespValue::BulkString(Some("foo".to_string())),
            RespValue::BulkString(Some("bar".to_string())),
        ]));
        assert_eq!(result, expected);
    }

    #[test]
    fn test_incomplete_frames() {
        let parser = RespParser::new();
        assert!(parser.parse_frame(b"").unwrap().is_none());
        assert!(parser.parse_frame(b"+OK").unwrap().is_none());
        assert!(parser.parse_frame(b"$6\r\nfoo").unwrap().is_none());
        assert!(parser.parse_frame(b"$6\r\nfoobar").unwrap().is_none());
        assert!(parser.parse_frame(b"*2\r\n$3\r\nfoo\r\n").unwrap().is_none());
    }

    #[test]
    fn test_consumed_length_leaves_next_frame() {
        let parser = RespParser::new();
        let input = b"+OK\r\n:5\r\n";
        let (frame, used) = parser.parse_frame(input).unwrap().unwrap();
        assert_eq!(frame, Frame::Value(RespValue::SimpleString("OK".to_string())));
        assert_eq!(used, 5);
        let (frame, _) = parser.parse_frame(&input[used..]).unwrap().unwrap();
        assert_eq!(frame, Frame::Value(RespValue::Integer(5)));
    }

    #[test]
    fn test_invalid_utf8_is_recoverable() {
        let parser = RespParser::new();
        let (frame, used) = parser.parse_frame(b"$2\r\n\xff\xfe\r\n+OK\r\n").unwrap().unwrap();
        assert!(matches!(frame, Frame::Malformed(_)));
        assert_eq!(used, 8);
    }

    #[test]
    fn test_malformed_array_element_consumes_whole_array() {
        let parser = RespParser::new();
        let input = b"*2\r\n:abc\r\n$1\r\nx\r\n";
        let (frame, used) = parser.parse_frame(input).unwrap().unwrap();
        assert!(matches!(frame, Frame::Malformed(_)));
        assert_eq!(used, input.len());
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let parser = RespParser::new();
        let result = parser.parse_frame(b"?what\r\n");
        assert!(matches!(result, Err(SpatioError::ProtocolFatal(_))));
    }

    #[test]
    fn test_bad_length_is_fatal() {
        let parser = RespParser::new();
        assert!(matches!(
            parser.parse_frame(b"$abc\r\n"),
            Err(SpatioError::ProtocolFatal(_))
        ));
        assert!(matches!(
            parser.parse_frame(b"*-5\r\n"),
            Err(SpatioError::ProtocolFatal(_))
        ));
        assert!(matches!(
            parser.parse_frame(b"$3\r\nfoobar\r\n"),
            Err(SpatioError::ProtocolFatal(_))
        ));
    }

    #[test]
    fn test_nested_arrays_within_limit() {
        let parser = RespParser::new();
        let mut input = "*1\r\n".repeat(100);
        input.push_str(":1\r\n");

        let (frame, used) = parser.parse_frame(input.as_bytes()).unwrap().unwrap();
        assert_eq!(used, input.len());

        let mut value = match frame {
            Frame::Value(value) => value,
            other => panic!("unexpected frame: {:?}", other),
        };
        for _ in 0..100 {
            value = match value {
                RespValue::Array(Some(mut items)) => items.remove(0),
                other => panic!("unexpected value: {:?}", other),
            };
        }
        assert_eq!(value, RespValue::Integer(1));
    }

    #[test]
    fn test_deep_nesting_is_fatal() {
        let parser = RespParser::new();
        let mut input = "*1\r\n".repeat(200_000);
        input.push_str(":1\r\n");
        assert!(matches!(
            parser.parse_frame(input.as_bytes()),
            Err(SpatioError::ProtocolFatal(_))
        ));

        // 还没收完也能提前判定
        let partial = "*1\r\n".repeat(MAX_ARRAY_DEPTH + 1);
        assert!(matches!(
            parser.parse_frame(partial.as_bytes()),
            Err(SpatioError::ProtocolFatal(_))
        ));
    }

    #[test]
    fn test_to_json_parses_bulk_json() {
        let value = RespValue::Array(Some(vec![
            RespValue::BulkString(Some(r#"{"ok":true}"#.to_string())),
            RespValue::Integer(3),
        ]));
        assert_eq!(value.to_json(), serde_json::json!([{"ok": true}, 3]));
    }
}
