use std::fmt;

use crate::protocol::encoder::RespEncoder;

/// 渲染后的命令：动词在前，参数依次排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            tokens: vec![verb.into()],
        }
    }

    /// 从已经分好的参数构造，例如 CLI 输入。第一个参数作为动词
    pub fn from_tokens<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.tokens.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn verb(&self) -> &str {
        &self.tokens[0]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// 请求/响应通道使用的 RESP 数组编码
    pub fn to_resp(&self) -> String {
        RespEncoder::command_array(&self.tokens)
    }

    /// 实时通道使用的 inline 编码
    ///
    /// 参数本身含空格时（例如 WHEREEVAL 脚本）服务端会把它拆成多个参数
    pub fn to_inline(&self) -> String {
        RespEncoder::inline(&self.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_with_single_space() {
        let cmd = Command::new("GET").arg("fleet").arg("truck1");
        assert_eq!(cmd.to_string(), "GET fleet truck1");
        assert_eq!(cmd.verb(), "GET");
    }

    #[test]
    fn test_encodings() {
        let cmd = Command::new("PING");
        assert_eq!(cmd.to_resp(), "*1\r\n$4\r\nPING\r\n");
        assert_eq!(cmd.to_inline(), "PING\r\n");
    }

    #[test]
    fn test_from_tokens() {
        assert!(Command::from_tokens(Vec::<String>::new()).is_none());
        let cmd = Command::from_tokens(["SCAN", "fleet"]).unwrap();
        assert_eq!(cmd.tokens(), &["SCAN".to_string(), "fleet".to_string()]);
    }
}
