//! 文本命令格式
//!
//! 一行一条命令：`Name key=value key="quoted value" flag`。
//! 只写 `flag` 等价于 `flag=true`；值含空白、引号或为空时加双引号，
//! 引号内用 `\"` 和 `\\` 转义。命令名与参数名均不区分大小写。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// 一条命令：名称加有序的键值参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub args: Vec<(String, String)>,
}

impl Command {
    /// 创建不带参数的命令
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// 追加或覆盖参数（链式）
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_arg(key, value);
        self
    }

    /// 追加或覆盖参数
    pub fn set_arg(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.args.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(slot) => slot.1 = value,
            None => self.args.push((key, value)),
        }
    }

    /// 读取参数
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// 读取布尔参数，只有 "true" 为真
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// 移除参数
    pub fn remove_arg(&mut self, key: &str) -> Option<String> {
        let index = self.args.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.args.remove(index).1)
    }

    /// 命令名是否匹配
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// 是否来自对端
    pub fn is_remote(&self) -> bool {
        self.get_bool("remote")
    }

    /// 解析一行命令
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut chars = line.trim().chars().peekable();

        let name: String = chars.by_ref().take_while(|c| !c.is_whitespace()).collect();
        if name.is_empty() {
            return Err(CommandError::Empty);
        }

        let mut command = Command::new(name);
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_none() {
                break;
            }

            let key: String = std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace() && *c != '='))
                .collect();
            if key.is_empty() {
                let token: String = chars.by_ref().take_while(|c| !c.is_whitespace()).collect();
                return Err(CommandError::MalformedArgument { token });
            }

            // 无值参数
            if chars.next_if_eq(&'=').is_none() {
                command.args.push((key, "true".to_string()));
                continue;
            }

            let value = if chars.next_if_eq(&'"').is_some() {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => return Err(CommandError::UnterminatedQuote { key }),
                        },
                        Some(c) => value.push(c),
                        None => return Err(CommandError::UnterminatedQuote { key }),
                    }
                }
                if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                    let rest: String = chars.by_ref().take_while(|c| !c.is_whitespace()).collect();
                    return Err(CommandError::MalformedArgument {
                        token: format!("{key}=\"{value}\"{rest}"),
                    });
                }
                value
            } else {
                std::iter::from_fn(|| chars.next_if(|c| !c.is_whitespace())).collect()
            };

            command.args.push((key, value));
        }

        Ok(command)
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\')
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.args {
            if needs_quotes(value) {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, " {key}=\"{escaped}\"")?;
            } else {
                write!(f, " {key}={value}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}
