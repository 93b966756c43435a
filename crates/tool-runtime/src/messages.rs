//! Localized user messages and remediation suggestions per [`ErrorCode`].

use flowtool_core::Locale;

use crate::error::ErrorCode;

pub fn user_message(code: ErrorCode, locale: Locale) -> &'static str {
    match locale {
        Locale::En => user_message_en(code),
        Locale::Zh => user_message_zh(code),
    }
}

pub fn suggestions(code: ErrorCode, locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => suggestions_en(code),
        Locale::Zh => suggestions_zh(code),
    }
}

fn user_message_en(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Unreachable => "Unable to reach the tool server.",
        ErrorCode::AuthFailed => "Authentication with the tool server failed.",
        ErrorCode::ProtocolError => "The tool server responded with an unexpected protocol message.",
        ErrorCode::Timeout => "The tool server did not respond in time.",
        ErrorCode::ConnectionClosed => "The connection to the tool server was closed unexpectedly.",
        ErrorCode::SslError => "A secure connection to the tool server could not be established.",
        ErrorCode::ToolNotFound => "The requested tool does not exist.",
        ErrorCode::InvalidParams => "The tool was called with invalid parameters.",
        ErrorCode::ExecutionError => "The tool failed while executing.",
        ErrorCode::ParseError => "The tool response could not be parsed.",
        ErrorCode::InvalidConfig => "The tool configuration is invalid.",
        ErrorCode::InvalidUrl => "The tool server URL is invalid.",
        ErrorCode::MissingAuth => "Authentication credentials are missing.",
        ErrorCode::RateLimited => "Too many requests were sent to the tool server.",
        ErrorCode::QuotaExceeded => "The usage quota for this tool has been exhausted.",
        ErrorCode::ServerError => "The tool server encountered an internal error.",
        ErrorCode::ServiceUnavailable => "The tool service is temporarily unavailable.",
        ErrorCode::Unknown => "An unknown error occurred while calling the tool.",
    }
}

fn user_message_zh(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Unreachable => "无法连接到工具服务器。",
        ErrorCode::AuthFailed => "工具服务器认证失败。",
        ErrorCode::ProtocolError => "工具服务器返回了无法识别的协议消息。",
        ErrorCode::Timeout => "工具服务器响应超时。",
        ErrorCode::ConnectionClosed => "与工具服务器的连接意外关闭。",
        ErrorCode::SslError => "无法与工具服务器建立安全连接。",
        ErrorCode::ToolNotFound => "请求的工具不存在。",
        ErrorCode::InvalidParams => "工具调用参数无效。",
        ErrorCode::ExecutionError => "工具执行失败。",
        ErrorCode::ParseError => "无法解析工具返回结果。",
        ErrorCode::InvalidConfig => "工具配置无效。",
        ErrorCode::InvalidUrl => "工具服务器地址无效。",
        ErrorCode::MissingAuth => "缺少认证凭据。",
        ErrorCode::RateLimited => "请求过于频繁，已被工具服务器限流。",
        ErrorCode::QuotaExceeded => "该工具的使用配额已用尽。",
        ErrorCode::ServerError => "工具服务器内部错误。",
        ErrorCode::ServiceUnavailable => "工具服务暂时不可用。",
        ErrorCode::Unknown => "调用工具时发生未知错误。",
    }
}

fn suggestions_en(code: ErrorCode) -> &'static [&'static str] {
    match code {
        ErrorCode::Unreachable => &[
            "Check that the server URL is correct",
            "Confirm the server is running and reachable from this network",
            "Check firewall and proxy settings",
        ],
        ErrorCode::AuthFailed => &[
            "Verify the API key or bearer token",
            "Check that the credentials have not expired",
            "Confirm the account has access to this server",
        ],
        ErrorCode::ProtocolError => &[
            "Confirm the server implements the MCP protocol",
            "Check that the transport type (sse/http) matches the server",
        ],
        ErrorCode::Timeout => &[
            "Try again later",
            "Increase the timeout for this tool",
            "Check the server load and network latency",
        ],
        ErrorCode::ConnectionClosed => &[
            "Try again",
            "Check the server logs for crashes or restarts",
        ],
        ErrorCode::SslError => &[
            "Check that the server certificate is valid and not expired",
            "Confirm the URL uses the correct scheme (http or https)",
        ],
        ErrorCode::ToolNotFound => &[
            "Check the tool name for typos",
            "List the tools available on the server",
        ],
        ErrorCode::InvalidParams => &[
            "Check the tool arguments against its parameter schema",
            "Make sure every referenced variable is defined",
        ],
        ErrorCode::ExecutionError => &[
            "Check the tool arguments",
            "Review the tool server logs for details",
        ],
        ErrorCode::ParseError => &[
            "Check that the arguments are valid JSON",
            "Confirm the server returns a well-formed response",
        ],
        ErrorCode::InvalidConfig => &[
            "Review the tool configuration",
            "Make sure the server configuration and tool name are set",
        ],
        ErrorCode::InvalidUrl => &[
            "Use a full http:// or https:// URL",
            "Check the URL for typos",
        ],
        ErrorCode::MissingAuth => &[
            "Provide an API key for the selected authentication type",
            "Or set the authentication type to none",
        ],
        ErrorCode::RateLimited => &[
            "Wait a moment before retrying",
            "Reduce the request frequency",
        ],
        ErrorCode::QuotaExceeded => &[
            "Check the usage quota of the account",
            "Upgrade the plan or wait for the quota to reset",
        ],
        ErrorCode::ServerError => &[
            "Try again later",
            "Contact the server administrator if the problem persists",
        ],
        ErrorCode::ServiceUnavailable => &[
            "Try again later",
            "Check the service status page",
        ],
        ErrorCode::Unknown => &[
            "Try again",
            "Contact support with the error details if the problem persists",
        ],
    }
}

fn suggestions_zh(code: ErrorCode) -> &'static [&'static str] {
    match code {
        ErrorCode::Unreachable => &[
            "检查服务器地址是否正确",
            "确认服务器正在运行且网络可达",
            "检查防火墙和代理设置",
        ],
        ErrorCode::AuthFailed => &[
            "检查 API Key 或 Bearer Token 是否正确",
            "确认凭据未过期",
            "确认账号有权访问该服务器",
        ],
        ErrorCode::ProtocolError => &[
            "确认服务器实现了 MCP 协议",
            "检查传输类型（sse/http）是否与服务器一致",
        ],
        ErrorCode::Timeout => &[
            "稍后重试",
            "增加该工具的超时时间",
            "检查服务器负载和网络延迟",
        ],
        ErrorCode::ConnectionClosed => &["重新尝试", "查看服务器日志是否有崩溃或重启"],
        ErrorCode::SslError => &[
            "检查服务器证书是否有效且未过期",
            "确认地址使用了正确的协议（http 或 https）",
        ],
        ErrorCode::ToolNotFound => &["检查工具名称是否拼写正确", "查看服务器上可用的工具列表"],
        ErrorCode::InvalidParams => &["根据参数定义检查工具参数", "确保引用的变量均已定义"],
        ErrorCode::ExecutionError => &["检查工具参数", "查看工具服务器日志了解详情"],
        ErrorCode::ParseError => &["检查参数是否为合法 JSON", "确认服务器返回了格式正确的响应"],
        ErrorCode::InvalidConfig => &["检查工具配置", "确保已设置服务器配置和工具名称"],
        ErrorCode::InvalidUrl => &["使用完整的 http:// 或 https:// 地址", "检查地址是否拼写正确"],
        ErrorCode::MissingAuth => &["为所选认证方式提供 API Key", "或将认证方式设置为无"],
        ErrorCode::RateLimited => &["稍等片刻后重试", "降低请求频率"],
        ErrorCode::QuotaExceeded => &["检查账号的使用配额", "升级套餐或等待配额重置"],
        ErrorCode::ServerError => &["稍后重试", "如问题持续，请联系服务器管理员"],
        ErrorCode::ServiceUnavailable => &["稍后重试", "查看服务状态页面"],
        ErrorCode::Unknown => &["重新尝试", "如问题持续，请携带错误详情联系支持"],
    }
}
