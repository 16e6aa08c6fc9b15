use figment::Figment;
use figment::providers::Env;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 800;
const DEFAULT_MEDIA_URL_TTL_SECS: u64 = 3600;

/// 模型调用路径：auto 先探测 Responses API，缺失时回退到 Chat Completions。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    Auto,
    Responses,
    Chat,
}

impl ApiMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "responses" | "response" => Self::Responses,
            "chat" | "chat_completions" | "completions" => Self::Chat,
            _ => Self::Auto,
        }
    }
}

/// 进程级配置：启动时读取一次，之后只读。
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub api_mode: ApiMode,
    pub max_output_tokens: u32,

    pub s3_bucket: Option<String>,
    pub media_url_ttl: Duration,

    pub timeout_ms: u64,
    pub proxy: String,

    pub debug: String,
}

/// 环境变量原始取值。Env 会把 `800`、`true` 解析成数字/布尔，
/// 这里统一收成文本，再按字段各自解析，单个字段非法不影响其它字段。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl EnvValue {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Bool(v) => Some(v.to_string()),
            Self::Unsigned(v) => Some(v.to_string()),
            Self::Signed(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Text(v) => Some(v),
            Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    #[serde(alias = "HOST")]
    host: Option<EnvValue>,
    #[serde(alias = "PORT")]
    port: Option<EnvValue>,

    #[serde(alias = "OPENAI_API_KEY")]
    openai_api_key: Option<EnvValue>,
    #[serde(alias = "OPENAI_MODEL")]
    openai_model: Option<EnvValue>,
    #[serde(alias = "OPENAI_BASE_URL")]
    openai_base_url: Option<EnvValue>,
    #[serde(alias = "OPENAI_API_MODE")]
    openai_api_mode: Option<EnvValue>,
    #[serde(alias = "MAX_OUTPUT_TOKENS")]
    max_output_tokens: Option<EnvValue>,

    #[serde(alias = "S3_BUCKET")]
    s3_bucket: Option<EnvValue>,
    #[serde(alias = "MEDIA_URL_TTL_SECS")]
    media_url_ttl_secs: Option<EnvValue>,

    #[serde(alias = "TIMEOUT")]
    timeout: Option<EnvValue>,
    #[serde(alias = "PROXY")]
    proxy: Option<EnvValue>,

    #[serde(alias = "DEBUG")]
    debug: Option<EnvValue>,
}

impl Config {
    pub fn load() -> Self {
        load_dotenv();
        Self::from_figment(Figment::from(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Self {
        let raw = figment.extract::<RawEnv>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "读取配置失败，全部使用默认值");
            RawEnv::default()
        });

        Self {
            host: non_empty(raw.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: number("PORT", raw.port).unwrap_or(DEFAULT_PORT),
            openai_api_key: non_empty(raw.openai_api_key),
            openai_model: non_empty(raw.openai_model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: non_empty(raw.openai_base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_mode: ApiMode::parse(
                non_empty(raw.openai_api_mode)
                    .as_deref()
                    .unwrap_or_default(),
            ),
            max_output_tokens: number("MAX_OUTPUT_TOKENS", raw.max_output_tokens)
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            s3_bucket: non_empty(raw.s3_bucket),
            media_url_ttl: Duration::from_secs(
                number("MEDIA_URL_TTL_SECS", raw.media_url_ttl_secs)
                    .filter(|n| *n > 0)
                    .unwrap_or(DEFAULT_MEDIA_URL_TTL_SECS),
            ),
            timeout_ms: number("TIMEOUT", raw.timeout).unwrap_or(0),
            proxy: non_empty(raw.proxy).unwrap_or_default(),
            debug: non_empty(raw.debug).unwrap_or_else(|| "off".to_string()),
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }
}

fn non_empty(value: Option<EnvValue>) -> Option<String> {
    value
        .and_then(EnvValue::into_text)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 数值字段解析失败时只回退该字段的默认值，并记录告警。
fn number<T: FromStr>(name: &str, value: Option<EnvValue>) -> Option<T> {
    let text = non_empty(value)?;
    match text.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key = name, value = %text, "配置值不是合法数字，使用默认值");
            None
        }
    }
}

fn load_dotenv() {
    let Some(dotenv_path) = find_dotenv_path() else {
        return;
    };

    let Ok(file) = std::fs::File::open(&dotenv_path) else {
        return;
    };

    let reader = std::io::BufReader::new(file);
    for line in std::io::BufRead::lines(reader).map_while(Result::ok) {
        let Some((key, value)) = parse_dotenv_line(&line) else {
            continue;
        };
        // 已由宿主环境注入的变量优先，.env 只补缺。
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // Rust 2024：修改进程环境变量在并发场景下可能触发 UB，因此 API 为 unsafe。
        // 这里在启动阶段加载 .env，且未并发访问环境变量，符合使用前提。
        unsafe {
            std::env::set_var(key, value);
        }
    }
}

fn find_dotenv_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let mut dir: &Path = cwd.as_path();

    loop {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }

        // 避免跨越仓库根目录：发现 Cargo.toml 或 .git 即停止向上寻找。
        if dir.join("Cargo.toml").is_file() || dir.join(".git").is_dir() {
            return None;
        }

        let Some(parent) = dir.parent() else {
            break;
        };
        if parent == dir {
            break;
        }
        dir = parent;
    }

    None
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let mut line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Some(rest) = line.strip_prefix("export ") {
        line = rest.trim_start();
    }

    let eq_idx = line.find('=')?;
    if eq_idx == 0 {
        return None;
    }

    let key = line[..eq_idx].trim();
    if key.is_empty() {
        return None;
    }

    let raw = line[eq_idx + 1..].trim();
    if raw.is_empty() {
        return Some((key.to_string(), String::new()));
    }

    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some((key.to_string(), raw[1..raw.len() - 1].to_string()));
        }
    }

    Some((key.to_string(), strip_inline_comment(raw).trim().to_string()))
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] != b'#' {
            continue;
        }
        if i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' {
            return value[..i].trim_end();
        }
    }
    value
}
