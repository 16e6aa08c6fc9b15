use reqwest::header::HeaderMap;
use sonic_rs::prelude::*;
use std::borrow::Cow;
use std::time::Duration;

/// 日志等级（DEBUG 环境变量）：
/// - off：只输出常规 tracing 日志
/// - low：额外输出入站信封与出站信封（格式化/脱敏）
/// - medium：再加上发往模型服务的请求/响应（格式化/脱敏）
/// - high：同 medium，但完全原始输出，不折叠 base64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "client" => Self::Low,
            "medium" | "backend" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn client_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn backend_enabled(self) -> bool {
        self >= Self::Medium
    }

    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn envelope_request(body: &[u8], is_base64_encoded: bool) {
    tracing::info!(
        "\n===================== 入站信封 ======================\n[isBase64Encoded] {is_base64_encoded}\n{}\n=====================================================",
        format_body_bytes(body)
    );
}

pub fn envelope_request_raw(body: &[u8], is_base64_encoded: bool) {
    tracing::info!(
        "\n================== 入站信封（RAW） ==================\n[isBase64Encoded] {is_base64_encoded}\n{}\n=====================================================",
        format_bytes_raw(body)
    );
}

pub fn envelope_response(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n===================== 出站信封 ======================\n[出站信封] {} {}ms\n{}\n=====================================================",
        status,
        format_duration_ms(duration),
        format_body_bytes(body)
    );
}

pub fn backend_request(method: &str, url: &str, headers: &HeaderMap, body: &[u8]) {
    tracing::info!(
        "\n====================== 模型请求 ========================\n[模型请求] {method} {url}\n[模型请求头]\n{}\n{}\n==========================================================",
        format_headers(headers),
        format_body_bytes(body)
    );
}

pub fn backend_request_raw(method: &str, url: &str, headers: &HeaderMap, body: &[u8]) {
    tracing::info!(
        "\n=================== 模型请求（RAW） ===================\n[模型请求] {method} {url}\n[模型请求头]\n{}\n[模型请求体]\n{}\n=========================================================",
        format_headers_raw(headers),
        format_bytes_raw(body),
    );
}

pub fn backend_response(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n====================== 模型响应 ========================\n[模型响应] {} {}ms\n{}\n==========================================================",
        status,
        format_duration_ms(duration),
        format_body_bytes(body)
    );
}

pub fn backend_response_raw(status: u16, duration: Duration, body: &[u8]) {
    tracing::info!(
        "\n=================== 模型响应（RAW） ===================\n[模型响应] {} {}ms\n{}\n=========================================================",
        status,
        format_duration_ms(duration),
        format_bytes_raw(body),
    );
}

fn format_headers(headers: &HeaderMap) -> String {
    let mut obj = sonic_rs::Object::new();

    for (name, value) in headers.iter() {
        let key = name.as_str();
        let key_lc = key.to_lowercase();
        let redacted = key_lc == "authorization" || key_lc == "proxy-authorization";

        let v = if redacted {
            sonic_rs::Value::from("Bearer ***")
        } else {
            match value.to_str() {
                Ok(s) => sonic_rs::Value::from(s),
                Err(_) => sonic_rs::Value::from("<binary>"),
            }
        };

        // HeaderMap 可能存在同名多值，统一用数组输出，避免信息丢失。
        if let Some(existing) = obj.get(&key).and_then(|v| v.as_array()) {
            let mut arr = existing.to_vec();
            arr.push(v);
            obj.insert(key, arr);
        } else {
            obj.insert(key, vec![v]);
        }
    }

    format_body_value(&obj.into_value())
}

fn format_body_value(v: &sonic_rs::Value) -> String {
    let sanitized = sanitize_json_for_log(v, false);
    match sonic_rs::to_string_pretty(&sanitized) {
        Ok(s) => s,
        Err(_) => sanitized.to_string(),
    }
}

fn format_body_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    // 大体积上传：避免为了日志反序列化/格式化而产生巨额内存与 CPU 开销。
    const MAX_PARSE_BYTES: usize = 2 * 1024 * 1024;
    const HEAD_TAIL: usize = 16 * 1024;

    if bytes.len() > MAX_PARSE_BYTES {
        let head_len = bytes.len().min(HEAD_TAIL);
        let tail_len = bytes.len().saturating_sub(head_len).min(HEAD_TAIL);
        let head = String::from_utf8_lossy(&bytes[..head_len]);
        let tail = String::from_utf8_lossy(&bytes[bytes.len() - tail_len..]);
        return format!(
            "(body too large: {} bytes, showing head/tail)\n--- head ---\n{}\n--- tail ---\n{}",
            bytes.len(),
            truncate_base64_maybe(&head, false),
            truncate_base64_maybe(&tail, false)
        );
    }

    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => format_body_value(&v),
        Err(_) => truncate_base64_maybe(&String::from_utf8_lossy(bytes), false).into_owned(),
    }
}

fn format_headers_raw(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers.iter() {
        out.push_str(name.as_str());
        out.push_str(": ");
        out.push_str(value.to_str().unwrap_or("<non-utf8>"));
        out.push('\n');
    }
    out
}

fn format_bytes_raw(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn sanitize_json_for_log(v: &sonic_rs::Value, force_base64: bool) -> sonic_rs::Value {
    if let Some(obj) = v.as_object() {
        let mut out = sonic_rs::Object::new();
        for (key, child) in obj.iter() {
            let sanitized = match key {
                // 入站 media 字段一定是 base64。
                "media" => sanitize_json_for_log(child, true),
                _ => sanitize_json_for_log(child, force_base64),
            };
            out.insert(key, sanitized);
        }
        return out.into_value();
    }

    if let Some(arr) = v.as_array() {
        let mut out = Vec::with_capacity(arr.len());
        for item in arr {
            out.push(sanitize_json_for_log(item, force_base64));
        }
        return sonic_rs::Value::from(out);
    }

    if let Some(s) = v.as_str() {
        return sonic_rs::Value::from(truncate_base64_maybe(s, force_base64).as_ref());
    }

    v.to_owned()
}

fn truncate_base64_maybe(s: &str, force: bool) -> Cow<'_, str> {
    if s.len() <= 100 {
        return Cow::Borrowed(s);
    }

    const KEEP: usize = 20;

    if let Some(idx) = s.find(";base64,") {
        let prefix_end = idx + ";base64,".len();
        let prefix = &s[..prefix_end];
        let rest = &s[prefix_end..];
        if rest.len() <= KEEP * 2 || !rest.is_ascii() {
            return Cow::Borrowed(s);
        }

        let omitted = rest.len() - KEEP * 2;
        return Cow::Owned(format!(
            "{prefix}{}...[TRUNCATED: {omitted} chars]...{}",
            &rest[..KEEP],
            &rest[rest.len() - KEEP..]
        ));
    }

    let is_base64 = force
        || (s.len() > 200
            && s.bytes()
                .take(100)
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')));

    if !is_base64 || !s.is_ascii() {
        return Cow::Borrowed(s);
    }

    let omitted = s.len() - KEEP * 2;
    Cow::Owned(format!(
        "{}...[TRUNCATED: {omitted} chars]...{}",
        &s[..KEEP],
        &s[s.len() - KEEP..]
    ))
}
