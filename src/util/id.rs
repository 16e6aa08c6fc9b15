use uuid::Uuid;

/// 每次诊断请求的关联 ID，写入 tracing span。
pub fn request_id() -> String {
    format!("diag-{}", Uuid::new_v4().simple())
}
