use super::envelope::{LambdaEnvelope, ResponseEnvelope};
use crate::diagnosis::DiagnosticHandler;
use lambda_runtime::{LambdaEvent, service_fn};
use std::sync::Arc;

/// 宿主是否为 Lambda 运行时（由运行时注入该变量）。
pub fn is_lambda_runtime() -> bool {
    std::env::var_os("AWS_LAMBDA_RUNTIME_API").is_some()
}

pub async fn run(handler: Arc<DiagnosticHandler>) -> Result<(), lambda_runtime::Error> {
    lambda_runtime::run(service_fn(move |event: LambdaEvent<LambdaEnvelope>| {
        let handler = handler.clone();
        async move {
            let out = handler.handle(&event.payload).await?;
            Ok::<ResponseEnvelope, lambda_runtime::Error>(out)
        }
    }))
    .await
}
