use aws_config::BehaviorVersion;
use dbping::{
    Config, Handler,
    queries::mysql::MySql,
    secrets::SecretsManager,
};
use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env()?;

    // Collaborators are built once at cold start and shared across
    // invocations; all per-invocation state lives inside the handler call.
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = config.region.clone() {
        loader = loader.region(aws_config::Region::new(region));
    }
    let aws = loader.load().await;

    let secrets = SecretsManager::new(
        aws_sdk_secretsmanager::Client::new(&aws),
        config.secret_id.clone(),
    );
    let db = MySql::new(&config);
    let handler = Arc::new(Handler::new(
        secrets,
        db,
        config.tls.mode,
        config.tls_fallback,
    ));

    run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Error>(handler.handle(&event.payload).await) }
    }))
    .await
}
