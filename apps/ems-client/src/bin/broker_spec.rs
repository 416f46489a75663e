//! Broker Specification Example
//!
//! Fetches the broker specification tree for the configured user and
//! prints it: brokers, strategies, parameter schemas, times-in-force,
//! order types, and handling instructions.
//!
//! ```bash
//! cargo run --bin broker-spec
//! ```

use ems_client::{
    FlowAction, FlowConfig, FlowOutcome, Settings, SimConfig, SimSession, broker_spec_request,
    run_to_completion, telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ems_client::load_dotenv();
    telemetry::init();

    let settings = Settings::from_env()?;
    tracing::info!(
        host = %settings.gateway.host,
        port = settings.gateway.port,
        user_uuid = settings.user_uuid,
        "Connecting to venue gateway"
    );

    let (session, events) = SimSession::connect(SimConfig::default());

    let config = FlowConfig {
        service: settings.services.order_entry.clone(),
        action: FlowAction::Request(broker_spec_request(settings.user_uuid)),
    };

    match run_to_completion(session, events, config, settings.request_timeout).await {
        FlowOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        FlowOutcome::Failed(reason) => anyhow::bail!("flow failed: {reason}"),
        FlowOutcome::TimedOut => anyhow::bail!("timed out waiting for a response"),
    }
}
