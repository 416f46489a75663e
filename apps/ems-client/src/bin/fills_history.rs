//! Fills History Example
//!
//! Queries fills over a fixed window against the history service and
//! prints each execution.
//!
//! ```bash
//! cargo run --bin fills-history
//! ```

use chrono::{DateTime, Utc};
use ems_client::{
    FillsQuery, FlowAction, FlowConfig, FlowOutcome, Settings, SimConfig, SimSession,
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
        "Connecting to venue gateway"
    );

    let (session, events) = SimSession::connect(SimConfig::default());

    let query = FillsQuery {
        from: "2024-11-04T00:00:00Z".parse::<DateTime<Utc>>()?,
        to: "2024-11-04T23:59:00Z".parse::<DateTime<Utc>>()?,
        user_uuid: settings.user_uuid,
    };

    let config = FlowConfig {
        service: settings.services.history.clone(),
        action: FlowAction::Request(query.into_request()),
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
