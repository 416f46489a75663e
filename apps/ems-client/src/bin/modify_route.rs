//! Modify Route Example
//!
//! Amends the quantity and order type of an existing route, prints the
//! decoded ack, and exits.
//!
//! ```bash
//! cargo run --bin modify-route
//! ```

use ems_client::{
    FlowAction, FlowConfig, FlowOutcome, OrderType, RouteAmendment, Settings, SimConfig,
    SimSession, TimeInForce, run_to_completion, telemetry,
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

    let amendment = RouteAmendment {
        sequence: 1_000_001,
        route_id: 1,
        amount: 100,
        order_type: OrderType::Market,
        time_in_force: TimeInForce::Day,
    };

    let config = FlowConfig {
        service: settings.services.order_entry.clone(),
        action: FlowAction::Request(amendment.into_request()),
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
