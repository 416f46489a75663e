//! Create Order And Route Example
//!
//! Opens a session against the venue gateway, opens the order-entry
//! service, sends one create-and-route request, prints the decoded
//! response, and exits.
//!
//! ```bash
//! cargo run --bin create-order-and-route
//! ```

use ems_client::{
    FlowAction, FlowConfig, FlowOutcome, HandlingInstruction, OrderTicket, OrderType, Settings,
    Side, SimConfig, SimSession, TimeInForce, run_to_completion, telemetry,
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

    let ticket = OrderTicket {
        ticker: "IBM US".to_string(),
        amount: 4500,
        side: Side::Buy,
        order_type: OrderType::Market,
        time_in_force: TimeInForce::Day,
        handling: HandlingInstruction::Any,
        broker: "BB".to_string(),
        notes: Some("example order".to_string()),
    };

    let config = FlowConfig {
        service: settings.services.order_entry.clone(),
        action: FlowAction::Request(ticket.into_request()),
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
