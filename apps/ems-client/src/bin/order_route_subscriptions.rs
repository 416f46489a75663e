//! Order And Route Subscriptions Example
//!
//! Subscribes to the order stream, then (once it is confirmed) the
//! dependent route stream, and prints field updates until interrupted
//! with Ctrl-C or until both streams end.
//!
//! ```bash
//! cargo run --bin order-route-subscriptions
//! ```

use std::sync::Arc;

use ems_client::{
    FlowAction, FlowConfig, FlowUpdate, SessionHandle, Settings, SimConfig, SimSession,
    order_route_chain, spawn_flow, telemetry,
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
    let session: Arc<dyn SessionHandle> = session;

    let config = FlowConfig {
        service: settings.services.order_entry.clone(),
        action: FlowAction::Subscribe(order_route_chain()),
    };

    let mut run = spawn_flow(Arc::clone(&session), events, config);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                let _ = signal;
                tracing::info!("Interrupted; stopping session");
                let _ = session.stop().await;
                break;
            }
            update = run.updates.recv() => {
                let Some(update) = update else { break };
                match update {
                    FlowUpdate::SubscriptionUpdate { token, topic, fields } => {
                        println!("{topic} [{token}] {}", serde_json::to_string(&fields)?);
                    }
                    FlowUpdate::SubscriptionStarted { token, topic } => {
                        tracing::info!(%token, %topic, "Subscription started");
                    }
                    FlowUpdate::InitialPaintComplete { token } => {
                        tracing::info!(%token, "Initial paint complete");
                    }
                    FlowUpdate::Heartbeat { token } => {
                        tracing::debug!(%token, "Heartbeat");
                    }
                    FlowUpdate::SubscriptionEnded { token, topic, reason } => {
                        tracing::warn!(%token, %topic, %reason, "Subscription ended");
                    }
                    FlowUpdate::Failed(reason) => {
                        anyhow::bail!("subscriptions failed: {reason}");
                    }
                    FlowUpdate::ServiceOpened | FlowUpdate::Completed(_) => {}
                }
            }
        }
    }

    Ok(())
}
