//! Outbound Request and Subscription Payloads
//!
//! Builders for the operations the example programs exercise. The
//! dispatcher treats payloads as opaque; only the venue interprets the
//! field names. Prices are carried as [`Decimal`] at the edges and
//! lowered to float fields on the wire contract.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use super::field::FieldMap;

// =============================================================================
// Operations
// =============================================================================

/// One-shot operations the order-entry and history services accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    /// Create an order and route it to a broker in one step.
    CreateOrderAndRoute,
    /// Amend an existing route.
    ModifyRoute,
    /// Fetch the broker specification tree.
    GetBrokerSpec,
    /// Fetch fills over a time window.
    GetFills,
}

impl Operation {
    /// The wire name of this operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateOrderAndRoute => "CreateOrderAndRoute",
            Self::ModifyRoute => "ModifyRoute",
            Self::GetBrokerSpec => "GetBrokerSpec",
            Self::GetFills => "GetFills",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound one-shot request: an operation plus its field payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Operation tag the service dispatches on.
    pub operation: Operation,
    /// Business payload.
    pub fields: FieldMap,
}

// =============================================================================
// Order Vocabulary
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl Side {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type, with the limit price attached where one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order at the given price.
    Limit(Decimal),
}

impl OrderType {
    /// Wire value of the type tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "MKT",
            Self::Limit(_) => "LMT",
        }
    }
}

/// Time-in-force instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeInForce {
    /// Good for the trading day.
    Day,
    /// Good until cancelled.
    GoodTillCancel,
    /// Good until the given date.
    GoodTillDate(NaiveDate),
}

impl TimeInForce {
    /// Wire value of the instruction tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "DAY",
            Self::GoodTillCancel => "GTC",
            Self::GoodTillDate(_) => "GTD",
        }
    }
}

/// Broker handling instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlingInstruction {
    /// No special handling.
    Any,
    /// Directed order.
    Directed,
}

impl HandlingInstruction {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Directed => "DIR",
        }
    }
}

/// Compact yyyymmdd form used by date-valued integer fields.
fn yyyymmdd(date: NaiveDate) -> i64 {
    use chrono::Datelike;
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

// =============================================================================
// Order Entry
// =============================================================================

/// Payload for [`Operation::CreateOrderAndRoute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTicket {
    /// Instrument ticker.
    pub ticker: String,
    /// Order quantity.
    pub amount: i64,
    /// Buy or sell.
    pub side: Side,
    /// Order type plus limit price where applicable.
    pub order_type: OrderType,
    /// Time-in-force.
    pub time_in_force: TimeInForce,
    /// Handling instruction.
    pub handling: HandlingInstruction,
    /// Destination broker code.
    pub broker: String,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl OrderTicket {
    /// Lower the ticket into its request payload.
    #[must_use]
    pub fn into_request(self) -> Request {
        let mut fields = FieldMap::new()
            .with("ticker", self.ticker)
            .with("amount", self.amount)
            .with("side", self.side.as_str())
            .with("orderType", self.order_type.as_str())
            .with("timeInForce", self.time_in_force.as_str())
            .with("handlingInstruction", self.handling.as_str())
            .with("broker", self.broker);
        if let OrderType::Limit(price) = self.order_type {
            fields.insert("limitPrice", price.to_f64().unwrap_or_default());
        }
        if let TimeInForce::GoodTillDate(date) = self.time_in_force {
            fields.insert("gtdDate", yyyymmdd(date));
        }
        if let Some(notes) = self.notes {
            fields.insert("notes", notes);
        }
        Request {
            operation: Operation::CreateOrderAndRoute,
            fields,
        }
    }
}

/// Payload for [`Operation::ModifyRoute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAmendment {
    /// Order sequence number the route belongs to.
    pub sequence: i64,
    /// Route to amend.
    pub route_id: i64,
    /// New quantity.
    pub amount: i64,
    /// New order type plus limit price where applicable.
    pub order_type: OrderType,
    /// New time-in-force.
    pub time_in_force: TimeInForce,
}

impl RouteAmendment {
    /// Lower the amendment into its request payload.
    #[must_use]
    pub fn into_request(self) -> Request {
        let mut fields = FieldMap::new()
            .with("sequence", self.sequence)
            .with("routeId", self.route_id)
            .with("amount", self.amount)
            .with("orderType", self.order_type.as_str())
            .with("timeInForce", self.time_in_force.as_str());
        if let OrderType::Limit(price) = self.order_type {
            fields.insert("limitPrice", price.to_f64().unwrap_or_default());
        }
        if let TimeInForce::GoodTillDate(date) = self.time_in_force {
            fields.insert("gtdDate", yyyymmdd(date));
        }
        Request {
            operation: Operation::ModifyRoute,
            fields,
        }
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Build a [`Operation::GetBrokerSpec`] request scoped to a user.
#[must_use]
pub fn broker_spec_request(user_uuid: i64) -> Request {
    Request {
        operation: Operation::GetBrokerSpec,
        fields: FieldMap::new().with("uuid", user_uuid),
    }
}

/// Payload for [`Operation::GetFills`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillsQuery {
    /// Start of the window, inclusive.
    pub from: DateTime<Utc>,
    /// End of the window, inclusive.
    pub to: DateTime<Utc>,
    /// User the fills belong to.
    pub user_uuid: i64,
}

impl FillsQuery {
    /// Lower the query into its request payload.
    #[must_use]
    pub fn into_request(self) -> Request {
        Request {
            operation: Operation::GetFills,
            fields: FieldMap::new()
                .with("fromDateTime", self.from)
                .with("toDateTime", self.to)
                .with("uuid", self.user_uuid),
        }
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Topic of a standing field subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubscriptionTopic {
    /// Order blotter stream.
    Order,
    /// Route (placement) stream.
    Route,
}

impl SubscriptionTopic {
    /// Wire value of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Route => "route",
        }
    }
}

impl std::fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A standing request for a continuous stream of field updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionSpec {
    /// Stream topic.
    pub topic: SubscriptionTopic,
    /// Fields the stream should carry.
    pub fields: Vec<String>,
}

/// Fields the order stream subscription asks for.
const ORDER_FIELDS: &[&str] = &[
    "apiSeqNum",
    "account",
    "amount",
    "avgPrice",
    "broker",
    "date",
    "filled",
    "idleAmount",
    "limitPrice",
    "orderType",
    "percentRemain",
    "routeId",
    "sequence",
    "side",
    "status",
    "ticker",
    "timeInForce",
    "timeStamp",
    "trader",
    "working",
];

/// Fields the route stream subscription asks for.
const ROUTE_FIELDS: &[&str] = &[
    "apiSeqNum",
    "amount",
    "avgPrice",
    "broker",
    "dayFill",
    "filled",
    "lastFillDate",
    "lastFillTime",
    "lastMarket",
    "lastPrice",
    "lastShares",
    "orderType",
    "percentRemain",
    "routeCreateDate",
    "routeId",
    "sequence",
    "status",
    "timeInForce",
    "timeStamp",
    "working",
];

/// Subscription over the order blotter stream.
#[must_use]
pub fn order_subscription() -> SubscriptionSpec {
    SubscriptionSpec {
        topic: SubscriptionTopic::Order,
        fields: ORDER_FIELDS.iter().map(ToString::to_string).collect(),
    }
}

/// Subscription over the route stream.
#[must_use]
pub fn route_subscription() -> SubscriptionSpec {
    SubscriptionSpec {
        topic: SubscriptionTopic::Route,
        fields: ROUTE_FIELDS.iter().map(ToString::to_string).collect(),
    }
}

/// The order and route subscriptions in dependency order: the route
/// stream is only started once the order stream is confirmed.
#[must_use]
pub fn order_route_chain() -> Vec<SubscriptionSpec> {
    vec![order_subscription(), route_subscription()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_order_payload_omits_limit_price() {
        let request = OrderTicket {
            ticker: "IBM US".to_string(),
            amount: 4500,
            side: Side::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Day,
            handling: HandlingInstruction::Any,
            broker: "BB".to_string(),
            notes: Some("Some notes".to_string()),
        }
        .into_request();

        assert_eq!(request.operation, Operation::CreateOrderAndRoute);
        assert_eq!(request.fields.str_or("orderType", ""), "MKT");
        assert_eq!(request.fields.str_or("side", ""), "BUY");
        assert!(!request.fields.contains("limitPrice"));
        assert_eq!(request.fields.str_or("notes", ""), "Some notes");
    }

    #[test]
    fn limit_order_payload_carries_price() {
        let request = OrderTicket {
            ticker: "IBM US".to_string(),
            amount: 100,
            side: Side::Sell,
            order_type: OrderType::Limit(Decimal::new(15_025, 2)),
            time_in_force: TimeInForce::GoodTillCancel,
            handling: HandlingInstruction::Directed,
            broker: "BB".to_string(),
            notes: None,
        }
        .into_request();

        assert_eq!(request.fields.str_or("orderType", ""), "LMT");
        assert!((request.fields.f64_or("limitPrice", 0.0) - 150.25).abs() < 1e-9);
        assert!(!request.fields.contains("notes"));
    }

    #[test]
    fn gtd_orders_carry_a_compact_date() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 29).unwrap();
        let request = RouteAmendment {
            sequence: 4_116_143,
            route_id: 2,
            amount: 100,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::GoodTillDate(date),
        }
        .into_request();

        assert_eq!(request.fields.i64_or("gtdDate", 0), 20_241_129);
        assert_eq!(request.fields.str_or("timeInForce", ""), "GTD");
    }

    #[test]
    fn chain_starts_with_the_order_stream() {
        let chain = order_route_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].topic, SubscriptionTopic::Order);
        assert_eq!(chain[1].topic, SubscriptionTopic::Route);
        assert!(chain[0].fields.iter().any(|f| f == "status"));
    }
}
