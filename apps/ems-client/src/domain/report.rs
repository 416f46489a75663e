//! Decoded Response Payloads
//!
//! Typed views over response messages, selected by message-type tag.
//! A business error (`ErrorInfo`) decodes like any other payload: it is
//! data for the consumer, not a dispatch failure. Subscription ticks are
//! not decoded here; their field snapshots pass through to the consumer
//! as-is.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::event::{Message, MessageType};
use super::field::{DecodeError, FieldMap, FieldValue};

// =============================================================================
// Report
// =============================================================================

/// A decoded one-shot response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Report {
    /// Venue-reported business error.
    Error(ErrorInfo),
    /// Order created and routed.
    OrderRouted(OrderRouted),
    /// Route amended.
    RouteModified(RouteModified),
    /// Fills over the requested window.
    Fills(FillsReport),
    /// Broker specification tree.
    BrokerSpec(BrokerSpecReport),
}

impl Report {
    /// Decode a response message by its type tag.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the tag is not a known response type
    /// or a payload field is missing or mistyped.
    pub fn decode(message: &Message) -> Result<Self, DecodeError> {
        match &message.message_type {
            MessageType::ErrorInfo => ErrorInfo::from_fields(&message.fields).map(Self::Error),
            MessageType::CreateOrderAndRoute => {
                OrderRouted::from_fields(&message.fields).map(Self::OrderRouted)
            }
            MessageType::ModifyRoute => {
                RouteModified::from_fields(&message.fields).map(Self::RouteModified)
            }
            MessageType::GetFillsResponse => {
                FillsReport::from_fields(&message.fields).map(Self::Fills)
            }
            MessageType::BrokerSpecReport => {
                BrokerSpecReport::from_fields(&message.fields).map(Self::BrokerSpec)
            }
            other => Err(DecodeError::UnexpectedMessageType(other.to_string())),
        }
    }

    /// Whether this report carries a business error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// =============================================================================
// Simple Payloads
// =============================================================================

/// Business error carried in a valid response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Venue error code.
    pub code: i64,
    /// Venue error text.
    pub message: String,
}

impl ErrorInfo {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            code: fields.require_i64("errorCode")?,
            message: fields.require_str("errorMessage")?.to_string(),
        })
    }
}

/// Ack for order creation plus routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRouted {
    /// Sequence number assigned to the new order.
    pub sequence: i64,
    /// Route identifier under that order.
    pub route_id: i64,
    /// Venue ack text.
    pub text: String,
}

impl OrderRouted {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            sequence: fields.require_i64("sequence")?,
            route_id: fields.require_i64("routeId")?,
            text: fields.str_or("message", "").to_string(),
        })
    }
}

/// Ack for a route amendment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteModified {
    /// Venue ack text.
    pub text: String,
}

impl RouteModified {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            text: fields.str_or("message", "").to_string(),
        })
    }
}

// =============================================================================
// Fills
// =============================================================================

/// Fills history over a requested window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillsReport {
    /// Fills in venue delivery order.
    pub fills: Vec<Fill>,
}

/// One execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    /// Order the fill belongs to.
    pub order_id: i64,
    /// Fill identifier within the order.
    pub fill_id: i64,
    /// Executed price.
    pub price: Decimal,
    /// Executed quantity.
    pub shares: Decimal,
    /// Execution time.
    pub executed_at: DateTime<Utc>,
}

impl FillsReport {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        let fills = group_items(fields.array_or_empty("fills"), "fills")?
            .into_iter()
            .map(Fill::from_fields)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fills })
    }
}

impl Fill {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            order_id: fields.require_i64("orderId")?,
            fill_id: fields.require_i64("fillId")?,
            price: decimal_field(fields, "fillPrice")?,
            shares: decimal_field(fields, "fillShares")?,
            executed_at: fields.require_date_time("dateTimeOfFill")?,
        })
    }
}

// =============================================================================
// Broker Specification
// =============================================================================

/// Broker specification tree: brokers, their strategies, and the
/// parameter schemas those strategies accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerSpecReport {
    /// Brokers available to the requesting user.
    pub brokers: Vec<BrokerSpec>,
}

/// One broker entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerSpec {
    /// Broker code.
    pub code: String,
    /// Asset class the entry applies to.
    pub asset_class: String,
    /// FIX tag strategies are keyed on, when the broker supports any.
    pub strategy_fix_tag: Option<i64>,
    /// Strategies offered by the broker.
    pub strategies: Vec<BrokerStrategy>,
    /// Supported time-in-force values.
    pub times_in_force: Vec<FixMapping>,
    /// Supported order types.
    pub order_types: Vec<FixMapping>,
    /// Supported handling instructions.
    pub handling_instructions: Vec<FixMapping>,
}

/// A display name with its FIX wire value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixMapping {
    /// Display name.
    pub name: String,
    /// FIX value sent on the wire.
    pub fix_value: String,
}

/// One broker strategy and its parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerStrategy {
    /// Strategy name.
    pub name: String,
    /// FIX value selecting the strategy.
    pub fix_value: String,
    /// Parameters the strategy accepts, in fixed order.
    pub parameters: Vec<StrategyParameter>,
}

/// Schema of one strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParameter {
    /// Parameter name.
    pub name: String,
    /// FIX tag the parameter maps to.
    pub fix_tag: i64,
    /// Whether the venue requires a value.
    pub required: bool,
    /// Whether a supplied value may be replaced after routing.
    pub replaceable: bool,
    /// Value shape.
    pub kind: ParameterType,
}

/// Value shape of a strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParameterType {
    /// Closed set of named values.
    Enumeration(Vec<FixMapping>),
    /// Numeric range.
    Range {
        /// Minimum accepted value.
        min: i64,
        /// Maximum accepted value.
        max: i64,
        /// Step between accepted values.
        step: i64,
    },
    /// Free text, optionally with suggested values.
    Text {
        /// Suggested values, possibly empty.
        possible_values: Vec<String>,
    },
}

impl BrokerSpecReport {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        let brokers = group_items(fields.require_array("brokers")?, "brokers")?
            .into_iter()
            .map(BrokerSpec::from_fields)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { brokers })
    }
}

impl BrokerSpec {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        let strategy_fix_tag = fields
            .contains("strategyFixTag")
            .then(|| fields.require_i64("strategyFixTag"))
            .transpose()?;

        // Brokers without a strategy FIX tag carry no strategy list.
        let strategies = group_items(fields.array_or_empty("strategies"), "strategies")?
            .into_iter()
            .map(BrokerStrategy::from_fields)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            code: fields.require_str("code")?.to_string(),
            asset_class: fields.require_str("assetClass")?.to_string(),
            strategy_fix_tag,
            strategies,
            times_in_force: fix_mappings(fields, "timesInForce")?,
            order_types: fix_mappings(fields, "orderTypes")?,
            handling_instructions: fix_mappings(fields, "handlingInstructions")?,
        })
    }
}

impl BrokerStrategy {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        let parameters = group_items(fields.array_or_empty("parameters"), "parameters")?
            .into_iter()
            .map(StrategyParameter::from_fields)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: fields.require_str("name")?.to_string(),
            fix_value: fields.require_str("fixValue")?.to_string(),
            parameters,
        })
    }
}

impl StrategyParameter {
    fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            name: fields.require_str("name")?.to_string(),
            fix_tag: fields.require_i64("fixTag")?,
            required: fields.require_bool("isRequired")?,
            replaceable: fields.require_bool("isReplaceable")?,
            kind: ParameterType::from_fields(fields.require_group("type")?)?,
        })
    }
}

impl ParameterType {
    fn from_fields(type_group: &FieldMap) -> Result<Self, DecodeError> {
        if let Some(FieldValue::Group(group)) = type_group.get("enumeration") {
            let enumerators = group_items(group.array_or_empty("enumerators"), "enumerators")?
                .into_iter()
                .map(fix_mapping)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Enumeration(enumerators));
        }
        if let Some(FieldValue::Group(group)) = type_group.get("range") {
            return Ok(Self::Range {
                min: group.require_i64("min")?,
                max: group.require_i64("max")?,
                step: group.require_i64("step")?,
            });
        }
        if let Some(FieldValue::Group(group)) = type_group.get("string") {
            let possible_values = group
                .array_or_empty("possibleValues")
                .iter()
                .map(|value| match value {
                    FieldValue::Str(s) => Ok(s.clone()),
                    _ => Err(DecodeError::WrongType {
                        field: "possibleValues".to_string(),
                        expected: "string",
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self::Text { possible_values });
        }
        Err(DecodeError::MissingField("type".to_string()))
    }
}

// =============================================================================
// Decode Helpers
// =============================================================================

fn decimal_field(fields: &FieldMap, name: &str) -> Result<Decimal, DecodeError> {
    let raw = fields.require_f64(name)?;
    Decimal::try_from(raw).map_err(|_| DecodeError::OutOfRange(name.to_string()))
}

fn group_items<'a>(
    items: &'a [FieldValue],
    field: &str,
) -> Result<Vec<&'a FieldMap>, DecodeError> {
    items
        .iter()
        .map(|item| match item {
            FieldValue::Group(group) => Ok(group),
            _ => Err(DecodeError::WrongType {
                field: field.to_string(),
                expected: "group",
            }),
        })
        .collect()
}

fn fix_mappings(fields: &FieldMap, name: &str) -> Result<Vec<FixMapping>, DecodeError> {
    group_items(fields.array_or_empty(name), name)?
        .into_iter()
        .map(fix_mapping)
        .collect()
}

fn fix_mapping(fields: &FieldMap) -> Result<FixMapping, DecodeError> {
    Ok(FixMapping {
        name: fields.require_str("name")?.to_string(),
        fix_value: fields.require_str("fixValue")?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn error_info_decodes_code_and_message() {
        let message = Message::new(MessageType::ErrorInfo)
            .with_field("errorCode", 7_i64)
            .with_field("errorMessage", "bad field");

        let report = Report::decode(&message).unwrap();
        assert!(report.is_error());
        assert_eq!(
            report,
            Report::Error(ErrorInfo {
                code: 7,
                message: "bad field".to_string(),
            })
        );
    }

    #[test]
    fn order_routed_ack_decodes() {
        let message = Message::new(MessageType::CreateOrderAndRoute)
            .with_field("sequence", 4_116_143_i64)
            .with_field("routeId", 1_i64)
            .with_field("message", "Order created and routed");

        match Report::decode(&message).unwrap() {
            Report::OrderRouted(ack) => {
                assert_eq!(ack.sequence, 4_116_143);
                assert_eq!(ack.route_id, 1);
                assert_eq!(ack.text, "Order created and routed");
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }

    #[test]
    fn fills_decode_with_decimal_prices() {
        let fill = FieldMap::new()
            .with("orderId", 88_i64)
            .with("fillId", 3_i64)
            .with("fillPrice", 150.25)
            .with("fillShares", 200.0)
            .with(
                "dateTimeOfFill",
                Utc.with_ymd_and_hms(2024, 11, 3, 14, 30, 0).unwrap(),
            );
        let message = Message::new(MessageType::GetFillsResponse)
            .with_field("fills", vec![FieldValue::Group(fill)]);

        match Report::decode(&message).unwrap() {
            Report::Fills(report) => {
                assert_eq!(report.fills.len(), 1);
                assert_eq!(report.fills[0].order_id, 88);
                assert_eq!(report.fills[0].price.to_string(), "150.25");
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }

    #[test]
    fn unknown_message_types_are_rejected() {
        let message = Message::new(MessageType::Other("Mystery".to_string()));
        assert_eq!(
            Report::decode(&message),
            Err(DecodeError::UnexpectedMessageType("Mystery".to_string()))
        );
    }

    #[test]
    fn broker_spec_decodes_nested_strategies() {
        let enumerator = FieldMap::new().with("name", "Passive").with("fixValue", "P");
        let parameter = FieldMap::new()
            .with("name", "Urgency")
            .with("fixTag", 9_001_i64)
            .with("isRequired", true)
            .with("isReplaceable", false)
            .with(
                "type",
                FieldMap::new().with(
                    "enumeration",
                    FieldMap::new().with("enumerators", vec![FieldValue::Group(enumerator)]),
                ),
            );
        let strategy = FieldMap::new()
            .with("name", "VWAP")
            .with("fixValue", "V")
            .with("parameters", vec![FieldValue::Group(parameter)]);
        let tif = FieldMap::new().with("name", "DAY").with("fixValue", "0");
        let broker = FieldMap::new()
            .with("code", "BB")
            .with("assetClass", "EQTY")
            .with("strategyFixTag", 6_060_i64)
            .with("strategies", vec![FieldValue::Group(strategy)])
            .with("timesInForce", vec![FieldValue::Group(tif.clone())])
            .with("orderTypes", vec![FieldValue::Group(tif.clone())])
            .with("handlingInstructions", vec![FieldValue::Group(tif)]);
        let message = Message::new(MessageType::BrokerSpecReport)
            .with_field("brokers", vec![FieldValue::Group(broker)]);

        match Report::decode(&message).unwrap() {
            Report::BrokerSpec(report) => {
                assert_eq!(report.brokers.len(), 1);
                let broker = &report.brokers[0];
                assert_eq!(broker.code, "BB");
                assert_eq!(broker.strategy_fix_tag, Some(6_060));
                assert_eq!(broker.strategies.len(), 1);
                let parameter = &broker.strategies[0].parameters[0];
                assert!(parameter.required);
                match &parameter.kind {
                    ParameterType::Enumeration(values) => {
                        assert_eq!(values[0].name, "Passive");
                    }
                    other => panic!("unexpected parameter type: {other:?}"),
                }
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }

    #[test]
    fn brokers_without_strategies_decode_clean() {
        let tif = FieldMap::new().with("name", "DAY").with("fixValue", "0");
        let broker = FieldMap::new()
            .with("code", "XY")
            .with("assetClass", "FUT")
            .with("timesInForce", vec![FieldValue::Group(tif.clone())])
            .with("orderTypes", vec![FieldValue::Group(tif.clone())])
            .with("handlingInstructions", vec![FieldValue::Group(tif)]);
        let message = Message::new(MessageType::BrokerSpecReport)
            .with_field("brokers", vec![FieldValue::Group(broker)]);

        match Report::decode(&message).unwrap() {
            Report::BrokerSpec(report) => {
                assert_eq!(report.brokers[0].strategy_fix_tag, None);
                assert!(report.brokers[0].strategies.is_empty());
            }
            other => panic!("unexpected report: {other:?}"),
        }
    }
}
