//! The `get_car_value` tool.

use chrono::Datelike;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

const BASE_VALUE: f64 = 20_000.0;
const SEDAN_DEPRECIATION: f64 = 0.15;
const DEFAULT_DEPRECIATION: f64 = 0.20;

#[derive(Debug, Error, PartialEq)]
pub enum ValuationError {
    #[error("year {0} is too far from the current year")]
    YearOutOfRange(i32),

    #[error("value for year {0} is not representable")]
    Overflow(i32),
}

/// Placeholder valuation: fixed base price, compounded yearly depreciation.
///
/// Years in the future yield a value above the base price.
pub fn estimate(model: &str, year: i32, current_year: i32) -> Result<i64, ValuationError> {
    let rate = if model.eq_ignore_ascii_case("sedan") {
        SEDAN_DEPRECIATION
    } else {
        DEFAULT_DEPRECIATION
    };
    let age = current_year
        .checked_sub(year)
        .ok_or(ValuationError::YearOutOfRange(year))?;
    let value = BASE_VALUE * (1.0 - rate).powi(age);
    if !value.is_finite() || value >= i64::MAX as f64 {
        return Err(ValuationError::Overflow(year));
    }
    Ok(value as i64)
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CarQuery {
    /// The model of the car.
    pub model: String,
    /// The manufacturing year of the car.
    #[serde(deserialize_with = "lenient_year")]
    #[schemars(with = "i32")]
    pub year: i32,
}

/// Integers, integral floats (`2020.0`) and numeric strings are all accepted.
fn lenient_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    as_year(&value).ok_or_else(|| serde::de::Error::custom("`year` must be an integer"))
}

fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX))
                .map(|f| f as i32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// MCP server exposing [`estimate`] as `get_car_value`.
#[derive(Clone)]
pub struct CarValue {
    tool_router: ToolRouter<Self>,
    fixed_year: Option<i32>,
}

#[tool_router]
impl CarValue {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
            fixed_year: None,
        }
    }

    /// Pin "today" to a given year.
    #[cfg(test)]
    pub fn at_year(year: i32) -> Self {
        Self {
            fixed_year: Some(year),
            ..Self::new()
        }
    }

    fn current_year(&self) -> i32 {
        self.fixed_year
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    #[tool(description = "Retrieve the value of a car based on its model and year.")]
    async fn get_car_value(
        &self,
        Parameters(query): Parameters<CarQuery>,
    ) -> Result<CallToolResult, ErrorData> {
        match estimate(&query.model, query.year, self.current_year()) {
            Ok(value) => {
                debug!(model = %query.model, year = query.year, value, "estimated car value");
                let mut result = CallToolResult::success(vec![Content::text(value.to_string())]);
                result.structured_content = Some(json!({ "result": value }));
                Ok(result)
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

impl Default for CarValue {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for CarValue {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Estimates the value of a car from its model and year.".into()),
            ..Default::default()
        }
    }
}
