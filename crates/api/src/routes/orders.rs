//! Order commit, lookup, status and analytics endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{Money, OrderId};
use domain::{Order, OrderStatus, PaymentMethod, ProfitSummary};
use saga::{CartLine, CartRequest, CustomerInput, InlineCustomer, LowStockAlert};
use serde::{Deserialize, Serialize};
use store::{Backend, OrderQuery, OrderStore};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub subtotal: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub discount: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub customer_data: Option<CustomerDataRequest>,
    pub customer_name: Option<String>,
    pub customer_contact: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product: String,
    pub quantity: i64,
    pub price: Option<Money>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDataRequest {
    #[serde(default)]
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub nic: Option<String>,
    #[serde(default)]
    pub is_vat: bool,
}

impl From<CreateOrderRequest> for CartRequest {
    fn from(req: CreateOrderRequest) -> Self {
        CartRequest {
            lines: req
                .items
                .into_iter()
                .map(|item| CartLine {
                    product: item.product,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            subtotal: req.subtotal,
            tax: req.tax,
            discount: req.discount,
            total: req.total,
            payment_method: req.payment_method,
            customer: CustomerInput {
                customer_id: req.customer_id,
                inline: req.customer_data.map(|c| InlineCustomer {
                    name: c.name,
                    address: c.address,
                    phone_number: c.phone_number,
                    nic: c.nic,
                    is_vat: c.is_vat,
                }),
                legacy_name: req.customer_name,
                legacy_contact: req.customer_contact,
            },
            user_id: req.user_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitInfo {
    pub total_cost: Money,
    pub total_profit: Money,
    pub profit_margin: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: OrderId,
    pub order: Order,
    pub profit_info: ProfitInfo,
    pub low_stock: Vec<LowStockAlert>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatedResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: Order,
}

// -- Handlers --

/// POST /orders: validate, price and commit a cart.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let Json(req) = payload?;
    let outcome = state.coordinator.commit(req.into()).await?;

    let f = outcome.order.financials();
    let response = OrderCreatedResponse {
        success: true,
        message: "Order created successfully",
        order_id: outcome.order.id(),
        profit_info: ProfitInfo {
            total_cost: f.total_cost,
            total_profit: f.total_profit,
            profit_margin: f.profit_margin,
        },
        order: outcome.order,
        low_stock: outcome.low_stock,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders: list orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(params) = params?;

    let mut query = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.status(status.parse().map_err(ApiError::Validation)?);
    }
    if let Some(method) = params.payment_method.as_deref().filter(|m| !m.is_empty()) {
        query = query.payment_method(method.parse().map_err(ApiError::Validation)?);
    }

    Ok(Json(state.store.list_orders(&query).await?))
}

/// GET /orders/:id: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = id.parse()?;
    let order = state
        .store
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {order_id}")))?;
    Ok(Json(order))
}

/// PUT /orders/:id/status: change status; cancelling returns stock.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let order_id: OrderId = id.parse()?;
    let Json(req) = payload?;
    let to: OrderStatus = req.status.parse().map_err(ApiError::Validation)?;

    let order = state.status.change_status(order_id, to).await?;

    Ok(Json(StatusUpdatedResponse {
        success: true,
        message: "Order status updated successfully",
        order,
    }))
}

/// GET /orders/analytics/profit: revenue and profit over non-cancelled orders.
#[tracing::instrument(skip(state))]
pub async fn profit<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<DateRangeParams>, QueryRejection>,
) -> Result<Json<ProfitSummary>, ApiError> {
    let Query(params) = params?;
    let query = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;
    let orders = state.store.list_orders(&query).await?;
    Ok(Json(ProfitSummary::from_orders(&orders)))
}

/// Which end of a day a bare date stands for.
#[derive(Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Result<OrderQuery, ApiError> {
    let mut query = OrderQuery::new();
    if let Some(start) = start.filter(|s| !s.is_empty()) {
        query = query.from(parse_date(start, DayEdge::Start)?);
    }
    if let Some(end) = end.filter(|s| !s.is_empty()) {
        query = query.to(parse_date(end, DayEdge::End)?);
    }
    Ok(query)
}

/// Accepts RFC 3339 timestamps or `YYYY-MM-DD` dates.
fn parse_date(value: &str, edge: DayEdge) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("Invalid date: {value}")))?;
    let time = match edge {
        DayEdge::Start => NaiveTime::from_hms_opt(0, 0, 0),
        DayEdge::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999),
    }
    .ok_or_else(|| ApiError::Internal("time of day out of range".to_string()))?;
    Ok(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn bare_dates_cover_the_whole_day() {
        let query = date_range(Some("2024-03-01"), Some("2024-03-01")).unwrap();
        assert_eq!(
            query.from,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        let to = query.to.unwrap();
        assert!(to > Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap());
        assert!(to < Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn rfc3339_keeps_offset() {
        let at = parse_date("2024-03-01T10:00:00+05:30", DayEdge::Start).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 1, 4, 30, 0).unwrap());
    }

    #[test]
    fn garbage_date_is_a_validation_error() {
        assert!(matches!(
            date_range(Some("last tuesday"), None),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn request_maps_onto_cart() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{"product": "p-1", "quantity": 2, "price": 4.5}],
            "subtotal": 9,
            "total": 9,
            "paymentMethod": "card",
            "customerName": "Kamala",
            "userId": "u-1"
        }))
        .unwrap();

        let cart = CartRequest::from(req);
        assert_eq!(cart.lines[0].price, Some(Money::from_cents(450)));
        assert_eq!(cart.subtotal.cents(), 900);
        assert!(cart.tax.is_zero());
        assert_eq!(cart.payment_method, PaymentMethod::Card);
        assert_eq!(cart.customer.legacy_name.as_deref(), Some("Kamala"));
    }
}
