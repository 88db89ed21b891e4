use axum::{extract::Path, Json};

use crate::models::{Customer, Invoice, Order};

/// @Summary Get a customer
/// @Description Returns a single customer by id
/// @Tags customers
/// @Produce json
/// @Param id path int true "Customer id"
/// @Success 200 {object} Customer "The customer"
/// @Failure 404 {object} ProblemDetails "Customer not found"
pub async fn get_customer(Path(id): Path<i64>) -> Json<Customer> {
    todo!("load customer {}", id)
}

/// @Summary List orders
/// @Tags orders
/// @Param status query string false "Filter by status"
/// @Param limit query int false "Page size"
/// @Success 200 {array} Order "Orders"
/// @Security ApiKeyAuth
pub async fn list_orders() -> Json<Vec<Order>> {
    Json(Vec::new())
}

/// @Summary Create an order
/// @Tags orders
/// @Accept json
/// @Param order body Order true "Order to create"
/// @Success 201 {object} Order "Created order"
/// @Failure 422 {object} ProblemDetails "Validation failed"
pub async fn create_order(Json(order): Json<Order>) -> Json<Order> {
    Json(order)
}

/// @Summary Issue an invoice
/// @Param invoice body Invoice true
/// @Success 201 {object} Invoice
pub async fn create_invoice(Json(invoice): Json<Invoice>) -> Json<Invoice> {
    Json(invoice)
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}
