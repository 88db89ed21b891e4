use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::billing::Item;

pub type OrderStatus = &'static str;

pub const STATUS_PENDING: OrderStatus = "pending";
pub const STATUS_SHIPPED: OrderStatus = "shipped";
pub const STATUS_CANCELLED: OrderStatus = "cancelled";

pub const MAX_LINES: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    #[serde(rename = "full_name")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub referred_by: Option<Box<Customer>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: uuid::Uuid,
    pub customer: Customer,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub shipped_at: Option<chrono::DateTime<chrono::Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Invoice {
    pub order: Order,
    pub method: PaymentMethod,
    pub items: Vec<Item>,
}
