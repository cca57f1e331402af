use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::order::{
    OrderLookup, OrderPlacement, OrderQuery, OrderRequest, OrderStatusReport, OrderedItem,
    PlacedOrder,
};
use crate::ports::{OrderGateway, PortError};

const FIRST_ORDER_NUMBER: u64 = 100;

#[derive(Clone, Debug)]
struct StoredOrder {
    report: OrderStatusReport,
    email: String,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct OrderBook {
    issued: u64,
    orders: Vec<StoredOrder>,
}

/// Order backend held in memory, issuing sequential 8-digit order numbers.
#[derive(Debug, Default)]
pub struct InMemoryOrderGateway {
    book: Mutex<OrderBook>,
}

impl InMemoryOrderGateway {
    pub fn order_count(&self) -> usize {
        self.with_book(|book| book.orders.len())
    }

    fn with_book<T>(&self, f: impl FnOnce(&mut OrderBook) -> T) -> T {
        match self.book.lock() {
            Ok(mut book) => f(&mut book),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

fn normalize_order_number(raw: &str) -> &str {
    raw.trim().trim_start_matches('#').trim()
}

#[async_trait]
impl OrderGateway for InMemoryOrderGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderPlacement, PortError> {
        if request.items.is_empty() {
            return Ok(OrderPlacement::Rejected { reason: "Order must contain items".to_owned() });
        }
        if !request.customer.email.contains('@') {
            return Ok(OrderPlacement::Rejected {
                reason: format!("Invalid email address: {}", request.customer.email),
            });
        }

        let total_amount = request.total();
        let placed_at = Utc::now();
        let placed = self.with_book(|book| {
            let sequence = FIRST_ORDER_NUMBER + book.issued;
            book.issued += 1;
            let order_number = format!("{sequence:08}");
            book.orders.push(StoredOrder {
                report: OrderStatusReport {
                    order_number: order_number.clone(),
                    status: "Activated".to_owned(),
                    order_date: placed_at.format("%Y-%m-%d").to_string(),
                    total_amount,
                    items: request
                        .items
                        .iter()
                        .map(|item| OrderedItem {
                            product_name: item.product_name.clone(),
                            quantity: item.quantity,
                            unit_price: item.unit_price,
                        })
                        .collect(),
                },
                email: request.customer.email.to_lowercase(),
                placed_at,
            });
            PlacedOrder { order_id: format!("801-mem-{sequence}"), order_number, total_amount }
        });

        Ok(OrderPlacement::Placed(placed))
    }

    async fn lookup_order(&self, query: &OrderQuery) -> Result<OrderLookup, PortError> {
        let found = self.with_book(|book| match query {
            OrderQuery::ByNumber(number) => {
                let wanted = normalize_order_number(number);
                book.orders.iter().find(|order| order.report.order_number == wanted).cloned()
            }
            OrderQuery::ByEmail(email) => {
                let wanted = email.trim().to_lowercase();
                book.orders
                    .iter()
                    .filter(|order| order.email == wanted)
                    .max_by_key(|order| order.placed_at)
                    .cloned()
            }
        });

        Ok(found.map_or(OrderLookup::NotFound, |order| OrderLookup::Found(order.report)))
    }

    async fn order_history(&self, email: &str) -> Result<Vec<OrderStatusReport>, PortError> {
        let wanted = email.trim().to_lowercase();
        let mut orders: Vec<StoredOrder> = self.with_book(|book| {
            book.orders.iter().filter(|order| order.email == wanted).cloned().collect()
        });
        orders.sort_by(|a, b| {
            b.placed_at.cmp(&a.placed_at).then(b.report.order_number.cmp(&a.report.order_number))
        });
        Ok(orders.into_iter().map(|order| order.report).collect())
    }
}
