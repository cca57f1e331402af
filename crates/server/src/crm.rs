//! Salesforce REST adapter backing catalog search and order placement.

use std::time::Duration;

use async_trait::async_trait;
use cartline_core::config::CrmConfig;
use cartline_core::domain::order::{
    OrderLookup, OrderPlacement, OrderQuery, OrderRequest, OrderStatusReport, OrderedItem,
    PlacedOrder,
};
use cartline_core::domain::product::{
    CatalogFilters, ListingQuery, PricebookEntryId, Product, ProductId,
};
use cartline_core::ports::{
    CatalogSearch, OrderGateway, PortError, ProductListing, MAX_CATALOG_RESULTS,
    MAX_LISTING_RESULTS,
};
use chrono::Utc;
use reqwest::{Client, Response};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

/// Rows fetched before price filtering trims the list to the result cap.
const SEARCH_FETCH_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum SalesforceSetupError {
    #[error("crm is not configured: `{0}` is missing")]
    NotConfigured(&'static str),
    #[error("could not build crm http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure of a single REST call. `Refused` carries an error payload the
/// org returned; `Unreachable` means no usable answer came back at all.
#[derive(Debug)]
enum CallError {
    Unreachable(PortError),
    Refused(String),
}

impl From<CallError> for PortError {
    fn from(value: CallError) -> Self {
        match value {
            CallError::Unreachable(error) => error,
            CallError::Refused(reason) => Self::Protocol(reason),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IdRecord {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorRecord {
    message: String,
    #[serde(rename = "errorCode", default)]
    error_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductRecord {
    id: String,
    name: String,
    #[serde(default)]
    product_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    family: Option<String>,
    #[serde(rename = "Color__c", default)]
    color: Option<String>,
    #[serde(rename = "Size__c", default)]
    size: Option<String>,
    #[serde(rename = "Image_URL__c", default)]
    image_url: Option<String>,
    #[serde(default)]
    pricebook_entries: Option<QueryResponse<PricebookEntryRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PricebookEntryRecord {
    id: String,
    unit_price: Decimal,
}

impl ProductRecord {
    /// Products without an active pricebook entry cannot be ordered and are skipped.
    fn into_product(self) -> Option<Product> {
        let entry = self.pricebook_entries?.records.into_iter().next()?;
        Some(Product {
            id: ProductId(self.id),
            sku: self.product_code.unwrap_or_default(),
            name: self.name,
            description: self.description.unwrap_or_default(),
            family: self.family.unwrap_or_default(),
            color: self.color.unwrap_or_default(),
            size: self.size.unwrap_or_default(),
            price: entry.unit_price,
            pricebook_entry_id: PricebookEntryId(entry.id),
            image_url: self.image_url.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrderRecord {
    order_number: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    effective_date: Option<String>,
    #[serde(default)]
    total_amount: Option<Decimal>,
    #[serde(default)]
    order_items: Option<QueryResponse<OrderItemRecord>>,
}

#[derive(Debug, Deserialize)]
struct NamedRecord {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrderItemRecord {
    #[serde(rename = "Product2", default)]
    product: Option<NamedRecord>,
    quantity: Decimal,
    unit_price: Decimal,
}

impl OrderRecord {
    fn into_report(self) -> OrderStatusReport {
        let items = self
            .order_items
            .map(|items| items.records)
            .unwrap_or_default()
            .into_iter()
            .map(|item| OrderedItem {
                product_name: item.product.map(|product| product.name).unwrap_or_default(),
                quantity: item.quantity.to_u32().unwrap_or(0),
                unit_price: item.unit_price,
            })
            .collect();
        OrderStatusReport {
            order_number: self.order_number,
            status: self.status.unwrap_or_else(|| "Unknown".to_owned()),
            order_date: self.effective_date.unwrap_or_default(),
            total_amount: self.total_amount.unwrap_or(Decimal::ZERO),
            items,
        }
    }
}

pub struct SalesforceClient {
    http: Client,
    data_url: String,
    access_token: SecretString,
}

impl SalesforceClient {
    pub fn from_config(config: &CrmConfig) -> Result<Self, SalesforceSetupError> {
        let instance_url = config
            .instance_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SalesforceSetupError::NotConfigured("crm.instance_url"))?;
        let access_token = config
            .access_token
            .clone()
            .ok_or(SalesforceSetupError::NotConfigured("crm.access_token"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SalesforceSetupError::Client)?;

        Ok(Self {
            http,
            data_url: format!(
                "{}/services/data/{}",
                instance_url.trim_end_matches('/'),
                config.api_version
            ),
            access_token,
        })
    }

    async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, CallError> {
        let response = self
            .http
            .get(format!("{}/query", self.data_url))
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("q", soql)])
            .send()
            .await
            .map_err(transport_error)?;
        let body: QueryResponse<T> =
            checked(response).await?.json().await.map_err(decode_error)?;
        Ok(body.records)
    }

    async fn create(&self, sobject: &str, fields: Value) -> Result<String, CallError> {
        let response = self
            .http
            .post(format!("{}/sobjects/{sobject}", self.data_url))
            .bearer_auth(self.access_token.expose_secret())
            .json(&fields)
            .send()
            .await
            .map_err(transport_error)?;
        let created: CreatedRecord =
            checked(response).await?.json().await.map_err(decode_error)?;
        Ok(created.id)
    }

    async fn update(&self, sobject: &str, id: &str, fields: Value) -> Result<(), CallError> {
        let response = self
            .http
            .patch(format!("{}/sobjects/{sobject}/{id}", self.data_url))
            .bearer_auth(self.access_token.expose_secret())
            .json(&fields)
            .send()
            .await
            .map_err(transport_error)?;
        checked(response).await?;
        Ok(())
    }

    async fn upsert_account(&self, request: &OrderRequest) -> Result<String, CallError> {
        let existing: Vec<IdRecord> =
            self.query(&account_by_email_soql(&request.customer.email)).await?;
        if let Some(account) = existing.into_iter().next() {
            return Ok(account.id);
        }
        self.create(
            "Account",
            json!({
                "Name": request.customer.name,
                "Phone": request.customer.phone,
                "Email__c": request.customer.email,
            }),
        )
        .await
    }

    async fn standard_pricebook(&self) -> Result<String, CallError> {
        let pricebooks: Vec<IdRecord> =
            self.query("SELECT Id FROM Pricebook2 WHERE IsStandard = true LIMIT 1").await?;
        pricebooks
            .into_iter()
            .next()
            .map(|pricebook| pricebook.id)
            .ok_or_else(|| CallError::Refused("standard pricebook not found".to_owned()))
    }

    async fn place(&self, request: &OrderRequest) -> Result<PlacedOrder, CallError> {
        let account_id = self.upsert_account(request).await?;
        let pricebook_id = self.standard_pricebook().await?;
        let order_id = self
            .create(
                "Order",
                json!({
                    "AccountId": account_id,
                    "Pricebook2Id": pricebook_id,
                    "EffectiveDate": Utc::now().format("%Y-%m-%d").to_string(),
                    "Status": "Draft",
                    "CheckoutSource__c": request.source,
                }),
            )
            .await?;

        for item in &request.items {
            self.create(
                "OrderItem",
                json!({
                    "OrderId": order_id,
                    "PricebookEntryId": item.pricebook_entry_id.0,
                    "Quantity": item.quantity,
                    "UnitPrice": item.unit_price.to_f64().unwrap_or_default(),
                }),
            )
            .await?;
        }

        self.update("Order", &order_id, json!({ "Status": "Activated" })).await?;

        #[derive(Deserialize)]
        struct OrderNumberRecord {
            #[serde(rename = "OrderNumber")]
            order_number: String,
        }
        let soql = format!("SELECT OrderNumber FROM Order WHERE Id = '{}'", escape_soql(&order_id));
        let numbers: Vec<OrderNumberRecord> = self.query(&soql).await?;
        let Some(order_number) = numbers.into_iter().next().map(|record| record.order_number)
        else {
            return Err(CallError::Refused(format!("order {order_id} has no order number")));
        };

        Ok(PlacedOrder { order_number, order_id, total_amount: request.total() })
    }

    async fn products(
        &self,
        soql: &str,
        operation: &'static str,
    ) -> Result<Vec<Product>, PortError> {
        let records: Vec<ProductRecord> = self.query(soql).await.map_err(|error| {
            warn!(
                event_name = "crm.salesforce.product_query_failed",
                correlation_id = "crm",
                operation,
                error = ?error,
                "product query failed"
            );
            PortError::from(error)
        })?;
        Ok(records.into_iter().filter_map(ProductRecord::into_product).collect())
    }

    async fn find(&self, query: &OrderQuery) -> Result<Option<OrderRecord>, CallError> {
        match query {
            OrderQuery::ByNumber(number) => {
                let number = number.trim().trim_start_matches('#').trim();
                let orders: Vec<OrderRecord> = self.query(&order_by_number_soql(number)).await?;
                Ok(orders.into_iter().next())
            }
            OrderQuery::ByEmail(email) => {
                let accounts: Vec<IdRecord> = self.query(&account_by_email_soql(email)).await?;
                let Some(account) = accounts.into_iter().next() else {
                    return Ok(None);
                };
                let orders: Vec<OrderRecord> =
                    self.query(&latest_order_soql(&account.id)).await?;
                Ok(orders.into_iter().next())
            }
        }
    }
}

#[async_trait]
impl CatalogSearch for SalesforceClient {
    async fn search(
        &self,
        term: &str,
        filters: &CatalogFilters,
    ) -> Result<Vec<Product>, PortError> {
        let soql = product_search_soql(term, filters, SEARCH_FETCH_LIMIT);
        let mut products = self.products(&soql, "search").await?;
        products.retain(|product| filters.matches(product));
        products.truncate(MAX_CATALOG_RESULTS);
        Ok(products)
    }
}

#[async_trait]
impl ProductListing for SalesforceClient {
    async fn list_products(&self, query: &ListingQuery) -> Result<Vec<Product>, PortError> {
        let limit = query.limit.clamp(1, MAX_LISTING_RESULTS);
        let term = query.term.as_deref().unwrap_or_default();
        let soql = product_search_soql(term, &query.filters, MAX_LISTING_RESULTS);
        let mut products = self.products(&soql, "list").await?;
        products.retain(|product| query.filters.matches(product));
        products.truncate(limit);
        Ok(products)
    }

    async fn product(&self, id: &ProductId) -> Result<Option<Product>, PortError> {
        let products = self.products(&product_by_id_soql(&id.0), "detail").await?;
        Ok(products.into_iter().next())
    }
}

#[async_trait]
impl OrderGateway for SalesforceClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderPlacement, PortError> {
        if request.items.is_empty() {
            return Ok(OrderPlacement::Rejected { reason: "Order must contain items".to_owned() });
        }

        match self.place(request).await {
            Ok(placed) => Ok(OrderPlacement::Placed(placed)),
            Err(CallError::Refused(reason)) => {
                warn!(
                    event_name = "crm.salesforce.order_rejected",
                    correlation_id = "crm",
                    reason = %reason,
                    "order placement rejected"
                );
                Ok(OrderPlacement::Rejected { reason })
            }
            Err(CallError::Unreachable(error)) => Err(error),
        }
    }

    async fn lookup_order(&self, query: &OrderQuery) -> Result<OrderLookup, PortError> {
        match self.find(query).await {
            Ok(Some(order)) => Ok(OrderLookup::Found(order.into_report())),
            Ok(None) => Ok(OrderLookup::NotFound),
            Err(CallError::Refused(reason)) => {
                warn!(
                    event_name = "crm.salesforce.lookup_rejected",
                    correlation_id = "crm",
                    reason = %reason,
                    "order lookup rejected"
                );
                Ok(OrderLookup::NotFound)
            }
            Err(CallError::Unreachable(error)) => Err(error),
        }
    }

    async fn order_history(&self, email: &str) -> Result<Vec<OrderStatusReport>, PortError> {
        let accounts: Vec<IdRecord> = self.query(&account_by_email_soql(email)).await?;
        let Some(account) = accounts.into_iter().next() else {
            return Ok(Vec::new());
        };
        let orders: Vec<OrderRecord> = self.query(&order_history_soql(&account.id)).await?;
        Ok(orders.into_iter().map(OrderRecord::into_report).collect())
    }
}

fn transport_error(error: reqwest::Error) -> CallError {
    if error.is_timeout() {
        CallError::Unreachable(PortError::Timeout(error.to_string()))
    } else {
        CallError::Unreachable(PortError::Unavailable(error.to_string()))
    }
}

fn decode_error(error: reqwest::Error) -> CallError {
    CallError::Unreachable(PortError::Protocol(format!("undecodable crm response: {error}")))
}

/// 5xx answers count as an outage; any other non-success status carries an
/// error payload describing why the org refused the call.
async fn checked(response: Response) -> Result<Response, CallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(CallError::Unreachable(PortError::Unavailable(format!(
            "crm returned {status}"
        ))));
    }
    Err(CallError::Refused(describe_error_payload(status.as_u16(), &body)))
}

fn describe_error_payload(status: u16, body: &str) -> String {
    match serde_json::from_str::<Vec<ApiErrorRecord>>(body) {
        Ok(errors) if !errors.is_empty() => errors
            .iter()
            .map(|error| {
                if error.error_code.is_empty() {
                    error.message.clone()
                } else {
                    format!("{}: {}", error.error_code, error.message)
                }
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => format!("crm returned status {status}"),
    }
}

fn escape_soql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn escape_like(value: &str) -> String {
    escape_soql(value).replace('%', "\\%").replace('_', "\\_")
}

/// Every whitespace-separated term must appear in the name or description.
fn product_search_soql(term: &str, filters: &CatalogFilters, limit: usize) -> String {
    let mut conditions = vec!["IsActive = true".to_owned()];
    for term in term.split_whitespace() {
        let term = escape_like(&term.to_lowercase());
        conditions.push(format!("(Name LIKE '%{term}%' OR Description LIKE '%{term}%')"));
    }
    if let Some(color) = &filters.color {
        conditions.push(format!("Color__c LIKE '%{}%'", escape_like(color)));
    }
    if let Some(family) = &filters.family {
        conditions.push(format!("Family = '{}'", escape_soql(family)));
    }
    if let Some(size) = &filters.size {
        conditions.push(format!("Size__c LIKE '%{}%'", escape_like(size)));
    }

    format!(
        "SELECT {PRODUCT_FIELDS} FROM Product2 WHERE {} ORDER BY Name ASC LIMIT {limit}",
        conditions.join(" AND ")
    )
}

const PRODUCT_FIELDS: &str = "Id, Name, ProductCode, Description, Family, Color__c, Size__c, \
     Image_URL__c, (SELECT Id, UnitPrice FROM PricebookEntries WHERE IsActive = true LIMIT 1)";

fn product_by_id_soql(product_id: &str) -> String {
    format!(
        "SELECT {PRODUCT_FIELDS} FROM Product2 WHERE Id = '{}' AND IsActive = true LIMIT 1",
        escape_soql(product_id)
    )
}

fn account_by_email_soql(email: &str) -> String {
    format!(
        "SELECT Id FROM Account WHERE Email__c = '{}' ORDER BY CreatedDate DESC LIMIT 1",
        escape_soql(email.trim())
    )
}

const ORDER_FIELDS: &str = "Id, OrderNumber, Status, EffectiveDate, TotalAmount, \
     (SELECT Product2.Name, Quantity, UnitPrice FROM OrderItems)";

fn order_by_number_soql(order_number: &str) -> String {
    format!(
        "SELECT {ORDER_FIELDS} FROM Order WHERE OrderNumber = '{}' LIMIT 1",
        escape_soql(order_number)
    )
}

fn order_history_soql(account_id: &str) -> String {
    format!(
        "SELECT {ORDER_FIELDS} FROM Order WHERE AccountId = '{}' ORDER BY CreatedDate DESC",
        escape_soql(account_id)
    )
}

fn latest_order_soql(account_id: &str) -> String {
    format!(
        "SELECT {ORDER_FIELDS} FROM Order WHERE AccountId = '{}' \
         ORDER BY EffectiveDate DESC, CreatedDate DESC LIMIT 1",
        escape_soql(account_id)
    )
}

#[cfg(test)]
mod tests {
    use cartline_core::config::AppConfig;
    use cartline_core::domain::product::CatalogFilters;
    use rust_decimal::Decimal;

    use super::{
        describe_error_payload, escape_like, order_by_number_soql, order_history_soql,
        product_by_id_soql, product_search_soql, OrderRecord, ProductRecord, QueryResponse,
        SalesforceClient, SalesforceSetupError, SEARCH_FETCH_LIMIT,
    };

    #[test]
    fn every_search_term_becomes_its_own_condition() {
        let soql =
            product_search_soql("Silver  watch", &CatalogFilters::default(), SEARCH_FETCH_LIMIT);

        assert!(soql.contains("(Name LIKE '%silver%' OR Description LIKE '%silver%')"));
        assert!(soql.contains("(Name LIKE '%watch%' OR Description LIKE '%watch%')"));
        assert!(soql.contains("FROM Product2 WHERE IsActive = true AND"));
        assert!(soql.ends_with("ORDER BY Name ASC LIMIT 50"));
    }

    #[test]
    fn filters_are_pushed_into_the_query() {
        let filters = CatalogFilters {
            color: Some("Navy".to_owned()),
            family: Some("Watches".to_owned()),
            ..CatalogFilters::default()
        };
        let soql = product_search_soql("watch", &filters, SEARCH_FETCH_LIMIT);

        assert!(soql.contains("Color__c LIKE '%Navy%'"));
        assert!(soql.contains("Family = 'Watches'"));
    }

    #[test]
    fn quotes_and_wildcards_are_escaped() {
        assert_eq!(escape_like("o'brien_50%"), "o\\'brien\\_50\\%");
        assert!(order_by_number_soql("1' OR '1'='1").contains("'1\\' OR \\'1\\'=\\'1'"));
    }

    #[test]
    fn storefront_queries_select_by_id_and_account() {
        let detail = product_by_id_soql("01t1'x");
        assert!(detail.contains("FROM Product2 WHERE Id = '01t1\\'x' AND IsActive = true"));
        assert!(detail.contains("PricebookEntries"));

        let history = order_history_soql("001abc");
        assert!(history.contains("WHERE AccountId = '001abc'"));
        assert!(history.ends_with("ORDER BY CreatedDate DESC"));
        assert!(!history.contains("LIMIT"));

        let listing = product_search_soql("", &CatalogFilters::default(), 500);
        assert!(listing.ends_with("WHERE IsActive = true ORDER BY Name ASC LIMIT 500"));
    }

    #[test]
    fn product_records_without_price_are_dropped() {
        let raw = r#"{"records": [
            {"Id": "01t1", "Name": "Classic Silver Watch", "ProductCode": "WCH-1",
             "Description": "Steel", "Family": "Watches", "Color__c": "Silver",
             "Size__c": null, "Image_URL__c": null,
             "PricebookEntries": {"records": [{"Id": "01u1", "UnitPrice": 129.99}]}},
            {"Id": "01t2", "Name": "Unpriced Belt", "PricebookEntries": null}
        ]}"#;
        let response: QueryResponse<ProductRecord> = serde_json::from_str(raw).expect("decode");
        let products: Vec<_> =
            response.records.into_iter().filter_map(ProductRecord::into_product).collect();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, Decimal::new(12_999, 2));
        assert_eq!(products[0].pricebook_entry_id.0, "01u1");
        assert_eq!(products[0].size, "");
    }

    #[test]
    fn order_records_map_to_status_reports() {
        let raw = r#"{"Id": "801x", "OrderNumber": "00000123", "Status": "Activated",
            "EffectiveDate": "2026-10-01", "TotalAmount": 78.0,
            "OrderItems": {"records": [
                {"Product2": {"Name": "Brown Leather Belt"}, "Quantity": 2.0, "UnitPrice": 39.0}
            ]}}"#;
        let report = serde_json::from_str::<OrderRecord>(raw).expect("decode").into_report();

        assert_eq!(report.order_number, "00000123");
        assert_eq!(report.items[0].quantity, 2);
        assert_eq!(report.items[0].product_name, "Brown Leather Belt");
        assert_eq!(report.total_amount, Decimal::new(78, 0));
    }

    #[test]
    fn error_payloads_are_summarised_for_rejections() {
        let body = r#"[{"message": "Email is invalid", "errorCode": "INVALID_EMAIL_ADDRESS"}]"#;
        assert_eq!(describe_error_payload(400, body), "INVALID_EMAIL_ADDRESS: Email is invalid");
        assert_eq!(describe_error_payload(404, "not json"), "crm returned status 404");
    }

    #[test]
    fn client_requires_instance_url_and_token() {
        let config = AppConfig::default();
        let result = SalesforceClient::from_config(&config.crm);
        assert!(matches!(result, Err(SalesforceSetupError::NotConfigured("crm.instance_url"))));

        let mut crm = config.crm;
        crm.instance_url = Some("https://example.my.salesforce.com/".to_owned());
        crm.access_token = Some("00Dxx!token".to_owned().into());
        let client = SalesforceClient::from_config(&crm).expect("client");
        assert_eq!(client.data_url, "https://example.my.salesforce.com/services/data/v59.0");
    }
}
