use std::collections::HashMap;

use chrono::NaiveDate;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::entities::*;
use super::groups::{classify_by_keywords, dominant_group, routing_for};
use crate::core::{
    Config, DocumentHeader, InvoiceItem, LegalForm, Organization, ProcessingStats,
    ProvodkaError, vat_rate_percent,
};
use crate::upd::UpdDocument;

/// Outcome of a document-creation sequence: the primary document (facture or
/// счет) plus its base document (отгрузка or заказ).
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub document_id: String,
    pub document_name: String,
    pub document_url: String,
    pub base_document_id: String,
    pub base_document_name: String,
    pub base_document_url: String,
    pub stats: ProcessingStats,
}

/// Authenticated MoySklad JSON API client.
///
/// Every lookup is request-scoped; nothing is cached between calls. The
/// multi-step document creation sequence is not transactional — entities
/// created before a failing step stay in MoySklad.
pub struct MoySkladClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    organization_id: Option<String>,
    config: Config,
}

impl MoySkladClient {
    pub fn new(config: &Config) -> Result<Self, ProvodkaError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProvodkaError::RemoteApi(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            organization_id: config.organization_id.clone(),
            config: config.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProvodkaError> {
        let url = self.url(path);
        debug!(%path, "GET MoySklad");
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json;charset=utf-8")
            .query(query)
            .send()
            .await
            .map_err(|e| ProvodkaError::RemoteApi(format!("network error: {e}")))?;
        Self::handle(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProvodkaError> {
        let url = self.url(path);
        debug!(%path, "POST MoySklad");
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json;charset=utf-8")
            .header("Accept", "application/json;charset=utf-8")
            .json(body)
            .send()
            .await
            .map_err(|e| ProvodkaError::RemoteApi(format!("network error: {e}")))?;
        Self::handle(path, response).await
    }

    async fn handle<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ProvodkaError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProvodkaError::RemoteApi(format!("network error: {e}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(%path, "MoySklad rate limit");
            return Err(ProvodkaError::RateLimited(format!(
                "{path}: {}",
                excerpt(&body)
            )));
        }
        if !status.is_success() {
            warn!(%path, %status, "MoySklad request failed");
            return Err(ProvodkaError::RemoteApi(format!(
                "{path}: HTTP {status}: {}",
                excerpt(&body)
            )));
        }
        serde_json::from_str(&body).map_err(|e| {
            ProvodkaError::RemoteApi(format!("{path}: unexpected response shape: {e}"))
        })
    }

    // -----------------------------------------------------------------------
    // Connection probe
    // -----------------------------------------------------------------------

    /// Lightweight reachability and auth check. Never errors.
    pub async fn check_connection(&self) -> bool {
        match self
            .get_json::<serde_json::Value>("context/employee", &[])
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "MoySklad connection check failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Organizations and counterparties
    // -----------------------------------------------------------------------

    /// Search own organizations (`entity/organization`) by INN.
    pub async fn find_own_organization(
        &self,
        inn: &str,
    ) -> Result<Option<RemoteEntityRef>, ProvodkaError> {
        let rows: Rows<EntityRow> = self
            .get_json("entity/organization", &[("filter", format!("inn={inn}"))])
            .await?;
        Ok(rows.rows.into_iter().next().map(Into::into))
    }

    /// Own organization for documents where the seller is us: the configured
    /// id wins, then an INN search, then the first organization of the
    /// account.
    async fn own_organization_for(
        &self,
        seller_inn: &str,
    ) -> Result<RemoteEntityRef, ProvodkaError> {
        if let Some(id) = &self.organization_id {
            let row: EntityRow = self
                .get_json(&format!("entity/organization/{id}"), &[])
                .await?;
            return Ok(row.into());
        }
        if let Some(org) = self.find_own_organization(seller_inn).await? {
            return Ok(org);
        }
        let rows: Rows<EntityRow> = self.get_json("entity/organization", &[]).await?;
        rows.rows
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| {
                ProvodkaError::RemoteApi("no organizations available in the MoySklad account".into())
            })
    }

    /// Search counterparties by INN; when a KPP is supplied, a row with the
    /// same KPP is preferred over the first match. Zero matches is `None`,
    /// not an error.
    pub async fn find_counterparty(
        &self,
        inn: &str,
        kpp: Option<&str>,
    ) -> Result<Option<RemoteEntityRef>, ProvodkaError> {
        let rows: Rows<EntityRow> = self
            .get_json("entity/counterparty", &[("filter", format!("inn={inn}"))])
            .await?;
        let mut rows = rows.rows;
        if rows.is_empty() {
            return Ok(None);
        }
        if let Some(kpp) = kpp {
            if let Some(pos) = rows.iter().position(|r| r.kpp.as_deref() == Some(kpp)) {
                return Ok(Some(rows.swap_remove(pos).into()));
            }
        }
        Ok(Some(rows.swap_remove(0).into()))
    }

    /// Create a counterparty. Not idempotent on its own — callers must
    /// [`find_counterparty`](Self::find_counterparty) first.
    pub async fn create_counterparty(
        &self,
        org: &Organization,
    ) -> Result<RemoteEntityRef, ProvodkaError> {
        let payload = CounterpartyPayload {
            name: org.name.clone(),
            inn: org.inn.clone(),
            company_type: match org.legal_form {
                LegalForm::LegalEntity => "legal",
                LegalForm::SoleProprietor => "individual",
            },
            kpp: match org.legal_form {
                LegalForm::LegalEntity => org.kpp.clone(),
                LegalForm::SoleProprietor => None,
            },
        };
        info!(name = %org.name, inn = %org.inn, company_type = payload.company_type,
            "creating counterparty");
        let row: EntityRow = self.post_json("entity/counterparty", &payload).await?;
        Ok(row.into())
    }

    pub async fn find_or_create_counterparty(
        &self,
        org: &Organization,
    ) -> Result<RemoteEntityRef, ProvodkaError> {
        if let Some(existing) = self.find_counterparty(&org.inn, org.kpp.as_deref()).await? {
            debug!(name = %existing.name, inn = %org.inn, "counterparty already exists");
            return Ok(existing);
        }
        self.create_counterparty(org).await
    }

    // -----------------------------------------------------------------------
    // Products
    // -----------------------------------------------------------------------

    pub async fn find_product_by_article(
        &self,
        article: &str,
    ) -> Result<Option<RemoteEntityRef>, ProvodkaError> {
        let rows: Rows<EntityRow> = self
            .get_json("entity/product", &[("filter", format!("article={article}"))])
            .await?;
        Ok(rows.rows.into_iter().next().map(Into::into))
    }

    /// Exact name filter first; falls back to the fuzzy `search` parameter
    /// with a case-insensitive comparison over the returned rows.
    pub async fn find_product_by_name(
        &self,
        name: &str,
    ) -> Result<Option<RemoteEntityRef>, ProvodkaError> {
        let rows: Rows<EntityRow> = self
            .get_json("entity/product", &[("filter", format!("name={name}"))])
            .await?;
        if let Some(row) = rows.rows.into_iter().next() {
            return Ok(Some(row.into()));
        }

        let rows: Rows<EntityRow> = self
            .get_json("entity/product", &[("search", name.to_string())])
            .await?;
        let wanted = name.to_lowercase();
        Ok(rows
            .rows
            .into_iter()
            .find(|r| r.name.to_lowercase() == wanted)
            .map(Into::into))
    }

    pub async fn create_product(
        &self,
        name: &str,
        article: Option<&str>,
    ) -> Result<RemoteEntityRef, ProvodkaError> {
        info!(%name, ?article, "creating product");
        let payload = ProductPayload {
            name: name.to_string(),
            article: article.map(str::to_owned),
        };
        let row: EntityRow = self.post_json("entity/product", &payload).await?;
        Ok(row.into())
    }

    /// Article search first (exact), then case-insensitive name search, then
    /// creation. The flag reports whether the product had to be created.
    pub async fn find_or_create_product(
        &self,
        name: &str,
        article: Option<&str>,
    ) -> Result<(RemoteEntityRef, bool), ProvodkaError> {
        if let Some(article) = article.filter(|a| !a.is_empty()) {
            if let Some(product) = self.find_product_by_article(article).await? {
                debug!(%name, %article, "product matched by article");
                return Ok((product, false));
            }
        }
        if let Some(product) = self.find_product_by_name(name).await? {
            debug!(%name, "product matched by name");
            return Ok((product, false));
        }
        Ok((self.create_product(name, article).await?, true))
    }

    // -----------------------------------------------------------------------
    // Warehouses and projects
    // -----------------------------------------------------------------------

    async fn find_listed_entity(
        &self,
        endpoint: &str,
        name: &str,
        kind: &str,
    ) -> Result<RemoteEntityRef, ProvodkaError> {
        let rows: Rows<EntityRow> = self
            .get_json(endpoint, &[("filter", format!("name={name}"))])
            .await?;
        if let Some(row) = rows.rows.into_iter().next() {
            return Ok(row.into());
        }
        // The filter is exact; re-list and compare case-insensitively before
        // giving up.
        let rows: Rows<EntityRow> = self.get_json(endpoint, &[]).await?;
        let wanted = name.to_lowercase();
        rows.rows
            .into_iter()
            .find(|r| r.name.to_lowercase() == wanted)
            .map(Into::into)
            .ok_or_else(|| {
                ProvodkaError::RemoteApi(format!("{kind} '{name}' not found in MoySklad"))
            })
    }

    pub async fn find_store(&self, name: &str) -> Result<RemoteEntityRef, ProvodkaError> {
        self.find_listed_entity("entity/store", name, "warehouse").await
    }

    pub async fn find_project(&self, name: &str) -> Result<RemoteEntityRef, ProvodkaError> {
        self.find_listed_entity("entity/project", name, "project").await
    }

    /// Route a document to a warehouse and project by its majority product
    /// group (ties → профиль).
    pub async fn resolve_warehouse_and_project(
        &self,
        items: &[InvoiceItem],
    ) -> Result<(RemoteEntityRef, RemoteEntityRef), ProvodkaError> {
        let group = dominant_group(items, classify_by_keywords);
        let routing = routing_for(&self.config, group);
        info!(?group, warehouse = %routing.warehouse, project = %routing.project,
            "routing document by product group");
        let store = self.find_store(&routing.warehouse).await?;
        let project = self.find_project(&routing.project).await?;
        Ok((store, project))
    }

    // -----------------------------------------------------------------------
    // Linked customer invoices
    // -----------------------------------------------------------------------

    /// Look up an existing счет покупателю by the number extracted from the
    /// УПД transfer requisites. Tries exact name, then partial name, then
    /// description match.
    pub async fn find_customer_invoice(
        &self,
        number: &str,
    ) -> Result<Option<InvoiceOutRow>, ProvodkaError> {
        for pattern in [
            format!("name={number}"),
            format!("name~{number}"),
            format!("description~{number}"),
        ] {
            let rows: Rows<InvoiceOutRow> = self
                .get_json("entity/invoiceout", &[("filter", pattern.clone())])
                .await?;
            if let Some(row) = rows.rows.into_iter().next() {
                debug!(invoice = %row.name, %pattern, "found linked customer invoice");
                let full: InvoiceOutRow = self
                    .get_json(
                        &row.meta.href,
                        &[("expand", "positions.assortment".to_string())],
                    )
                    .await?;
                return Ok(Some(full));
            }
        }
        warn!(%number, "customer invoice not found by requisite number");
        Ok(None)
    }

    /// Position prices of a linked invoice, keyed `article:<a>` and
    /// `name:<n>`, in kopecks.
    async fn invoice_prices(
        &self,
        invoice: &InvoiceOutRow,
    ) -> Result<HashMap<String, i64>, ProvodkaError> {
        let mut rows = Vec::new();
        if let Some(block) = &invoice.positions {
            if !block.rows.is_empty() {
                rows = block.rows.clone();
            } else if let Some(meta) = &block.meta {
                let listed: Rows<PositionRow> = self.get_json(&meta.href, &[]).await?;
                rows = listed.rows;
            }
        }

        let mut prices = HashMap::new();
        for row in rows {
            let Some(assortment) = row.assortment else {
                continue;
            };
            let price = row.price.round() as i64;
            if let Some(article) = assortment.article.filter(|a| !a.is_empty()) {
                prices.insert(format!("article:{article}"), price);
            }
            if let Some(name) = assortment.name.filter(|n| !n.is_empty()) {
                prices.insert(format!("name:{name}"), price);
            }
        }
        debug!(count = prices.len(), "loaded position prices from the linked invoice");
        Ok(prices)
    }

    // -----------------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------------

    /// Resolve every item to a product and build document positions. Prices
    /// from the linked invoice override the document's own when present.
    async fn build_positions(
        &self,
        items: &[InvoiceItem],
        price_overrides: &HashMap<String, i64>,
        stats: &mut ProcessingStats,
    ) -> Result<Vec<PositionPayload>, ProvodkaError> {
        let mut positions = Vec::with_capacity(items.len());
        for item in items {
            let (product, created) = self
                .find_or_create_product(&item.name, item.article.as_deref())
                .await?;
            if created {
                stats.items_created += 1;
            } else {
                stats.items_matched += 1;
            }

            let override_price = item
                .article
                .as_deref()
                .and_then(|a| price_overrides.get(&format!("article:{a}")))
                .or_else(|| price_overrides.get(&format!("name:{}", item.name)))
                .copied()
                .filter(|p| *p > 0);
            let price = override_price.unwrap_or_else(|| kopecks(item.price));

            positions.push(PositionPayload {
                quantity: item.quantity.to_f64().unwrap_or(0.0),
                price,
                assortment: product.link(),
                vat: vat_rate_percent(item.vat_rate.as_deref()),
            });
        }
        Ok(positions)
    }

    // -----------------------------------------------------------------------
    // Document creation
    // -----------------------------------------------------------------------

    /// Create the отгрузка + счет-фактура pair for a УПД.
    ///
    /// Resolution order for the warehouse: the store of the customer invoice
    /// linked through the requisite number, then the product-group heuristic.
    /// Not transactional: entities created before a failing step persist.
    pub async fn create_upd_documents(
        &self,
        upd: &UpdDocument,
    ) -> Result<SyncOutcome, ProvodkaError> {
        let header = &upd.header;
        info!(number = %header.number, doc_flow = %upd.meta.doc_flow_id, "creating УПД documents");

        let organization = self
            .find_own_organization(&header.seller.inn)
            .await?
            .ok_or_else(|| {
                ProvodkaError::RemoteApi(format!(
                    "supplier organization with INN {} not found in MoySklad",
                    header.seller.inn
                ))
            })?;
        let counterparty = self.find_or_create_counterparty(&header.buyer).await?;

        let linked_invoice = match &header.requisite_number {
            Some(number) => self.find_customer_invoice(number).await?,
            None => None,
        };
        let price_overrides = match &linked_invoice {
            Some(invoice) => self.invoice_prices(invoice).await?,
            None => HashMap::new(),
        };

        let mut stats = ProcessingStats {
            items_processed: header.items.len(),
            ..Default::default()
        };
        let positions = self
            .build_positions(&header.items, &price_overrides, &mut stats)
            .await?;

        let (store, project) = match linked_invoice.as_ref().and_then(|i| i.store.as_ref()) {
            Some(store) => {
                info!(store = store.name.as_deref().unwrap_or("?"), "using store from the linked invoice");
                (
                    MetaRef { meta: store.meta.clone() },
                    linked_invoice
                        .as_ref()
                        .and_then(|i| i.project.as_ref())
                        .map(|p| MetaRef { meta: p.meta.clone() }),
                )
            }
            None => {
                let (store, project) = self.resolve_warehouse_and_project(&header.items).await?;
                (store.link(), Some(project.link()))
            }
        };

        let moment = moment(header.date);
        let demand: CreatedDocument = self
            .post_json(
                "entity/demand",
                &DemandPayload {
                    name: format!("О{}", header.number),
                    moment: moment.clone(),
                    organization: organization.link(),
                    agent: counterparty.link(),
                    store,
                    project,
                    vat_enabled: true,
                    vat_included: true,
                    invoices_out: linked_invoice
                        .as_ref()
                        .map(|i| vec![MetaRef { meta: i.meta.clone() }]),
                    positions: positions.clone(),
                },
            )
            .await?;
        info!(id = %demand.id, name = %demand.name, "demand created");

        let facture: CreatedDocument = self
            .post_json(
                "entity/factureout",
                &FactureOutPayload {
                    name: header.number.clone(),
                    moment,
                    organization: organization.link(),
                    agent: counterparty.link(),
                    vat_enabled: true,
                    vat_included: true,
                    demands: vec![MetaRef { meta: demand.meta.clone() }],
                    positions,
                },
            )
            .await?;
        info!(id = %facture.id, name = %facture.name, "facture created");

        Ok(SyncOutcome {
            document_url: facture_out_url(&facture.id),
            document_id: facture.id,
            document_name: facture.name,
            base_document_url: demand_url(&demand.id),
            base_document_id: demand.id,
            base_document_name: demand.name,
            stats,
        })
    }

    /// Create the заказ покупателя + счет покупателю pair for a customer
    /// invoice. Both documents carry the warehouse and project selected by
    /// the product-group heuristic.
    pub async fn create_customer_documents(
        &self,
        header: &DocumentHeader,
    ) -> Result<SyncOutcome, ProvodkaError> {
        info!(number = %header.number, "creating customer order and invoice");

        let organization = self.own_organization_for(&header.seller.inn).await?;
        let counterparty = self.find_or_create_counterparty(&header.buyer).await?;
        let (store, project) = self.resolve_warehouse_and_project(&header.items).await?;

        let mut stats = ProcessingStats {
            items_processed: header.items.len(),
            ..Default::default()
        };
        let positions = self
            .build_positions(&header.items, &HashMap::new(), &mut stats)
            .await?;

        let moment = moment(header.date);
        let order: CreatedDocument = self
            .post_json(
                "entity/customerorder",
                &CustomerOrderPayload {
                    name: header.number.clone(),
                    moment: moment.clone(),
                    organization: organization.link(),
                    agent: counterparty.link(),
                    store: store.link(),
                    project: project.link(),
                    vat_enabled: true,
                    vat_included: true,
                    positions: positions.clone(),
                },
            )
            .await?;
        info!(id = %order.id, name = %order.name, "customer order created");

        let invoice: CreatedDocument = self
            .post_json(
                "entity/invoiceout",
                &InvoiceOutPayload {
                    name: header.number.clone(),
                    moment,
                    organization: organization.link(),
                    agent: counterparty.link(),
                    store: store.link(),
                    project: project.link(),
                    customer_order: Some(MetaRef { meta: order.meta.clone() }),
                    positions,
                },
            )
            .await?;
        info!(id = %invoice.id, name = %invoice.name, "customer invoice created");

        Ok(SyncOutcome {
            document_url: invoice_out_url(&invoice.id),
            document_id: invoice.id,
            document_name: invoice.name,
            base_document_url: customer_order_url(&order.id),
            base_document_id: order.id,
            base_document_name: order.name,
            stats,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// MoySklad wants `YYYY-MM-DD HH:MM:SS.sss`.
fn moment(date: NaiveDate) -> String {
    format!("{} 00:00:00.000", date.format("%Y-%m-%d"))
}

/// Decimal rubles → integer kopecks.
fn kopecks(amount: Decimal) -> i64 {
    (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
}

fn excerpt(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}

const WEB_APP_URL: &str = "https://online.moysklad.ru/app";

pub fn facture_out_url(id: &str) -> String {
    format!("{WEB_APP_URL}/#factureout/edit?id={id}")
}

pub fn demand_url(id: &str) -> String {
    format!("{WEB_APP_URL}/#demand/edit?id={id}")
}

pub fn customer_order_url(id: &str) -> String {
    format!("{WEB_APP_URL}/#customerorder/edit?id={id}")
}

pub fn invoice_out_url(id: &str) -> String {
    format!("{WEB_APP_URL}/#invoiceout/edit?id={id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn moment_format() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(moment(date), "2024-02-01 00:00:00.000");
    }

    #[test]
    fn kopecks_rounding() {
        assert_eq!(kopecks(dec!(1234.56)), 123456);
        assert_eq!(kopecks(dec!(0.005)), 1);
        assert_eq!(kopecks(dec!(0)), 0);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let body = "ошибка ".repeat(100);
        let cut = excerpt(&body);
        assert!(cut.chars().count() <= 200);
    }

    #[test]
    fn web_urls() {
        assert_eq!(
            facture_out_url("abc"),
            "https://online.moysklad.ru/app/#factureout/edit?id=abc"
        );
        assert_eq!(
            demand_url("d1"),
            "https://online.moysklad.ru/app/#demand/edit?id=d1"
        );
        assert_eq!(
            customer_order_url("o1"),
            "https://online.moysklad.ru/app/#customerorder/edit?id=o1"
        );
        assert_eq!(
            invoice_out_url("i1"),
            "https://online.moysklad.ru/app/#invoiceout/edit?id=i1"
        );
    }

    #[test]
    fn client_builds_from_config() {
        let client = MoySkladClient::new(&Config::new("token")).unwrap();
        assert_eq!(
            client.url("entity/product"),
            "https://api.moysklad.ru/api/remap/1.2/entity/product"
        );
        // Absolute hrefs from meta objects pass through untouched.
        assert_eq!(client.url("https://x/y"), "https://x/y");
    }
}
