//! HTTP client for the Omie JSON-RPC API.
//!
//! Every call is a `POST` of `{call, app_key, app_secret, param: [..]}` to an
//! endpoint under the configured base URL. Credentials are per store. An
//! "empty page" fault is reported by the API as an HTTP error; it is mapped to
//! an empty page here so callers only see real failures.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use stockledger_core::{Quantity, StoreCode};
use stockledger_inventory::MovementEvent;

use super::{FeedError, MovementFeed, MovementPage, SnapshotEntry, SnapshotFeed, SnapshotPage};
use crate::config::{FeedConfig, StoreConfig};

const MOVEMENTS_ENDPOINT: &str = "estoque/movimentos/";
const POSITION_ENDPOINT: &str = "estoque/consulta/";

/// Fault code the API returns when a listing has no records.
const NO_RECORDS_FAULT: &str = "5113";

#[derive(Debug, Clone)]
struct Credentials {
    app_key: String,
    app_secret: String,
    location: i64,
}

/// Omie-backed [`MovementFeed`] and [`SnapshotFeed`].
#[derive(Debug, Clone)]
pub struct OmieClient {
    http: reqwest::Client,
    base_url: String,
    credentials: HashMap<StoreCode, Credentials>,
}

impl OmieClient {
    pub fn new(feed: &FeedConfig, stores: &[StoreConfig]) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(feed.timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let credentials = stores
            .iter()
            .filter_map(|s| match (&s.app_key, &s.app_secret) {
                (Some(key), Some(secret)) => Some((
                    s.code.clone(),
                    Credentials {
                        app_key: key.clone(),
                        app_secret: secret.clone(),
                        location: s.location,
                    },
                )),
                _ => None,
            })
            .collect();

        Ok(Self {
            http,
            base_url: feed.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn credentials(&self, store: &StoreCode) -> Result<&Credentials, FeedError> {
        self.credentials
            .get(store)
            .ok_or_else(|| FeedError::MissingCredentials(store.clone()))
    }

    /// Issue one RPC call. `Ok(None)` means the API reported "no records".
    async fn call<P, R>(
        &self,
        store: &StoreCode,
        endpoint: &str,
        call: &str,
        param: P,
    ) -> Result<Option<R>, FeedError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let creds = self.credentials(store)?;
        let url = format!("{}/{}", self.base_url, endpoint);
        let request = RpcRequest {
            call,
            app_key: &creds.app_key,
            app_secret: &creds.app_secret,
            param: [param],
        };

        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if let Some(fault) = parse_fault(&body) {
            if fault.is_no_records() {
                return Ok(None);
            }
            return Err(FeedError::Fault {
                code: fault.faultcode,
                message: fault.faultstring,
            });
        }

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl MovementFeed for OmieClient {
    async fn fetch_movements(
        &self,
        store: &StoreCode,
        day: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<MovementPage, FeedError> {
        let location = self.credentials(store)?.location;
        let param = movements_request(day, page, page_size, location);

        let response: Option<MovementsResponse> = self
            .call(store, MOVEMENTS_ENDPOINT, "ListarMovimentos", param)
            .await?;

        match response {
            Some(r) => Ok(map_movement_page(store, r)),
            None => Ok(MovementPage {
                page,
                total_pages: 0,
                events: Vec::new(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotFeed for OmieClient {
    async fn fetch_snapshot(
        &self,
        store: &StoreCode,
        position_date: NaiveDate,
        page: u32,
        page_size: u32,
    ) -> Result<SnapshotPage, FeedError> {
        let location = self.credentials(store)?.location;
        let param = position_request(position_date, page, page_size, location);

        let response: Option<PositionResponse> = self
            .call(store, POSITION_ENDPOINT, "ListarPosEstoque", param)
            .await?;

        match response {
            Some(r) => Ok(map_snapshot_page(store, r)),
            None => Ok(SnapshotPage {
                page,
                total_pages: 0,
                entries: Vec::new(),
            }),
        }
    }
}

// ---- wire types ----

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    call: &'a str,
    app_key: &'a str,
    app_secret: &'a str,
    param: [P; 1],
}

#[derive(Debug, Deserialize)]
struct Fault {
    faultstring: String,
    faultcode: String,
}

impl Fault {
    fn is_no_records(&self) -> bool {
        self.faultcode.ends_with(NO_RECORDS_FAULT) || self.faultstring.contains("Não existem registros")
    }
}

fn parse_fault(body: &str) -> Option<Fault> {
    serde_json::from_str::<Fault>(body).ok()
}

#[derive(Debug, Serialize, PartialEq)]
struct MovementsRequest {
    pagina: u32,
    registros_por_pagina: u32,
    data_inicial: String,
    data_final: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    codigo_local_estoque: Option<i64>,
}

fn movements_request(day: NaiveDate, page: u32, page_size: u32, location: i64) -> MovementsRequest {
    let date = format_date(day);
    MovementsRequest {
        pagina: page,
        registros_por_pagina: page_size,
        data_inicial: date.clone(),
        data_final: date,
        codigo_local_estoque: (location != 0).then_some(location),
    }
}

#[derive(Debug, Deserialize)]
struct MovementsResponse {
    #[serde(default)]
    pagina: u32,
    #[serde(default)]
    total_de_paginas: u32,
    #[serde(default)]
    cadastros: Vec<ProductMovements>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ProductMovements {
    #[serde(default)]
    cCodigo: String,
    #[serde(default)]
    movimentos: Vec<Movement>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Movement {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    cCodProd: Option<String>,
    #[serde(default)]
    dDataMovimento: String,
    #[serde(default)]
    nQtdeEntradas: Option<f64>,
    #[serde(default)]
    nQtdeSaidas: Option<f64>,
}

/// Records with an unrepresentable quantity are logged and left out; the
/// rest of the page still maps.
fn map_movement_page(store: &StoreCode, resp: MovementsResponse) -> MovementPage {
    let mut events = Vec::new();

    for product in resp.cadastros {
        for m in product.movimentos {
            let item_code = if product.cCodigo.is_empty() {
                m.cCodProd.clone().unwrap_or_default()
            } else {
                product.cCodigo.clone()
            };

            let quantities = decimal(m.nQtdeEntradas).and_then(|qin| decimal(m.nQtdeSaidas).map(|qout| (qin, qout)));
            let (quantity_in, quantity_out) = match quantities {
                Ok(q) => q,
                Err(e) => {
                    tracing::warn!(%store, %item_code, movement_id = ?m.id, error = %e, "discarding movement with bad quantity");
                    continue;
                }
            };

            events.push(MovementEvent {
                movement_id: m.id.map(|id| id.to_string()),
                item_code,
                store: store.clone(),
                raw_date: m.dDataMovimento,
                quantity_in,
                quantity_out,
            });
        }
    }

    MovementPage {
        page: resp.pagina,
        total_pages: resp.total_de_paginas,
        events,
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[allow(non_snake_case)]
struct PositionRequest {
    nPagina: u32,
    nRegPorPagina: u32,
    dDataPosicao: String,
    cExibeTodos: &'static str,
    codigo_local_estoque: i64,
}

fn position_request(date: NaiveDate, page: u32, page_size: u32, location: i64) -> PositionRequest {
    PositionRequest {
        nPagina: page,
        nRegPorPagina: page_size,
        dDataPosicao: format_date(date),
        cExibeTodos: "N",
        codigo_local_estoque: location,
    }
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PositionResponse {
    #[serde(default)]
    nPagina: u32,
    #[serde(default)]
    nTotPaginas: u32,
    #[serde(default)]
    produtos: Vec<Position>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct Position {
    cCodigo: String,
    #[serde(default)]
    nSaldo: f64,
}

fn map_snapshot_page(store: &StoreCode, resp: PositionResponse) -> SnapshotPage {
    let entries = resp
        .produtos
        .into_iter()
        .filter_map(|p| match decimal(Some(p.nSaldo)) {
            Ok(quantity) => Some(SnapshotEntry {
                item_code: p.cCodigo,
                quantity,
            }),
            Err(e) => {
                tracing::warn!(%store, item_code = %p.cCodigo, error = %e, "discarding position with bad quantity");
                None
            }
        })
        .collect();

    SnapshotPage {
        page: resp.nPagina,
        total_pages: resp.nTotPaginas,
        entries,
    }
}

fn decimal(value: Option<f64>) -> Result<Quantity, FeedError> {
    match value {
        Some(v) => Quantity::from_decimal(v).map_err(|e| FeedError::Decode(e.to_string())),
        None => Ok(Quantity::ZERO),
    }
}

/// Dates travel as `DD/MM/YYYY`.
fn format_date(day: NaiveDate) -> String {
    day.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> StoreCode {
        StoreCode::new("VITORIA").unwrap()
    }

    #[test]
    fn movement_request_uses_a_single_day_window() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let value = serde_json::to_value(movements_request(day, 2, 1000, 0)).unwrap();

        assert_eq!(
            value,
            json!({
                "pagina": 2,
                "registros_por_pagina": 1000,
                "data_inicial": "07/03/2025",
                "data_final": "07/03/2025",
            })
        );

        let with_location = serde_json::to_value(movements_request(day, 1, 10, 4)).unwrap();
        assert_eq!(with_location["codigo_local_estoque"], json!(4));
    }

    #[test]
    fn movement_response_flattens_products_into_events() {
        let body = json!({
            "pagina": 1,
            "total_de_paginas": 3,
            "registros": 2,
            "cadastros": [{
                "nCodProd": 991,
                "cCodigo": "TEC-001",
                "cDescricao": "Tecido",
                "movimentos": [
                    { "id": 11, "cLocal": "1", "dDataMovimento": "07/03/2025", "nQtdeEntradas": 10.5 },
                    { "id": 12, "dDataMovimento": "07/03/2025", "nQtdeSaidas": 2.25 }
                ]
            }]
        });
        let resp: MovementsResponse = serde_json::from_value(body).unwrap();

        let page = map_movement_page(&store(), resp);

        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[0].item_code, "TEC-001");
        assert_eq!(page.events[0].movement_id.as_deref(), Some("11"));
        assert_eq!(page.events[0].net(), Quantity::from_hundredths(1050));
        assert_eq!(page.events[1].net(), Quantity::from_hundredths(-225));
        assert_eq!(page.events[1].store, store());
    }

    #[test]
    fn movement_with_unrepresentable_quantity_is_dropped_alone() {
        let resp: MovementsResponse = serde_json::from_value(json!({
            "pagina": 1,
            "total_de_paginas": 1,
            "cadastros": [{
                "cCodigo": "TEC-001",
                "movimentos": [
                    { "id": 1, "dDataMovimento": "07/03/2025", "nQtdeEntradas": 3.0 },
                    { "id": 2, "dDataMovimento": "07/03/2025", "nQtdeEntradas": 1.0e20 },
                    { "id": 3, "dDataMovimento": "07/03/2025", "nQtdeSaidas": 1.0 }
                ]
            }]
        }))
        .unwrap();

        let page = map_movement_page(&store(), resp);

        let ids: Vec<_> = page.events.iter().filter_map(|e| e.movement_id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(page.events[1].net(), Quantity::from_units(-1));
    }

    #[test]
    fn position_with_unrepresentable_quantity_is_dropped_alone() {
        let resp: PositionResponse = serde_json::from_value(json!({
            "nPagina": 1,
            "nTotPaginas": 1,
            "produtos": [
                { "nCodProd": 1, "cCodigo": "A1", "nSaldo": -1.0e19 },
                { "nCodProd": 2, "cCodigo": "B2", "nSaldo": 4.0 }
            ]
        }))
        .unwrap();

        let page = map_snapshot_page(&store(), resp);

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].item_code, "B2");
    }

    #[test]
    fn position_request_and_response_map_to_snapshot() {
        let day = NaiveDate::from_ymd_opt(2025, 2, 25).unwrap();
        let value = serde_json::to_value(position_request(day, 1, 500, 0)).unwrap();
        assert_eq!(value["dDataPosicao"], json!("25/02/2025"));
        assert_eq!(value["cExibeTodos"], json!("N"));

        let resp: PositionResponse = serde_json::from_value(json!({
            "nPagina": 1,
            "nTotPaginas": 1,
            "produtos": [
                { "nCodProd": 1, "cCodigo": "A1", "nSaldo": 40.0 },
                { "nCodProd": 2, "cCodigo": "B2", "nSaldo": -1.5 }
            ]
        }))
        .unwrap();

        let page = map_snapshot_page(&store(), resp);
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[1].quantity, Quantity::from_hundredths(-150));
    }

    #[test]
    fn no_records_fault_is_recognised() {
        let body = r#"{"faultstring":"ERROR: Não existem registros para a página [1]!","faultcode":"SOAP-ENV:Client-5113"}"#;
        let fault = parse_fault(body).unwrap();
        assert!(fault.is_no_records());

        let other = parse_fault(r#"{"faultstring":"Chave inválida","faultcode":"SOAP-ENV:Client-101"}"#).unwrap();
        assert!(!other.is_no_records());

        assert!(parse_fault(r#"{"pagina":1}"#).is_none());
    }

    #[tokio::test]
    async fn stores_without_credentials_are_rejected_before_any_request() {
        let feed = FeedConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: std::time::Duration::from_secs(1),
            movement_page_size: 10,
            snapshot_page_size: 10,
        };
        let stores = vec![StoreConfig {
            code: store(),
            app_key: None,
            app_secret: None,
            location: 0,
        }];
        let client = OmieClient::new(&feed, &stores).unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();

        let err = client.fetch_movements(&store(), day, 1, 10).await.unwrap_err();
        assert!(matches!(err, FeedError::MissingCredentials(_)));
    }
}
