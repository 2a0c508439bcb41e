//! HTTP client for the exchange rate service.
//!
//! The service exposes two endpoints:
//!
//! - `GET {url}/rates` → `{"base": "USD", "rates": {"EUR": 0.9, ...}}`
//! - `GET {url}/rate?from=USD&to=EUR` → `{"from": "USD", "to": "EUR", "rate": 0.9}`
//!
//! Any failure is reported to the engine as
//! [`EngineError::RateUnavailable`].

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use engine::{Currency, EngineError, ExchangeRate, RateProvider, RateTable, ResultEngine};
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateClientError {
    #[error("invalid rate service url: {0}")]
    Url(String),
    #[error("rate service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rate service answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected rate service response: {0}")]
    Malformed(String),
}

impl From<RateClientError> for EngineError {
    fn from(err: RateClientError) -> Self {
        EngineError::RateUnavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RatesBody {
    base: String,
    rates: BTreeMap<String, Decimal>,
}

#[derive(Debug, Deserialize)]
struct RateBody {
    from: String,
    to: String,
    rate: Decimal,
}

/// [`RateProvider`] backed by the remote rate service.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpRateProvider {
    /// `timeout` bounds every request, connection included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RateClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|err| RateClientError::Url(err.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RateClientError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| RateClientError::Url(err.to_string()))?;

        let res = self.http.get(endpoint).query(query).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(RateClientError::Status { status, body });
        }
        res.json::<T>()
            .await
            .map_err(|err| RateClientError::Malformed(err.to_string()))
    }

    async fn fetch_rate(&self, from: Currency, to: Currency) -> Result<RateBody, RateClientError> {
        let body: RateBody = self
            .get("rate", &[("from", from.code()), ("to", to.code())])
            .await?;
        if !body.from.eq_ignore_ascii_case(from.code()) || !body.to.eq_ignore_ascii_case(to.code())
        {
            return Err(RateClientError::Malformed(format!(
                "asked for {from}->{to}, got {}->{}",
                body.from, body.to
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn rate(&self, from: Currency, to: Currency) -> ResultEngine<ExchangeRate> {
        let body = self.fetch_rate(from, to).await.inspect_err(|err| {
            tracing::warn!(%from, %to, %err, "rate lookup failed");
        })?;
        ExchangeRate::new(from, to, body.rate)
    }

    async fn all_rates(&self) -> ResultEngine<RateTable> {
        let body: RatesBody = self.get("rates", &[]).await.inspect_err(|err| {
            tracing::warn!(%err, "rate table lookup failed");
        })?;

        let base = Currency::try_from(body.base.as_str()).map_err(|_| {
            RateClientError::Malformed(format!("unsupported base currency {}", body.base))
        })?;
        let mut rates = Vec::with_capacity(body.rates.len());
        for (code, rate) in body.rates {
            match Currency::try_from(code.as_str()) {
                Ok(currency) => rates.push((currency, rate)),
                Err(_) => tracing::debug!(code, "skipping unsupported currency"),
            }
        }
        RateTable::new(base, rates)
    }
}
