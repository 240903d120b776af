//! Hosted backend: a thin JSON client over the relational API.
//!
//! Every operation is one network round trip; multi-row writes (scenario
//! replace) are a single request the server executes in one transaction.
//! The adapter never retries — retry and timeout policy belong to the
//! caller.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;

use crate::dates::DATE_FMT;
use crate::error::{GuardrailsError, Result};
use crate::storage::{
    validate_settings, ActualsSnapshot, PlanSnapshot, Settings, StorageAdapter, UploadMeta,
};
use crate::PlanPoint;

pub struct RemoteStore {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavePlanBody<'a> {
    series: &'a [PlanPoint],
    replace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a UploadMeta>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavePlansBody<'a> {
    plans: &'a BTreeMap<String, Vec<PlanPoint>>,
    replace_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a UploadMeta>,
}

#[derive(Serialize)]
struct ActualBody {
    date: String,
    value: f64,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Surface non-success statuses as explicit errors instead of decoding
    /// whatever body came back.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GuardrailsError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl StorageAdapter for RemoteStore {
    async fn get_plan(&self, scenario: Option<&str>) -> Result<PlanSnapshot> {
        let mut req = self.client.get(self.url("/api/plan"));
        if let Some(s) = scenario {
            req = req.query(&[("scenario", s)]);
        }
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn save_plan(&self, series: &[PlanPoint], meta: Option<UploadMeta>) -> Result<()> {
        let body = SavePlanBody {
            series,
            replace: true,
            meta: meta.as_ref(),
        };
        let resp = self.client.post(self.url("/api/plan")).json(&body).send().await?;
        Self::check(resp).await?;
        debug!("saved {} plan point(s) remotely", series.len());
        Ok(())
    }

    async fn save_plans(
        &self,
        plans: &BTreeMap<String, Vec<PlanPoint>>,
        replace_all: bool,
        meta: Option<UploadMeta>,
    ) -> Result<()> {
        let body = SavePlansBody {
            plans,
            replace_all,
            meta: meta.as_ref(),
        };
        let resp = self.client.post(self.url("/api/plans")).json(&body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_actuals(&self) -> Result<ActualsSnapshot> {
        let resp = Self::check(self.client.get(self.url("/api/actuals")).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn upsert_actual(&self, date: NaiveDate, value: f64) -> Result<()> {
        let body = ActualBody {
            date: date.format(DATE_FMT).to_string(),
            value,
        };
        let resp = self.client.post(self.url("/api/actuals")).json(&body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update_actual(&self, date: NaiveDate, value: f64) -> Result<()> {
        let body = ActualBody {
            date: date.format(DATE_FMT).to_string(),
            value,
        };
        let resp = self.client.put(self.url("/api/actuals")).json(&body).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GuardrailsError::ActualNotFound(date));
        }
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete_actual(&self, date: NaiveDate) -> Result<()> {
        let resp = self
            .client
            .delete(self.url("/api/actuals"))
            .query(&[("date", date.format(DATE_FMT).to_string())])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings> {
        let resp = Self::check(self.client.get(self.url("/api/settings")).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn save_settings(&self, lower_pct: f64, upper_pct: f64) -> Result<()> {
        // Validate client-side so both backends reject identical input.
        let settings = validate_settings(lower_pct, upper_pct)?;
        let resp = self
            .client
            .post(self.url("/api/settings"))
            .json(&settings)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_scenarios(&self) -> Result<Vec<String>> {
        let resp = Self::check(self.client.get(self.url("/api/scenarios")).send().await?).await?;
        Ok(resp.json().await?)
    }
}
