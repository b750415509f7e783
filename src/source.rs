use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{DecodeError, FetchError, FetchErrorKind, PollError, WriteThroughError};
use crate::types::{
    Entity, EntityOperation, FlagId, FlagPayload, FlagWriteRequest, FlagWriteResponse, ListId,
    ListPayload, MutateRequest, MutateResponse, Resource, VersionedSnapshot,
};

/// Decoded body of one polled resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Flag(bool),
    List(Vec<Entity>),
}

/// The remote worker service as the reconciliation core sees it.
///
/// Implementations never touch console state; they only hand data back.
pub trait StateSource: Send + Sync + 'static {
    /// Connectivity probe used once during bootstrap.
    fn probe(&self) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// At most one outstanding fetch per resource; a second concurrent call
    /// fails with `FetchErrorKind::InFlight`.
    fn fetch(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<VersionedSnapshot<Payload>, PollError>> + Send;

    /// Write a flag. `Ok` carries the service's `appliedValue`, if any.
    fn write_flag(
        &self,
        flag: &FlagId,
        value: bool,
    ) -> impl Future<Output = Result<Option<bool>, WriteThroughError>> + Send;

    /// Fire-and-forget entity action. Success means "accepted", nothing more.
    fn mutate_entity(
        &self,
        list: &ListId,
        key: &str,
        operation: EntityOperation,
    ) -> impl Future<Output = Result<(), WriteThroughError>> + Send;
}

/// Tracks which resources have a fetch outstanding.
#[derive(Debug, Default)]
pub struct InFlight {
    resources: Mutex<HashSet<Resource>>,
}

impl InFlight {
    pub fn try_begin(&self, resource: &Resource) -> Option<InFlightGuard<'_>> {
        let mut set = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(resource.clone()) {
            return None;
        }
        Some(InFlightGuard { owner: self, resource: resource.clone() })
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    resource: Resource,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.resource);
    }
}

/// `StateSource` over the service's REST interface.
pub struct RemoteStateSource {
    http: reqwest::Client,
    base_url: String,
    in_flight: InFlight,
}

impl RemoteStateSource {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            in_flight: InFlight::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &Resource) -> Result<T, PollError> {
        let url = self.url(&resource.path());
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(resource.clone(), &e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(resource.clone(), &e))?;

        if !status.is_success() {
            return Err(FetchError {
                resource: resource.clone(),
                kind: FetchErrorKind::Status(status.as_u16()),
                detail: body,
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|e| {
            DecodeError { resource: resource.clone(), detail: e.to_string() }.into()
        })
    }
}

impl StateSource for RemoteStateSource {
    async fn probe(&self) -> Result<(), FetchError> {
        let probe = Resource::Health;
        let resp = self
            .http
            .get(self.url(&probe.path()))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(probe.clone(), &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError {
                resource: probe,
                kind: FetchErrorKind::Status(status.as_u16()),
                detail: format!("health check returned {status}"),
            });
        }
        Ok(())
    }

    async fn fetch(&self, resource: &Resource) -> Result<VersionedSnapshot<Payload>, PollError> {
        let Some(_guard) = self.in_flight.try_begin(resource) else {
            return Err(FetchError {
                resource: resource.clone(),
                kind: FetchErrorKind::InFlight,
                detail: "previous fetch still outstanding".into(),
            }
            .into());
        };

        match resource {
            Resource::Flag(_) => {
                let p: FlagPayload = self.get_json(resource).await?;
                Ok(VersionedSnapshot { data: Payload::Flag(p.value), version: p.version })
            }
            Resource::List(_) => {
                let p: ListPayload = self.get_json(resource).await?;
                Ok(VersionedSnapshot { data: Payload::List(p.entities), version: p.version })
            }
            Resource::Health => {
                self.probe().await?;
                Ok(VersionedSnapshot { data: Payload::Flag(true), version: None })
            }
        }
    }

    async fn write_flag(&self, flag: &FlagId, value: bool) -> Result<Option<bool>, WriteThroughError> {
        let target = format!("flag {flag}");
        let url = self.url(&Resource::Flag(flag.clone()).path());

        let resp = self
            .http
            .post(&url)
            .json(&FlagWriteRequest { value })
            .send()
            .await
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?
            .error_for_status()
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?;

        let ack: FlagWriteResponse = resp
            .json()
            .await
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?;

        if !ack.success {
            return Err(WriteThroughError::rejected(target, ack.error));
        }
        if ack.applied_value.is_some_and(|applied| applied != value) {
            tracing::warn!(%flag, value, applied = ?ack.applied_value, "service applied a different value");
        }
        Ok(ack.applied_value)
    }

    async fn mutate_entity(
        &self,
        list: &ListId,
        key: &str,
        operation: EntityOperation,
    ) -> Result<(), WriteThroughError> {
        let target = format!("{operation} {key}");
        let url = self.url(&format!("{}/mutate", Resource::List(list.clone()).path()));

        let resp = self
            .http
            .post(&url)
            .json(&MutateRequest { key, operation })
            .send()
            .await
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?
            .error_for_status()
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?;

        let ack: MutateResponse = resp
            .json()
            .await
            .map_err(|e| WriteThroughError::from_reqwest(target.clone(), &e))?;

        if !ack.success {
            return Err(WriteThroughError::rejected(target, ack.error));
        }
        Ok(())
    }
}
