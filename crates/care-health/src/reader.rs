//! Read access to the resources the health checks inspect
//!
//! Control-plane components live in a namespace of the hosting (seed)
//! cluster; nodes, webhooks and `/healthz` belong to the managed cluster
//! itself. [`ResourceReaderImpl`] therefore wraps two clients.

use async_trait::async_trait;
use http::Request;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::client::Body;
use kube::Client;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use care_common::crd::{Etcd, Machine, MachineDeployment, ManagedResource, Worker};
use care_common::Error;

/// Path probed to decide whether the API server is available
pub const HEALTHZ_PATH: &str = "/healthz";

/// Trait abstracting the resource listing the health checks depend on
///
/// Every call is a single list or get; nothing is retried. Dropping the
/// returned future cancels the request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// List deployments in the control-plane namespace matching a label selector
    async fn list_deployments(&self, namespace: &str, selector: &str)
        -> Result<Vec<Deployment>, Error>;

    /// List stateful sets in the control-plane namespace matching a label selector
    async fn list_stateful_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<StatefulSet>, Error>;

    /// List etcd clusters in the control-plane namespace
    async fn list_etcds(&self, namespace: &str) -> Result<Vec<Etcd>, Error>;

    /// List worker extension resources in the control-plane namespace
    async fn list_workers(&self, namespace: &str) -> Result<Vec<Worker>, Error>;

    /// List machines in the control-plane namespace
    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, Error>;

    /// List machine deployments in the control-plane namespace
    async fn list_machine_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineDeployment>, Error>;

    /// List managed resources in the control-plane namespace
    async fn list_managed_resources(&self, namespace: &str)
        -> Result<Vec<ManagedResource>, Error>;

    /// List the nodes of the managed cluster
    async fn list_nodes(&self) -> Result<Vec<Node>, Error>;

    /// List validating webhook configurations of the managed cluster
    async fn list_validating_webhook_configurations(
        &self,
    ) -> Result<Vec<ValidatingWebhookConfiguration>, Error>;

    /// List mutating webhook configurations of the managed cluster
    async fn list_mutating_webhook_configurations(
        &self,
    ) -> Result<Vec<MutatingWebhookConfiguration>, Error>;

    /// Probe the managed cluster's API server and return the HTTP status code
    async fn api_server_healthz(&self) -> Result<u16, Error>;
}

/// Real implementation backed by kube clients
pub struct ResourceReaderImpl {
    /// Client of the cluster hosting the control plane
    seed: Client,
    /// Client of the managed cluster
    shoot: Client,
}

impl ResourceReaderImpl {
    /// Create a reader from the hosting cluster's and the managed cluster's clients
    pub fn new(seed: Client, shoot: Client) -> Self {
        Self { seed, shoot }
    }

    async fn list_namespaced<K>(
        &self,
        namespace: &str,
        params: &ListParams,
    ) -> Result<Vec<K>, Error>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.seed.clone(), namespace);
        Ok(api.list(params).await?.items)
    }

    async fn list_shoot<K>(&self) -> Result<Vec<K>, Error>
    where
        K: kube::Resource<Scope = k8s_openapi::ClusterResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.shoot.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

#[async_trait]
impl ResourceReader for ResourceReaderImpl {
    async fn list_deployments(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Deployment>, Error> {
        self.list_namespaced(namespace, &ListParams::default().labels(selector))
            .await
    }

    async fn list_stateful_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<StatefulSet>, Error> {
        self.list_namespaced(namespace, &ListParams::default().labels(selector))
            .await
    }

    async fn list_etcds(&self, namespace: &str) -> Result<Vec<Etcd>, Error> {
        self.list_namespaced(namespace, &ListParams::default()).await
    }

    async fn list_workers(&self, namespace: &str) -> Result<Vec<Worker>, Error> {
        self.list_namespaced(namespace, &ListParams::default()).await
    }

    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, Error> {
        self.list_namespaced(namespace, &ListParams::default()).await
    }

    async fn list_machine_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<MachineDeployment>, Error> {
        self.list_namespaced(namespace, &ListParams::default()).await
    }

    async fn list_managed_resources(
        &self,
        namespace: &str,
    ) -> Result<Vec<ManagedResource>, Error> {
        self.list_namespaced(namespace, &ListParams::default()).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        self.list_shoot().await
    }

    async fn list_validating_webhook_configurations(
        &self,
    ) -> Result<Vec<ValidatingWebhookConfiguration>, Error> {
        self.list_shoot().await
    }

    async fn list_mutating_webhook_configurations(
        &self,
    ) -> Result<Vec<MutatingWebhookConfiguration>, Error> {
        self.list_shoot().await
    }

    #[instrument(skip(self))]
    async fn api_server_healthz(&self) -> Result<u16, Error> {
        let request = Request::get(HEALTHZ_PATH)
            .body(Body::from(Vec::new()))
            .map_err(|e| Error::internal_with_context("healthz", e.to_string()))?;

        let response = self.shoot.send(request).await?;
        let status = response.status().as_u16();
        debug!(status, "API server health probe finished");
        Ok(status)
    }
}
