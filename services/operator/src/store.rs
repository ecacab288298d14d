//! Cluster object access for the reconciliation loop.
//!
//! The loop reads and writes cluster state only through the [`ObjectStore`]
//! trait, so tests can drive it against a mock while production uses the
//! API server via [`KubeStore`]. Not-found is part of the contract: every
//! lookup returns `Ok(None)` for a missing object, and only transport or
//! API-server failures surface as errors.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use scanward_api::{ScanRequest, ScanRequestStatus};

#[cfg(test)]
use mockall::automock;

use crate::error::Error;

/// Field manager recorded on writes made by this operator.
pub const FIELD_MANAGER: &str = "scanward-operator";

/// The object-store collaborator surface consumed by the loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error>;

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<(), Error>;

    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<Option<CronJob>, Error>;

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob) -> Result<(), Error>;

    async fn update_cron_job(&self, namespace: &str, cron_job: &CronJob) -> Result<(), Error>;

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error>;

    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap)
        -> Result<(), Error>;

    async fn update_config_map(&self, namespace: &str, config_map: &ConfigMap)
        -> Result<(), Error>;

    /// Pods belonging to a run-once workload, located by the `job-name`
    /// label the workload executor stamps on them.
    async fn list_job_pods(&self, namespace: &str, job_name: &str) -> Result<Vec<Pod>, Error>;

    /// Raw text output of an execution unit.
    async fn pod_logs(&self, namespace: &str, pod_name: &str) -> Result<String, Error>;

    /// Write scan-request status through the status subresource.
    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ScanRequestStatus,
    ) -> Result<(), Error>;
}

/// API-server-backed implementation.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn cron_jobs(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map the API server's 404 onto the not-found half of the contract.
fn ok_or_not_found<T>(result: Result<T, kube::Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(object) => Ok(Some(object)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>, Error> {
        ok_or_not_found(self.jobs(namespace).get(name).await)
    }

    async fn create_job(&self, namespace: &str, job: &Job) -> Result<(), Error> {
        self.jobs(namespace)
            .create(&PostParams::default(), job)
            .await?;
        Ok(())
    }

    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<Option<CronJob>, Error> {
        ok_or_not_found(self.cron_jobs(namespace).get(name).await)
    }

    async fn create_cron_job(&self, namespace: &str, cron_job: &CronJob) -> Result<(), Error> {
        self.cron_jobs(namespace)
            .create(&PostParams::default(), cron_job)
            .await?;
        Ok(())
    }

    async fn update_cron_job(&self, namespace: &str, cron_job: &CronJob) -> Result<(), Error> {
        self.cron_jobs(namespace)
            .replace(&cron_job.name_any(), &PostParams::default(), cron_job)
            .await?;
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        ok_or_not_found(self.config_maps(namespace).get(name).await)
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        self.config_maps(namespace)
            .create(&PostParams::default(), config_map)
            .await?;
        Ok(())
    }

    async fn update_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        self.config_maps(namespace)
            .replace(&config_map.name_any(), &PostParams::default(), config_map)
            .await?;
        Ok(())
    }

    async fn list_job_pods(&self, namespace: &str, job_name: &str) -> Result<Vec<Pod>, Error> {
        let params = ListParams::default().labels(&format!("job-name={job_name}"));
        let pods = self.pods(namespace).list(&params).await?;
        Ok(pods.items)
    }

    async fn pod_logs(&self, namespace: &str, pod_name: &str) -> Result<String, Error> {
        let logs = self
            .pods(namespace)
            .logs(pod_name, &LogParams::default())
            .await?;
        Ok(logs)
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ScanRequestStatus,
    ) -> Result<(), Error> {
        let api: Api<ScanRequest> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
