use std::{path::PathBuf, time::Duration};

use k8s_openapi::serde_json::{self, Value};
use kube::{
    api::{Api, ApiResource, DynamicObject, ListParams, ResourceExt},
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tokio::{runtime::Runtime, time::timeout};
use tracing::{debug, info};

use super::{DataSource, ListScope};
use crate::error::SourceError;

const PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Live cluster access. Blocks the calling thread on a private
/// current-thread runtime for every call, keeping the pipeline sequential.
pub struct KubeSource {
    client: Client,
    runtime: Runtime,
    cluster: String,
    timeout: Duration,
}

impl KubeSource {
    #[tracing::instrument(skip_all, fields(context = ?opts.context))]
    pub fn connect(opts: &ConnectOptions) -> Result<Self, SourceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SourceError::Config(format!("failed to create runtime: {e}")))?;

        let (config, cluster) = runtime.block_on(load_config(opts))?;
        let client = Client::try_from(config)?;

        let version = runtime
            .block_on(timeout(opts.timeout, client.apiserver_version()))
            .map_err(|_| SourceError::Timeout(opts.timeout.as_secs()))??;
        info!(%cluster, server = %version.git_version, "connected to cluster");

        Ok(Self {
            client,
            runtime,
            cluster,
            timeout: opts.timeout,
        })
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

impl DataSource for KubeSource {
    fn cluster_name(&self) -> &str {
        &self.cluster
    }

    #[tracing::instrument(skip(self, resource), fields(kind = %resource.kind))]
    fn list(&self, resource: &ApiResource, scope: &ListScope) -> Result<Vec<Value>, SourceError> {
        let api = self.api(resource, scope.namespace.as_deref());
        let mut params = ListParams::default().limit(PAGE_SIZE);
        if let Some(selector) = &scope.field_selector {
            params = params.fields(selector);
        }

        let mut items = Vec::new();
        loop {
            let page = self
                .runtime
                .block_on(timeout(self.timeout, api.list(&params)))
                .map_err(|_| SourceError::Timeout(self.timeout.as_secs()))?
                .map_err(|err| not_served(err, &resource.kind))?;

            for mut obj in page.items {
                obj.managed_fields_mut().clear();
                items.push(serde_json::to_value(obj)?);
            }

            match page.metadata.continue_.filter(|token| !token.is_empty()) {
                Some(token) => params = params.continue_token(&token),
                None => break,
            }
        }

        debug!(count = items.len(), "listed objects");
        Ok(items)
    }
}

/// A 404 on a list call means the API group or kind is not installed.
fn not_served(err: kube::Error, kind: &str) -> SourceError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => SourceError::NotServed {
            kind: kind.to_string(),
        },
        err => SourceError::Api(err),
    }
}

/// Explicit kubeconfig/context first, then the default kubeconfig, then the
/// in-cluster service account. Returns the config and the cluster identifier.
async fn load_config(opts: &ConnectOptions) -> Result<(Config, String), SourceError> {
    let kubeconfig = match &opts.kubeconfig {
        Some(path) => Kubeconfig::read_from(path),
        None => Kubeconfig::read(),
    };

    let kubeconfig = match kubeconfig {
        Ok(kubeconfig) => kubeconfig,
        Err(err) if opts.kubeconfig.is_some() => {
            return Err(SourceError::Config(err.to_string()));
        }
        Err(err) => {
            debug!(error = %err, "no kubeconfig, trying in-cluster config");
            let config = Config::incluster().map_err(|e| {
                SourceError::Config(format!("failed to load in-cluster configuration: {e}"))
            })?;
            let cluster = config.cluster_url.to_string();
            return Ok((config, cluster));
        }
    };

    let context_name = opts
        .context
        .clone()
        .or_else(|| kubeconfig.current_context.clone())
        .ok_or_else(|| SourceError::Config("no current context in kubeconfig".into()))?;
    let cluster = kubeconfig
        .contexts
        .iter()
        .find(|named| named.name == context_name)
        .and_then(|named| named.context.as_ref())
        .map(|ctx| ctx.cluster.clone())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SourceError::Config(format!("cluster name not found in context '{context_name}'"))
        })?;

    let options = KubeConfigOptions {
        context: Some(context_name),
        cluster: None,
        user: None,
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| SourceError::Config(e.to_string()))?;

    Ok((config, cluster))
}
