use jiff::Timestamp;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, ServiceAccount};

use super::{name, namespace, Collector};
use crate::{
    error::CollectError,
    utils::{age, bracketed, join_map, opt, or_sentinel},
};

#[derive(Debug, Clone, Copy)]
pub struct ConfigMapCollector;

impl Collector for ConfigMapCollector {
    type Resource = ConfigMap;
    type Context = ();
    const KIND: &'static str = "configmap";

    fn columns(&self) -> &'static [&'static str] {
        &["CONFIGMAP NAME", "NAMESPACE", "DATA ITEMS", "AGE", "LABELS"]
    }

    fn build_row(&self, cm: &ConfigMap, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let items = cm.data.as_ref().map_or(0, |d| d.len())
            + cm.binary_data.as_ref().map_or(0, |d| d.len());
        Ok(vec![
            name(&cm.metadata),
            namespace(&cm.metadata),
            items.to_string(),
            age(cm.metadata.creation_timestamp.as_ref(), now),
            join_map(cm.metadata.labels.as_ref()),
        ])
    }
}

/// Secret payloads are never read, only counted.
#[derive(Debug, Clone, Copy)]
pub struct SecretCollector;

impl Collector for SecretCollector {
    type Resource = Secret;
    type Context = ();
    const KIND: &'static str = "secret";

    fn columns(&self) -> &'static [&'static str] {
        &["SECRET NAME", "NAMESPACE", "TYPE", "DATA ITEMS", "AGE", "LABELS"]
    }

    fn build_row(&self, secret: &Secret, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        Ok(vec![
            name(&secret.metadata),
            namespace(&secret.metadata),
            or_sentinel(secret.type_.clone(), "Opaque"),
            secret.data.as_ref().map_or(0, |d| d.len()).to_string(),
            age(secret.metadata.creation_timestamp.as_ref(), now),
            join_map(secret.metadata.labels.as_ref()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceAccountCollector;

impl Collector for ServiceAccountCollector {
    type Resource = ServiceAccount;
    type Context = ();
    const KIND: &'static str = "serviceaccount";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "SERVICEACCOUNT NAME",
            "NAMESPACE",
            "SECRETS",
            "ANNOTATIONS",
            "AGE",
            "IMAGE PULL SECRETS",
        ]
    }

    fn build_row(
        &self,
        sa: &ServiceAccount,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let secrets = sa
            .secrets
            .iter()
            .flatten()
            .filter_map(|s| s.name.clone());
        let pull_secrets = sa
            .image_pull_secrets
            .iter()
            .flatten()
            .filter_map(|s| opt::<String>(s.name.clone()));

        Ok(vec![
            name(&sa.metadata),
            namespace(&sa.metadata),
            bracketed(secrets),
            join_map(sa.metadata.annotations.as_ref()),
            age(sa.metadata.creation_timestamp.as_ref(), now),
            bracketed(pull_secrets),
        ])
    }
}
