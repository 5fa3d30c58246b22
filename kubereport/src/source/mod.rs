//! Read-only access to cluster objects.
//!
//! Collectors only see the [`DataSource`] trait. [`KubeSource`] talks to a
//! live API server and [`InMemorySource`] serves a fixed snapshot, which is
//! what the tests and `--snapshot` runs use.

use k8s_metrics::v1beta1::NodeMetrics;
use k8s_openapi::serde_json::{self, Value};
use ::kube::{api::ApiResource, Resource};
use serde::de::DeserializeOwned;

use crate::error::SourceError;

pub mod kube;
pub mod memory;

pub use self::kube::KubeSource;
pub use memory::InMemorySource;

/// Optional narrowing of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    pub namespace: Option<String>,
    /// `path=value` or `path!=value` terms, comma separated.
    pub field_selector: Option<String>,
}

impl ListScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            field_selector: None,
        }
    }

    pub fn with_field_selector(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }
}

pub trait DataSource {
    /// Human-readable identifier of the cluster the snapshot comes from.
    fn cluster_name(&self) -> &str;

    fn list(&self, resource: &ApiResource, scope: &ListScope) -> Result<Vec<Value>, SourceError>;
}

/// Lists one kind and decodes it into its typed form.
///
/// An object that fails to decode fails the whole list, so a table never
/// silently loses rows.
pub fn list<K>(source: &dyn DataSource, scope: &ListScope) -> Result<Vec<K>, SourceError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    list_as(source, &ApiResource::erase::<K>(&()), scope)
}

/// Like [`list`], for types whose `Resource` impl does not name the served kind.
pub fn list_as<K>(
    source: &dyn DataSource,
    resource: &ApiResource,
    scope: &ListScope,
) -> Result<Vec<K>, SourceError>
where
    K: DeserializeOwned,
{
    source
        .list(resource, scope)?
        .into_iter()
        .map(|mut item| {
            with_type_meta(&mut item, resource);
            let name = item
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            serde_json::from_value::<K>(item).map_err(|source| SourceError::Undecodable {
                kind: resource.kind.clone(),
                name,
                source,
            })
        })
        .collect()
}

/// `metrics.k8s.io` node usage. k8s-metrics labels this kind `node`; the
/// API server and `kubectl` dumps call it `NodeMetrics`.
pub fn node_metrics_resource() -> ApiResource {
    ApiResource {
        kind: "NodeMetrics".to_string(),
        ..ApiResource::erase::<NodeMetrics>(&())
    }
}

/// List responses omit per-item `apiVersion`/`kind`; fill them in.
pub(crate) fn with_type_meta(item: &mut Value, resource: &ApiResource) {
    if let Some(obj) = item.as_object_mut() {
        obj.entry("apiVersion")
            .or_insert_with(|| Value::String(resource.api_version.clone()));
        obj.entry("kind")
            .or_insert_with(|| Value::String(resource.kind.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_undecodable_item_fails_the_list() {
        let source = InMemorySource::new("test").with_objects(
            "Pod",
            vec![
                json!({"metadata": {"name": "good", "namespace": "default"}}),
                json!({"metadata": {"name": "bad", "creationTimestamp": "not-a-time"}}),
            ],
        );
        let err = list::<Pod>(&source, &ListScope::all()).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Undecodable { ref kind, ref name, .. } if kind == "Pod" && name == "bad"
        ));
    }

    #[test]
    fn test_node_metrics_use_the_served_kind() {
        let resource = node_metrics_resource();
        assert_eq!(resource.kind, "NodeMetrics");
        assert_eq!(resource.group, "metrics.k8s.io");

        let source = InMemorySource::new("test").with_objects(
            "NodeMetrics",
            vec![json!({
                "metadata": {"name": "n1"},
                "timestamp": "2024-03-04T11:59:30Z",
                "window": "30s",
                "usage": {"cpu": "300m", "memory": "1Gi"},
            })],
        );
        let metrics: Vec<NodeMetrics> = list_as(&source, &resource, &ListScope::all()).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metadata.name.as_deref(), Some("n1"));
    }

    #[test]
    fn test_with_type_meta_keeps_existing() {
        let resource = ApiResource::erase::<Pod>(&());
        let mut item = json!({"kind": "Pod", "apiVersion": "v1"});
        with_type_meta(&mut item, &resource);
        assert_eq!(item["apiVersion"], "v1");

        let mut bare = json!({});
        with_type_meta(&mut bare, &resource);
        assert_eq!(bare["kind"], "Pod");
    }
}
