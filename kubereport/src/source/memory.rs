use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use ::kube::api::ApiResource;
use k8s_openapi::serde_json::Value;
use tracing::debug;

use super::{DataSource, ListScope};
use crate::error::SourceError;

/// Serves a fixed set of objects, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    cluster: String,
    objects: BTreeMap<String, Vec<Value>>,
    failures: BTreeMap<String, String>,
    unserved: BTreeSet<String>,
}

impl InMemorySource {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            ..Default::default()
        }
    }

    pub fn with_objects(mut self, kind: &str, items: Vec<Value>) -> Self {
        self.objects.entry(kind.to_string()).or_default().extend(items);
        self
    }

    /// Makes every list call for `kind` fail.
    pub fn with_failure(mut self, kind: &str, reason: &str) -> Self {
        self.failures.insert(kind.to_string(), reason.to_string());
        self
    }

    /// Makes `kind` look like an API the cluster does not serve.
    pub fn without_api(mut self, kind: &str) -> Self {
        self.unserved.insert(kind.to_string());
        self
    }

    pub fn insert(&mut self, item: Value) -> Result<(), SourceError> {
        let kind = item
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::Snapshot("object without a kind".into()))?
            .to_string();
        self.objects.entry(kind).or_default().push(item);
        Ok(())
    }

    /// Parses a `kubectl get -o yaml|json` dump: either a `List` or one object.
    pub fn from_document(cluster: impl Into<String>, text: &str) -> Result<Self, SourceError> {
        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| SourceError::Snapshot(e.to_string()))?;
        let mut source = Self::new(cluster);

        let items = match doc.get("items").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => vec![doc],
        };
        for item in items {
            source.insert(item)?;
        }
        debug!(kinds = source.objects.len(), "loaded snapshot");
        Ok(source)
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path)
            .map_err(|e| SourceError::Snapshot(format!("{}: {e}", path.display())))?;
        let cluster = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        Self::from_document(cluster, &text)
    }

}

impl DataSource for InMemorySource {
    fn cluster_name(&self) -> &str {
        &self.cluster
    }

    fn list(&self, resource: &ApiResource, scope: &ListScope) -> Result<Vec<Value>, SourceError> {
        if self.unserved.contains(&resource.kind) {
            return Err(SourceError::NotServed {
                kind: resource.kind.clone(),
            });
        }
        if let Some(reason) = self.failures.get(&resource.kind) {
            return Err(SourceError::Unavailable {
                kind: resource.kind.clone(),
                reason: reason.clone(),
            });
        }

        let selector = scope
            .field_selector
            .as_deref()
            .map(FieldSelector::parse)
            .unwrap_or_default();

        Ok(self
            .objects
            .get(&resource.kind)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| match &scope.namespace {
                        Some(ns) => value_at(item, "metadata.namespace") == ns.as_str(),
                        None => true,
                    })
                    .filter(|item| selector.matches(item))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct FieldSelector {
    terms: Vec<(String, String, bool)>,
}

impl FieldSelector {
    fn parse(raw: &str) -> Self {
        let terms = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .filter_map(|term| {
                if let Some((path, value)) = term.split_once("!=") {
                    Some((path.to_string(), value.to_string(), false))
                } else {
                    let (path, value) = term
                        .split_once("==")
                        .or_else(|| term.split_once('='))?;
                    Some((path.to_string(), value.to_string(), true))
                }
            })
            .collect();
        Self { terms }
    }

    fn matches(&self, item: &Value) -> bool {
        self.terms
            .iter()
            .all(|(path, expect, equal)| (value_at(item, path) == expect.as_str()) == *equal)
    }
}

/// Missing fields compare as the empty string, as the API server does.
fn value_at<'a>(item: &'a Value, path: &str) -> &'a str {
    path.split('.')
        .try_fold(item, |cur, seg| cur.get(seg))
        .and_then(Value::as_str)
        .unwrap_or_default()
}
