use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::{
    api::core::v1::{LimitRange, LimitRangeItem, ResourceQuota},
    apimachinery::pkg::api::resource::Quantity as K8sQuantity,
};

use super::{name, namespace, quantity_map, Collector};
use crate::{
    error::CollectError,
    quantity::{Quantity, UnitClass},
    utils::{age, join_map, NOT_AVAILABLE},
};

type QuantityMap = BTreeMap<String, K8sQuantity>;

fn class_for(resource: &str) -> UnitClass {
    if resource.contains("cpu") {
        UnitClass::Cpu
    } else if resource.contains("storage") {
        UnitClass::Storage
    } else {
        UnitClass::Memory
    }
}

/// True when any tracked resource's usage is above its hard limit.
fn exceeded(hard: Option<&QuantityMap>, used: Option<&QuantityMap>) -> bool {
    let (Some(hard), Some(used)) = (hard, used) else {
        return false;
    };
    hard.iter().any(|(resource, limit)| {
        let class = class_for(resource);
        match (
            used.get(resource).map(|u| Quantity::from_k8s(class, u)),
            Quantity::from_k8s(class, limit),
        ) {
            (Some(Ok(used)), Ok(limit)) => used.base_value() > limit.base_value(),
            _ => false,
        }
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceQuotaCollector;

impl Collector for ResourceQuotaCollector {
    type Resource = ResourceQuota;
    type Context = ();
    const KIND: &'static str = "resourcequota";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "RESOURCE NAME",
            "NAMESPACE",
            "HARD LIMITS",
            "USED RESOURCES",
            "AGE",
            "ANNOTATIONS",
            "STATUS",
            "USED PODS",
            "REQUEST LIMITS",
            "LIMIT TYPE",
        ]
    }

    fn build_row(
        &self,
        rq: &ResourceQuota,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let spec = rq.spec.as_ref();
        let hard = spec.and_then(|s| s.hard.as_ref());
        let used = rq.status.as_ref().and_then(|s| s.used.as_ref());

        let request_limits: QuantityMap = hard
            .into_iter()
            .flatten()
            .filter(|(k, _)| k.starts_with("requests.") || k.starts_with("limits."))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let scopes = spec
            .and_then(|s| s.scopes.as_ref())
            .filter(|s| !s.is_empty())
            .map(|s| s.join(", "))
            .unwrap_or_else(|| "Resource Limit".to_string());

        Ok(vec![
            name(&rq.metadata),
            namespace(&rq.metadata),
            quantity_map(hard),
            quantity_map(used),
            age(rq.metadata.creation_timestamp.as_ref(), now),
            join_map(rq.metadata.annotations.as_ref()),
            if exceeded(hard, used) { "Exceeded" } else { "Active" }.to_string(),
            used.and_then(|u| u.get("pods"))
                .map(|q| q.0.clone())
                .unwrap_or_else(|| "0".to_string()),
            quantity_map(Some(&request_limits)),
            scopes,
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LimitRangeCollector;

impl Collector for LimitRangeCollector {
    type Resource = LimitRange;
    type Context = ();
    const KIND: &'static str = "limitrange";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "RESOURCE NAME",
            "NAMESPACE",
            "LIMITS",
            "REQUESTS",
            "AGE",
            "ANNOTATIONS",
            "STATUS",
            "LIMIT TYPE",
            "DEFAULT LIMITS",
            "DEFAULT REQUESTS",
        ]
    }

    fn build_row(&self, lr: &LimitRange, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let items = lr.spec.as_ref().map(|s| s.limits.as_slice()).unwrap_or_default();
        let default_limits = items.iter().find_map(|i| i.default.as_ref());
        let default_requests = items.iter().find_map(|i| i.default_request.as_ref());

        Ok(vec![
            name(&lr.metadata),
            namespace(&lr.metadata),
            per_type(items, |i| i.max.as_ref()),
            per_type(items, |i| i.min.as_ref()),
            age(lr.metadata.creation_timestamp.as_ref(), now),
            join_map(lr.metadata.annotations.as_ref()),
            "Active".to_string(),
            items
                .iter()
                .map(|i| i.type_.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            cpu_memory(default_limits),
            cpu_memory(default_requests),
        ])
    }
}

/// `Type: k=v` for every item carrying the picked map.
fn per_type(
    items: &[LimitRangeItem],
    pick: impl Fn(&LimitRangeItem) -> Option<&QuantityMap>,
) -> String {
    items
        .iter()
        .filter_map(|item| {
            pick(item).map(|m| format!("{}: {}", item.type_, quantity_map(Some(m))))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn cpu_memory(map: Option<&QuantityMap>) -> String {
    let Some(map) = map else {
        return String::new();
    };
    let get = |key: &str| {
        map.get(key)
            .map(|q| q.0.clone())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };
    format!("CPU: {}, Memory: {}", get("cpu"), get("memory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{run, testing};
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_quota_exceeded_compares_quantities() {
        let source = InMemorySource::new("t").with_objects(
            "ResourceQuota",
            vec![
                json!({
                    "metadata": testing::meta("compute", Some("prod")),
                    "spec": {"hard": {"requests.cpu": "2", "requests.memory": "1Gi", "pods": "10"}},
                    "status": {"used": {"requests.cpu": "2500m", "requests.memory": "512Mi", "pods": "4"}},
                }),
                json!({
                    "metadata": testing::meta("objects", Some("prod")),
                    "spec": {"hard": {"limits.memory": "2Gi"}, "scopes": ["NotTerminating"]},
                    "status": {"used": {"limits.memory": "2048Mi"}},
                }),
            ],
        );
        let table = run(&ResourceQuotaCollector, &source, testing::now()).unwrap();

        let compute = &table.rows()[0];
        assert_eq!(compute[2], "pods=10, requests.cpu=2, requests.memory=1Gi");
        assert_eq!(compute[6], "Exceeded");
        assert_eq!(compute[7], "4");
        assert_eq!(compute[8], "requests.cpu=2, requests.memory=1Gi");
        assert_eq!(compute[9], "Resource Limit");

        let objects = &table.rows()[1];
        assert_eq!(objects[6], "Active");
        assert_eq!(objects[7], "0");
        assert_eq!(objects[9], "NotTerminating");
    }

    #[test]
    fn test_limit_range_summary() {
        let source = InMemorySource::new("t").with_objects(
            "LimitRange",
            vec![json!({
                "metadata": testing::meta("defaults", Some("prod")),
                "spec": {"limits": [
                    {
                        "type": "Container",
                        "max": {"cpu": "2"},
                        "min": {"cpu": "50m"},
                        "default": {"cpu": "500m", "memory": "512Mi"},
                        "defaultRequest": {"cpu": "100m"},
                    },
                    {"type": "PersistentVolumeClaim", "max": {"storage": "50Gi"}},
                ]},
            })],
        );
        let table = run(&LimitRangeCollector, &source, testing::now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row[2], "Container: cpu=2; PersistentVolumeClaim: storage=50Gi");
        assert_eq!(row[3], "Container: cpu=50m");
        assert_eq!(row[7], "Container, PersistentVolumeClaim");
        assert_eq!(row[8], "CPU: 500m, Memory: 512Mi");
        assert_eq!(row[9], "CPU: 100m, Memory: N/A");
    }
}
