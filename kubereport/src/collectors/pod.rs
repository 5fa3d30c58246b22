use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::api::core::v1::Pod;

use super::{
    list_all, mebibytes, millicores, name, namespace, resource_quantity, Collector,
};
use crate::{
    error::{CollectError, QuantityError},
    quantity::{Quantity, UnitClass},
    source::DataSource,
    table::{ColumnWidths, RecordTable, SortColumn, SortKey},
    utils::{age, or_sentinel, UNKNOWN},
};

pub const UNSCHEDULED: &str = "<unscheduled>";

/// Request and limit totals over a pod's containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodResources {
    pub cpu_requests: Quantity,
    pub cpu_limits: Quantity,
    pub memory_requests: Quantity,
    pub memory_limits: Quantity,
}

impl Default for PodResources {
    fn default() -> Self {
        Self {
            cpu_requests: Quantity::zero(UnitClass::Cpu),
            cpu_limits: Quantity::zero(UnitClass::Cpu),
            memory_requests: Quantity::zero(UnitClass::Memory),
            memory_limits: Quantity::zero(UnitClass::Memory),
        }
    }
}

impl PodResources {
    pub fn of(pod: &Pod) -> Result<Self, QuantityError> {
        let mut totals = Self::default();
        for container in pod.spec.iter().flat_map(|s| &s.containers) {
            let resources = container.resources.as_ref();
            let requests = resources.and_then(|r| r.requests.as_ref());
            let limits = resources.and_then(|r| r.limits.as_ref());
            totals = totals.add(Self {
                cpu_requests: resource_quantity(requests, "cpu", UnitClass::Cpu),
                cpu_limits: resource_quantity(limits, "cpu", UnitClass::Cpu),
                memory_requests: resource_quantity(requests, "memory", UnitClass::Memory),
                memory_limits: resource_quantity(limits, "memory", UnitClass::Memory),
            })?;
        }
        Ok(totals)
    }

    pub fn add(self, other: Self) -> Result<Self, QuantityError> {
        Ok(Self {
            cpu_requests: self.cpu_requests.add(other.cpu_requests)?,
            cpu_limits: self.cpu_limits.add(other.cpu_limits)?,
            memory_requests: self.memory_requests.add(other.memory_requests)?,
            memory_limits: self.memory_limits.add(other.memory_limits)?,
        })
    }

    pub fn sum<'a, I>(pods: I) -> Result<Self, QuantityError>
    where
        I: IntoIterator<Item = &'a Pod>,
    {
        pods.into_iter()
            .try_fold(Self::default(), |acc, pod| acc.add(Self::of(pod)?))
    }
}

pub fn node_name(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

pub fn phase(pod: &Pod) -> String {
    or_sentinel(pod.status.as_ref().and_then(|s| s.phase.clone()), UNKNOWN)
}

/// Pod Resource Details: per-pod request/limit totals, busiest first.
#[derive(Debug, Clone, Copy)]
pub struct PodResourceCollector;

impl Collector for PodResourceCollector {
    type Resource = Pod;
    type Context = ();
    const KIND: &'static str = "pod";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "Pod Name",
            "CPU mC req",
            "CPU mC limit",
            "Mem MiB req",
            "Mem MiB limit",
        ]
    }

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Fixed(vec![38.0; 5])
    }

    fn sort_key(&self) -> SortKey {
        SortKey::Columns(vec![SortColumn::numeric_desc(1), SortColumn::asc(0)])
    }

    fn build_row(&self, pod: &Pod, _: &(), _: Timestamp) -> Result<Vec<String>, CollectError> {
        let totals = PodResources::of(pod)?;
        Ok(vec![
            name(&pod.metadata),
            millicores(totals.cpu_requests),
            millicores(totals.cpu_limits),
            mebibytes(totals.memory_requests),
            mebibytes(totals.memory_limits),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PodStatusCollector;

impl Collector for PodStatusCollector {
    type Resource = Pod;
    type Context = ();
    const KIND: &'static str = "pod";

    fn columns(&self) -> &'static [&'static str] {
        &["Pod Name", "Namespace", "Status"]
    }

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Fixed(vec![88.0, 88.0, 20.0])
    }

    fn build_row(&self, pod: &Pod, _: &(), _: Timestamp) -> Result<Vec<String>, CollectError> {
        Ok(vec![name(&pod.metadata), namespace(&pod.metadata), phase(pod)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PodDetailCollector;

impl Collector for PodDetailCollector {
    type Resource = Pod;
    type Context = ();
    const KIND: &'static str = "pod";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "POD NAME",
            "NAMESPACE",
            "NODE NAME",
            "CPU REQUESTS",
            "CPU LIMITS",
            "MEMORY REQUESTS",
            "MEMORY LIMITS",
            "STATUS",
            "RESTART COUNT",
            "CONDITIONS",
            "AGE",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::Columns(vec![
            SortColumn::numeric_desc(3),
            SortColumn::asc(0),
            SortColumn::asc(1),
        ])
    }

    fn build_row(&self, pod: &Pod, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let totals = PodResources::of(pod)?;
        let status = pod.status.as_ref();
        let restarts = status
            .and_then(|s| s.container_statuses.as_ref())
            .and_then(|cs| cs.first())
            .map(|c| c.restart_count)
            .unwrap_or(0);
        let conditions = status
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| {
                conds
                    .iter()
                    .map(|c| format!("{}={}", c.type_, c.status))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        Ok(vec![
            name(&pod.metadata),
            namespace(&pod.metadata),
            node_name(pod).unwrap_or_default().to_string(),
            millicores(totals.cpu_requests),
            millicores(totals.cpu_limits),
            mebibytes(totals.memory_requests),
            mebibytes(totals.memory_limits),
            phase(pod),
            restarts.to_string(),
            conditions,
            age(pod.metadata.creation_timestamp.as_ref(), now),
        ])
    }
}

/// Pod counts per namespace, as `N pods`.
#[tracing::instrument(skip_all)]
pub fn pods_by_namespace(source: &dyn DataSource) -> Result<RecordTable, CollectError> {
    let pods: Vec<Pod> = list_all(source, "pod")?;
    distribution(["Name", "Value"], pods.iter().map(|p| namespace(&p.metadata)))
}

/// Pod counts per node; pods not yet bound count under `<unscheduled>`.
#[tracing::instrument(skip_all)]
pub fn pods_by_node(source: &dyn DataSource) -> Result<RecordTable, CollectError> {
    let pods: Vec<Pod> = list_all(source, "pod")?;
    distribution(
        ["Node", "Value"],
        pods.iter()
            .map(|p| node_name(p).unwrap_or(UNSCHEDULED).to_string()),
    )
}

fn distribution<I>(columns: [&str; 2], keys: I) -> Result<RecordTable, CollectError>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }

    let mut table = RecordTable::new(columns).with_widths(ColumnWidths::Fixed(vec![95.0, 30.0]));
    for (key, count) in counts {
        table.push_row(vec![key, format!("{count} pods")])?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{run, testing};
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::{from_value, json};

    fn source() -> InMemorySource {
        InMemorySource::new("t").with_objects(
            "Pod",
            vec![
                testing::pod("a", "prod", Some("n1"), Some("100m")),
                testing::pod("b", "prod", Some("n2"), Some("250m")),
                testing::pod("c", "dev", None, None),
            ],
        )
    }

    #[test]
    fn test_pod_resources_sum_containers() {
        let pod: Pod = from_value(json!({
            "metadata": {"name": "multi"},
            "spec": {"containers": [
                {"name": "a", "resources": {"requests": {"cpu": "0.5", "memory": "1Gi"}}},
                {"name": "b", "resources": {"requests": {"cpu": "250m"}, "limits": {"cpu": "1"}}},
                {"name": "c"},
            ]},
        }))
        .unwrap();
        let totals = PodResources::of(&pod).unwrap();
        assert_eq!(totals.cpu_requests, Quantity::millicores(750));
        assert_eq!(totals.cpu_limits, Quantity::millicores(1000));
        assert_eq!(mebibytes(totals.memory_requests), "1024");
        assert!(totals.memory_limits.is_zero());
    }

    #[test]
    fn test_malformed_request_counts_as_zero() {
        let pod: Pod = from_value(json!({
            "metadata": {"name": "odd"},
            "spec": {"containers": [
                {"name": "a", "resources": {"requests": {"cpu": "lots"}}},
                {"name": "b", "resources": {"requests": {"cpu": "100m"}}},
            ]},
        }))
        .unwrap();
        let totals = PodResources::of(&pod).unwrap();
        assert_eq!(totals.cpu_requests, Quantity::millicores(100));
    }

    #[test]
    fn test_pod_resource_table_orders_by_cpu() {
        let table = run(&PodResourceCollector, &source(), testing::now()).unwrap();
        let rows: Vec<_> = table.rows().iter().map(|r| (r[0].as_str(), r[1].as_str())).collect();
        assert_eq!(rows, vec![("b", "250"), ("a", "100"), ("c", "0")]);
        assert_eq!(table.rows()[0][3], "64");
        assert_eq!(table.rows()[0][4], "128");
    }

    #[test]
    fn test_pod_detail_defaults() {
        let table = run(&PodDetailCollector, &source(), testing::now()).unwrap();
        let c = table.rows().iter().find(|r| r[0] == "c").unwrap();
        assert_eq!(c[2], "");
        assert_eq!(c[8], "0");
        assert_eq!(c[10], "72h0m0s");
    }

    #[test]
    fn test_distributions() {
        let by_ns = pods_by_namespace(&source()).unwrap();
        assert_eq!(by_ns.rows()[0], vec!["dev", "1 pods"]);
        assert_eq!(by_ns.rows()[1], vec!["prod", "2 pods"]);

        let by_node = pods_by_node(&source()).unwrap();
        let keys: Vec<_> = by_node.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(keys, vec!["<unscheduled>", "n1", "n2"]);
    }
}
