//! Cluster-wide capacity summary.
//!
//! Allocatable comes from the node list. Available subtracts live usage
//! reported by the metrics API for the listed nodes. When the cluster does not
//! serve the metrics API the usage-derived rows render `N/A`; any other
//! metrics failure fails the section.

use std::collections::BTreeSet;

use jiff::Timestamp;
use k8s_metrics::v1beta1::NodeMetrics;
use k8s_openapi::api::core::v1::{Node, Pod};
use tracing::warn;

use super::{list_all, mebibytes, millicores, name, resource_quantity};
use crate::{
    error::{CollectError, SourceError},
    quantity::{aggregate, percent_of, Quantity, UnitClass},
    source::{self, DataSource, ListScope},
    table::{ColumnWidths, RecordTable},
    utils::NOT_AVAILABLE,
};

pub const COLUMNS: [&str; 3] = ["Resource Type", "CPU (mC)", "Memory (MiB)"];

/// Summed node usage, restricted to nodes present in the node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub cpu: Quantity,
    pub memory: Quantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCapacity {
    pub nodes: usize,
    pub pods: usize,
    pub allocatable_cpu: Quantity,
    pub allocatable_memory: Quantity,
    pub used: Option<Usage>,
}

impl ClusterCapacity {
    pub fn available_cpu(&self) -> Result<Option<Quantity>, CollectError> {
        self.used
            .map(|u| self.allocatable_cpu.sub(u.cpu))
            .transpose()
            .map_err(Into::into)
    }

    pub fn available_memory(&self) -> Result<Option<Quantity>, CollectError> {
        self.used
            .map(|u| self.allocatable_memory.sub(u.memory))
            .transpose()
            .map_err(Into::into)
    }
}

#[tracing::instrument(skip_all)]
pub fn capacity(source: &dyn DataSource) -> Result<ClusterCapacity, CollectError> {
    let nodes: Vec<Node> = list_all(source, "node")?;
    let pods: Vec<Pod> = list_all(source, "pod")?;

    let allocatable = |key: &str, class: UnitClass| {
        aggregate(
            class,
            nodes.iter().map(|n| {
                resource_quantity(
                    n.status.as_ref().and_then(|s| s.allocatable.as_ref()),
                    key,
                    class,
                )
            }),
        )
    };
    let allocatable_cpu = allocatable("cpu", UnitClass::Cpu)?;
    let allocatable_memory = allocatable("memory", UnitClass::Memory)?;

    let metrics = source::list_as::<NodeMetrics>(
        source,
        &source::node_metrics_resource(),
        &ListScope::all(),
    );
    let used = match metrics {
        Ok(metrics) => {
            let listed: BTreeSet<String> = nodes.iter().map(|n| name(&n.metadata)).collect();
            let reported: Vec<&NodeMetrics> = metrics
                .iter()
                .filter(|m| listed.contains(&name(&m.metadata)))
                .collect();
            Some(Usage {
                cpu: aggregate(
                    UnitClass::Cpu,
                    reported
                        .iter()
                        .map(|m| Quantity::from_k8s_or_zero(UnitClass::Cpu, &m.usage.cpu)),
                )?,
                memory: aggregate(
                    UnitClass::Memory,
                    reported
                        .iter()
                        .map(|m| Quantity::from_k8s_or_zero(UnitClass::Memory, &m.usage.memory)),
                )?,
            })
        }
        Err(err @ SourceError::NotServed { .. }) => {
            warn!(error = %err, "node metrics unavailable, cluster availability not reported");
            None
        }
        Err(cause) => {
            return Err(CollectError::CollectionUnavailable {
                kind: "nodemetrics",
                cause,
            })
        }
    };

    Ok(ClusterCapacity {
        nodes: nodes.len(),
        pods: pods.len(),
        allocatable_cpu,
        allocatable_memory,
        used,
    })
}

/// Cluster Resource Details in its fixed row order.
pub fn cluster_summary(source: &dyn DataSource, _now: Timestamp) -> Result<RecordTable, CollectError> {
    let cap = capacity(source)?;

    let available_cpu = cap.available_cpu()?;
    let available_memory = cap.available_memory()?;
    let percent = |available: Option<Quantity>, whole: Quantity| -> Result<String, CollectError> {
        Ok(match available {
            Some(q) => format!("{:.2}%", percent_of(q, whole)?),
            None => NOT_AVAILABLE.to_string(),
        })
    };
    let or_na = |q: Option<Quantity>, fmt: fn(Quantity) -> String| {
        q.map(fmt).unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    let rows = [
        ["Total Nodes".to_string(), cap.nodes.to_string(), String::new()],
        ["Total Pods".to_string(), cap.pods.to_string(), String::new()],
        [
            "Cluster Allocatable".to_string(),
            millicores(cap.allocatable_cpu),
            mebibytes(cap.allocatable_memory),
        ],
        [
            "Cluster Available".to_string(),
            or_na(available_cpu, millicores),
            or_na(available_memory, mebibytes),
        ],
        [
            "Cluster Available (%)".to_string(),
            percent(available_cpu, cap.allocatable_cpu)?,
            percent(available_memory, cap.allocatable_memory)?,
        ],
    ];

    let mut table = RecordTable::new(COLUMNS).with_widths(ColumnWidths::Fixed(vec![50.0; 3]));
    for row in rows {
        table.push_row(row.into())?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing;
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::{json, Value};

    fn metrics(node: &str, cpu: &str, memory: &str) -> Value {
        json!({
            "metadata": {"name": node},
            "timestamp": "2024-03-04T11:59:30Z",
            "window": "30s",
            "usage": {"cpu": cpu, "memory": memory},
        })
    }

    fn source() -> InMemorySource {
        InMemorySource::new("t")
            .with_objects(
                "Node",
                vec![
                    testing::node("n1", "4000m", "8Gi"),
                    testing::node("n2", "2000m", "4Gi"),
                ],
            )
            .with_objects(
                "Pod",
                vec![
                    testing::pod("a", "prod", Some("n1"), Some("100m")),
                    testing::pod("b", "prod", Some("n2"), Some("250m")),
                    testing::pod("c", "prod", Some("n1"), None),
                ],
            )
    }

    #[test]
    fn test_cluster_summary_rows() {
        let source = source().with_objects(
            "NodeMetrics",
            vec![
                metrics("n1", "300m", "1Gi"),
                metrics("n2", "200m", "1Gi"),
                metrics("gone", "5", "10Gi"),
            ],
        );
        let table = cluster_summary(&source, testing::now()).unwrap();
        let rows = table.rows();
        assert_eq!(rows[0], vec!["Total Nodes", "2", ""]);
        assert_eq!(rows[1], vec!["Total Pods", "3", ""]);
        assert_eq!(rows[2], vec!["Cluster Allocatable", "6000", "12288"]);
        assert_eq!(rows[3], vec!["Cluster Available", "5500", "10240"]);
        assert_eq!(rows[4], vec!["Cluster Available (%)", "91.67%", "83.33%"]);
    }

    #[test]
    fn test_missing_metrics_degrades() {
        let source = source().without_api("NodeMetrics");
        let table = cluster_summary(&source, testing::now()).unwrap();
        assert_eq!(table.rows()[2][1], "6000");
        assert_eq!(table.rows()[3], vec!["Cluster Available", "N/A", "N/A"]);
        assert_eq!(table.rows()[4], vec!["Cluster Available (%)", "N/A", "N/A"]);
    }

    #[test]
    fn test_metrics_failure_is_fatal() {
        let source = source().with_failure("NodeMetrics", "nodes.metrics.k8s.io is forbidden");
        assert!(matches!(
            cluster_summary(&source, testing::now()),
            Err(CollectError::CollectionUnavailable { kind: "nodemetrics", .. })
        ));
    }

    #[test]
    fn test_undecodable_metrics_are_fatal() {
        let source = source().with_objects(
            "NodeMetrics",
            vec![json!({"metadata": {"name": "n1"}, "usage": {"cpu": 12}})],
        );
        assert!(matches!(
            cluster_summary(&source, testing::now()),
            Err(CollectError::CollectionUnavailable {
                kind: "nodemetrics",
                cause: SourceError::Undecodable { .. },
            })
        ));
    }

    #[test]
    fn test_zero_allocatable_percent() {
        let source = InMemorySource::new("t")
            .with_objects("Node", vec![])
            .with_objects("NodeMetrics", vec![]);
        let table = cluster_summary(&source, testing::now()).unwrap();
        assert_eq!(table.rows()[4], vec!["Cluster Available (%)", "0.00%", "0.00%"]);
    }

    #[test]
    fn test_node_failure_is_fatal() {
        let source = source().with_failure("Node", "forbidden");
        assert!(matches!(
            cluster_summary(&source, testing::now()),
            Err(CollectError::CollectionUnavailable { kind: "node", .. })
        ));
    }
}
