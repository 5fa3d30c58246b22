use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    core::v1::{ConfigMap, Namespace, Pod, Secret, Service},
};
use kube::Resource;
use serde::de::DeserializeOwned;

use super::{
    list_all, mebibytes, mebibytes_2dp, millicores, name, namespace, pod::PodResources, Collector,
};
use crate::{
    error::CollectError,
    source::DataSource,
    table::{ColumnWidths, RecordTable, SortKey},
    utils::join_map,
};

/// Object counts keyed by namespace.
#[derive(Debug, Default)]
pub struct Counts(BTreeMap<String, usize>);

impl Counts {
    pub fn of<K>(source: &dyn DataSource, kind: &'static str) -> Result<Self, CollectError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let items: Vec<K> = list_all(source, kind)?;
        Ok(Self::from_items(&items))
    }

    pub fn from_items<K: Resource>(items: &[K]) -> Self {
        let mut counts = BTreeMap::new();
        for item in items {
            *counts.entry(namespace(item.meta())).or_default() += 1;
        }
        Self(counts)
    }

    pub fn get(&self, namespace: &str) -> usize {
        self.0.get(namespace).copied().unwrap_or(0)
    }
}

fn resources_by_namespace(pods: &[Pod]) -> Result<BTreeMap<String, PodResources>, CollectError> {
    let mut totals: BTreeMap<String, PodResources> = BTreeMap::new();
    for pod in pods {
        let entry = totals.entry(namespace(&pod.metadata)).or_default();
        *entry = entry.add(PodResources::of(pod)?)?;
    }
    Ok(totals)
}

/// Namespace Resource Details, closed by a `Total` row over the listed
/// namespaces.
#[derive(Debug, Clone, Copy)]
pub struct NamespaceResourceCollector;

impl Collector for NamespaceResourceCollector {
    type Resource = Namespace;
    type Context = BTreeMap<String, PodResources>;
    const KIND: &'static str = "namespace";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "Namespace",
            "CPU Req (mCPU)",
            "CPU Lim (mCPU)",
            "Memory Req (MiB)",
            "Memory Lim (MiB)",
        ]
    }

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Fixed(vec![38.0; 5])
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<Self::Context, CollectError> {
        let pods: Vec<Pod> = list_all(source, "pod")?;
        resources_by_namespace(&pods)
    }

    fn build_row(
        &self,
        ns: &Namespace,
        totals: &Self::Context,
        _: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let ns_name = name(&ns.metadata);
        let res = totals.get(&ns_name).copied().unwrap_or_default();
        Ok(resource_cells(ns_name, res))
    }

    fn finish(&self, table: &mut RecordTable, totals: &Self::Context) -> Result<(), CollectError> {
        let mut sum = PodResources::default();
        for row in table.rows() {
            if let Some(res) = totals.get(&row[0]) {
                sum = sum.add(*res)?;
            }
        }
        table.push_row(resource_cells("Total".to_string(), sum))?;
        Ok(())
    }
}

fn resource_cells(label: String, res: PodResources) -> Vec<String> {
    vec![
        label,
        millicores(res.cpu_requests),
        millicores(res.cpu_limits),
        mebibytes_2dp(res.memory_requests),
        mebibytes_2dp(res.memory_limits),
    ]
}

#[derive(Debug, Default)]
pub struct SummaryCounts {
    deployments: Counts,
    pods: Counts,
    services: Counts,
}

#[derive(Debug, Clone, Copy)]
pub struct NamespaceSummaryCollector;

impl Collector for NamespaceSummaryCollector {
    type Resource = Namespace;
    type Context = SummaryCounts;
    const KIND: &'static str = "namespace";

    fn columns(&self) -> &'static [&'static str] {
        &["Namespace", "Deployments", "Pods", "Services"]
    }

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Fixed(vec![90.0, 30.0, 30.0, 30.0])
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<SummaryCounts, CollectError> {
        Ok(SummaryCounts {
            deployments: Counts::of::<Deployment>(source, "deployment")?,
            pods: Counts::of::<Pod>(source, "pod")?,
            services: Counts::of::<Service>(source, "service")?,
        })
    }

    fn build_row(
        &self,
        ns: &Namespace,
        counts: &SummaryCounts,
        _: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let ns_name = name(&ns.metadata);
        let deployments = counts.deployments.get(&ns_name);
        let pods = counts.pods.get(&ns_name);
        let services = counts.services.get(&ns_name);
        Ok(vec![
            ns_name,
            deployments.to_string(),
            pods.to_string(),
            services.to_string(),
        ])
    }
}

#[derive(Debug, Default)]
pub struct NamespaceInventory {
    phases: BTreeMap<String, BTreeMap<String, usize>>,
    resources: BTreeMap<String, PodResources>,
    pods: Counts,
    services: Counts,
    deployments: Counts,
    replicasets: Counts,
    statefulsets: Counts,
    daemonsets: Counts,
    configmaps: Counts,
    secrets: Counts,
}

impl NamespaceInventory {
    fn phase_count(&self, namespace: &str, phase: &str) -> usize {
        self.phases
            .get(namespace)
            .and_then(|p| p.get(phase))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NamespaceDetailCollector;

impl Collector for NamespaceDetailCollector {
    type Resource = Namespace;
    type Context = NamespaceInventory;
    const KIND: &'static str = "namespace";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "NAMESPACE",
            "PODS",
            "RUNNING PODS",
            "PENDING PODS",
            "FAILED PODS",
            "SERVICES",
            "DEPLOYMENTS",
            "REPLICASETS",
            "STATEFULSETS",
            "DAEMONSETS",
            "CONFIGMAPS",
            "SECRETS",
            "ANNOTATIONS",
            "CPU REQ (MCPU)",
            "CPU LIM (MCPU)",
            "MEMORY REQ (MIB)",
            "MEMORY LIM (MIB)",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<NamespaceInventory, CollectError> {
        let pods: Vec<Pod> = list_all(source, "pod")?;
        let mut phases: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for pod in &pods {
            if let Some(phase) = pod.status.as_ref().and_then(|s| s.phase.clone()) {
                *phases
                    .entry(namespace(&pod.metadata))
                    .or_default()
                    .entry(phase)
                    .or_default() += 1;
            }
        }

        Ok(NamespaceInventory {
            phases,
            resources: resources_by_namespace(&pods)?,
            pods: Counts::from_items(&pods),
            services: Counts::of::<Service>(source, "service")?,
            deployments: Counts::of::<Deployment>(source, "deployment")?,
            replicasets: Counts::of::<ReplicaSet>(source, "replicaset")?,
            statefulsets: Counts::of::<StatefulSet>(source, "statefulset")?,
            daemonsets: Counts::of::<DaemonSet>(source, "daemonset")?,
            configmaps: Counts::of::<ConfigMap>(source, "configmap")?,
            secrets: Counts::of::<Secret>(source, "secret")?,
        })
    }

    fn build_row(
        &self,
        ns: &Namespace,
        inv: &NamespaceInventory,
        _: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let ns_name = name(&ns.metadata);
        let res = inv.resources.get(&ns_name).copied().unwrap_or_default();
        let counts = [
            inv.pods.get(&ns_name),
            inv.phase_count(&ns_name, "Running"),
            inv.phase_count(&ns_name, "Pending"),
            inv.phase_count(&ns_name, "Failed"),
            inv.services.get(&ns_name),
            inv.deployments.get(&ns_name),
            inv.replicasets.get(&ns_name),
            inv.statefulsets.get(&ns_name),
            inv.daemonsets.get(&ns_name),
            inv.configmaps.get(&ns_name),
            inv.secrets.get(&ns_name),
        ];

        let mut row = vec![ns_name];
        row.extend(counts.iter().map(usize::to_string));
        row.extend([
            join_map(ns.metadata.annotations.as_ref()),
            millicores(res.cpu_requests),
            millicores(res.cpu_limits),
            mebibytes(res.memory_requests),
            mebibytes(res.memory_limits),
        ]);
        Ok(row)
    }
}
