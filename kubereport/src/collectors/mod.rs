//! One collector per resource kind.
//!
//! Row-per-object kinds implement [`Collector`] and go through [`run`], which
//! owns listing, row assembly, sorting and shape checks. Aggregate tables
//! (cluster summary, pod distributions) are plain functions over the same
//! helpers. [`CollectorKind`] is the closed set the report catalogs pick from.

use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::apimachinery::pkg::{
    api::resource::Quantity as K8sQuantity, apis::meta::v1::ObjectMeta,
};
use kube::Resource;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::CollectError,
    quantity::{DisplayUnit, Quantity, UnitClass},
    source::{self, DataSource, ListScope},
    table::{ColumnWidths, RecordTable, SortKey},
};

pub mod batch;
pub mod cluster;
pub mod configuration;
pub mod kind;
pub mod namespace;
pub mod network;
pub mod node;
pub mod pod;
pub mod policy;
pub mod rbac;
pub mod storage;
pub mod workload;

pub use kind::CollectorKind;

pub trait Collector {
    type Resource: Resource<DynamicType = ()> + DeserializeOwned;
    /// Lookups shared by every row, loaded once per run.
    type Context: Default;

    /// Label used in logs and errors.
    const KIND: &'static str;

    fn columns(&self) -> &'static [&'static str];

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Equal
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name_then_namespace()
    }

    fn context(&self, _source: &dyn DataSource) -> Result<Self::Context, CollectError> {
        Ok(Self::Context::default())
    }

    fn build_row(
        &self,
        obj: &Self::Resource,
        ctx: &Self::Context,
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError>;

    /// Trailing rows appended after sorting, such as totals.
    fn finish(&self, _table: &mut RecordTable, _ctx: &Self::Context) -> Result<(), CollectError> {
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(kind = C::KIND))]
pub fn run<C: Collector>(
    collector: &C,
    source: &dyn DataSource,
    now: Timestamp,
) -> Result<RecordTable, CollectError> {
    let items: Vec<C::Resource> = list_all(source, C::KIND)?;
    let ctx = collector.context(source)?;

    let mut table = RecordTable::new(collector.columns().iter().copied())
        .with_widths(collector.widths());
    for obj in &items {
        table.push_row(collector.build_row(obj, &ctx, now)?)?;
    }
    table.sort_by_key(&collector.sort_key());
    collector.finish(&mut table, &ctx)?;

    debug!(rows = table.len(), "collected");
    Ok(table)
}

/// Lists every object of `K`; a failed call is fatal for the section.
pub fn list_all<K>(source: &dyn DataSource, kind: &'static str) -> Result<Vec<K>, CollectError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    source::list::<K>(source, &ListScope::all()).map_err(CollectError::unavailable(kind))
}

pub fn name(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

pub fn namespace(meta: &ObjectMeta) -> String {
    meta.namespace.clone().unwrap_or_default()
}

/// Looks up one resource in a request/limit/capacity map; absent is zero.
pub fn resource_quantity(
    map: Option<&BTreeMap<String, K8sQuantity>>,
    key: &str,
    class: UnitClass,
) -> Quantity {
    map.and_then(|m| m.get(key))
        .map(|q| Quantity::from_k8s_or_zero(class, q))
        .unwrap_or(Quantity::zero(class))
}

pub fn millicores(q: Quantity) -> String {
    q.whole(DisplayUnit::Millicores).to_string()
}

pub fn mebibytes(q: Quantity) -> String {
    q.whole(DisplayUnit::Mebibytes).to_string()
}

pub fn mebibytes_2dp(q: Quantity) -> String {
    format!("{:.2}", q.scale_to(DisplayUnit::Mebibytes))
}

pub fn gibibytes(q: Quantity) -> String {
    format!("{:.2}Gi", q.scale_to(DisplayUnit::Gibibytes))
}

/// Renders a quantity map as `key=value` pairs, keeping declared strings.
pub fn quantity_map(map: Option<&BTreeMap<String, K8sQuantity>>) -> String {
    map.map(|m| {
        m.iter()
            .map(|(k, v)| format!("{k}={}", v.0))
            .collect::<Vec<_>>()
            .join(", ")
    })
    .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::InMemorySource;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_list_all_reports_kind() {
        let source = InMemorySource::new("t").with_failure("Pod", "forbidden");
        let err = list_all::<Pod>(&source, "pod").unwrap_err();
        assert!(matches!(
            err,
            CollectError::CollectionUnavailable { kind: "pod", .. }
        ));
    }

    #[test]
    fn test_undecodable_object_fails_the_section() {
        let source = InMemorySource::new("t").with_objects(
            "Pod",
            vec![
                testing::pod("web-1", "prod", Some("n1"), None),
                json!({"metadata": {"name": "odd", "namespace": "prod", "labels": ["x"]}}),
            ],
        );
        let err = CollectorKind::PodStatus
            .collect(&source, testing::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CollectError::CollectionUnavailable {
                kind: "pod",
                cause: SourceError::Undecodable { .. },
            }
        ));
    }

    #[test]
    fn test_unit_formatting() {
        let mem = Quantity::parse(UnitClass::Memory, "1536Mi").unwrap();
        assert_eq!(mebibytes(mem), "1536");
        assert_eq!(mebibytes_2dp(mem), "1536.00");
        assert_eq!(gibibytes(mem), "1.50Gi");
        assert_eq!(millicores(Quantity::millicores(250)), "250");
    }
}
