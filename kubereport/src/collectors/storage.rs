use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::api::{
    core::v1::{PersistentVolume, PersistentVolumeClaim, Pod},
    storage::v1::StorageClass,
};

use super::{list_all, name, namespace, Collector};
use crate::{
    error::CollectError,
    source::DataSource,
    table::SortKey,
    utils::{age, bracketed, join_map, label_selector, or_sentinel, yes_no, UNKNOWN},
};

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// First pod, by name, mounting each `(namespace, claim)`.
#[derive(Debug, Default)]
pub struct Claimants(BTreeMap<(String, String), String>);

impl Claimants {
    pub fn load(source: &dyn DataSource) -> Result<Self, CollectError> {
        let pods: Vec<Pod> = list_all(source, "pod")?;
        let mut claimants: BTreeMap<(String, String), String> = BTreeMap::new();
        for pod in &pods {
            let pod_name = name(&pod.metadata);
            let volumes = pod.spec.iter().flat_map(|s| s.volumes.iter().flatten());
            for claim in volumes.filter_map(|v| v.persistent_volume_claim.as_ref()) {
                let key = (namespace(&pod.metadata), claim.claim_name.clone());
                claimants
                    .entry(key)
                    .and_modify(|cur| {
                        if pod_name < *cur {
                            *cur = pod_name.clone();
                        }
                    })
                    .or_insert_with(|| pod_name.clone());
            }
        }
        Ok(Self(claimants))
    }

    pub fn get(&self, namespace: &str, claim: &str) -> Option<&str> {
        self.0
            .get(&(namespace.to_string(), claim.to_string()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PersistentVolumeCollector;

impl Collector for PersistentVolumeCollector {
    type Resource = PersistentVolume;
    type Context = Claimants;
    const KIND: &'static str = "persistentvolume";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "PV NAME",
            "CAPACITY",
            "ACCESS MODES",
            "RECLAIM POLICY",
            "STATUS",
            "PERSISTENT VOLUME CLAIM",
            "STORAGE CLASS",
            "AGE",
            "PHASE",
            "ANNOTATIONS",
            "CLAIMANT",
            "VOLUME MODE",
            "MOUNT OPTIONS",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<Claimants, CollectError> {
        Claimants::load(source)
    }

    fn build_row(
        &self,
        pv: &PersistentVolume,
        claimants: &Claimants,
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let spec = pv.spec.as_ref();
        let phase = or_sentinel(pv.status.as_ref().and_then(|s| s.phase.clone()), UNKNOWN);
        let claim_ref = spec.and_then(|s| s.claim_ref.as_ref());
        let claimant = claim_ref.and_then(|c| {
            claimants.get(c.namespace.as_deref()?, c.name.as_deref()?)
        });

        Ok(vec![
            name(&pv.metadata),
            spec.and_then(|s| s.capacity.as_ref())
                .and_then(|c| c.get("storage"))
                .map(|q| q.0.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            bracketed(spec.and_then(|s| s.access_modes.clone()).unwrap_or_default()),
            spec.and_then(|s| s.persistent_volume_reclaim_policy.clone())
                .unwrap_or_default(),
            phase.clone(),
            claim_ref.and_then(|c| c.name.clone()).unwrap_or_default(),
            spec.and_then(|s| s.storage_class_name.clone())
                .unwrap_or_default(),
            age(pv.metadata.creation_timestamp.as_ref(), now),
            phase,
            join_map(pv.metadata.annotations.as_ref()),
            claimant.unwrap_or(UNKNOWN).to_string(),
            spec.and_then(|s| s.volume_mode.clone()).unwrap_or_default(),
            bracketed(spec.and_then(|s| s.mount_options.clone()).unwrap_or_default()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PersistentVolumeClaimCollector;

impl Collector for PersistentVolumeClaimCollector {
    type Resource = PersistentVolumeClaim;
    type Context = ();
    const KIND: &'static str = "persistentvolumeclaim";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "PVC NAME",
            "NAMESPACE",
            "STATUS",
            "VOLUME",
            "CAPACITY",
            "ACCESS MODES",
            "STORAGE CLASS",
            "AGE",
            "VOLUME MODE",
            "ANNOTATIONS",
            "SELECTOR",
        ]
    }

    fn build_row(
        &self,
        pvc: &PersistentVolumeClaim,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let spec = pvc.spec.as_ref();
        let status = pvc.status.as_ref();

        Ok(vec![
            name(&pvc.metadata),
            namespace(&pvc.metadata),
            or_sentinel(status.and_then(|s| s.phase.clone()), UNKNOWN),
            spec.and_then(|s| s.volume_name.clone()).unwrap_or_default(),
            status
                .and_then(|s| s.capacity.as_ref())
                .and_then(|c| c.get("storage"))
                .map(|q| q.0.clone())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            bracketed(spec.and_then(|s| s.access_modes.clone()).unwrap_or_default()),
            spec.and_then(|s| s.storage_class_name.clone())
                .unwrap_or_default(),
            age(pvc.metadata.creation_timestamp.as_ref(), now),
            spec.and_then(|s| s.volume_mode.clone()).unwrap_or_default(),
            join_map(pvc.metadata.annotations.as_ref()),
            spec.and_then(|s| s.selector.as_ref())
                .map(|sel| label_selector(Some(sel)))
                .unwrap_or_default(),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StorageClassCollector;

impl Collector for StorageClassCollector {
    type Resource = StorageClass;
    type Context = ();
    const KIND: &'static str = "storageclass";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "STORAGECLASS NAME",
            "PROVISIONER",
            "RECLAIM POLICY",
            "BINDING MODE",
            "ALLOW VOLUME EXPANSION",
            "DEFAULT",
            "PARAMETERS",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn build_row(&self, sc: &StorageClass, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let annotations = sc.metadata.annotations.as_ref();
        let is_default = annotations
            .and_then(|a| a.get(DEFAULT_CLASS_ANNOTATION))
            .is_some_and(|v| v == "true");

        Ok(vec![
            name(&sc.metadata),
            sc.provisioner.clone(),
            sc.reclaim_policy.clone().unwrap_or_default(),
            sc.volume_binding_mode.clone().unwrap_or_default(),
            yes_no(sc.allow_volume_expansion.unwrap_or(false)),
            is_default.to_string(),
            join_map(sc.parameters.as_ref()),
            age(sc.metadata.creation_timestamp.as_ref(), now),
            join_map(annotations),
        ])
    }
}
