use jiff::Timestamp;
use k8s_openapi::{
    api::batch::v1::{CronJob, Job},
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
};

use super::{name, namespace, Collector};
use crate::{
    error::CollectError,
    utils::{age, elapsed, instant, or_sentinel, NONE, NOT_AVAILABLE},
};

/// `name/namespace` of a pod or job template; `<none>` when neither is set.
fn template_ref(meta: Option<&ObjectMeta>) -> String {
    let name = meta.and_then(|m| m.name.as_deref()).unwrap_or_default();
    let namespace = meta.and_then(|m| m.namespace.as_deref()).unwrap_or_default();
    if name.is_empty() && namespace.is_empty() {
        return NONE.to_string();
    }
    format!("{name}/{namespace}")
}

/// Time since an instant, rounded like ages.
fn since(time: Option<&Time>, now: Timestamp) -> String {
    match time {
        Some(t) => age(Some(t), now),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JobCollector;

impl Collector for JobCollector {
    type Resource = Job;
    type Context = ();
    const KIND: &'static str = "job";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "JOB NAME",
            "NAMESPACE",
            "COMPLETIONS",
            "PARALLELISM",
            "ACTIVE PODS",
            "SUCCEEDED PODS",
            "FAILED PODS",
            "AGE",
            "CONDITIONS",
            "JOB DURATION",
            "JOB TEMPLATE",
        ]
    }

    fn build_row(&self, job: &Job, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = job.spec.as_ref();
        let status = job.status.as_ref();

        let duration = status
            .and_then(|s| {
                let start = instant(s.start_time.as_ref()?)?;
                let done = instant(s.completion_time.as_ref()?)?;
                Some(elapsed(start, done))
            })
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let conditions = status
            .and_then(|s| s.conditions.as_ref())
            .into_iter()
            .flatten()
            .map(|c| format!("{} ({})", c.type_, c.status))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(vec![
            name(&job.metadata),
            namespace(&job.metadata),
            spec.and_then(|s| s.completions).unwrap_or(1).to_string(),
            spec.and_then(|s| s.parallelism).unwrap_or(1).to_string(),
            status.and_then(|s| s.active).unwrap_or(0).to_string(),
            status.and_then(|s| s.succeeded).unwrap_or(0).to_string(),
            status.and_then(|s| s.failed).unwrap_or(0).to_string(),
            age(job.metadata.creation_timestamp.as_ref(), now),
            conditions,
            duration,
            template_ref(spec.and_then(|s| s.template.metadata.as_ref())),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CronJobCollector;

impl Collector for CronJobCollector {
    type Resource = CronJob;
    type Context = ();
    const KIND: &'static str = "cronjob";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "CRONJOB NAME",
            "NAMESPACE",
            "SCHEDULE",
            "ACTIVE JOBS",
            "LAST SCHEDULE",
            "AGE",
            "JOB DURATION",
            "JOB TEMPLATE",
            "HISTORY LIMIT",
            "CONCURRENCY POLICY",
        ]
    }

    fn build_row(
        &self,
        cron: &CronJob,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let spec = cron.spec.as_ref();
        let status = cron.status.as_ref();

        Ok(vec![
            name(&cron.metadata),
            namespace(&cron.metadata),
            spec.map(|s| s.schedule.clone()).unwrap_or_default(),
            status
                .and_then(|s| s.active.as_ref())
                .map_or(0, |a| a.len())
                .to_string(),
            since(status.and_then(|s| s.last_schedule_time.as_ref()), now),
            age(cron.metadata.creation_timestamp.as_ref(), now),
            since(status.and_then(|s| s.last_successful_time.as_ref()), now),
            template_ref(spec.and_then(|s| s.job_template.metadata.as_ref())),
            spec.and_then(|s| s.successful_jobs_history_limit)
                .unwrap_or(0)
                .to_string(),
            or_sentinel(spec.and_then(|s| s.concurrency_policy.clone()), "Allow"),
        ])
    }
}
