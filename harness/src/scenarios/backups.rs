use super::str_of;
use crate::expectation::{Expectation, Shape, Verdict};
use crate::registry::ResourceKind;
use crate::scenario::{Scenario, ScenarioContext, ScenarioError, ScenarioResult};
use async_trait::async_trait;
use client::ApiRequest;
use std::time::Duration;
use tracing::debug;

/// Backup creation, listing and deletion.
///
/// Backups are written by a background job, so the listing is polled until
/// the new id shows up.
pub struct BackupsScenario {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for BackupsScenario {
    fn default() -> Self {
        Self {
            poll_attempts: 10,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl Scenario for BackupsScenario {
    fn name(&self) -> &str {
        "backups"
    }

    fn description(&self) -> &str {
        "Backup create, appears in list, delete, then 404 on second delete"
    }

    async fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<()> {
        let step = "Create backup";
        let started = ctx
            .expect(
                step,
                ApiRequest::post("/backup/create").with_query("username", "seal-harness"),
                &Expectation::success(Shape::non_empty("backup_id")),
            )
            .await;
        let body = started
            .success_json()
            .ok_or_else(|| ScenarioError::setup(step, started.summary()))?;
        let backup_id = ctx.created().register_from(ResourceKind::Backup, body)?;
        debug!(%backup_id, status = str_of(body, "status"), "backup started");

        let listed_shape = Shape::contains("backup_id", backup_id.as_str());
        let mut listed = Verdict::Fail("backup list never fetched".to_string());
        let attempts = self.poll_attempts.max(1);
        for attempt in 1..=attempts {
            let exchange = ctx.session().get("/backup/list").await;
            listed = match exchange.success_json() {
                Some(list) => listed_shape.verdict(list, format!("listed after {} poll(s)", attempt)),
                None => Verdict::Fail(exchange.summary()),
            };
            if listed.is_pass() || attempt == attempts {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        ctx.verdict("Backup appears in list", listed);

        let item = ResourceKind::Backup.item_path(&backup_id);
        let deleted = ctx
            .expect("Delete backup", ApiRequest::delete(item.as_str()), &Expectation::ok())
            .await;
        if deleted.is_success() {
            ctx.created().forget(ResourceKind::Backup, &backup_id);
            ctx.expect(
                "Deleting backup twice reports missing",
                ApiRequest::delete(item.as_str()),
                &Expectation::error([404]),
            )
            .await;
        }

        Ok(())
    }
}
