//! Deploy orchestrator.
//!
//! Walks a plan concurrently, dispatching each item's change group to its
//! adapter, merging authoritative results back into the shared plan elements
//! and turning the walk outcome into user-facing deploy errors.

use std::sync::{Mutex, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::element::{Change, merge_element, read_element, write_element};
use crate::error::{DeployActionError, NodeFailure, WalkError};
use crate::planner::{Plan, PlanItem, PlanItemId};

use super::adapter::{AdapterRegistry, ChangeGroup, DeployOptions};
use super::progress::{ItemStatus, PostDeployAction, ProgressReporter};
use super::result::{DeployError, DeployOutcome, ExtraProperties};

/// Orchestrates a deploy run over a plan.
#[derive(Debug)]
pub struct DeployOrchestrator<'a> {
    /// Adapters by namespace.
    adapters: &'a AdapterRegistry,
    /// Dispatch `validate` instead of `deploy`.
    check_only: bool,
    /// Upper bound on groups dispatched at once.
    max_concurrent_groups: Option<usize>,
}

/// State shared by every item handler of one run.
struct DeployRun<'a> {
    plan: &'a Plan,
    adapters: &'a AdapterRegistry,
    reporter: &'a dyn ProgressReporter,
    post_deploy: &'a dyn PostDeployAction,
    check_only: bool,
    limiter: Option<Semaphore>,
    applied: Mutex<Vec<Change>>,
    extra: Mutex<ExtraProperties>,
}

impl<'a> DeployOrchestrator<'a> {
    /// Creates an orchestrator over the given adapters.
    #[must_use]
    pub const fn new(adapters: &'a AdapterRegistry) -> Self {
        Self {
            adapters,
            check_only: false,
            max_concurrent_groups: None,
        }
    }

    /// Sets whether groups are validated instead of deployed.
    #[must_use]
    pub const fn with_check_only(mut self, check_only: bool) -> Self {
        self.check_only = check_only;
        self
    }

    /// Limits how many groups are dispatched at once. `None` is unbounded.
    #[must_use]
    pub const fn with_max_concurrent_groups(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_groups = limit;
        self
    }

    /// Deploys every item of `plan`.
    ///
    /// Never fails as a whole: every item-level problem is returned in
    /// [`DeployOutcome::errors`], alongside the changes that were applied.
    pub async fn deploy_actions(
        &self,
        plan: &Plan,
        reporter: &dyn ProgressReporter,
        post_deploy: &dyn PostDeployAction,
    ) -> DeployOutcome {
        info!(
            "Deploying plan with {} items{}",
            plan.len(),
            if self.check_only { " (check only)" } else { "" }
        );

        let run = DeployRun {
            plan,
            adapters: self.adapters,
            reporter,
            post_deploy,
            check_only: self.check_only,
            limiter: self.max_concurrent_groups.map(|limit| Semaphore::new(limit.max(1))),
            applied: Mutex::new(Vec::new()),
            extra: Mutex::new(ExtraProperties::default()),
        };

        let walked = {
            let run = &run;
            plan.walk_async(move |id| async move { run.deploy_item(&id).await })
                .await
        };

        let errors = match walked {
            Ok(()) => Vec::new(),
            Err(walk_error) => run.collect_errors(walk_error),
        };

        let outcome = DeployOutcome {
            errors,
            applied_changes: run.applied.into_inner().unwrap_or_else(PoisonError::into_inner),
            extra_properties: run.extra.into_inner().unwrap_or_else(PoisonError::into_inner),
        };
        info!("{outcome}");
        outcome
    }
}

impl DeployRun<'_> {
    async fn deploy_item(&self, id: &PlanItemId) -> Result<(), DeployActionError> {
        let Some(item) = self.plan.item(id) else {
            return Err(DeployActionError::UnknownItem { id: id.to_string() });
        };

        self.reporter.report(item, ItemStatus::Started, None);
        match self.dispatch(item).await {
            Ok(()) => {
                self.reporter.report(item, ItemStatus::Finished, None);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                error!("Failed to deploy {}: {message}", item.group_key());
                self.reporter.report(item, ItemStatus::Error, Some(&message));
                Err(e)
            }
        }
    }

    async fn dispatch(&self, item: &PlanItem) -> Result<(), DeployActionError> {
        let adapter_name = item.adapter_name().unwrap_or_default();
        let Some(adapter) = self.adapters.get(&adapter_name) else {
            return Err(DeployActionError::MissingAdapter {
                adapter: adapter_name,
            });
        };
        if self.check_only && !adapter.supports_validate() {
            return Err(DeployActionError::ValidateUnsupported {
                adapter: adapter_name,
            });
        }

        let options = DeployOptions {
            change_group: ChangeGroup {
                group_id: item.group_key().to_string(),
                changes: item.changes().to_vec(),
            },
        };

        // The semaphore is owned by the run and never closed.
        let permit = match &self.limiter {
            Some(limiter) => limiter.acquire().await.ok(),
            None => None,
        };
        debug!("Dispatching {} to adapter {adapter_name}", item.group_key());
        let result = if self.check_only {
            adapter.validate(options).await?
        } else {
            adapter.deploy(options).await?
        };
        drop(permit);

        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(result.applied_changes.iter().cloned());
        self.extra
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(&result.extra_properties);

        update_plan_elements(item, &result.applied_changes);

        self.post_deploy
            .on_applied(&result.applied_changes)
            .await
            .map_err(DeployActionError::PostDeploy)?;

        if result.errors.is_empty() {
            return Ok(());
        }
        let message = result
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Err(DeployActionError::GroupFailed {
            group_key: item.group_key().to_string(),
            message,
        })
    }

    fn collect_errors(
        &self,
        walk_error: WalkError<PlanItemId, DeployActionError>,
    ) -> Vec<DeployError> {
        let (node_errors, circular) = walk_error.into_parts();
        let mut errors = Vec::new();

        for (id, failure) in node_errors {
            let item = self.plan.item(&id);
            let elem_ids = item.map(PlanItem::elem_ids).unwrap_or_default();
            match failure {
                NodeFailure::Failed(e) => errors.push(DeployError::failed(elem_ids, e.to_string())),
                NodeFailure::Skipped { causing } => {
                    let causing_key = self
                        .plan
                        .item(&causing)
                        .map_or_else(|| causing.to_string(), |c| c.group_key().to_string());
                    if let Some(item) = item {
                        self.reporter.report(item, ItemStatus::Cancelled, Some(&causing_key));
                    }
                    errors.push(DeployError::dependency(
                        elem_ids,
                        format!(
                            "Element was not deployed, as it depends on {causing_key} which failed to deploy"
                        ),
                    ));
                }
            }
        }

        if let Some(circular) = circular {
            let message = circular.to_string();
            warn!("{message}");
            for id in circular.node_ids() {
                let Some(item) = self.plan.item(id) else {
                    continue;
                };
                self.reporter.report(item, ItemStatus::Error, Some(&message));
                errors.push(DeployError::circular(item.elem_ids(), message.clone()));
            }
        }

        errors
    }
}

/// Patches the item's own change data with the values the adapter applied.
///
/// Later items referencing these elements observe the patched values.
fn update_plan_elements(item: &PlanItem, applied: &[Change]) {
    for applied_change in applied.iter().filter(|c| c.is_addition_or_modification()) {
        let elem_id = applied_change.elem_id();
        let Some(plan_change) = item
            .changes()
            .iter()
            .find(|c| c.is_addition_or_modification() && c.elem_id() == elem_id)
        else {
            debug!("Applied change {elem_id} has no counterpart in {}", item.group_key());
            continue;
        };
        if plan_change.shares_data_with(applied_change) {
            continue;
        }

        let updated = read_element(applied_change.data()).clone();
        let patched = merge_element(&mut write_element(plan_change.data()), &updated);
        if patched > 0 {
            debug!("Patched {patched} values of {elem_id}");
        }
    }
}

/// Deploys `plan` with a default orchestrator.
pub async fn deploy_actions(
    plan: &Plan,
    adapters: &AdapterRegistry,
    reporter: &dyn ProgressReporter,
    post_deploy: &dyn PostDeployAction,
    check_only: bool,
) -> DeployOutcome {
    DeployOrchestrator::new(adapters)
        .with_check_only(check_only)
        .deploy_actions(plan, reporter, post_deploy)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::adapter::{Adapter, DeployResult};
    use crate::deploy::progress::NoopPostDeployAction;
    use crate::deploy::result::{DeployErrorKind, GroupProperties};
    use crate::element::{ElemId, Element, ReferenceExpression, Value};
    use crate::error::{AdapterError, GantryError, Result};
    use crate::planner::PlanBuilder;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type AdapterResult = std::result::Result<DeployResult, AdapterError>;
    type Script = Box<dyn Fn(&DeployOptions) -> AdapterResult + Send + Sync>;

    struct ScriptedAdapter {
        script: Script,
        delays: HashMap<String, u64>,
        validate: bool,
        deployed: Mutex<Vec<String>>,
        validated: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(script: Script) -> Self {
            Self {
                script,
                delays: HashMap::new(),
                validate: false,
                deployed: Mutex::new(Vec::new()),
                validated: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn applying_all() -> Self {
            Self::new(Box::new(|options| Ok(apply_all(options))))
        }

        fn with_delay(mut self, group: &str, millis: u64) -> Self {
            self.delays.insert(group.to_string(), millis);
            self
        }

        fn deployed(&self) -> Vec<String> {
            let mut groups = self.deployed.lock().expect("lock").clone();
            groups.sort();
            groups
        }

        async fn run(&self, options: &DeployOptions) -> AdapterResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let delay = self.delays.get(&options.change_group.group_id).copied().unwrap_or(1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.script)(options)
        }
    }

    #[async_trait]
    impl Adapter for ScriptedAdapter {
        async fn deploy(&self, options: DeployOptions) -> AdapterResult {
            self.deployed
                .lock()
                .expect("lock")
                .push(options.change_group.group_id.clone());
            self.run(&options).await
        }

        fn supports_validate(&self) -> bool {
            self.validate
        }

        async fn validate(&self, options: DeployOptions) -> AdapterResult {
            self.validated
                .lock()
                .expect("lock")
                .push(options.change_group.group_id.clone());
            self.run(&options).await
        }
    }

    mock! {
        Backend {}

        #[async_trait]
        impl Adapter for Backend {
            async fn deploy(
                &self,
                options: DeployOptions,
            ) -> std::result::Result<DeployResult, AdapterError>;
            fn supports_validate(&self) -> bool;
            async fn validate(
                &self,
                options: DeployOptions,
            ) -> std::result::Result<DeployResult, AdapterError>;
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<(String, ItemStatus, Option<String>)>>,
    }

    impl RecordingReporter {
        fn statuses(&self, group: &str) -> Vec<ItemStatus> {
            self.events
                .lock()
                .expect("lock")
                .iter()
                .filter(|(g, _, _)| g == group)
                .map(|(_, status, _)| *status)
                .collect()
        }

        fn details(&self, group: &str, status: ItemStatus) -> Option<String> {
            self.events
                .lock()
                .expect("lock")
                .iter()
                .find(|(g, s, _)| g == group && *s == status)
                .and_then(|(_, _, details)| details.clone())
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, item: &PlanItem, status: ItemStatus, details: Option<&str>) {
            self.events.lock().expect("lock").push((
                item.group_key().to_string(),
                status,
                details.map(str::to_string),
            ));
        }
    }

    #[derive(Default)]
    struct RecordingPostDeploy {
        batches: Mutex<Vec<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl PostDeployAction for RecordingPostDeploy {
        async fn on_applied(&self, applied: &[Change]) -> Result<()> {
            self.batches.lock().expect("lock").push(applied.len());
            if self.fail {
                return Err(GantryError::internal("state write failed"));
            }
            Ok(())
        }
    }

    fn apply_all(options: &DeployOptions) -> DeployResult {
        DeployResult {
            applied_changes: options.change_group.changes.clone(),
            ..DeployResult::default()
        }
    }

    fn account(adapter: &str, name: &str) -> Element {
        Element::new(
            ElemId::instance_id(adapter, "Account", name),
            Value::from(json!({ "name": name })),
        )
    }

    fn item(id: &str) -> PlanItem {
        PlanItem::new(id, id, vec![Change::add(account("salto", id).shared())])
    }

    fn plan(items: Vec<PlanItem>, edges: &[(&str, &str)]) -> Plan {
        let mut builder = PlanBuilder::new();
        for item in items {
            builder.add_item(item).expect("add item");
        }
        for (dependent, dependency) in edges {
            builder.add_dependency(*dependent, *dependency).expect("add edge");
        }
        builder.build()
    }

    fn registry(name: &str, adapter: Arc<dyn Adapter>) -> AdapterRegistry {
        AdapterRegistry::new().with_adapter(name, adapter)
    }

    #[tokio::test]
    async fn test_all_items_succeed() {
        let adapter = Arc::new(ScriptedAdapter::applying_all());
        let adapters = registry("salto", adapter.clone());
        let plan = plan(vec![item("a"), item("b"), item("c")], &[("b", "a")]);
        let reporter = RecordingReporter::default();
        let post = RecordingPostDeploy::default();

        let outcome = DeployOrchestrator::new(&adapters)
            .deploy_actions(&plan, &reporter, &post)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.applied_changes.len(), 3);
        assert_eq!(adapter.deployed(), vec!["a", "b", "c"]);
        for group in ["a", "b", "c"] {
            assert_eq!(reporter.statuses(group), vec![ItemStatus::Started, ItemStatus::Finished]);
        }
        assert_eq!(post.batches.lock().expect("lock").len(), 3);
    }

    #[tokio::test]
    async fn test_failure_cascades_to_dependents() {
        let adapter = Arc::new(ScriptedAdapter::new(Box::new(|options| {
            if options.change_group.group_id == "a" {
                Err(AdapterError::request("connection reset"))
            } else {
                Ok(apply_all(options))
            }
        })));
        let adapters = registry("salto", adapter.clone());
        let plan = plan(
            vec![item("a"), item("b"), item("c"), item("d")],
            &[("b", "a"), ("c", "b")],
        );
        let reporter = RecordingReporter::default();

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &reporter,

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert_eq!(adapter.deployed(), vec!["a", "d"]);
        assert_eq!(outcome.applied_changes.len(), 1);
        assert_eq!(reporter.statuses("a"), vec![ItemStatus::Started, ItemStatus::Error]);
        assert_eq!(reporter.statuses("b"), vec![ItemStatus::Cancelled]);
        assert_eq!(reporter.details("c", ItemStatus::Cancelled).as_deref(), Some("a"));

        let skipped: Vec<&DeployError> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == DeployErrorKind::Dependency)
            .collect();
        assert_eq!(skipped.len(), 2);
        for error in skipped {
            assert_eq!(
                error.message,
                "Element was not deployed, as it depends on a which failed to deploy"
            );
        }
        let failed: Vec<&DeployError> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == DeployErrorKind::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].message, "Adapter request failed: connection reset");
        assert_eq!(failed[0].elem_ids, vec![ElemId::instance_id("salto", "Account", "a")]);
    }

    #[tokio::test]
    async fn test_failed_node_skips_without_dispatch() {
        let mut backend = MockBackend::new();
        backend.expect_supports_validate().return_const(false);
        backend
            .expect_deploy()
            .withf(|options| options.change_group.group_id == "a")
            .times(1)
            .returning(|_| Err(AdapterError::request("boom")));
        let adapters = registry("salto", Arc::new(backend));
        let plan = plan(vec![item("a"), item("b")], &[("b", "a")]);

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &RecordingReporter::default(),

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.skipped_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_is_reported_and_isolated() {
        let adapter = Arc::new(ScriptedAdapter::applying_all());
        let adapters = registry("salto", adapter.clone());
        let plan = plan(
            vec![item("a"), item("b"), item("d"), item("x")],
            &[("a", "b"), ("b", "a"), ("x", "a")],
        );
        let reporter = RecordingReporter::default();

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &reporter,

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert_eq!(adapter.deployed(), vec!["d"]);
        assert_eq!(outcome.applied_changes.len(), 1);
        assert_eq!(
            outcome.applied_changes[0].elem_id(),
            ElemId::instance_id("salto", "Account", "d")
        );

        let circular: Vec<&DeployError> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == DeployErrorKind::CircularDependency)
            .collect();
        assert_eq!(circular.len(), 2);
        assert!(circular[0].message.starts_with("Circular dependencies exist among these items"));
        assert_eq!(reporter.statuses("a"), vec![ItemStatus::Error]);
        assert_eq!(reporter.statuses("d"), vec![ItemStatus::Started, ItemStatus::Finished]);

        assert_eq!(reporter.statuses("x"), vec![ItemStatus::Cancelled]);
        assert_eq!(reporter.details("x", ItemStatus::Cancelled).as_deref(), Some("a"));
        let skipped: Vec<&DeployError> = outcome
            .errors
            .iter()
            .filter(|e| e.kind == DeployErrorKind::Dependency)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].elem_ids, vec![ElemId::instance_id("salto", "Account", "x")]);
        assert_eq!(
            skipped[0].message,
            "Element was not deployed, as it depends on a which failed to deploy"
        );
    }

    #[tokio::test]
    async fn test_applied_values_propagate_to_dependents() {
        let account_elem = Element::new(
            ElemId::instance_id("salto", "Account", "acme"),
            Value::from(json!({ "id": null, "name": "acme" })),
        )
        .shared();
        let mut contact_value = Value::from(json!({ "name": "bob" }));
        assert!(contact_value.set_path(
            &["account_id"],
            Value::Reference(ReferenceExpression::linked(
                ElemId::instance_id("salto", "Account", "acme").create_nested_id(&["id"]),
                account_elem.clone(),
            )),
        ));
        let contact =
            Element::new(ElemId::instance_id("salto", "Contact", "bob"), contact_value).shared();

        let observed = Arc::new(Mutex::new(None));
        let seen = observed.clone();
        let adapter = Arc::new(ScriptedAdapter::new(Box::new(move |options| {
            let group = &options.change_group;
            if group.group_id == "g1" {
                let created = Element::new(
                    ElemId::instance_id("salto", "Account", "acme"),
                    Value::from(json!({ "id": 42, "name": "acme" })),
                );
                return Ok(DeployResult {
                    applied_changes: vec![Change::add(created.shared())],
                    ..DeployResult::default()
                });
            }
            let resolved = read_element(group.changes[0].data()).resolved_value();
            *seen.lock().expect("lock") = resolved.get_path(&["account_id"]).cloned();
            Ok(apply_all(options))
        })));
        let adapters = registry("salto", adapter);
        let plan = plan(
            vec![
                PlanItem::new("g1", "g1", vec![Change::add(account_elem.clone())]),
                PlanItem::new("g2", "g2", vec![Change::add(contact)]),
            ],
            &[("g2", "g1")],
        );

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &RecordingReporter::default(),

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert!(outcome.is_success());
        assert_eq!(*observed.lock().expect("lock"), Some(Value::from(42_i64)));
        assert_eq!(
            read_element(&account_elem).value.get_path(&["id"]),
            Some(&Value::from(42_i64))
        );
    }

    #[tokio::test]
    async fn test_empty_applied_changes_leave_plan_untouched() {
        let element = account("salto", "a").shared();
        let adapter = Arc::new(ScriptedAdapter::new(Box::new(|_| Ok(DeployResult::default()))));
        let adapters = registry("salto", adapter);
        let plan = plan(vec![PlanItem::new("a", "a", vec![Change::add(element.clone())])], &[]);
        let before = read_element(&element).clone();

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &RecordingReporter::default(),

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert!(outcome.is_success());
        assert!(outcome.applied_changes.is_empty());
        assert_eq!(*read_element(&element), before);
    }

    #[tokio::test]
    async fn test_check_only_requires_validate() {
        let mut backend = MockBackend::new();
        backend.expect_supports_validate().return_const(false);
        backend.expect_deploy().never();
        backend.expect_validate().never();
        let adapters = registry("salto", Arc::new(backend));
        let plan = plan(vec![item("a")], &[]);

        let outcome = DeployOrchestrator::new(&adapters)
            .with_check_only(true)
            .deploy_actions(&plan, &RecordingReporter::default(), &NoopPostDeployAction)
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            outcome.errors[0].message,
            "Check-only deployment is not supported in adapter salto"
        );
    }

    #[tokio::test]
    async fn test_check_only_dispatches_validate() {
        let mut scripted = ScriptedAdapter::applying_all();
        scripted.validate = true;
        let adapter = Arc::new(scripted);
        let adapters = registry("salto", adapter.clone());
        let plan = plan(vec![item("a"), item("b")], &[("b", "a")]);

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &RecordingReporter::default(),

            &NoopPostDeployAction,

            true,

        )

        .await;

        assert!(outcome.is_success());
        assert!(adapter.deployed().is_empty());
        assert_eq!(adapter.validated.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn test_missing_adapter_fails_item() {
        let adapters = registry("salto", Arc::new(ScriptedAdapter::applying_all()));
        let jira = PlanItem::new("j", "j", vec![Change::add(account("jira", "j").shared())]);
        let plan = plan(vec![jira, item("a"), item("b")], &[("b", "j")]);
        let reporter = RecordingReporter::default();

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &reporter,

            &NoopPostDeployAction,

            false,

        )

        .await;

        assert_eq!(outcome.applied_changes.len(), 1);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(
            reporter.details("j", ItemStatus::Error).as_deref(),
            Some("Missing adapter for jira")
        );
        assert_eq!(reporter.statuses("b"), vec![ItemStatus::Cancelled]);
    }

    #[tokio::test]
    async fn test_adapter_reported_errors_fail_the_group() {
        let adapter = Arc::new(ScriptedAdapter::new(Box::new(|options| {
            let mut result = apply_all(options);
            if options.change_group.group_id == "a" {
                result.errors = vec![
                    DeployError::failed(vec![], "field x is read-only"),
                    DeployError::failed(vec![], "field y is required"),
                ];
            }
            Ok(result)
        })));
        let adapters = registry("salto", adapter);
        let plan = plan(vec![item("a"), item("b")], &[("b", "a")]);
        let reporter = RecordingReporter::default();
        let post = RecordingPostDeploy::default();

        let outcome = DeployOrchestrator::new(&adapters)
            .deploy_actions(&plan, &reporter, &post)
            .await;

        assert_eq!(outcome.applied_changes.len(), 1);
        assert_eq!(*post.batches.lock().expect("lock"), vec![1]);
        assert_eq!(
            reporter.details("a", ItemStatus::Error).as_deref(),
            Some("field x is read-only\nfield y is required")
        );
        assert_eq!(outcome.skipped_count(), 1);
    }

    #[tokio::test]
    async fn test_post_deploy_failure_fails_the_group() {
        let adapters = registry("salto", Arc::new(ScriptedAdapter::applying_all()));
        let plan = plan(vec![item("a")], &[]);
        let post = RecordingPostDeploy {
            fail: true,
            ..RecordingPostDeploy::default()
        };

        let outcome = DeployOrchestrator::new(&adapters)
            .deploy_actions(&plan, &RecordingReporter::default(), &post)
            .await;

        assert_eq!(outcome.applied_changes.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.starts_with("Post-deploy action failed"));
    }

    #[tokio::test]
    async fn test_extra_properties_from_concurrent_groups() {
        let adapter = ScriptedAdapter::new(Box::new(|options| {
            let group = options.change_group.group_id.clone();
            Ok(DeployResult {
                extra_properties: ExtraProperties {
                    deployment_urls: vec![format!("https://deploy.example/{group}")],
                    groups: vec![GroupProperties {
                        id: group,
                        request_id: None,
                        url: None,
                    }],
                },
                ..apply_all(options)
            })
        }))
        .with_delay("slow", 30)
        .with_delay("fast", 1);
        let adapters = registry("salto", Arc::new(adapter));
        let plan = plan(vec![item("slow"), item("fast")], &[]);

        let outcome = deploy_actions(

            &plan,

            &adapters,

            &RecordingReporter::default(),

            &NoopPostDeployAction,

            false,

        )

        .await;

        let mut urls = outcome.extra_properties.deployment_urls.clone();
        urls.sort();
        assert_eq!(
            urls,
            vec!["https://deploy.example/fast", "https://deploy.example/slow"]
        );
        assert_eq!(outcome.extra_properties.groups.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let adapter = Arc::new(
            ScriptedAdapter::applying_all()
                .with_delay("a", 10)
                .with_delay("b", 10)
                .with_delay("c", 10),
        );
        let adapters = registry("salto", adapter.clone());
        let plan = plan(vec![item("a"), item("b"), item("c")], &[]);

        let outcome = DeployOrchestrator::new(&adapters)
            .with_max_concurrent_groups(Some(1))
            .deploy_actions(&plan, &RecordingReporter::default(), &NoopPostDeployAction)
            .await;

        assert!(outcome.is_success());
        assert_eq!(adapter.max_in_flight.load(Ordering::SeqCst), 1);

        let unbounded = Arc::new(
            ScriptedAdapter::applying_all()
                .with_delay("a", 10)
                .with_delay("b", 10)
                .with_delay("c", 10),
        );
        let adapters = registry("salto", unbounded.clone());
        let _ = deploy_actions(
            &plan,
            &adapters,
            &RecordingReporter::default(),
            &NoopPostDeployAction,
            false,
        )
        .await;
        assert_eq!(unbounded.max_in_flight.load(Ordering::SeqCst), 3);
    }
}
