//! Executes a plan in dependency order, polls for reconcile status, prunes
//! objects no longer desired, and updates the inventory.

use std::collections::HashSet;
use std::time::Duration;

use kpt_errors::{Error, ErrorKind, Event, EventAction, EventGroup};
use kpt_inventory::{InventoryStore, ObjectReference};
use kpt_krm::{Resource, ResourceIdentity};
use kube::api::{Api, DeleteParams, DynamicObject};
use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::graph::DependencyGraph;
use crate::plan::{Action, Planner};
use crate::status::{self, ReconcileStatus};

pub struct ApplyConfig {
    pub reconcile_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self { reconcile_timeout: Duration::from_secs(120), poll_interval: Duration::from_secs(2) }
    }
}

pub struct ApplyOutcome {
    pub events: Vec<Event>,
    pub final_inventory: Vec<ObjectReference>,
}

/// Applies `desired` against the cluster, prunes anything in the previous
/// inventory that's absent from `desired`, and returns the event stream
/// plus the inventory's new contents per the superset-merge rule.
pub async fn apply(
    client: &Client,
    store: &InventoryStore,
    inventory_namespace: &str,
    inventory_name: &str,
    desired: &[Resource],
    cancel: &CancellationToken,
    config: &ApplyConfig,
) -> Result<ApplyOutcome, Error> {
    let mut events = vec![Event { group: EventGroup::Apply, action: EventAction::Init, subject: "apply".to_owned() }];

    let previous = store
        .get(inventory_namespace, inventory_name)
        .await?
        .map(|rg| rg.spec.resources)
        .unwrap_or_default();

    let graph = DependencyGraph::build(desired)?;
    let order = graph.apply_order()?;
    let by_identity: std::collections::HashMap<ResourceIdentity, &Resource> =
        desired.iter().map(|r| (r.identity(), r)).collect();

    let planner = Planner::new(client.clone()).await?;

    let mut applied_ok = Vec::new();
    let mut applied_failed = Vec::new();
    let mut skipped = Vec::new();

    for identity in &order {
        if cancel.is_cancelled() {
            events.push(Event { group: EventGroup::Apply, action: EventAction::Error { kind: ErrorKind::Cancelled, message: "apply cancelled".to_owned() }, subject: identity.to_string() });
            break;
        }
        let Some(resource) = by_identity.get(identity) else { continue };
        let planned = planner.plan_one(resource).await;

        match &planned.action {
            Action::Skip => {
                skipped.push(identity.clone());
                continue;
            }
            Action::Error(message) => {
                applied_failed.push(identity.clone());
                events.push(Event {
                    group: EventGroup::Apply,
                    action: EventAction::Error { kind: ErrorKind::Upstream, message: message.clone() },
                    subject: identity.to_string(),
                });
                continue;
            }
            Action::Create | Action::Update | Action::Unchanged => {
                events.push(Event { group: EventGroup::Apply, action: EventAction::Apply, subject: identity.to_string() });
                let reconciled = wait_for_current(client, identity, config).await;
                match reconciled {
                    Ok(ReconcileStatus::Current) => applied_ok.push(identity.clone()),
                    Ok(_) => applied_failed.push(identity.clone()),
                    Err(_) => applied_failed.push(identity.clone()),
                }
            }
            Action::Delete => unreachable!("plan_one never classifies a desired object as Delete"),
        }
    }

    let desired_identities: HashSet<ResourceIdentity> = desired.iter().map(Resource::identity).collect();
    let mut pruned_ok = Vec::new();
    let mut pruned_failed = Vec::new();

    for reference in &previous {
        let identity = ResourceIdentity::new(
            reference.group.clone(),
            reference.kind.clone(),
            reference.namespace.clone(),
            reference.name.clone(),
        );
        if desired_identities.contains(&identity) {
            continue;
        }
        match delete_object(client, &identity).await {
            Ok(()) => {
                pruned_ok.push(identity.clone());
                events.push(Event { group: EventGroup::Prune, action: EventAction::Prune, subject: identity.to_string() });
            }
            Err(e) => {
                pruned_failed.push(identity.clone());
                events.push(Event {
                    group: EventGroup::Prune,
                    action: EventAction::Error { kind: e.kind(), message: e.flatten() },
                    subject: identity.to_string(),
                });
            }
        }
    }

    let final_inventory = merge_inventory(&previous, &applied_ok, &applied_failed, &skipped, &pruned_ok, &pruned_failed);

    store
        .update_resources(inventory_namespace, inventory_name, |resources| {
            *resources = final_inventory.clone();
        })
        .await?;

    Ok(ApplyOutcome { events, final_inventory })
}

/// The superset-merge rule: anything in the cluster should be in the
/// inventory unless explicitly abandoned.
fn merge_inventory(
    previous: &[ObjectReference],
    applied_ok: &[ResourceIdentity],
    applied_failed: &[ResourceIdentity],
    skipped: &[ResourceIdentity],
    pruned_ok: &[ResourceIdentity],
    pruned_failed: &[ResourceIdentity],
) -> Vec<ObjectReference> {
    let previous_set: HashSet<&ObjectReference> = previous.iter().collect();
    let contains = |identity: &ResourceIdentity| {
        let reference = to_reference(identity);
        previous_set.contains(&reference)
    };

    let mut kept: Vec<ObjectReference> = applied_ok.iter().map(to_reference).collect();
    for identity in applied_failed.iter().chain(skipped).chain(pruned_failed) {
        if contains(identity) {
            kept.push(to_reference(identity));
        }
    }
    let pruned_ok_set: HashSet<ResourceIdentity> = pruned_ok.iter().cloned().collect();
    kept.retain(|reference| !pruned_ok_set.contains(&from_reference(reference)));

    let mut seen = HashSet::new();
    kept.into_iter().filter(|r| seen.insert(r.clone())).collect()
}

fn to_reference(identity: &ResourceIdentity) -> ObjectReference {
    ObjectReference {
        group: identity.group.clone(),
        kind: identity.kind.clone(),
        namespace: identity.namespace.clone(),
        name: identity.name.clone(),
    }
}

fn from_reference(reference: &ObjectReference) -> ResourceIdentity {
    ResourceIdentity::new(reference.group.clone(), reference.kind.clone(), reference.namespace.clone(), reference.name.clone())
}

async fn wait_for_current(client: &Client, identity: &ResourceIdentity, config: &ApplyConfig) -> Result<ReconcileStatus, Error> {
    let deadline = tokio::time::Instant::now() + config.reconcile_timeout;
    loop {
        let object = fetch(client, identity).await?;
        let current = status::compute(&object);
        if matches!(current, ReconcileStatus::Current | ReconcileStatus::Failed) {
            return Ok(current);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::new(ErrorKind::Cancelled, format!("{identity} did not reconcile within {:?}", config.reconcile_timeout)));
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}

async fn fetch(client: &Client, identity: &ResourceIdentity) -> Result<DynamicObject, Error> {
    let api = api_for(client, identity).await?;
    api.get(&identity.name)
        .await
        .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to read {identity}"), e))
}

async fn delete_object(client: &Client, identity: &ResourceIdentity) -> Result<(), Error> {
    let api = api_for(client, identity).await?;
    api.delete(&identity.name, &DeleteParams::default())
        .await
        .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to delete {identity}"), e))?;
    Ok(())
}

/// Resolves `identity`'s group+kind to its preferred-version API resource.
/// `ResourceIdentity` carries no version, so this takes whichever version
/// the server recommends rather than an exact GVK match.
async fn api_for(client: &Client, identity: &ResourceIdentity) -> Result<Api<DynamicObject>, Error> {
    let discovery = kube::discovery::Discovery::new(client.clone())
        .run()
        .await
        .map_err(|e| Error::with_source(ErrorKind::Upstream, "failed to discover cluster API resources", e))?;
    let ar = discovery
        .groups()
        .find(|group| group.name() == identity.group)
        .and_then(|group| {
            group
                .recommended_resources()
                .into_iter()
                .find(|(ar, _)| ar.kind == identity.kind)
        })
        .map(|(ar, _caps)| ar)
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, format!("no API resource found for {identity}")))?;
    Ok(if identity.namespace.is_empty() {
        Api::all_with(client.clone(), &ar)
    } else {
        Api::namespaced_with(client.clone(), &identity.namespace, &ar)
    })
}
