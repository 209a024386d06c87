// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use cozystack_operator::{
    backup_crd::{BackupJob, Plan, RestoreJob},
    config::{ControllerName, OperatorConfig, WorkloadKind},
    constants::{
        CRD_ESTABLISHED_TIMEOUT_SECS, KIND_APPLICATION_DEFINITION, KIND_BACKUP_JOB, KIND_BUNDLE,
        KIND_PACKAGE, KIND_PACKAGE_SOURCE, KIND_PLAN, KIND_PLATFORM, KIND_PLATFORM_CONFIGURATION,
        KIND_RESTORE_JOB, TOKIO_WORKER_THREADS, VALUES_SECRET_NAME,
    },
    context::{Context, Stores},
    controller::{error_policy, instrument},
    crd::{
        ApplicationDefinition, Bundle, Package, PackageSource, Platform, PlatformConfiguration,
    },
    crd_install::{all_crds, install_crds, load_manifest},
    external::{ArtifactGenerator, GitRepository, HelmRelease, WorkloadMonitor},
    labels::PACKAGE,
    leader,
    lineage::{parse_watch_list, ApplicationRegistry, ClusterObjectGraph},
    reconcilers::{
        bundle::release_bundle,
        config_hash::{workload_ref, ConfigHashContext, Debouncer},
        lineage_labeler::LineageContext,
        namespace_labels::release_namespace,
        package::{dependents_to_enqueue, PackageIndex},
        packagesource::generator_owner,
        platform::labeled_platform,
        reconcile_application_definition, reconcile_backup_job, reconcile_bundle,
        reconcile_config_hash, reconcile_dashboard, reconcile_flux_plunger, reconcile_lineage,
        reconcile_namespace_labels,
        reconcile_package, reconcile_packagesource, reconcile_plan, reconcile_platform,
        reconcile_platform_configuration, reconcile_restore_job, reconcile_secret_replicas,
        reconcile_subresource_rbac, reconcile_workload_monitors,
        secret_replicator::source_secret_ref,
    },
    server::{start_server, ServerState},
};
use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{
    api::{Api, DynamicObject},
    discovery::{pinned_kind, Scope},
    runtime::{
        reflector::{self, ObjectRef, Store},
        watcher::{self, Config},
        Controller, WatchStreamExt,
    },
    Client, Resource, ResourceExt,
};
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Metric labels of controllers that do not own a CRD.
const DASHBOARD: &str = "Dashboard";
const SUBRESOURCE_RBAC: &str = "SubresourceRbac";
const WORKLOAD_MONITOR: &str = "WorkloadMonitor";
const NAMESPACE_LABELS: &str = "NamespaceLabels";
const LINEAGE: &str = "Lineage";
const SECRET_REPLICATOR: &str = "SecretReplicator";
const CONFIG_HASH: &str = "ConfigHash";
const FLUX_PLUNGER: &str = "FluxPlunger";

type ControllerFuture = BoxFuture<'static, Result<()>>;

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("cozystack-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let config = Arc::new(OperatorConfig::parse());
    info!(
        hub_namespace = %config.hub_namespace,
        controllers = ?config.controllers,
        "Starting Cozystack operator"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    if config.install_crds {
        let crds = match &config.crd_manifest {
            Some(path) => load_manifest(path).await?,
            None => all_crds(),
        };
        install_crds(
            client.clone(),
            &crds,
            Duration::from_secs(CRD_ESTABLISHED_TIMEOUT_SECS),
        )
        .await?;
        info!(count = crds.len(), "CRDs installed");
    }

    let state = Arc::new(ServerState::default());
    let server = {
        let (bind_address, port, state) = (config.bind_address.clone(), config.port, state.clone());
        async move { start_server(&bind_address, port, state).await }
    };

    if config.leader_election {
        let server_task = tokio::spawn(server);
        let mut leadership = tokio::select! {
            leadership = leader::acquire(client.clone(), &config) => leadership?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal before acquiring leadership");
                return Ok(());
            }
        };
        info!(identity = %leadership.identity(), "Starting controllers as leader");

        tokio::select! {
            result = run_controllers(client, config, state) => result,
            () = leadership.lost() => {
                // Another replica may already be reconciling; stop immediately.
                anyhow::bail!("Lost leadership")
            }
            result = server_task => {
                error!("CRITICAL: HTTP server exited unexpectedly: {:?}", result);
                result??;
                anyhow::bail!("HTTP server exited unexpectedly without error")
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                Ok(())
            }
        }
    } else {
        tokio::select! {
            result = run_controllers(client, config, state) => result,
            result = server => {
                error!("CRITICAL: HTTP server exited unexpectedly: {:?}", result);
                result?;
                anyhow::bail!("HTTP server exited unexpectedly without error")
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                Ok(())
            }
        }
    }
}

/// Runs every enabled controller until one of them exits.
async fn run_controllers(
    client: Client,
    config: Arc<OperatorConfig>,
    state: Arc<ServerState>,
) -> Result<()> {
    let mut tasks: Vec<(&'static str, ControllerFuture)> = Vec::new();

    let registry = Arc::new(ApplicationRegistry::new());
    let (definitions, definitions_reflector) = definition_reflector(client.clone(), registry.clone());
    let (packages, packages_reflector) = reflect(Api::<Package>::all(client.clone()));
    let (package_sources, sources_reflector) = reflect(Api::<PackageSource>::all(client.clone()));

    tasks.push(("ApplicationDefinition reflector", definitions_reflector));
    tasks.push(("Package reflector", packages_reflector));
    tasks.push(("PackageSource reflector", sources_reflector));

    let ctx = Arc::new(Context {
        client: client.clone(),
        config: config.clone(),
        stores: Stores {
            application_definitions: definitions,
            packages,
            package_sources,
        },
        registry,
    });

    if config.is_enabled(ControllerName::PackageSource) {
        tasks.push((KIND_PACKAGE_SOURCE, run_packagesource_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::Package) {
        tasks.push((KIND_PACKAGE, run_package_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::Bundle) {
        tasks.push((KIND_BUNDLE, run_bundle_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::Platform) {
        tasks.push((KIND_PLATFORM, run_platform_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::PlatformConfiguration) {
        tasks.push((
            KIND_PLATFORM_CONFIGURATION,
            run_platform_configuration_controller(ctx.clone()).boxed(),
        ));
    }
    if config.is_enabled(ControllerName::ApplicationDefinition) {
        tasks.push((
            KIND_APPLICATION_DEFINITION,
            run_application_definition_controller(ctx.clone()).boxed(),
        ));
    }
    if config.is_enabled(ControllerName::Dashboard) {
        tasks.push((DASHBOARD, run_dashboard_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::SubresourceRbac) {
        tasks.push((SUBRESOURCE_RBAC, run_subresource_rbac_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::WorkloadMonitor) {
        tasks.push((WORKLOAD_MONITOR, run_workload_monitor_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::NamespaceLabels) {
        tasks.push((NAMESPACE_LABELS, run_namespace_labels_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::Lineage) {
        tasks.push((LINEAGE, run_lineage_controllers(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::SecretReplicator) {
        tasks.push((SECRET_REPLICATOR, run_secret_replicator_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::ConfigHash) {
        let hashing = Arc::new(ConfigHashContext {
            ctx: ctx.clone(),
            debouncer: Debouncer::new(config.config_hash_debounce()),
        });
        let task = match config.config_hash_kind {
            WorkloadKind::Deployment => run_config_hash_controller::<Deployment>(hashing).boxed(),
            WorkloadKind::DaemonSet => run_config_hash_controller::<DaemonSet>(hashing).boxed(),
        };
        tasks.push((CONFIG_HASH, task));
    }
    if config.is_enabled(ControllerName::FluxPlunger) {
        tasks.push((FLUX_PLUNGER, run_flux_plunger_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::BackupJob) {
        tasks.push((KIND_BACKUP_JOB, run_backup_job_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::RestoreJob) {
        tasks.push((KIND_RESTORE_JOB, run_restore_job_controller(ctx.clone()).boxed()));
    }
    if config.is_enabled(ControllerName::Plan) {
        tasks.push((KIND_PLAN, run_plan_controller(ctx.clone()).boxed()));
    }

    info!(count = tasks.len(), "Starting all controllers");
    state.set_ready(true);

    // Controllers should never exit - if one does, exit the main process
    let (names, futures): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let (result, index, _) = futures::future::select_all(futures).await;
    let name = names.get(index).copied().unwrap_or("unknown");
    state.set_ready(false);
    error!("CRITICAL: {} controller exited unexpectedly: {:?}", name, result);
    result?;
    anyhow::bail!("{name} controller exited unexpectedly without error")
}

/// Reflector over `api`, returning the store and the future that feeds it.
fn reflect<K>(api: Api<K>) -> (Store<K>, ControllerFuture)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let (reader, writer) = reflector::store();
    let feed = reflector::reflector(writer, watcher::watcher(api, Config::default()))
        .default_backoff()
        .touched_objects()
        .for_each(|event| {
            if let Err(e) = event {
                warn!(kind = %K::kind(&()), error = %e, "Reflector watch error");
            }
            futures::future::ready(())
        })
        .map(|()| Ok(()))
        .boxed();
    (reader, feed)
}

/// Reflector over definitions that also rebuilds the chart registry on every
/// change.
fn definition_reflector(
    client: Client,
    registry: Arc<ApplicationRegistry>,
) -> (Store<ApplicationDefinition>, ControllerFuture) {
    let (reader, writer) = reflector::store();
    let store = reader.clone();
    let feed = reflector::reflector(
        writer,
        watcher::watcher(Api::<ApplicationDefinition>::all(client), Config::default()),
    )
    .default_backoff()
    .touched_objects()
    .for_each(move |event| {
        let store = store.clone();
        let registry = registry.clone();
        async move {
            if let Err(e) = event {
                warn!(error = %e, "ApplicationDefinition watch error");
                return;
            }
            let definitions: Vec<ApplicationDefinition> =
                store.state().iter().map(|d| d.as_ref().clone()).collect();
            registry.replace(&definitions).await;
            debug!(count = definitions.len(), "Refreshed application registry");
        }
    })
    .map(|()| Ok(()))
    .boxed();
    (reader, feed)
}

/// Triggers fired on every `ApplicationDefinition` change.
fn definition_changes(client: Client) -> UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded();
    tokio::spawn(async move {
        let mut events =
            watcher::watcher(Api::<ApplicationDefinition>::all(client), Config::default())
                .default_backoff()
                .touched_objects()
                .boxed();
        while let Some(event) = events.next().await {
            if event.is_ok() && tx.unbounded_send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run the `PackageSource` controller
async fn run_packagesource_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting PackageSource controller");

    let hub = ctx.config.hub_namespace.clone();
    Controller::new(Api::<PackageSource>::all(ctx.client.clone()), Config::default())
        .watches(
            Api::<ArtifactGenerator>::namespaced(ctx.client.clone(), &hub),
            Config::default(),
            |generator| generator_owner(&generator).map(|name| ObjectRef::new(&name)),
        )
        .run(
            |source, ctx| instrument(KIND_PACKAGE_SOURCE, reconcile_packagesource(ctx, source)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `Package` controller
async fn run_package_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Package controller");

    let stores = ctx.stores.clone();
    Controller::new(Api::<Package>::all(ctx.client.clone()), Config::default())
        .watches(
            Api::<HelmRelease>::all(ctx.client.clone()),
            Config::default().labels(PACKAGE),
            |release| release.labels().get(PACKAGE).map(|name| ObjectRef::new(name)),
        )
        .watches(
            Api::<PackageSource>::all(ctx.client.clone()),
            Config::default(),
            |source| Some(ObjectRef::new(&source.name_any())),
        )
        .watches(
            Api::<Package>::all(ctx.client.clone()),
            Config::default(),
            move |package| {
                let index = PackageIndex::new(
                    stores.packages.state().iter().map(|p| p.as_ref().clone()).collect(),
                    stores
                        .package_sources
                        .state()
                        .iter()
                        .map(|s| s.as_ref().clone())
                        .collect(),
                );
                dependents_to_enqueue(&index, &package.name_any())
            },
        )
        .run(
            |package, ctx| instrument(KIND_PACKAGE, reconcile_package(ctx, package)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `Bundle` controller
async fn run_bundle_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Bundle controller");

    Controller::new(Api::<Bundle>::all(ctx.client.clone()), Config::default())
        .watches(
            Api::<HelmRelease>::all(ctx.client.clone()),
            Config::default(),
            |release| release_bundle(&release).map(|name| ObjectRef::new(&name)),
        )
        .run(
            |bundle, ctx| instrument(KIND_BUNDLE, reconcile_bundle(ctx, bundle)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `Platform` controller
async fn run_platform_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Platform controller");

    let hub = ctx.config.hub_namespace.clone();
    Controller::new(Api::<Platform>::all(ctx.client.clone()), Config::default())
        .watches(
            Api::<HelmRelease>::namespaced(ctx.client.clone(), &hub),
            Config::default(),
            |release| labeled_platform(release.labels()).map(|name| ObjectRef::new(&name)),
        )
        .watches(
            Api::<ArtifactGenerator>::namespaced(ctx.client.clone(), &hub),
            Config::default(),
            |generator| labeled_platform(generator.labels()).map(|name| ObjectRef::new(&name)),
        )
        .run(
            |platform, ctx| instrument(KIND_PLATFORM, reconcile_platform(ctx, platform)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `PlatformConfiguration` controller
async fn run_platform_configuration_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting PlatformConfiguration controller");

    // The git source and release share the configuration's name.
    let hub = ctx.config.hub_namespace.clone();
    Controller::new(
        Api::<PlatformConfiguration>::all(ctx.client.clone()),
        Config::default(),
    )
    .watches(
        Api::<GitRepository>::namespaced(ctx.client.clone(), &hub),
        Config::default(),
        |repository| Some(ObjectRef::new(&repository.name_any())),
    )
    .watches(
        Api::<HelmRelease>::namespaced(ctx.client.clone(), &hub),
        Config::default(),
        |release| Some(ObjectRef::new(&release.name_any())),
    )
    .run(
        |config, ctx| {
            instrument(
                KIND_PLATFORM_CONFIGURATION,
                reconcile_platform_configuration(ctx, config),
            )
        },
        error_policy,
        ctx,
    )
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

/// Run the `ApplicationDefinition` release alignment controller
async fn run_application_definition_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting ApplicationDefinition controller");

    Controller::new(
        Api::<ApplicationDefinition>::all(ctx.client.clone()),
        Config::default(),
    )
    .run(
        |definition, ctx| {
            instrument(
                KIND_APPLICATION_DEFINITION,
                reconcile_application_definition(ctx, definition),
            )
        },
        error_policy,
        ctx,
    )
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

/// Run the dashboard customization controller
async fn run_dashboard_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Dashboard controller");

    Controller::new(
        Api::<ApplicationDefinition>::all(ctx.client.clone()),
        Config::default(),
    )
    .run(
        |definition, ctx| instrument(DASHBOARD, reconcile_dashboard(ctx, definition)),
        error_policy,
        ctx,
    )
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

/// Run the subresource RBAC controller
async fn run_subresource_rbac_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting subresource RBAC controller");

    Controller::new(Api::<HelmRelease>::all(ctx.client.clone()), Config::default())
        .owns(Api::<Role>::all(ctx.client.clone()), Config::default())
        .owns(Api::<RoleBinding>::all(ctx.client.clone()), Config::default())
        .reconcile_all_on(definition_changes(ctx.client.clone()))
        .run(
            |release, ctx| instrument(SUBRESOURCE_RBAC, reconcile_subresource_rbac(ctx, release)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the workload monitor controller
async fn run_workload_monitor_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting WorkloadMonitor controller");

    Controller::new(Api::<HelmRelease>::all(ctx.client.clone()), Config::default())
        .owns(Api::<WorkloadMonitor>::all(ctx.client.clone()), Config::default())
        .reconcile_all_on(definition_changes(ctx.client.clone()))
        .run(
            |release, ctx| instrument(WORKLOAD_MONITOR, reconcile_workload_monitors(ctx, release)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the namespace labels propagator
async fn run_namespace_labels_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting namespace labels controller");

    Controller::new(Api::<Namespace>::all(ctx.client.clone()), Config::default())
        .watches(
            Api::<HelmRelease>::all(ctx.client.clone()),
            Config::default(),
            |release| release_namespace(&release),
        )
        .run(
            |namespace, ctx| instrument(NAMESPACE_LABELS, reconcile_namespace_labels(ctx, namespace)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run one lineage controller per configured kind.
async fn run_lineage_controllers(ctx: Arc<Context>) -> Result<()> {
    let kinds = parse_watch_list(&ctx.config.lineage_watch).context("invalid lineage watch list")?;
    let graph = Arc::new(ClusterObjectGraph::new(ctx.client.clone()));

    let mut controllers = Vec::new();
    for gvk in kinds {
        let (resource, capabilities) = match pinned_kind(&ctx.client, &gvk).await {
            Ok(found) => found,
            Err(e) => {
                warn!(kind = %gvk.kind, group = %gvk.group, error = %e, "Skipping undiscoverable lineage kind");
                continue;
            }
        };
        info!(kind = %resource.kind, "Starting lineage controller");

        let lineage = Arc::new(LineageContext {
            ctx: ctx.clone(),
            graph: graph.clone(),
            resource: resource.clone(),
            namespaced: capabilities.scope == Scope::Namespaced,
        });
        let api = Api::<DynamicObject>::all_with(ctx.client.clone(), &resource);
        controllers.push(
            Controller::new_with(api, Config::default(), resource)
                .run(
                    |object, lineage| instrument(LINEAGE, reconcile_lineage(lineage, object)),
                    error_policy,
                    lineage,
                )
                .for_each(|_| futures::future::ready(())),
        );
    }

    if controllers.is_empty() {
        warn!("No lineage kinds could be discovered; lineage labeling is idle");
        futures::future::pending::<()>().await;
    }
    futures::future::join_all(controllers).await;

    Ok(())
}

/// Run the values secret replicator
async fn run_secret_replicator_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting secret replicator controller");

    let hub = ctx.config.hub_namespace.clone();
    let source = source_secret_ref(&hub);
    Controller::new(
        Api::<Secret>::namespaced(ctx.client.clone(), &hub),
        Config::default().fields(&format!("metadata.name={VALUES_SECRET_NAME}")),
    )
    .watches(
        Api::<HelmRelease>::all(ctx.client.clone()),
        Config::default().labels(PACKAGE),
        move |_| Some(source.clone()),
    )
    .run(
        |secret, ctx| instrument(SECRET_REPLICATOR, reconcile_secret_replicas(ctx, secret)),
        error_policy,
        ctx,
    )
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

/// Run the config hash controller over the configured workload kind.
async fn run_config_hash_controller<K>(hashing: Arc<ConfigHashContext>) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    let namespace = hashing.ctx.config.config_hash_namespace().to_string();
    let name = hashing.ctx.config.config_hash_name.clone();
    info!(kind = %K::kind(&()), namespace = %namespace, name = %name, "Starting config hash controller");

    let key = workload_ref::<K>(&namespace, &name);
    let mapper_hashing = hashing.clone();
    Controller::new(
        Api::<K>::namespaced(hashing.ctx.client.clone(), &namespace),
        Config::default().fields(&format!("metadata.name={name}")),
    )
    .watches(
        Api::<ApplicationDefinition>::all(hashing.ctx.client.clone()),
        Config::default(),
        move |_| {
            mapper_hashing.debouncer.record_event();
            Some(key.clone())
        },
    )
    .run(
        |workload, hashing| instrument(CONFIG_HASH, reconcile_config_hash(hashing, workload)),
        error_policy,
        hashing,
    )
    .for_each(|_| futures::future::ready(()))
    .await;

    Ok(())
}

/// Run the flux plunger over every `HelmRelease`.
async fn run_flux_plunger_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting flux plunger controller");

    Controller::new(Api::<HelmRelease>::all(ctx.client.clone()), Config::default())
        .run(
            |release, ctx| instrument(FLUX_PLUNGER, reconcile_flux_plunger(ctx, release)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `BackupJob` controller
async fn run_backup_job_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting BackupJob controller");

    Controller::new(Api::<BackupJob>::all(ctx.client.clone()), Config::default())
        .run(
            |job, ctx| instrument(KIND_BACKUP_JOB, reconcile_backup_job(ctx, job)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `RestoreJob` controller
async fn run_restore_job_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting RestoreJob controller");

    Controller::new(Api::<RestoreJob>::all(ctx.client.clone()), Config::default())
        .run(
            |job, ctx| instrument(KIND_RESTORE_JOB, reconcile_restore_job(ctx, job)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Run the `Plan` scheduler
async fn run_plan_controller(ctx: Arc<Context>) -> Result<()> {
    info!("Starting Plan controller");

    Controller::new(Api::<Plan>::all(ctx.client.clone()), Config::default())
        .owns(Api::<BackupJob>::all(ctx.client.clone()), Config::default())
        .run(
            |plan, ctx| instrument(KIND_PLAN, reconcile_plan(ctx, plan)),
            error_policy,
            ctx,
        )
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}
