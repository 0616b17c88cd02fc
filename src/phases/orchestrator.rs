//! Generation Scheduler
//!
//! This module coordinates the phases of a `generate` run:
//!
//! 1. Discover clusters and select the ones the filters ask for
//! 2. Evaluate each cluster document from its ancestor chain
//! 3. Compare the cluster fingerprint with the persisted cache
//! 4. Per component: evaluate params, read `kr8_spec`, hash inputs, decide
//!    skip or regenerate, render into a staging area, commit, reconcile
//! 5. Prune orphaned component directories
//! 6. Commit the cluster cache if every component succeeded, otherwise
//!    discard it so the next run starts from scratch
//!
//! Clusters run on one bounded rayon pool, components of a cluster on a
//! second pool created per cluster run. Both collect results in declaration
//! order, so reports and outputs do not depend on the pool sizes.
//!
//! Failures are contained: a component failure fails that component, a
//! cluster failure (no evaluable document, missing `_kr8_spec`, malformed
//! `_components`) fails that cluster, and the run continues either way.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde_json::Value as JsonValue;

use super::discovery::{discover_clusters, find_cluster, Cluster};
use super::hierarchy::ancestor_chain;
use super::reconcile::{prune_orphan_components, reconcile};
use super::render::{render_include, RenderContext};
use super::write;
use crate::cache::{
    discard_cache, hash_bytes, hash_files, load_cache, save_cache, split_sections, CacheSession,
    ClusterFingerprint, ComponentCache, FileHashes, RawSections,
};
use crate::config::{
    extract_cluster_spec, extract_components, extract_spec, ClusterSpec, ComponentRef,
    ComponentSpec, CLUSTER_KEY,
};
use crate::error::{Error, Result};
use crate::evaluator::{EvalContext, Evaluator, MergeExpression};
use crate::filesystem::MemoryFS;
use crate::filter::{select_clusters, FilterSpec};
use crate::memo::Memo;
use crate::settings::{EngineSettings, CACHE_FILE, DEFAULT_DEST_EXT, PARAMS_FILE};

/// What happened to one component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentOutcome {
    /// Regenerated; counts of files written and stale files removed
    Generated { written: usize, removed: usize },
    /// Skipped because its cache entry is still valid
    Cached,
    /// Not selected by the component filter
    Skipped,
    /// Failed with the given message
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReport {
    pub name: String,
    pub outcome: ComponentOutcome,
}

/// What happened to one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterReport {
    pub name: String,
    /// `<generate_dir>/<name>`, once known
    pub output_dir: Option<PathBuf>,
    pub components: Vec<ComponentReport>,
    pub orphans_removed: Vec<PathBuf>,
    /// Whether the cache file was rewritten
    pub cache_committed: bool,
    /// Set when the cluster as a whole failed
    pub error: Option<String>,
}

impl ClusterReport {
    fn failed(name: &str, error: &Error) -> Self {
        Self {
            name: name.to_string(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn count(&self, matches: impl Fn(&ComponentOutcome) -> bool) -> usize {
        self.components.iter().filter(|c| matches(&c.outcome)).count()
    }

    pub fn generated(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Generated { .. }))
    }

    pub fn cached(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Cached))
    }

    pub fn failed_components(&self) -> usize {
        self.count(|o| matches!(o, ComponentOutcome::Failed(_)))
    }

    pub fn files_written(&self) -> usize {
        self.components
            .iter()
            .map(|c| match c.outcome {
                ComponentOutcome::Generated { written, .. } => written,
                _ => 0,
            })
            .sum()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentReport> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// Result of a whole run, clusters sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub clusters: Vec<ClusterReport>,
}

impl RunReport {
    pub fn cache_hits(&self) -> usize {
        self.clusters.iter().map(ClusterReport::cached).sum()
    }

    pub fn files_written(&self) -> usize {
        self.clusters.iter().map(ClusterReport::files_written).sum()
    }

    pub fn has_cluster_failures(&self) -> bool {
        self.clusters.iter().any(ClusterReport::is_failed)
    }

    pub fn has_component_failures(&self) -> bool {
        self.clusters.iter().any(|c| c.failed_components() > 0)
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterReport> {
        self.clusters.iter().find(|c| c.name == name)
    }
}

/// Shared state of one `generate` call
struct Run<'a> {
    clusters: &'a [Cluster],
    /// `kr8_allclusters`, computed on first use
    fleet: Memo<String>,
}

/// An evaluated cluster
struct LoadedCluster<'a> {
    cluster: &'a Cluster,
    chain: Vec<PathBuf>,
    doc: JsonValue,
    sections: RawSections,
    spec: ClusterSpec,
    components: BTreeMap<String, ComponentRef>,
    output_dir: PathBuf,
    /// `kr8_allparams`, computed on first use
    all_params: Memo<String>,
}

/// A component whose params and spec are known
struct PreparedComponent {
    name: String,
    dir: PathBuf,
    spec: ComponentSpec,
    raw_config: String,
    config: JsonValue,
    cluster: JsonValue,
    /// `None` when some input could not be hashed; such a run always misses
    file_hashes: Option<FileHashes>,
    all_params: Option<Arc<String>>,
    all_clusters: Option<Arc<String>>,
    context_hash: Option<String>,
}

struct ComponentRun {
    report: ComponentReport,
    /// Top-level output directories the component owns; `None` if it failed
    /// before its spec was known
    keep_dirs: Option<Vec<String>>,
}

/// The build engine
pub struct Engine {
    settings: EngineSettings,
    evaluator: Arc<dyn Evaluator>,
}

impl Engine {
    pub fn new(settings: EngineSettings, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            settings,
            evaluator,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Every cluster of the tree, sorted by name
    pub fn discover(&self) -> Result<Vec<Cluster>> {
        discover_clusters(&self.settings.cluster_dir())
    }

    /// Generate every selected cluster.
    ///
    /// Only run-wide problems (bad filters, unreadable cluster tree, pool
    /// start-up) are returned as errors; cluster and component failures are
    /// in the report.
    pub fn generate(&self) -> Result<RunReport> {
        self.settings.filters.validate()?;
        let clusters = self.discover()?;
        let run = Run {
            clusters: &clusters,
            fleet: Memo::new(),
        };

        let (selected, mut reports) = self.select(&clusters)?;
        info!("Generating {} cluster(s)", selected.len());

        let pool = build_pool(self.settings.cluster_parallelism, "cluster")?;
        let generated: Vec<ClusterReport> = pool.install(|| {
            selected
                .par_iter()
                .map(|cluster| self.generate_cluster(cluster, &run))
                .collect()
        });

        reports.extend(generated);
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RunReport { clusters: reports })
    }

    /// Evaluated params of a cluster, or of one of its components.
    pub fn cluster_params(&self, cluster_name: &str, component: Option<&str>) -> Result<JsonValue> {
        let clusters = self.discover()?;
        let cluster = find_cluster(&clusters, cluster_name)?;
        let loaded = self
            .load_cluster(cluster)
            .map_err(|e| e.in_cluster(cluster_name))?;
        match component {
            None => Ok(loaded.doc),
            Some(name) => {
                let run = Run {
                    clusters: &clusters,
                    fleet: Memo::new(),
                };
                let prepared = self
                    .prepare_named_component(&loaded, name, &run)
                    .map_err(|e| e.in_component(cluster_name, name))?;
                Ok(prepared.config)
            }
        }
    }

    /// Render one component into a staging area without touching the disk
    /// or the cache.
    pub fn render_component(&self, cluster_name: &str, component: &str) -> Result<MemoryFS> {
        let clusters = self.discover()?;
        let cluster = find_cluster(&clusters, cluster_name)?;
        let loaded = self
            .load_cluster(cluster)
            .map_err(|e| e.in_cluster(cluster_name))?;
        let run = Run {
            clusters: &clusters,
            fleet: Memo::new(),
        };
        self.prepare_named_component(&loaded, component, &run)
            .and_then(|prepared| self.stage(&prepared))
            .map_err(|e| e.in_component(cluster_name, component))
    }

    /// Apply the cluster filters. Clusters whose document cannot be evaluated
    /// while checking param conditions are returned as failed reports.
    fn select<'a>(&self, clusters: &'a [Cluster]) -> Result<(Vec<&'a Cluster>, Vec<ClusterReport>)> {
        let filters = &self.settings.filters;
        let mut failed = Vec::new();

        let configs: BTreeMap<String, JsonValue> = if filters.needs_params() {
            let by_name = FilterSpec {
                clusters: filters.clusters.clone(),
                ..Default::default()
            };
            let candidates: BTreeMap<String, JsonValue> = clusters
                .iter()
                .map(|c| (c.name.clone(), JsonValue::Null))
                .collect();
            let named: BTreeSet<String> = select_clusters(&candidates, &by_name)?.into_iter().collect();

            let mut configs = BTreeMap::new();
            for cluster in clusters.iter().filter(|c| named.contains(&c.name)) {
                match self.evaluate_cluster(cluster, &self.cluster_chain(cluster)) {
                    Ok((doc, _)) => {
                        configs.insert(cluster.name.clone(), doc);
                    }
                    Err(e) => {
                        let e = e.in_cluster(&cluster.name);
                        error!("{}", e);
                        failed.push(ClusterReport::failed(&cluster.name, &e));
                    }
                }
            }
            configs
        } else {
            clusters
                .iter()
                .map(|c| (c.name.clone(), JsonValue::Null))
                .collect()
        };

        let names: BTreeSet<String> = select_clusters(&configs, filters)?.into_iter().collect();
        let selected = clusters.iter().filter(|c| names.contains(&c.name)).collect();
        Ok((selected, failed))
    }

    fn generate_cluster(&self, cluster: &Cluster, run: &Run<'_>) -> ClusterReport {
        let started = Instant::now();
        match self.run_cluster(cluster, run) {
            Ok(report) => {
                info!(
                    "{}: {} generated, {} cached, {} failed, {} orphan(s) removed in {:.2?}",
                    report.name,
                    report.generated(),
                    report.cached(),
                    report.failed_components(),
                    report.orphans_removed.len(),
                    started.elapsed()
                );
                report
            }
            Err(e) => {
                let e = e.in_cluster(&cluster.name);
                error!("{}", e);
                ClusterReport::failed(&cluster.name, &e)
            }
        }
    }

    fn run_cluster(&self, cluster: &Cluster, run: &Run<'_>) -> Result<ClusterReport> {
        let loaded = self.load_cluster(cluster)?;
        let fingerprint = ClusterFingerprint::capture(&loaded.sections);
        let cache_path = loaded.output_dir.join(CACHE_FILE);
        let session = if self.settings.use_cache {
            CacheSession::new(load_cache(&cache_path), fingerprint)
        } else {
            CacheSession::disabled(fingerprint)
        };
        debug!(
            "{}: cluster cache {}",
            cluster.name,
            if session.cluster_valid() { "valid" } else { "invalid" }
        );

        let components: Vec<&ComponentRef> = loaded.components.values().collect();
        let pool = build_pool(self.settings.component_parallelism, "component")?;
        let results: Vec<ComponentRun> = pool.install(|| {
            components
                .par_iter()
                .map(|component| self.run_component(&loaded, component, &session, run))
                .collect()
        });

        let mut keep: BTreeSet<String> = loaded.components.keys().cloned().collect();
        let mut spec_unknown = false;
        for result in &results {
            match &result.keep_dirs {
                Some(dirs) => keep.extend(dirs.iter().cloned()),
                None => spec_unknown = true,
            }
        }
        let orphans_removed = if self.settings.filters.filters_components() || spec_unknown {
            debug!("{}: skipping orphan cleanup", cluster.name);
            Vec::new()
        } else {
            prune_orphan_components(&loaded.output_dir, &keep)
        };

        let failures = results
            .iter()
            .filter(|r| matches!(r.report.outcome, ComponentOutcome::Failed(_)))
            .count();
        let cache_committed = if failures > 0 {
            warn!(
                "{}: discarding cache, {} component(s) failed",
                cluster.name, failures
            );
            false
        } else {
            let cache = session.into_cache()?;
            match save_cache(&cache_path, &cache, self.settings.compress_cache) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}: {}", cluster.name, e);
                    false
                }
            }
        };
        // Outputs written this run are not described by the old cache
        if !cache_committed {
            discard_cache(&cache_path)?;
        }

        Ok(ClusterReport {
            name: cluster.name.clone(),
            output_dir: Some(loaded.output_dir),
            components: results.into_iter().map(|r| r.report).collect(),
            orphans_removed,
            cache_committed,
            error: None,
        })
    }

    fn run_component(
        &self,
        loaded: &LoadedCluster<'_>,
        component: &ComponentRef,
        session: &CacheSession,
        run: &Run<'_>,
    ) -> ComponentRun {
        let cluster = &loaded.cluster.name;
        let name = &component.name;
        let failed = |e: Error, keep_dirs: Option<Vec<String>>| {
            let e = e.in_component(cluster, name);
            warn!("{}", e);
            ComponentRun {
                report: ComponentReport {
                    name: name.clone(),
                    outcome: ComponentOutcome::Failed(e.to_string()),
                },
                keep_dirs,
            }
        };

        match self.settings.filters.selects_component(name) {
            Ok(true) => {}
            Ok(false) => {
                return match session.carry_forward(name) {
                    Ok(()) => ComponentRun {
                        report: ComponentReport {
                            name: name.clone(),
                            outcome: ComponentOutcome::Skipped,
                        },
                        keep_dirs: Some(Vec::new()),
                    },
                    Err(e) => failed(e, None),
                };
            }
            Err(e) => return failed(e, None),
        }

        let prepared = match self.prepare_component(loaded, component, run) {
            Ok(prepared) => prepared,
            Err(e) => return failed(e, None),
        };
        let keep_dirs = dest_dir_roots(&prepared.spec);
        match self.finish_component(loaded, prepared, session) {
            Ok(outcome) => ComponentRun {
                report: ComponentReport {
                    name: name.clone(),
                    outcome,
                },
                keep_dirs: Some(keep_dirs),
            },
            Err(e) => failed(e, Some(keep_dirs)),
        }
    }

    fn cluster_chain(&self, cluster: &Cluster) -> Vec<PathBuf> {
        let chain = ancestor_chain(&self.settings.cluster_dir(), &cluster.path);
        debug!("{}: ancestor chain {:?}", cluster.name, chain);
        chain
    }

    fn base_context(&self) -> EvalContext {
        self.settings
            .jpaths
            .iter()
            .fold(EvalContext::new(), |ctx, jpath| ctx.with_search_path(jpath.clone()))
    }

    fn evaluate(&self, expr: &MergeExpression, ctx: &EvalContext) -> Result<String> {
        debug!("evaluating {}", expr);
        self.evaluator.evaluate(expr, ctx)
    }

    fn evaluate_cluster(&self, cluster: &Cluster, chain: &[PathBuf]) -> Result<(JsonValue, RawSections)> {
        let expr = with_chain(MergeExpression::new(), chain).inline(cluster_name_layer(&cluster.name));
        let text = self.evaluate(&expr, &self.base_context())?;
        let sections = split_sections(&text)?;
        let doc = serde_json::from_str(&text)?;
        Ok((doc, sections))
    }

    fn load_cluster<'a>(&self, cluster: &'a Cluster) -> Result<LoadedCluster<'a>> {
        let chain = self.cluster_chain(cluster);
        let (doc, sections) = self.evaluate_cluster(cluster, &chain)?;
        let spec = extract_cluster_spec(&doc)?;
        let components = extract_components(&doc)?;
        let generate_dir = match &self.settings.generate_dir {
            Some(dir) => self.settings.resolve(dir),
            None => self.settings.resolve(&spec.generate_dir),
        };
        Ok(LoadedCluster {
            cluster,
            chain,
            doc,
            sections,
            spec,
            components,
            output_dir: generate_dir.join(&cluster.name),
            all_params: Memo::new(),
        })
    }

    fn prepare_named_component(
        &self,
        loaded: &LoadedCluster<'_>,
        name: &str,
        run: &Run<'_>,
    ) -> Result<PreparedComponent> {
        let component = loaded.components.get(name).ok_or_else(|| Error::Spec {
            message: format!(
                "cluster '{}' does not declare component '{}'",
                loaded.cluster.name, name
            ),
            hint: Some(format!(
                "Declared components: {}",
                loaded.components.keys().cloned().collect::<Vec<_>>().join(", ")
            )),
        })?;
        self.prepare_component(loaded, component, run)
    }

    /// Evaluate a component's params and collect what the cache decision
    /// needs.
    fn prepare_component(
        &self,
        loaded: &LoadedCluster<'_>,
        component: &ComponentRef,
        run: &Run<'_>,
    ) -> Result<PreparedComponent> {
        let name = component.name.clone();
        let dir = self.settings.resolve(&component.path);
        let params_file = Some(dir.join(PARAMS_FILE)).filter(|path| path.is_file());

        let mut expr = MergeExpression::new();
        if let Some(file) = &params_file {
            expr = expr.import_under(name.clone(), file.clone());
        }
        let expr = with_chain(expr, &loaded.chain)
            .inline(cluster_name_layer(&loaded.cluster.name))
            .pruned(loaded.spec.prune_params);
        let ctx = self
            .settings
            .jpaths
            .iter()
            .fold(EvalContext::new().with_search_path(&dir), |ctx, jpath| {
                ctx.with_search_path(jpath.clone())
            });
        let text = self.evaluate(&expr, &ctx)?;
        let sections = split_sections(&text)?;
        let raw_config = sections
            .get(&name)
            .map(|raw| raw.get().to_string())
            .unwrap_or_else(|| "null".to_string());
        let config: JsonValue = serde_json::from_str(&raw_config)?;
        let spec = extract_spec(&config)?;
        check_dest_dirs(&spec, &name, &loaded.components)?;

        let mut inputs: Vec<PathBuf> = spec
            .includes
            .iter()
            .map(|include| dir.join(&include.source_file))
            .chain(spec.ext_files.values().map(|file| dir.join(file)))
            .chain(params_file)
            .collect();
        inputs.sort();
        inputs.dedup();
        let file_hashes = match hash_files(&inputs) {
            Ok(hashes) => Some(hashes),
            Err(e) => {
                debug!("{}/{}: not cacheable: {}", loaded.cluster.name, name, e);
                None
            }
        };

        let all_params = if spec.include_all_cluster_params {
            Some(
                loaded
                    .all_params
                    .get_or_try_init(|| self.evaluate_all_params(loaded))?,
            )
        } else {
            None
        };
        let all_clusters = if spec.include_all_clusters {
            Some(run.fleet.get_or_try_init(|| self.evaluate_fleet(run.clusters))?)
        } else {
            None
        };
        let context_hash = context_hash(
            all_params.as_ref().map(|s| s.as_str()),
            all_clusters.as_ref().map(|s| s.as_str()),
        );

        Ok(PreparedComponent {
            name,
            dir,
            spec,
            raw_config,
            config,
            cluster: loaded.doc.get(CLUSTER_KEY).cloned().unwrap_or(JsonValue::Null),
            file_hashes,
            all_params,
            all_clusters,
            context_hash,
        })
    }

    /// Cache decision, then render, commit, reconcile and record.
    fn finish_component(
        &self,
        loaded: &LoadedCluster<'_>,
        prepared: PreparedComponent,
        session: &CacheSession,
    ) -> Result<ComponentOutcome> {
        let name = prepared.name.clone();
        if let Some(hashes) = &prepared.file_hashes {
            if session.is_component_valid(
                &name,
                &prepared.raw_config,
                hashes,
                prepared.context_hash.as_deref(),
                prepared.spec.disable_cache,
            ) {
                debug!("{}/{}: cache hit", loaded.cluster.name, name);
                session.carry_forward(&name)?;
                return Ok(ComponentOutcome::Cached);
            }
        }
        debug!("{}/{}: regenerating", loaded.cluster.name, name);

        let staged = self.stage(&prepared)?;
        let stats = write::execute(&staged, &loaded.output_dir)?;
        let removed = if prepared.spec.disable_output_clean {
            Vec::new()
        } else {
            reconcile(
                &loaded.output_dir.join(&name),
                &staged.names_in_dir(&name),
                &generated_extensions(&prepared.spec, &name),
            )?
        };

        if let Some(file_hashes) = prepared.file_hashes {
            session.record(
                &name,
                ComponentCache {
                    raw_config: prepared.raw_config,
                    file_hashes,
                    context_hash: prepared.context_hash,
                },
            )?;
        }

        Ok(ComponentOutcome::Generated {
            written: stats.written,
            removed: removed.len(),
        })
    }

    /// Render every include of a component into a fresh staging area.
    fn stage(&self, prepared: &PreparedComponent) -> Result<MemoryFS> {
        let ctx = RenderContext::new(
            &prepared.dir,
            &prepared.spec,
            prepared.config.clone(),
            prepared.cluster.clone(),
            &self.settings.jpaths,
            prepared.all_params.as_ref().map(|s| s.as_str()),
            prepared.all_clusters.as_ref().map(|s| s.as_str()),
        )?;
        let mut staged = MemoryFS::new();
        for include in &prepared.spec.includes {
            let bytes = render_include(include, &ctx, self.evaluator.as_ref())?;
            staged.add_file_content(include.output_path(&prepared.name), bytes)?;
        }
        Ok(staged)
    }

    /// Params of every component of a cluster, each under its name.
    fn evaluate_all_params(&self, loaded: &LoadedCluster<'_>) -> Result<String> {
        let mut expr = MergeExpression::new();
        for component in loaded.components.values() {
            let params = self.settings.resolve(&component.path).join(PARAMS_FILE);
            if params.is_file() {
                expr = expr.import_under(component.name.clone(), params);
            }
        }
        let expr = with_chain(expr, &loaded.chain)
            .inline(cluster_name_layer(&loaded.cluster.name))
            .pruned(loaded.spec.prune_params);
        self.evaluate(&expr, &self.base_context())
    }

    /// `_cluster` section of every discovered cluster, keyed by name.
    fn evaluate_fleet(&self, clusters: &[Cluster]) -> Result<String> {
        let mut fleet = serde_json::Map::new();
        for cluster in clusters {
            let (doc, _) = self
                .evaluate_cluster(cluster, &self.cluster_chain(cluster))
                .map_err(|e| e.in_cluster(&cluster.name))?;
            fleet.insert(
                cluster.name.clone(),
                doc.get(CLUSTER_KEY).cloned().unwrap_or(JsonValue::Null),
            );
        }
        Ok(serde_json::to_string(&JsonValue::Object(fleet))?)
    }
}

fn build_pool(threads: usize, role: &'static str) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |i| format!("kr8-{}-{}", role, i))
        .build()
        .map_err(|e| Error::Scheduler {
            message: format!("cannot start {} pool: {}", role, e),
        })
}

fn with_chain(expr: MergeExpression, chain: &[PathBuf]) -> MergeExpression {
    chain.iter().fold(expr, |expr, path| expr.import(path.clone()))
}

/// `{"_cluster": {"cluster_name": <name>}}`
fn cluster_name_layer(name: &str) -> JsonValue {
    let mut cluster = serde_json::Map::new();
    cluster.insert("cluster_name".to_string(), JsonValue::String(name.to_string()));
    let mut layer = serde_json::Map::new();
    layer.insert(CLUSTER_KEY.to_string(), JsonValue::Object(cluster));
    JsonValue::Object(layer)
}

fn context_hash(all_params: Option<&str>, all_clusters: Option<&str>) -> Option<String> {
    if all_params.is_none() && all_clusters.is_none() {
        return None;
    }
    let mut bytes = Vec::new();
    for part in [all_params, all_clusters] {
        bytes.extend_from_slice(part.unwrap_or("-").as_bytes());
        bytes.push(0);
    }
    Some(hash_bytes(&bytes))
}

/// First path segment of every `dest_dir`
fn dest_dir_roots(spec: &ComponentSpec) -> Vec<String> {
    spec.includes
        .iter()
        .filter_map(|include| include.dest_dir.as_deref())
        .filter_map(|dir| {
            Path::new(dir).components().find_map(|part| match part {
                PathComponent::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
        })
        .collect()
}

/// Reject includes writing into another component's directory, which that
/// component's reconcile pass would treat as stale.
fn check_dest_dirs(
    spec: &ComponentSpec,
    component: &str,
    components: &BTreeMap<String, ComponentRef>,
) -> Result<()> {
    let Some(owner) = dest_dir_roots(spec)
        .into_iter()
        .find(|root| root != component && components.contains_key(root))
    else {
        return Ok(());
    };
    Err(Error::Spec {
        message: format!(
            "an include of '{}' has dest_dir inside the output directory of component '{}'",
            component, owner
        ),
        hint: Some("Choose a dest_dir that is not another component's name".to_string()),
    })
}

/// Extensions the reconciler may delete in the component's own directory
fn generated_extensions(spec: &ComponentSpec, component: &str) -> BTreeSet<String> {
    let mut extensions = BTreeSet::from([DEFAULT_DEST_EXT.to_string()]);
    extensions.extend(
        spec.includes
            .iter()
            .filter(|include| include.output_dir(component) == Path::new(component))
            .map(|include| include.dest_ext.clone()),
    );
    extensions
}
