//! Plugin hooks for the record pipeline.
//!
//! A [`Plugin`] observes (and may adjust) each stage of record processing.
//! Every hook has a no-op default, so a plugin implements only the stages it
//! cares about. Hooks run in this order for each record:
//!
//! 1. [`Plugin::input`] on the untouched record model
//! 2. [`Plugin::xref`] on the record model after 880 resolution
//! 3. [`Plugin::materialized`] once per entity materialization
//! 4. [`Plugin::record`] on the output graph after the record's statements land
//!
//! and once per run, after the input closes, [`Plugin::finalize`]. A failing
//! per-record hook aborts the run. Finalize hooks run on their own threads,
//! tracked by a [`FinalizeGroup`].

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::error::{ConvertError, Result};
use crate::graph::MemoryGraph;
use crate::materialize::Materialized;

/// Result type returned by plugin hooks.
pub type HookResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Per-record state visible to hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordContext {
    /// Zero-based position of the record in the run.
    pub index: usize,
    /// Work id, once the signature pass has produced it.
    pub work_id: Option<String>,
    /// True if the Work id had been seen in an earlier record.
    pub folded: bool,
    /// Instance ids, once generated; the first is the default target.
    pub instance_ids: Vec<String>,
    /// Vocabulary base of the run.
    pub vocab_base: String,
    /// Entity base of the run.
    pub entity_base: Option<String>,
}

/// Stage hooks called by the record pipeline.
#[allow(unused_variables)]
pub trait Plugin: Send + Sync {
    /// Called with the record model before any processing.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn input(&self, model: &mut MemoryGraph, context: &RecordContext) -> HookResult {
        Ok(())
    }

    /// Called with the record model once cross-references are resolved.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn xref(&self, model: &mut MemoryGraph, context: &RecordContext) -> HookResult {
        Ok(())
    }

    /// Called after each entity materialization.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn materialized(&self, event: &Materialized) -> HookResult {
        Ok(())
    }

    /// Called with the output graph once a record is fully converted.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    fn record(&self, graph: &MemoryGraph, context: &RecordContext) -> HookResult {
        Ok(())
    }

    /// Called once after the input stream closes, on its own thread.
    ///
    /// # Errors
    ///
    /// Errors surface from [`FinalizeGroup::wait`].
    fn finalize(&self) -> HookResult {
        Ok(())
    }
}

/// Finalize hooks started after the input closes.
///
/// Each hook runs as an independent thread. A hook's index sits in the
/// outstanding set until it completes; there is no ordering among hooks.
#[derive(Debug, Default)]
pub struct FinalizeGroup {
    outstanding: Arc<Mutex<BTreeSet<usize>>>,
    handles: Vec<thread::JoinHandle<HookResult>>,
}

impl FinalizeGroup {
    /// Starts every plugin's finalize hook without waiting for any of them.
    #[must_use]
    pub fn start(plugins: &[Arc<dyn Plugin>]) -> Self {
        let outstanding = Arc::new(Mutex::new((0..plugins.len()).collect::<BTreeSet<_>>()));
        let handles = plugins
            .iter()
            .enumerate()
            .map(|(index, plugin)| {
                let plugin = Arc::clone(plugin);
                let outstanding = Arc::clone(&outstanding);
                thread::spawn(move || {
                    let result = plugin.finalize();
                    if let Ok(mut set) = outstanding.lock() {
                        set.remove(&index);
                    }
                    result
                })
            })
            .collect();
        Self {
            outstanding,
            handles,
        }
    }

    /// Number of finalize hooks still running.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().map_or(0, |set| set.len())
    }

    /// Blocks until every finalize hook has finished.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure, in plugin order. A panicking hook is
    /// reported as a collaborator failure.
    pub fn wait(self) -> Result<()> {
        let mut first_error = None;
        for handle in self.handles {
            let outcome = match handle.join() {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => ConvertError::collaborator("finalize", e.to_string()),
                Err(_) => ConvertError::collaborator("finalize", "hook panicked"),
            };
            first_error.get_or_insert(outcome);
        }
        first_error.map_or(Ok(()), Err)
    }
}
