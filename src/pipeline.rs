//! The record pipeline driver.
//!
//! A [`RecordHandler`] owns the run's output graph and existing-id set and
//! converts one record model at a time:
//!
//! ```text
//! Idle -> InputHook -> XrefResolved -> WorkPass -> InstancePass -> MainPass
//!      -> Postprocess -> RecordHook -> Emitted -> Idle
//! ```
//!
//! and on end of input `Draining -> Finalizing -> Done`. Record models reach
//! the handler through a bounded channel ([`channel`]); a producer thread
//! ([`feed`]) blocks when the channel is full. Plugin hooks run synchronously
//! inside their stage, except finalize hooks, which [`RecordHandler::finish`]
//! starts on their own threads and hands back as a [`FinalizeGroup`].
//!
//! Unless canonical mode is on, every record's new statements are streamed to
//! the output sink as one top-level JSON array.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::field_linkage::resolve_xrefs;
use crate::graph::{MemoryGraph, StatementId, StatementStore};
use crate::idgen::IdGenerator;
use crate::materialize::Materializer;
use crate::plugin::{FinalizeGroup, Plugin, RecordContext};
use crate::record::Record;
use crate::record_model::{from_record, marc_lookup};
use crate::split::{generate_instances, materialize_work, merge_instances, register_requested};
use crate::transforms::{process_patterns, Anchors, DefaultExtraTransforms, ExtraTransforms, Pass};

/// Where the handler is in the per-record or end-of-run sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the next record.
    Idle,
    /// Running input hooks on the untouched record model.
    InputHook,
    /// Cross-references resolved; running xref hooks.
    XrefResolved,
    /// Signature pass and Work materialization.
    WorkPass,
    /// Instance generation from ISBN evidence.
    InstancePass,
    /// Full rule engine pass.
    MainPass,
    /// Requested Instances registered and merged.
    Postprocess,
    /// Running record hooks on the output graph.
    RecordHook,
    /// Record's statements written to the sink.
    Emitted,
    /// Input closed; closing output framing.
    Draining,
    /// Starting finalize hooks.
    Finalizing,
    /// Run complete.
    Done,
}

/// Whether the driver should keep pulling records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ready for the next record.
    Continue,
    /// The record limit was reached.
    Stop,
}

/// Shared processed-record count with an optional maximum.
#[derive(Debug, Clone, Default)]
pub struct Limiter {
    count: Arc<AtomicUsize>,
    max: Option<usize>,
}

impl Limiter {
    /// Creates a limiter; `None` never stops.
    #[must_use]
    pub fn new(max: Option<usize>) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Records emitted so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// The configured maximum.
    #[must_use]
    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Counts one emitted record and returns the new total.
    pub fn increment(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns true once the count has reached the maximum.
    #[must_use]
    pub fn reached(&self) -> bool {
        self.max.is_some_and(|max| self.count() >= max)
    }
}

/// Totals for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records fully processed.
    pub processed: usize,
    /// Dropped-value counts per unmatched lookup key, across all records.
    pub dropped_codes: IndexMap<String, usize>,
}

/// Everything a finished run hands back.
#[derive(Debug)]
pub struct RunOutput<W> {
    /// The output graph.
    pub graph: MemoryGraph,
    /// Run totals.
    pub summary: RunSummary,
    /// Finalize hooks, already started.
    pub finalize: FinalizeGroup,
    /// The output sink, flushed and closed off.
    pub sink: Option<W>,
    /// The stage the handler finished in.
    pub stage: Stage,
}

/// Converts record models one at a time into the run's output graph.
pub struct RecordHandler<W: Write> {
    config: ConverterConfig,
    materializer: Materializer,
    graph: MemoryGraph,
    plugins: Vec<Arc<dyn Plugin>>,
    extra: Box<dyn ExtraTransforms>,
    sink: Option<W>,
    limiter: Limiter,
    stage: Stage,
    summary: RunSummary,
    emitted_any: bool,
}

impl<W: Write> std::fmt::Debug for RecordHandler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHandler")
            .field("stage", &self.stage)
            .field("processed", &self.summary.processed)
            .field("statements", &self.graph.len())
            .field("plugins", &self.plugins.len())
            .finish_non_exhaustive()
    }
}

impl RecordHandler<io::Sink> {
    /// Creates a handler that builds the graph without streaming it.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Config`] if the configuration is invalid.
    pub fn new(config: ConverterConfig) -> Result<Self> {
        Self::build(config, None)
    }
}

impl<W: Write> RecordHandler<W> {
    /// Creates a handler that streams each record's statements to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Config`] if the configuration is invalid.
    pub fn with_output(config: ConverterConfig, sink: W) -> Result<Self> {
        Self::build(config, Some(sink))
    }

    fn build(config: ConverterConfig, sink: Option<W>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            materializer: Materializer::new(&config),
            graph: MemoryGraph::new(),
            plugins: Vec::new(),
            extra: Box::new(DefaultExtraTransforms),
            sink,
            limiter: Limiter::new(config.max_records),
            stage: Stage::Idle,
            summary: RunSummary::default(),
            emitted_any: false,
            config,
        })
    }

    /// Sets the plugins whose hooks run at each stage.
    #[must_use]
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.materializer = self.materializer.with_plugins(plugins.clone());
        self.plugins = plugins;
        self
    }

    /// Replaces the positional transforms.
    #[must_use]
    pub fn with_extra_transforms(mut self, extra: impl ExtraTransforms + 'static) -> Self {
        self.extra = Box::new(extra);
        self
    }

    /// Replaces the id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.materializer = self.materializer.with_id_generator(ids);
        self
    }

    /// Shares a record limiter with the caller.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Limiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// The current stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The output graph so far.
    #[must_use]
    pub fn graph(&self) -> &MemoryGraph {
        &self.graph
    }

    /// Run totals so far.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn enter(&mut self, stage: Stage) {
        trace!(from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
    }

    fn context(&self, index: usize) -> RecordContext {
        RecordContext {
            index,
            vocab_base: self.config.vocab_base.clone(),
            entity_base: self.config.entity_base.clone(),
            ..RecordContext::default()
        }
    }

    /// Converts one record model.
    ///
    /// # Errors
    ///
    /// Returns the first plugin hook failure or sink error. Statements already
    /// added for the record stay in the graph, and [`RecordHandler::stage`]
    /// reports the stage that failed.
    pub fn handle(&mut self, mut model: MemoryGraph) -> Result<Flow> {
        if self.limiter.reached() {
            return Ok(Flow::Stop);
        }
        let Some(placeholder) = model.links().next().map(|link| link.origin.clone()) else {
            debug!(index = self.summary.processed, "Skipping empty record model");
            return Ok(Flow::Continue);
        };
        let mut context = self.context(self.summary.processed);
        let mark = self.graph.mark();

        self.enter(Stage::InputHook);
        for plugin in &self.plugins {
            plugin
                .input(&mut model, &context)
                .map_err(|e| ConvertError::collaborator("input", e.to_string()))?;
        }

        self.enter(Stage::XrefResolved);
        resolve_xrefs(&mut model);
        for plugin in &self.plugins {
            plugin
                .xref(&mut model, &context)
                .map_err(|e| ConvertError::collaborator("xref", e.to_string()))?;
        }

        self.enter(Stage::WorkPass);
        let work = materialize_work(
            &model,
            &placeholder,
            &mut self.materializer,
            self.extra.as_ref(),
            &mut self.graph,
        )?;
        context.work_id = Some(work.id.clone());
        context.folded = work.folded;

        self.enter(Stage::InstancePass);
        let mut instances = generate_instances(&model, &work.id, &mut self.materializer, &mut self.graph)?;
        let Some(default_instance) = instances.first().cloned() else {
            return Err(ConvertError::UnrepresentableStatement(format!(
                "no Instance for Work {}",
                work.id
            )));
        };

        self.enter(Stage::MainPass);
        let anchors = Anchors {
            work: &work.id,
            instance: &default_instance,
        };
        let outcome = process_patterns(
            Pass::Main,
            &model,
            &mut self.graph,
            &mut self.materializer,
            anchors,
            self.extra.as_ref(),
        )?;
        for (key, count) in outcome.dropped_codes {
            *self.summary.dropped_codes.entry(key).or_default() += count;
        }

        self.enter(Stage::Postprocess);
        register_requested(&mut instances, &outcome.postprocessing);
        merge_instances(&mut self.graph, &instances, &self.materializer);
        context.instance_ids = instances;

        let control_code = marc_lookup(&model, &["001"])
            .into_iter()
            .next()
            .map_or_else(|| "NO 001 CONTROL CODE".to_string(), |(_, v)| v);
        let title = marc_lookup(&model, &["245$a"])
            .into_iter()
            .next()
            .map_or_else(|| "NO 245$a TITLE".to_string(), |(_, v)| v);
        debug!(
            index = context.index,
            work = %work.id,
            folded = work.folded,
            instances = context.instance_ids.len(),
            control_code = %control_code,
            title = %title,
            "Converted record"
        );

        self.enter(Stage::RecordHook);
        for plugin in &self.plugins {
            plugin
                .record(&self.graph, &context)
                .map_err(|e| ConvertError::collaborator("record", e.to_string()))?;
        }

        self.emit(mark)?;
        self.enter(Stage::Emitted);
        self.summary.processed += 1;
        let count = self.limiter.increment();
        self.enter(Stage::Idle);

        match self.limiter.max() {
            Some(max) if count >= max => Ok(Flow::Stop),
            _ => Ok(Flow::Continue),
        }
    }

    /// Streams the statements added since `mark`.
    fn emit(&mut self, mark: StatementId) -> Result<()> {
        if self.config.canonical {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let statements = self
            .graph
            .links_since(mark)
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if statements.is_empty() {
            return Ok(());
        }
        let separator: &[u8] = if self.emitted_any { b",\n" } else { b"[" };
        sink.write_all(separator)?;
        sink.write_all(statements.join(", ").as_bytes())?;
        self.emitted_any = true;
        Ok(())
    }

    /// Closes the output framing and starts the finalize hooks.
    ///
    /// # Errors
    ///
    /// Returns a sink error if the closing delimiter cannot be written.
    pub fn finish(mut self) -> Result<RunOutput<W>> {
        self.enter(Stage::Draining);
        if !self.config.canonical {
            if let Some(sink) = self.sink.as_mut() {
                let close: &[u8] = if self.emitted_any { b"]" } else { b"[]" };
                sink.write_all(close)?;
                sink.flush()?;
            }
        }

        self.enter(Stage::Finalizing);
        let finalize = FinalizeGroup::start(&self.plugins);
        info!(
            processed = self.summary.processed,
            dropped = self.summary.dropped_codes.len(),
            "Conversion finished"
        );
        self.enter(Stage::Done);

        Ok(RunOutput {
            graph: self.graph,
            summary: self.summary,
            finalize,
            sink: self.sink,
            stage: self.stage,
        })
    }

    /// Converts record models from `records` until it closes or the limit is
    /// reached, then finishes the run.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Aborted`] carrying the number of completed
    /// records if any record fails.
    pub fn run(mut self, records: Receiver<MemoryGraph>) -> Result<RunOutput<W>> {
        for model in records.iter() {
            match self.handle(model) {
                Ok(Flow::Continue) => {},
                Ok(Flow::Stop) => break,
                Err(e) => {
                    return Err(ConvertError::Aborted {
                        completed: self.summary.processed,
                        source: Box::new(e),
                    })
                },
            }
        }
        drop(records);
        self.finish()
    }

    /// Converts decoded records through a bounded channel fed by a producer
    /// thread.
    ///
    /// # Errors
    ///
    /// As [`RecordHandler::run`].
    pub fn convert<I>(self, records: I) -> Result<RunOutput<W>>
    where
        I: IntoIterator<Item = Record> + Send + 'static,
        I::IntoIter: Send,
    {
        let (tx, rx) = channel(self.config.channel_capacity);
        let producer = feed(records, tx);
        let output = self.run(rx);
        let sent = producer
            .join()
            .map_err(|_| ConvertError::collaborator("input", "record producer panicked"))?;
        debug!(sent, "Record producer finished");
        output
    }
}

/// Creates the bounded record queue.
#[must_use]
pub fn channel(capacity: usize) -> (Sender<MemoryGraph>, Receiver<MemoryGraph>) {
    bounded(capacity.max(1))
}

/// Spawns a producer that builds a record model for each record and sends it
/// down the queue, blocking while the queue is full.
///
/// The producer stops early once the receiving side is dropped. It returns the
/// number of models sent.
pub fn feed<I>(records: I, tx: Sender<MemoryGraph>) -> thread::JoinHandle<usize>
where
    I: IntoIterator<Item = Record> + Send + 'static,
    I::IntoIter: Send,
{
    thread::spawn(move || {
        let mut sent = 0;
        for (index, record) in records.into_iter().enumerate() {
            let model = from_record(&record, &format!("_:record{index}"));
            if tx.send(model).is_err() {
                break;
            }
            sent += 1;
        }
        sent
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::Leader;
    use crate::plugin::HookResult;
    use crate::record::Field;

    fn record(title: &str) -> Record {
        Record::builder(Leader::default())
            .control_field_str("001", "1")
            .field(
                Field::builder("245".to_string(), '1', '0')
                    .subfield_str('a', title)
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_limiter() {
        let limiter = Limiter::new(Some(2));
        assert!(!limiter.reached());
        limiter.increment();
        let shared = limiter.clone();
        assert_eq!(shared.increment(), 2);
        assert!(limiter.reached());
        assert!(!Limiter::new(None).reached());
    }

    #[test]
    fn test_handle_returns_to_idle() {
        let mut handler = RecordHandler::new(ConverterConfig::default()).unwrap();
        let flow = handler.handle(from_record(&record("A"), "r")).unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(handler.stage(), Stage::Idle);
        assert_eq!(handler.summary().processed, 1);
        assert!(!handler.graph().is_empty());
    }

    #[test]
    fn test_failed_stage_stays_visible() {
        let mut handler = RecordHandler::new(ConverterConfig::default())
            .unwrap()
            .with_plugins(vec![Arc::new(FailOnRecord) as Arc<dyn Plugin>]);
        handler.handle(from_record(&record("A"), "r0")).unwrap();
        assert!(handler.handle(from_record(&record("B"), "r1")).is_err());
        assert_eq!(handler.stage(), Stage::RecordHook);
    }

    #[test]
    fn test_finish_reports_done() {
        let handler = RecordHandler::new(ConverterConfig::default()).unwrap();
        let output = handler.convert(vec![record("A")]).unwrap();
        assert_eq!(output.stage, Stage::Done);
        output.finalize.wait().unwrap();
    }

    #[test]
    fn test_stream_framing() {
        let handler = RecordHandler::with_output(ConverterConfig::default(), Vec::new()).unwrap();
        let output = handler.convert(vec![record("A"), record("B")]).unwrap();
        let text = String::from_utf8(output.sink.unwrap()).unwrap();
        assert!(text.starts_with('['));
        assert!(text.ends_with(']'));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), output.graph.len());
    }

    #[test]
    fn test_empty_stream_framing() {
        let handler = RecordHandler::with_output(ConverterConfig::default(), Vec::new()).unwrap();
        let output = handler.convert(Vec::new()).unwrap();
        assert_eq!(output.sink.unwrap(), b"[]");
        assert_eq!(output.summary.processed, 0);
    }

    #[test]
    fn test_canonical_mode_writes_nothing() {
        let config = ConverterConfig::new().with_canonical(true);
        let handler = RecordHandler::with_output(config, Vec::new()).unwrap();
        let output = handler.convert(vec![record("A")]).unwrap();
        assert!(output.sink.unwrap().is_empty());
        assert!(!output.graph.is_empty());
    }

    struct FailOnRecord;

    impl Plugin for FailOnRecord {
        fn record(&self, _graph: &MemoryGraph, context: &RecordContext) -> HookResult {
            if context.index == 1 {
                return Err("rejected".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_hook_failure_aborts_with_count() {
        let handler = RecordHandler::new(ConverterConfig::default())
            .unwrap()
            .with_plugins(vec![Arc::new(FailOnRecord) as Arc<dyn Plugin>]);
        let err = handler
            .convert(vec![record("A"), record("B"), record("C")])
            .unwrap_err();
        match err {
            ConvertError::Aborted { completed, source } => {
                assert_eq!(completed, 1);
                assert!(matches!(*source, ConvertError::Collaborator { stage: "record", .. }));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConverterConfig::new().with_vocab_base("relative/");
        assert!(matches!(RecordHandler::new(config), Err(ConvertError::Config(_))));
    }
}
