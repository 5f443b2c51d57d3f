//! Pipeline driver tests: record limits, hooks, channel feeding and streamed
//! output.

mod common;

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{create_book, entities_of_type, targets, Recorder};
use marc2bf::namespaces::DATA_REL;
use marc2bf::{
    channel, feed, Attributes, ConvertError, ConverterConfig, HookResult, Limiter, Link,
    MemoryGraph, Plugin, RecordContext, RecordHandler, StatementStore,
};
use tempfile::NamedTempFile;

fn five_books() -> Vec<marc2bf::Record> {
    (1..=5)
        .map(|n| create_book(&n.to_string(), &format!("Book {n}"), None, &[]))
        .collect()
}

#[test]
fn test_record_limit_stops_then_finalizes() {
    let recorder = Recorder::shared();
    let config = ConverterConfig::new().with_max_records(2);
    let output = RecordHandler::new(config)
        .unwrap()
        .with_plugins(vec![recorder.clone() as Arc<dyn Plugin>])
        .convert(five_books())
        .unwrap();

    assert_eq!(output.summary.processed, 2);
    assert_eq!(entities_of_type(&output.graph, "Work").len(), 2);
    output.finalize.wait().unwrap();

    let calls = recorder.calls();
    assert_eq!(calls.iter().filter(|c| **c == "record").count(), 2);
    assert_eq!(calls.last(), Some(&"finalize"));
    assert_eq!(calls.iter().filter(|c| **c == "finalize").count(), 1);
}

#[test]
fn test_shared_limiter_counts_emitted_records() {
    let limiter = Limiter::new(Some(3));
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_limiter(limiter.clone())
        .convert(five_books())
        .unwrap();
    assert_eq!(limiter.count(), 3);
    assert!(limiter.reached());
    assert_eq!(output.summary.processed, 3);
}

#[test]
fn test_hook_order_per_record() {
    let recorder = Recorder::shared();
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_plugins(vec![recorder.clone() as Arc<dyn Plugin>])
        .convert(vec![create_book("1", "Title", Some("Author"), &[])])
        .unwrap();
    output.finalize.wait().unwrap();

    let calls = recorder.calls();
    assert_eq!(&calls[..2], &["input", "xref"]);
    assert!(calls[2..calls.len() - 2].iter().all(|c| *c == "materialized"));
    assert_eq!(&calls[calls.len() - 2..], &["record", "finalize"]);

    let context = &recorder.contexts()[0];
    assert_eq!(context.index, 0);
    assert!(context.work_id.is_some());
    assert_eq!(context.instance_ids.len(), 1);
}

/// Adds a 500 note to every record model before conversion.
struct AddNote;

impl Plugin for AddNote {
    fn input(&self, model: &mut MemoryGraph, _context: &RecordContext) -> HookResult {
        let origin = model
            .links()
            .next()
            .map(|link| link.origin.clone())
            .ok_or("empty model")?;
        let mut attributes = Attributes::new();
        attributes.insert("tag".to_string(), vec!["500".to_string()]);
        attributes.insert("ind1".to_string(), vec![" ".to_string()]);
        attributes.insert("ind2".to_string(), vec![" ".to_string()]);
        attributes.insert("a".to_string(), vec!["Added upstream.".to_string()]);
        model.add(Link::with_attributes(origin, format!("{DATA_REL}500"), "", attributes))?;
        Ok(())
    }
}

#[test]
fn test_input_hook_edits_record_model() {
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_plugins(vec![Arc::new(AddNote) as Arc<dyn Plugin>])
        .convert(vec![create_book("1", "Title", None, &[])])
        .unwrap();
    let work = &entities_of_type(&output.graph, "Work")[0];
    assert_eq!(targets(&output.graph, work, "note"), vec!["Added upstream."]);
}

struct SlowFinalize(Arc<AtomicUsize>);

impl Plugin for SlowFinalize {
    fn finalize(&self) -> HookResult {
        std::thread::sleep(std::time::Duration::from_millis(20));
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_finalize_hooks_run_independently() {
    let done = Arc::new(AtomicUsize::new(0));
    let plugins: Vec<Arc<dyn Plugin>> = (0..3)
        .map(|_| Arc::new(SlowFinalize(done.clone())) as Arc<dyn Plugin>)
        .collect();
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_plugins(plugins)
        .convert(five_books())
        .unwrap();
    output.finalize.wait().unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 3);
}

struct FailingInput;

impl Plugin for FailingInput {
    fn input(&self, _model: &mut MemoryGraph, context: &RecordContext) -> HookResult {
        if context.index == 2 {
            return Err("bad record".into());
        }
        Ok(())
    }
}

#[test]
fn test_failure_reports_completed_records() {
    let err = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_plugins(vec![Arc::new(FailingInput) as Arc<dyn Plugin>])
        .convert(five_books())
        .unwrap_err();
    assert!(matches!(err, ConvertError::Aborted { completed: 2, .. }));
    assert!(err.to_string().contains("bad record"));
}

#[test]
fn test_custom_id_generator() {
    let mut next = 0;
    let ids = move |_: &[u8]| {
        next += 1;
        format!("urn:test:{next}")
    };
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .with_id_generator(ids)
        .convert(vec![create_book("1", "Title", None, &["0198526636"])])
        .unwrap();
    let work = &entities_of_type(&output.graph, "Work")[0];
    let instance = &entities_of_type(&output.graph, "Instance")[0];
    assert!(work.starts_with("urn:test:"), "{work}");
    assert!(instance.starts_with("urn:test:"), "{instance}");
    assert_eq!(targets(&output.graph, instance, "instantiates"), vec![work.clone()]);
}

#[test]
fn test_small_channel_feeds_every_record() {
    let (tx, rx) = channel(1);
    let producer = feed(five_books(), tx);
    let output = RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .run(rx)
        .unwrap();
    assert_eq!(producer.join().unwrap(), 5);
    assert_eq!(output.summary.processed, 5);
}

#[test]
fn test_streamed_output_to_file() {
    let mut file = NamedTempFile::new().unwrap();
    let handler =
        RecordHandler::with_output(ConverterConfig::default(), file.reopen().unwrap()).unwrap();
    let output = handler.convert(five_books()).unwrap();
    file.flush().unwrap();

    let text = fs::read_to_string(file.path()).unwrap();
    let statements: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(statements.len(), output.graph.len());
    assert!(statements.iter().all(|s| s.as_array().map(Vec::len) == Some(4)));
    assert_eq!(text.matches(",\n").count(), 4);
}

#[test]
fn test_canonical_mode_leaves_file_empty() {
    let file = NamedTempFile::new().unwrap();
    let config = ConverterConfig::new().with_canonical(true);
    let handler = RecordHandler::with_output(config, file.reopen().unwrap()).unwrap();
    let output = handler.convert(five_books()).unwrap();
    assert_eq!(output.summary.processed, 5);
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "");
}
