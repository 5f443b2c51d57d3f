//! Common test helpers and utilities shared across test suite.

use std::sync::{Arc, Mutex};

use marc2bf::namespaces::{BL, TYPE_REL};
use marc2bf::{
    ConverterConfig, Field, HookResult, Leader, MemoryGraph, Plugin, Record, RecordContext,
    RecordHandler, RunOutput, StatementStore,
};

/// Creates a default leader for test records.
#[allow(dead_code)]
pub fn create_test_leader() -> Leader {
    Leader {
        record_length: 1000,
        record_status: 'n',
        record_type: 'a',
        bibliographic_level: 'm',
        control_record_type: ' ',
        character_coding: 'a',
        indicator_count: 2,
        subfield_code_count: 2,
        data_base_address: 100,
        encoding_level: ' ',
        cataloging_form: 'a',
        multipart_level: ' ',
        reserved: "4500".to_string(),
    }
}

/// Creates a book record with a control number, title, optional author and
/// one 020 per ISBN.
pub fn create_book(control: &str, title: &str, author: Option<&str>, isbns: &[&str]) -> Record {
    let mut record = Record::new(create_test_leader());
    record.add_control_field_str("001", control);
    for isbn in isbns {
        let mut field = Field::new("020".to_string(), ' ', ' ');
        field.add_subfield_str('a', isbn);
        record.add_field(field);
    }
    if let Some(author) = author {
        let mut field = Field::new("100".to_string(), '1', ' ');
        field.add_subfield_str('a', author);
        record.add_field(field);
    }
    let mut field = Field::new("245".to_string(), '1', '0');
    field.add_subfield_str('a', title);
    record.add_field(field);
    record
}

/// Converts records with the default configuration and no output stream.
#[allow(dead_code)]
pub fn convert(records: Vec<Record>) -> RunOutput<std::io::Sink> {
    RecordHandler::new(ConverterConfig::default())
        .unwrap()
        .convert(records)
        .unwrap()
}

/// Ids of every entity typed `class` (a vocabulary local name), in graph order.
#[allow(dead_code)]
pub fn entities_of_type(graph: &MemoryGraph, class: &str) -> Vec<String> {
    let type_iri = format!("{BL}{class}");
    let mut ids: Vec<String> = Vec::new();
    for (_, link) in graph.match_links(None, Some(TYPE_REL)) {
        if link.target == type_iri && !ids.contains(&link.origin) {
            ids.push(link.origin.clone());
        }
    }
    ids
}

/// Targets of `origin --rel-->`, where `rel` is a vocabulary local name.
#[allow(dead_code)]
pub fn targets(graph: &MemoryGraph, origin: &str, rel: &str) -> Vec<String> {
    let rel = format!("{BL}{rel}");
    graph
        .match_links(Some(origin), Some(&rel))
        .map(|(_, link)| link.target.clone())
        .collect()
}

/// Plugin that keeps every record context and hook call it sees.
#[derive(Default)]
#[allow(dead_code)]
pub struct Recorder {
    /// Record contexts passed to the record hook.
    pub contexts: Mutex<Vec<RecordContext>>,
    /// Hook names in call order.
    pub calls: Mutex<Vec<&'static str>>,
}

#[allow(dead_code)]
impl Recorder {
    /// Creates a shared recorder.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The recorded contexts.
    pub fn contexts(&self) -> Vec<RecordContext> {
        self.contexts.lock().unwrap().clone()
    }

    /// The recorded hook names.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl Plugin for Recorder {
    fn input(&self, _model: &mut MemoryGraph, _context: &RecordContext) -> HookResult {
        self.calls.lock().unwrap().push("input");
        Ok(())
    }

    fn xref(&self, _model: &mut MemoryGraph, _context: &RecordContext) -> HookResult {
        self.calls.lock().unwrap().push("xref");
        Ok(())
    }

    fn materialized(&self, _event: &marc2bf::Materialized) -> HookResult {
        self.calls.lock().unwrap().push("materialized");
        Ok(())
    }

    fn record(&self, _graph: &MemoryGraph, context: &RecordContext) -> HookResult {
        self.calls.lock().unwrap().push("record");
        self.contexts.lock().unwrap().push(context.clone());
        Ok(())
    }

    fn finalize(&self) -> HookResult {
        self.calls.lock().unwrap().push("finalize");
        Ok(())
    }
}
