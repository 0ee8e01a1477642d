//! Tantivy integration for session indexes.
//!
//! This module wraps the Tantivy writer, reader and query parser
//! backing one open session.

use crate::core::analysis::{Analyzer, DEFAULT_FIELD, DEFAULT_TOKENIZER, ID_FIELD};
use crate::core::config::WriterConfig;
use crate::core::error::{IndexdError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::Directory;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// Create the Tantivy schema for a session
///
/// Fields:
/// - _id: Document identifier (STRING | STORED)
/// - default: Catch-all text (tokenized with the default analyzer)
/// - one text field per per-field analyzer override
pub fn create_schema(analyzer: &Analyzer) -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(ID_FIELD, STRING | STORED);
    builder.add_text_field(DEFAULT_FIELD, text_options(DEFAULT_TOKENIZER));

    for field in analyzer.field_names() {
        builder.add_text_field(field, text_options(&Analyzer::tokenizer_name(field)));
    }

    builder.build()
}

fn text_options(tokenizer: &str) -> TextOptions {
    TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizer)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    )
}

/// Result of a session search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHits {
    pub total_hits: usize,
    pub hits: Vec<String>,
}

/// Writer, reader and query parser for one session
pub struct SessionIndex {
    index: Index,
    writer: IndexWriter,
    reader: IndexReader,
    query_parser: QueryParser,
    id_field: Field,
    default_field: Field,
    fields: HashMap<String, Field>,
}

impl std::fmt::Debug for SessionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIndex")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SessionIndex {
    /// Open (or create) the index in `directory` and take its writer lock
    ///
    /// `label` names the index in errors. Fails with `StorageOpenError`
    /// if the directory is locked by another writer, unreadable, or holds
    /// an index with an incompatible schema.
    pub fn open(
        directory: Box<dyn Directory>,
        analyzer: &Analyzer,
        config: &WriterConfig,
        label: &str,
    ) -> Result<Self> {
        let storage_error = |e: tantivy::TantivyError| IndexdError::StorageOpenError {
            path: label.to_string(),
            message: e.to_string(),
        };

        let index =
            Index::open_or_create(directory, create_schema(analyzer)).map_err(storage_error)?;
        analyzer.register(index.tokenizers());

        let writer: IndexWriter = index
            .writer_with_num_threads(config.num_threads, config.heap_size_bytes)
            .map_err(storage_error)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(storage_error)?;

        let schema = index.schema();
        let id_field = schema.get_field(ID_FIELD).map_err(storage_error)?;
        let default_field = schema.get_field(DEFAULT_FIELD).map_err(storage_error)?;
        let fields = analyzer
            .field_names()
            .map(|name| Ok((name.to_string(), schema.get_field(name)?)))
            .collect::<tantivy::Result<HashMap<_, _>>>()
            .map_err(storage_error)?;

        let query_parser = QueryParser::for_index(&index, vec![default_field]);

        Ok(Self {
            index,
            writer,
            reader,
            query_parser,
            id_field,
            default_field,
            fields,
        })
    }

    /// Replace the document with `id` (or add it)
    ///
    /// Fields with a dedicated analyzer are indexed into their own field,
    /// everything else into `default`.
    pub fn update_document(&mut self, id: &str, fields: &BTreeMap<String, String>) -> Result<()> {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id_field, id);
        for (name, value) in fields {
            let field = self.fields.get(name).copied().unwrap_or(self.default_field);
            doc.add_text(field, value);
        }

        self.writer
            .delete_term(Term::from_field_text(self.id_field, id));
        self.writer
            .add_document(doc)
            .map_err(|e| IndexdError::IndexingFailed(format!("Failed to add document: {e}")))?;
        Ok(())
    }

    pub fn delete_document(&mut self, id: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.id_field, id));
    }

    /// Commit pending changes and make them visible to searches
    pub fn commit(&mut self) -> Result<()> {
        self.writer
            .commit()
            .map_err(|e| IndexdError::IndexingFailed(format!("Failed to commit: {e}")))?;
        self.reader
            .reload()
            .map_err(|e| IndexdError::SearchFailed(format!("Failed to reload reader: {e}")))?;
        Ok(())
    }

    /// Run a query against the last commit
    pub fn search(&self, query: &str, limit: usize) -> Result<SearchHits> {
        let query = self
            .query_parser
            .parse_query(query)
            .map_err(|e| IndexdError::InvalidRequest(format!("Failed to parse query: {e}")))?;

        let searcher = self.reader.searcher();
        let (top_docs, total_hits) = searcher
            .search(&query, &(TopDocs::with_limit(limit.max(1)), Count))
            .map_err(|e| IndexdError::SearchFailed(format!("Search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(|e| {
                IndexdError::SearchFailed(format!("Failed to retrieve document: {e}"))
            })?;
            if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
                hits.push(id.to_string());
            }
        }

        Ok(SearchHits { total_hits, hits })
    }

    /// Documents visible in the last commit
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Flush pending changes and release the writer lock
    pub fn close(self) -> Result<()> {
        let SessionIndex { mut writer, .. } = self;

        let committed = writer
            .commit()
            .map(|_| ())
            .map_err(|e| IndexdError::IndexingFailed(format!("Failed to commit on close: {e}")));
        let merged = writer
            .wait_merging_threads()
            .map_err(|e| IndexdError::IndexingFailed(format!("Failed to stop writer: {e}")));

        committed.and(merged)
    }
}
