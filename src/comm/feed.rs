use crate::comm::diagnostics::{Diagnostic, DiagnosticSink};
use crate::comm::lines;
use crate::comm::message::{Message, SYSTEM_AUTHOR};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Point-in-time read of the rendered feed. Nodes are in source order, newest first.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub nodes: Vec<Value>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorSpan {
    pub text: String,
    pub color: Option<String>,
    pub badge: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedNode {
    pub id: Option<String>,
    pub is_system: bool,
    pub author_spans: Vec<AuthorSpan>,
    pub author_label: Option<String>,
    pub author_color: Option<String>,
    pub time_label: Option<String>,
    pub body_text: Option<String>,
    pub message_timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    text: Option<String>,
}

impl FeedSnapshot {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// JSON objects carry `nodes` and/or `text`; anything not shaped like one is flattened text.
    ///
    /// A payload that opens with `{` but does not parse (typically a snapshot read
    /// mid-write) yields an empty snapshot, so this pass captures nothing.
    pub fn parse(raw: &str, sink: &dyn DiagnosticSink) -> Self {
        if !raw.trim_start().starts_with('{') {
            return Self::from_text(raw);
        }
        match serde_json::from_str::<SnapshotFile>(raw) {
            Ok(file) => Self {
                nodes: file.nodes,
                text: file.text,
            },
            Err(err) => {
                sink.report(Diagnostic::parse_skip("snapshot", err.to_string()));
                Self::default()
            }
        }
    }

    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn read(path: &Path, sink: &dyn DiagnosticSink) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read feed snapshot {}", path.display()))?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes), sink))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Structured,
    Lines,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Lines => "lines",
        }
    }
}

pub trait Extractor {
    fn source(&self) -> ExtractionSource;

    /// Candidates, oldest first.
    fn extract(&self, snapshot: &FeedSnapshot, sink: &dyn DiagnosticSink) -> Vec<Message>;
}

pub struct StructuredExtractor;

pub struct LineExtractor {
    pub blacklist: BTreeSet<String>,
}

fn strip_outer_quotes(raw: &str) -> &str {
    raw.trim().trim_matches('"')
}

fn value_as_id(value: &Value) -> String {
    match value {
        Value::String(s) => strip_outer_quotes(s).to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

impl FeedNode {
    fn resolve_author(&self) -> (String, Option<String>) {
        if self.is_system {
            return (SYSTEM_AUTHOR.to_string(), None);
        }
        let labelled = self.author_spans.iter().rfind(|span| !span.badge);
        let (text, color) = match labelled {
            Some(span) => (span.text.as_str(), span.color.as_deref()),
            None => (
                self.author_label.as_deref().unwrap_or(""),
                self.author_color.as_deref(),
            ),
        };
        let name = text.trim();
        if name.is_empty() {
            // The label exists but is blank; its color is still what the feed shows.
            return (SYSTEM_AUTHOR.to_string(), non_empty(color));
        }
        (name.to_string(), non_empty(color))
    }

    fn resolve_id(&self) -> Option<String> {
        let own = self.id.as_deref().map(strip_outer_quotes).unwrap_or("");
        if !own.is_empty() {
            return Some(own.to_string());
        }
        let fallback = self
            .message_timestamp
            .as_ref()
            .map(value_as_id)
            .unwrap_or_default();
        if fallback.is_empty() { None } else { Some(fallback) }
    }

    pub fn to_message(&self) -> Option<Message> {
        let body = self.body_text.as_deref().unwrap_or("").trim();
        if body.is_empty() {
            return None;
        }
        let (username, username_color) = self.resolve_author();
        Some(Message {
            id: self.resolve_id(),
            username,
            username_color,
            time: self.time_label.as_deref().unwrap_or("").trim().to_string(),
            message: body.to_string(),
        })
    }
}

impl StructuredExtractor {
    pub fn structured_count(snapshot: &FeedSnapshot) -> usize {
        snapshot.nodes.len()
    }
}

impl Extractor for StructuredExtractor {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Structured
    }

    fn extract(&self, snapshot: &FeedSnapshot, sink: &dyn DiagnosticSink) -> Vec<Message> {
        let mut out = Vec::with_capacity(snapshot.nodes.len());
        for (index, raw) in snapshot.nodes.iter().enumerate() {
            match FeedNode::deserialize(raw) {
                Ok(node) => {
                    if let Some(message) = node.to_message() {
                        out.push(message);
                    }
                }
                Err(err) => sink.report(Diagnostic::parse_skip(
                    "extract",
                    format!("node={index} error={err}"),
                )),
            }
        }
        out.reverse();
        out
    }
}

impl Extractor for LineExtractor {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Lines
    }

    fn extract(&self, snapshot: &FeedSnapshot, _sink: &dyn DiagnosticSink) -> Vec<Message> {
        let Some(text) = snapshot.text.as_deref() else {
            return Vec::new();
        };
        let prepared = lines::prepare_lines(text, &self.blacklist);
        if prepared.is_empty() {
            return Vec::new();
        }
        lines::parse_lines(&prepared)
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub source: ExtractionSource,
    pub candidates: Vec<Message>,
}

/// Structured first; the line fallback only runs when that yields nothing. Re-decided on every call.
pub fn extract_snapshot(
    snapshot: &FeedSnapshot,
    blacklist: &BTreeSet<String>,
    sink: &dyn DiagnosticSink,
) -> Extraction {
    if StructuredExtractor::structured_count(snapshot) > 0 {
        let candidates = StructuredExtractor.extract(snapshot, sink);
        if !candidates.is_empty() {
            return Extraction {
                source: ExtractionSource::Structured,
                candidates,
            };
        }
    }

    let fallback = LineExtractor {
        blacklist: blacklist.clone(),
    };
    Extraction {
        source: fallback.source(),
        candidates: fallback.extract(snapshot, sink),
    }
}
