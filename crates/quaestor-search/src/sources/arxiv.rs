//! arXiv API client.
//!
//! API: https://export.arxiv.org/api/query (Atom feed)
//!
//! Results are restricted to the quantitative-finance and economics
//! categories and sorted by submission date, newest first. arXiv has no
//! language field, so the language constraint is ignored here.

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use quaestor_common::models::{RecordMetadata, SearchConstraints, SourceSpec};
use quaestor_common::sandbox::SandboxClient as Client;

use super::LiteratureSource;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

// arXiv asks clients to keep result pages small.
const ARXIV_PAGE_CAP: usize = 100;

pub struct ArxivClient {
    client: Client,
}

impl ArxivClient {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::new()?,
        })
    }

    fn build_query(query: &str, constraints: &SearchConstraints) -> String {
        let mut q = format!("all:({query}) AND (cat:q-fin.* OR cat:econ.*)");
        if constraints.date_from.is_some() || constraints.date_to.is_some() {
            let from = constraints
                .date_from
                .map(|d| d.format("%Y%m%d").to_string())
                .unwrap_or_else(|| "19000101".to_string());
            let to = constraints
                .date_to
                .map(|d| d.format("%Y%m%d").to_string())
                .unwrap_or_else(|| "30001231".to_string());
            q.push_str(&format!(" AND submittedDate:[{from}0000 TO {to}2359]"));
        }
        q
    }
}

#[async_trait]
impl LiteratureSource for ArxivClient {
    fn name(&self) -> SourceSpec {
        SourceSpec::Arxiv
    }

    #[instrument(skip(self, constraints))]
    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>> {
        let search_query = Self::build_query(query, constraints);
        let max = constraints.max_results.min(ARXIV_PAGE_CAP);

        let xml = self.client
            .get(ARXIV_API_URL)?
            .query(&[
                ("search_query", search_query.as_str()),
                ("start",        "0"),
                ("max_results",  &max.to_string()),
                ("sortBy",       "submittedDate"),
                ("sortOrder",    "descending"),
            ])
            .send()
            .await?
            .text()
            .await?;

        let records = parse_arxiv_atom(&xml)?;
        debug!(n = records.len(), "arXiv search results");
        Ok(records)
    }
}

/// Parse the arXiv Atom feed into a record list. Only <entry> children are
/// read; the feed-level <title> and <id> are skipped.
fn parse_arxiv_atom(xml: &str) -> anyhow::Result<Vec<RecordMetadata>> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<RecordMetadata> = None;
    let mut in_entry     = false;
    let mut in_id        = false;
    let mut in_title     = false;
    let mut in_summary   = false;
    let mut in_published = false;
    let mut in_name      = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                match e.name().as_ref() {
                    b"entry" => {
                        in_entry = true;
                        current = Some(RecordMetadata {
                            id: String::new(),
                            source: SourceSpec::Arxiv,
                            title: String::new(),
                            authors: vec![],
                            abstract_text: None,
                            url: None,
                            doi: None,
                            published: None,
                            enhancement: None,
                        });
                    }
                    b"id"        if in_entry => in_id = true,
                    b"title"     if in_entry => in_title = true,
                    b"summary"   if in_entry => in_summary = true,
                    b"published" if in_entry => in_published = true,
                    b"name"      if in_entry => in_name = true,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut r) = current {
                    if in_id {
                        // e.g. http://arxiv.org/abs/2401.01234v1
                        r.url = Some(text.clone());
                        r.id = text.rsplit('/').next().unwrap_or(&text).to_string();
                    }
                    if in_title {
                        r.title = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    }
                    if in_summary {
                        r.abstract_text =
                            Some(text.split_whitespace().collect::<Vec<_>>().join(" "));
                    }
                    if in_published {
                        // 2024-01-15T08:30:00Z → date part only
                        r.published = text
                            .get(..10)
                            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
                    }
                    if in_name {
                        r.authors.push(text.clone());
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"id"        => in_id = false,
                    b"title"     => in_title = false,
                    b"summary"   => in_summary = false,
                    b"published" => in_published = false,
                    b"name"      => in_name = false,
                    b"entry" => {
                        in_entry = false;
                        if let Some(r) = current.take() {
                            if !r.title.is_empty() {
                                records.push(r);
                            } else {
                                warn!("skipping arXiv entry with empty title");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}
