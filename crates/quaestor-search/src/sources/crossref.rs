//! CrossRef works search client.
//!
//! API: https://api.crossref.org/works
//! Polite pool: the shared client sets a User-Agent with a mailto (see
//! CrossRef etiquette). Abstracts arrive as JATS XML snippets and are
//! stripped down to plain text.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use quaestor_common::models::{RecordMetadata, SearchConstraints, SourceSpec};
use quaestor_common::sandbox::SandboxClient as Client;

use super::LiteratureSource;

const CR_SEARCH_URL: &str = "https://api.crossref.org/works";

// Keep pages modest for the polite pool.
const CR_PAGE_CAP: usize = 100;

pub struct CrossRefClient {
    client: Client,
}

impl CrossRefClient {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::new()?,
        })
    }

    fn build_filter(constraints: &SearchConstraints) -> String {
        let mut parts = vec!["type:journal-article".to_string()];
        if let Some(from) = constraints.date_from {
            parts.push(format!("from-pub-date:{}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = constraints.date_to {
            parts.push(format!("until-pub-date:{}", to.format("%Y-%m-%d")));
        }
        parts.join(",")
    }
}

#[async_trait]
impl LiteratureSource for CrossRefClient {
    fn name(&self) -> SourceSpec {
        SourceSpec::CrossRef
    }

    #[instrument(skip(self, constraints))]
    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>> {
        let rows = constraints.max_results.min(CR_PAGE_CAP);
        let filter = Self::build_filter(constraints);

        let resp = self.client
            .get(CR_SEARCH_URL)?
            .query(&[
                ("query",  query),
                ("rows",   &rows.to_string()),
                ("filter", &filter),
                ("select", "DOI,title,abstract,author,published,URL"),
            ])
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let works = resp["message"]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        debug!(n = works.len(), "CrossRef search results");
        Ok(works.iter().map(work_to_record).collect())
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────

fn work_to_record(work: &serde_json::Value) -> RecordMetadata {
    let doi = work["DOI"].as_str().map(String::from);

    let title = work["title"]
        .as_array()
        .and_then(|t| t.first())
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();

    let abstract_text = work["abstract"].as_str().map(strip_jats);

    let authors: Vec<String> = work["author"]
        .as_array()
        .unwrap_or(&vec![])
        .iter()
        .map(|a| {
            let given  = a["given"].as_str().unwrap_or("").trim().to_string();
            let family = a["family"].as_str().unwrap_or("").trim().to_string();
            if given.is_empty() {
                family
            } else {
                format!("{given} {family}")
            }
        })
        .filter(|name| !name.is_empty())
        .collect();

    let published = work["published"]["date-parts"]
        .as_array()
        .and_then(|dp| dp.first())
        .and_then(|dp| dp.as_array())
        .and_then(|parts| {
            let year  = parts.first()?.as_u64()? as i32;
            let month = parts.get(1).and_then(|m| m.as_u64()).unwrap_or(1) as u32;
            let day   = parts.get(2).and_then(|d| d.as_u64()).unwrap_or(1) as u32;
            NaiveDate::from_ymd_opt(year, month, day)
        });

    let url = doi
        .as_ref()
        .map(|d| format!("https://doi.org/{d}"))
        .or_else(|| work["URL"].as_str().map(String::from));

    RecordMetadata {
        id: doi.clone().unwrap_or_else(|| title.clone()),
        source: SourceSpec::CrossRef,
        title,
        authors,
        abstract_text,
        url,
        doi,
        published,
        enhancement: None,
    }
}

/// CrossRef returns JATS XML snippets in abstracts; strip basic tags.
fn strip_jats(raw: &str) -> String {
    raw.replace("<jats:p>", "").replace("</jats:p>", "\n")
        .replace("<jats:italic>", "").replace("</jats:italic>", "")
        .replace("<jats:bold>", "").replace("</jats:bold>", "")
        .replace("<jats:title>", "").replace("</jats:title>", "\n")
        .trim()
        .to_string()
}
