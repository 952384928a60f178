//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! The date range is applied with `datetype=pdat` (publication date) and the
//! language filter with PubMed's `[Language]` field tag.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use quaestor_common::models::{RecordMetadata, SearchConstraints, SourceSpec};
use quaestor_common::sandbox::SandboxClient as Client;

use super::LiteratureSource;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL:  &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct PubMedClient {
    client: Client,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::new()?,
            api_key,
        })
    }

    /// Search PubMed and return a list of PMIDs.
    #[instrument(skip(self, constraints))]
    async fn esearch(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<String>> {
        let mut term = query.to_string();
        if let Some(lang) = &constraints.language {
            term.push_str(&format!(" AND {}[Language]", language_term(lang)));
        }

        let mut params = vec![
            ("db",         "pubmed".to_string()),
            ("term",       term),
            ("retmax",     constraints.max_results.to_string()),
            ("retmode",    "json".to_string()),
            ("usehistory", "n".to_string()),
        ];
        // esearch requires mindate and maxdate together; open ends get a
        // wide sentinel.
        if constraints.date_from.is_some() || constraints.date_to.is_some() {
            params.push(("datetype", "pdat".to_string()));
            params.push((
                "mindate",
                constraints
                    .date_from
                    .map(|d| d.format("%Y/%m/%d").to_string())
                    .unwrap_or_else(|| "1900/01/01".to_string()),
            ));
            params.push((
                "maxdate",
                constraints
                    .date_to
                    .map(|d| d.format("%Y/%m/%d").to_string())
                    .unwrap_or_else(|| "3000/12/31".to_string()),
            ));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let resp: serde_json::Value = self.client
            .get(ESEARCH_URL)?
            .query(&params)
            .send()
            .await?
            .json()
            .await?;

        let ids = resp["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();

        debug!(?ids, "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch PubMed XML for a list of PMIDs and parse into records.
    #[instrument(skip(self))]
    async fn efetch_abstracts(&self, pmids: &[String]) -> anyhow::Result<Vec<RecordMetadata>> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }

        let mut params = vec![
            ("db",      "pubmed".to_string()),
            ("id",      pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let xml = self.client
            .get(EFETCH_URL)?
            .query(&params)
            .send()
            .await?
            .text()
            .await?;

        parse_pubmed_xml(&xml)
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    fn name(&self) -> SourceSpec {
        SourceSpec::PubMed
    }

    async fn search(
        &self,
        query: &str,
        constraints: &SearchConstraints,
    ) -> anyhow::Result<Vec<RecordMetadata>> {
        let pmids = self.esearch(query, constraints).await?;
        self.efetch_abstracts(&pmids).await
    }
}

/// Map an ISO 639-1 code to PubMed's `[Language]` vocabulary. Unknown codes
/// pass through unchanged so full language names keep working.
fn language_term(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "zh" => "Chinese",
        _    => code,
    }
}

/// Parse PubMed XML (efetch abstract mode) into a record list.
/// Handles the <PubmedArticleSet><PubmedArticle> structure.
fn parse_pubmed_xml(xml: &str) -> anyhow::Result<Vec<RecordMetadata>> {
    let mut records = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // State machine for XML parsing
    let mut current: Option<RecordMetadata> = None;
    let mut in_pmid      = false;
    let mut in_title     = false;
    let mut in_abstract  = false;
    let mut in_author    = false;
    let mut in_last_name = false;
    let mut in_fore_name = false;
    let mut current_last = String::new();
    let mut current_fore = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                match e.name().as_ref() {
                    b"PubmedArticle" => {
                        current = Some(RecordMetadata {
                            id: String::new(),
                            source: SourceSpec::PubMed,
                            title: String::new(),
                            authors: vec![],
                            abstract_text: None,
                            url: None,
                            doi: None,
                            published: None,
                            enhancement: None,
                        });
                    }
                    b"PMID"         => in_pmid = true,
                    b"ArticleTitle" => in_title = true,
                    b"AbstractText" => in_abstract = true,
                    b"Author"       => { in_author = true; current_last.clear(); current_fore.clear(); }
                    b"LastName"     => in_last_name = true,
                    b"ForeName"     => in_fore_name = true,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut r) = current {
                    // The citation repeats <PMID> under <CommentsCorrections>;
                    // keep the first one only.
                    if in_pmid && r.id.is_empty() {
                        r.id = text.clone();
                        r.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{text}/"));
                    }
                    if in_title     { r.title = text.clone(); }
                    if in_abstract  { r.abstract_text = Some(text.clone()); }
                    if in_last_name { current_last = text.clone(); }
                    if in_fore_name { current_fore = text.clone(); }
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"PMID"         => in_pmid = false,
                    b"ArticleTitle" => in_title = false,
                    b"AbstractText" => in_abstract = false,
                    b"LastName"     => in_last_name = false,
                    b"ForeName"     => in_fore_name = false,
                    b"Author" => {
                        if in_author {
                            if let Some(ref mut r) = current {
                                let name = if current_fore.is_empty() {
                                    current_last.clone()
                                } else {
                                    format!("{} {}", current_fore, current_last)
                                };
                                if !name.is_empty() {
                                    r.authors.push(name);
                                }
                            }
                            in_author = false;
                        }
                    }
                    b"PubmedArticle" => {
                        if let Some(r) = current.take() {
                            if !r.title.is_empty() {
                                records.push(r);
                            } else {
                                warn!("skipping PubMed record with empty title");
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
