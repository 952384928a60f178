use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::QuaestorError;

/// An HTTP client that only allows requests to approved upstream domains.
/// Every outbound connector (literature sources, Gemini, Firestore) goes
/// through this client, so a misconfigured URL fails fast instead of
/// leaking requests to arbitrary hosts.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist covering every upstream
    /// this service talks to.
    pub fn new() -> Result<Self, QuaestorError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "eutils.ncbi.nlm.nih.gov",            // PubMed E-utilities
            "export.arxiv.org",                   // arXiv Atom API
            "api.crossref.org",                   // CrossRef works
            "generativelanguage.googleapis.com",  // Gemini
            "firestore.googleapis.com",           // Firestore REST
            "localhost",                          // local test doubles
            "127.0.0.1",
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent("Quaestor/0.1 (mailto:quaestor@example.com)")
            .build()
            .map_err(|e| QuaestorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, QuaestorError> {
        if !self.is_allowed(url) {
            return Err(QuaestorError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, QuaestorError> {
        if !self.is_allowed(url) {
            return Err(QuaestorError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.post(url))
    }

    pub fn delete(&self, url: &str) -> Result<reqwest::RequestBuilder, QuaestorError> {
        if !self.is_allowed(url) {
            return Err(QuaestorError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.delete(url))
    }

    pub fn patch(&self, url: &str) -> Result<reqwest::RequestBuilder, QuaestorError> {
        if !self.is_allowed(url) {
            return Err(QuaestorError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(self.client.patch(url))
    }
}
