//! Composite catalog client
//!
//! The list of composites expected for a product cut and flow lives in the
//! test-program repository. `SvnCompositeSource` fetches it with `svn cat`;
//! `StaticCompositeSource` serves lists from configuration. `CompositeCatalog`
//! puts the summary composites first and never fails: a source error is
//! logged and leaves only the summary composites.

use crate::config::CatalogSettings;
use crate::error::CatalogError;
use crate::models::CompositeRules;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use stdfp_common::logging::targets;
use tokio::process::Command;
use tracing::{debug, warn};

/// Supplies the composites defined for a product cut and flow
#[async_trait]
pub trait CompositeSource: Send + Sync {
    async fn fetch(&self, product_cut: &str, flow: &str) -> Result<Vec<String>, CatalogError>;
}

/// Extract composite names from a `composites.cnf` document
pub fn parse_composites(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"Composite\s*:=\s*(\w+)") else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Reads `composites.cnf` from the repository with the `svn` client
pub struct SvnCompositeSource {
    program: PathBuf,
    url_template: String,
    username: Option<String>,
    password: Option<String>,
}

impl SvnCompositeSource {
    pub fn new(program: PathBuf, url_template: String) -> Self {
        Self {
            program,
            url_template,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn url(&self, product_cut: &str, flow: &str) -> String {
        self.url_template
            .replace("{cut}", product_cut)
            .replace("{flow}", flow)
    }

    fn args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["cat".to_string(), url.to_string()];
        if let Some(username) = &self.username {
            args.push("--username".to_string());
            args.push(username.clone());
        }
        if let Some(password) = &self.password {
            args.push("--password".to_string());
            args.push(password.clone());
        }
        args.push("--non-interactive".to_string());
        args.push("--trust-server-cert".to_string());
        args
    }
}

#[async_trait]
impl CompositeSource for SvnCompositeSource {
    async fn fetch(&self, product_cut: &str, flow: &str) -> Result<Vec<String>, CatalogError> {
        let url = self.url(product_cut, flow);
        let output = Command::new(&self.program)
            .args(self.args(&url))
            .output()
            .await
            .map_err(CatalogError::Spawn)?;

        if !output.status.success() {
            return Err(CatalogError::Unavailable {
                url,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_composites(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Composites from configuration, keyed by `<CUT>/<FLOW>` with a `*` fallback
#[derive(Debug, Clone, Default)]
pub struct StaticCompositeSource {
    lists: HashMap<String, Vec<String>>,
}

impl StaticCompositeSource {
    pub const FALLBACK_KEY: &'static str = "*";

    pub fn new(lists: HashMap<String, Vec<String>>) -> Self {
        Self { lists }
    }

    /// Same list for every cut and flow
    pub fn uniform(composites: Vec<String>) -> Self {
        let mut lists = HashMap::new();
        lists.insert(Self::FALLBACK_KEY.to_string(), composites);
        Self { lists }
    }

    pub fn key(product_cut: &str, flow: &str) -> String {
        format!("{}/{}", product_cut.to_uppercase(), flow.to_uppercase())
    }
}

#[async_trait]
impl CompositeSource for StaticCompositeSource {
    async fn fetch(&self, product_cut: &str, flow: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .lists
            .get(&Self::key(product_cut, flow))
            .or_else(|| self.lists.get(Self::FALLBACK_KEY))
            .cloned()
            .unwrap_or_default())
    }
}

/// Svn source when a URL template is configured, static lists otherwise
pub fn source_from_settings(settings: &CatalogSettings) -> Arc<dyn CompositeSource> {
    match &settings.url_template {
        Some(template) => Arc::new(
            SvnCompositeSource::new(settings.program.clone(), template.clone())
                .with_credentials(settings.username.clone(), settings.password.clone()),
        ),
        None => Arc::new(StaticCompositeSource::new(settings.static_composites.clone())),
    }
}

/// Ordered composite list: summary composites, then the source's, without repeats
#[derive(Clone)]
pub struct CompositeCatalog {
    source: Arc<dyn CompositeSource>,
    summary: Vec<String>,
}

impl CompositeCatalog {
    pub fn new(source: Arc<dyn CompositeSource>, rules: &CompositeRules) -> Self {
        Self {
            source,
            summary: rules.summary.clone(),
        }
    }

    pub async fn composites(&self, product_cut: &str, flow: &str) -> Vec<String> {
        let mut list = self.summary.clone();

        match self.source.fetch(product_cut, flow).await {
            Ok(fetched) => {
                for name in fetched {
                    if !list.contains(&name) {
                        list.push(name);
                    }
                }
                debug!(target: targets::POLLING, "Catalog {}/{}: {:?}", product_cut, flow, list);
            }
            Err(e) => {
                warn!(
                    target: targets::POLLING,
                    "Composite catalog unavailable for {}/{}, using summary composites only: {}",
                    product_cut,
                    flow,
                    e
                );
            }
        }

        list
    }
}

/// Per-pass memo over a catalog so each cut/flow is fetched once per pass
pub struct PassCatalog<'a> {
    catalog: &'a CompositeCatalog,
    memo: HashMap<(String, String), Vec<String>>,
}

impl<'a> PassCatalog<'a> {
    pub fn new(catalog: &'a CompositeCatalog) -> Self {
        Self {
            catalog,
            memo: HashMap::new(),
        }
    }

    pub async fn composites(&mut self, product_cut: &str, flow: &str) -> &[String] {
        let key = (product_cut.to_string(), flow.to_string());
        if !self.memo.contains_key(&key) {
            let list = self.catalog.composites(product_cut, flow).await;
            self.memo.insert(key.clone(), list);
        }
        self.memo.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }
}
