//! Scripted capabilities for orchestrator and pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use blogsmith_shared::{
    BlogsmithError, Document, ErrorKind, Fetcher, Generation, GenerationRequest, Generator,
    ModelRole, PublishReceipt, Publisher, Result, SiteSnapshot,
};

use crate::cache::StageCache;
use crate::orchestrator::Capabilities;
use crate::stages::names;

pub const SITE_URL: &str = "https://leafandkettle.com";

/// One scripted generator reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// A transient generation error.
    Fail(String),
    /// A permanent rejection with this HTTP status.
    Reject(u16),
    /// Never completes.
    Hang,
}

/// Strict JSON replies for every shipped stage.
pub fn canned(stage: &str) -> &'static str {
    match stage {
        names::ANALYZE_SITE => {
            r#"{"businessType": "Tea shop", "mainProducts": ["green tea", "oolong"],
                "targetAudience": "Tea lovers", "contentCategories": ["Brewing"],
                "industry": "Food & Beverage", "communicationStyle": "Friendly",
                "summary": "An online tea shop."}"#
        }
        names::POPULAR_PAGES => {
            r#"["https://leafandkettle.com/blog/brewing-guide", "https://leafandkettle.com/shop"]"#
        }
        names::CONTENT_STRATEGY => r#"["Brewing guides", "Tea storage"]"#,
        names::GENERATE_KEYWORDS => {
            r#"[{"keyword": "green tea benefits", "category": "primary"},
                {"keyword": "how to store loose leaf tea", "category": "question"}]"#
        }
        names::CLUSTER_KEYWORDS => {
            r#"{"clusters": [{"name": "Tea Basics", "keywords": ["green tea benefits"]}]}"#
        }
        names::GAP_ANALYSIS => {
            r#"{"contentGaps": [{"topic": "Tea Storage", "description": "No storage advice",
                                 "targetKeywords": ["tea storage"]}],
                "blogSuggestions": ["How to Store Loose Leaf Tea"]}"#
        }
        names::CREATE_OUTLINE => {
            r#"{"title": "How to Store Loose Leaf Tea",
                "sections": [{"heading": "Introduction", "type": "h2", "wordCount": 200}]}"#
        }
        names::WRITE_CONTENT => {
            r###"{"content": "## Introduction\n\nKeep tea in an airtight tin."}"###
        }
        names::FINAL_EDIT => {
            r##"{"finalContent": "# How to Store Loose Leaf Tea\n\nKeep tea in an airtight tin.",
                "seoAnalysis": {"overallScore": 85}}"##
        }
        _ => "{}",
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Serves scripted replies per stage, then canned ones. Records every request.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for the next call made by `stage`.
    pub fn script(self, stage: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(stage.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Stage names in call order.
    pub fn stages_called(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.stage.clone())
            .collect()
    }

    /// Prompt of the last call made by `stage`.
    pub fn prompt_for(&self, stage: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.stage == stage)
            .map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation> {
        let reply = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Text(canned(&request.stage).to_string()));
        let model = self.model_for(request.role);
        self.requests.lock().unwrap().push(request);

        match reply {
            Reply::Text(text) => Ok(Generation {
                text,
                model,
                tokens_in: 10,
                tokens_out: 20,
            }),
            Reply::Fail(message) => Err(BlogsmithError::Generation(message)),
            Reply::Reject(status) => Err(BlogsmithError::http_status(
                ErrorKind::Generation,
                status,
                format!("HTTP {status}"),
            )),
            Reply::Hang => std::future::pending().await,
        }
    }

    fn model_for(&self, role: ModelRole) -> String {
        format!("mock-{role}")
    }
}

// ---------------------------------------------------------------------------
// Fetcher / Publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<SiteSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SiteSnapshot {
            url: url.to_string(),
            title: "Leaf & Kettle".into(),
            description: "Loose leaf tea, shipped fresh.".into(),
            headings: vec!["Shop tea".into(), "Brewing guides".into()],
            text: "Leaf & Kettle sells loose leaf tea.".into(),
        })
    }
}

#[derive(Default)]
pub struct MockPublisher {
    pub documents: Mutex<Vec<Document>>,
    pub fail: bool,
    calls: AtomicUsize,
}

impl MockPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }

    /// Publish calls made, failed ones included.
    pub fn attempts(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, document: &Document) -> Result<PublishReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BlogsmithError::Publish("dataset is read-only".into()));
        }
        let mut documents = self.documents.lock().unwrap();
        documents.push(document.clone());
        let id = format!("post-{}", documents.len());
        Ok(PublishReceipt {
            url: format!("https://blog.example/{id}"),
            id,
        })
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String, String), String>>,
}

impl MemoryCache {
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl StageCache for MemoryCache {
    async fn get(&self, stage: &str, input_hash: &str, model: &str) -> Result<Option<String>> {
        let key = (stage.to_string(), input_hash.to_string(), model.to_string());
        Ok(self.entries.lock().unwrap().get(&key).cloned())
    }

    async fn put(&self, stage: &str, input_hash: &str, model: &str, raw: &str) -> Result<()> {
        let key = (stage.to_string(), input_hash.to_string(), model.to_string());
        self.entries.lock().unwrap().insert(key, raw.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Concrete handles to the mocks plus the trait-object bundle.
pub struct Mocks {
    pub generator: Arc<ScriptedGenerator>,
    pub fetcher: Arc<MockFetcher>,
    pub publisher: Arc<MockPublisher>,
}

impl Mocks {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self::with_publisher(generator, MockPublisher::default())
    }

    pub fn with_publisher(generator: ScriptedGenerator, publisher: MockPublisher) -> Self {
        Self {
            generator: Arc::new(generator),
            fetcher: Arc::new(MockFetcher::default()),
            publisher: Arc::new(publisher),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            generator: self.generator.clone(),
            fetcher: self.fetcher.clone(),
            publisher: self.publisher.clone(),
        }
    }
}
