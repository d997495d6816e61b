use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::ContentCache;
use crate::chat::prompts::{full_system_message, AUTO_SUMMARY_PROMPT};
use crate::chat::{
    CompletionRequest, CompletionResponse, CompletionService, Conversation, Message, QueryRouter,
    RoutedQuery,
};
use crate::config::Config;
use crate::embeddings::{EmbeddingClient, EmbeddingService};
use crate::error::{PageChatError, Result};
use crate::extractor::{extract_page, PageContent, PageDocument};
use crate::lifecycle::Lifecycle;
use crate::rag::{InitOutcome, RagIndex};
use crate::settings::{Settings, SettingsStore};
use crate::text::char_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Tab hidden; drops the index and the cache
    Hide,
    /// Chat panel closed while the page stays up. Background work stops and
    /// the index is dropped, but the cache survives so reopening restores it.
    PanelClosed,
    Visible,
    Unload,
    /// Same view, different document
    Navigate,
}

/// Everything one page view owns: extracted content, cache, RAG index,
/// conversation and the background work tied to them.
pub struct PageSession {
    config: Config,
    settings: Arc<dyn SettingsStore>,
    cache: Arc<Mutex<ContentCache>>,
    index: RagIndex,
    router: QueryRouter,
    conversation: Conversation,
    lifecycle: Lifecycle,
    page: Option<PageContent>,
    hidden: bool,
    auto_summarized: bool,
}

impl PageSession {
    pub fn new(
        config: Config,
        settings: Arc<dyn SettingsStore>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        let client = EmbeddingClient::new(embedder, &config.rag);
        let index = RagIndex::new(client, &config.rag);
        let cache = ContentCache::new(config.rag.cache_capacity, config.rag.cache_ttl);
        let router = QueryRouter::new(config.rag.top_k);

        Self {
            config,
            settings,
            cache: Arc::new(Mutex::new(cache)),
            index,
            router,
            conversation: Conversation::new(),
            lifecycle: Lifecycle::new(),
            page: None,
            hidden: false,
            auto_summarized: false,
        }
    }

    pub fn page(&self) -> Option<&PageContent> {
        self.page.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn index(&self) -> &RagIndex {
        &self.index
    }

    pub fn cached_pages(&self) -> usize {
        lock_cache(&self.cache).len()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn settings(&self) -> Settings {
        self.settings.get().unwrap_or_else(|e| {
            log::warn!("could not read settings, using defaults: {}", e);
            Settings::default()
        })
    }

    /// Capture the page and install the full-context system message.
    ///
    /// A cache hit skips extraction, and embeddings cached alongside it bring
    /// the RAG index back without calling the embedding service.
    pub fn prepare_context(&mut self, doc: &dyn PageDocument) -> &PageContent {
        let url = doc.url();
        let title = doc.title().trim().to_string();

        let cached = lock_cache(&self.cache)
            .get(&url, &title)
            .map(|entry| (entry.content.clone(), entry.embeddings.clone()));

        let page = match cached {
            Some((content, embeddings)) => {
                log::debug!("using cached content for {}", url);
                if let Some(embeddings) = embeddings {
                    if !self.index.is_initialized() && !self.index.restore(&content, embeddings) {
                        log::debug!("cached embeddings for {} no longer match", url);
                    }
                }
                content
            }
            None => {
                let budget = if self.index.is_initialized() {
                    self.config.rag.compact_content_budget
                } else {
                    self.config.rag.full_content_budget
                };
                let content = extract_page(doc, budget);
                lock_cache(&self.cache).set(&content.url, &content.title, content.clone(), None);
                content
            }
        };

        let language = self.settings().language;
        self.conversation.set_system(full_system_message(&page, &language));
        log::info!(
            "context ready for {} ({} chars)",
            page.url,
            char_len(&page.raw_text)
        );
        self.page.insert(page)
    }

    /// Build the RAG index for the current page and wait for it
    pub async fn initialize_rag(&self) -> Result<InitOutcome> {
        let page = self.page.clone().ok_or(PageChatError::NoPageContent)?;
        build_index(self.index.clone(), Arc::clone(&self.cache), page).await
    }

    /// Same as `initialize_rag`, as a background task cancelled by the next
    /// hide/unload. Returns false when there is no page yet.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_rag_initialization(&self) -> bool {
        let Some(page) = self.page.clone() else {
            return false;
        };
        self.lifecycle
            .spawn(report(build_index(self.index.clone(), Arc::clone(&self.cache), page)));
        true
    }

    /// Route `message`, call the completion backend and record the reply.
    ///
    /// The API key is checked before anything touches the network. A failed
    /// completion leaves the conversation as it was before the call.
    pub async fn send(
        &mut self,
        message: &str,
        completion: &dyn CompletionService,
    ) -> Result<CompletionResponse> {
        let settings = self.settings.get()?;
        let has_key = self.config.api_key.is_some()
            || settings
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty());
        if !has_key {
            return Err(PageChatError::MissingApiKey);
        }

        let routed = self.route(message, &settings.language).await?;
        let request = CompletionRequest::plan(&routed.messages, &settings);

        match completion.complete(&request).await {
            Ok(response) => {
                self.conversation.push(Message::assistant(response.text.clone()));
                Ok(response)
            }
            Err(e) => {
                log::warn!("completion failed: {}", e);
                self.conversation.pop_user();
                Err(e)
            }
        }
    }

    /// Routing only, no completion call
    pub async fn route(&mut self, message: &str, language: &str) -> Result<RoutedQuery> {
        let page = self.page.as_ref().ok_or(PageChatError::NoPageContent)?;
        Ok(self
            .router
            .route(message, page, &self.index, language, &mut self.conversation)
            .await)
    }

    /// Send the canned summary request once per page, if the user asked for it
    pub async fn auto_summarize(
        &mut self,
        completion: &dyn CompletionService,
    ) -> Result<Option<CompletionResponse>> {
        if self.auto_summarized || !self.settings().auto_summarize || self.page.is_none() {
            return Ok(None);
        }
        self.auto_summarized = true;
        self.send(AUTO_SUMMARY_PROMPT, completion).await.map(Some)
    }

    /// React to a page lifecycle event. Returns true when a RAG
    /// re-initialization was scheduled.
    ///
    /// # Panics
    ///
    /// `Visible` after `Hide` schedules that re-initialization on the current
    /// tokio runtime and panics if there is none. The other events never spawn.
    pub fn handle_event(&mut self, event: PageEvent) -> bool {
        log::debug!("page event {:?}", event);
        match event {
            PageEvent::Hide => {
                self.hidden = true;
                self.teardown();
                false
            }
            PageEvent::PanelClosed => {
                self.lifecycle.cleanup();
                self.index.cleanup();
                false
            }
            PageEvent::Unload | PageEvent::Navigate => {
                self.teardown();
                self.conversation.reset();
                self.page = None;
                self.hidden = false;
                self.auto_summarized = false;
                false
            }
            PageEvent::Visible => {
                if !std::mem::replace(&mut self.hidden, false) {
                    return false;
                }
                let Some(page) = self.page.clone() else {
                    return false;
                };
                if self.index.is_initialized() {
                    return false;
                }
                let task = report(build_index(self.index.clone(), Arc::clone(&self.cache), page));
                self.lifecycle.set_timeout(self.config.rag.reinit_delay, task);
                true
            }
        }
    }

    fn teardown(&self) {
        self.lifecycle.cleanup();
        self.index.cleanup();
        lock_cache(&self.cache).clear();
    }
}

fn lock_cache(cache: &Mutex<ContentCache>) -> MutexGuard<'_, ContentCache> {
    cache.lock().unwrap_or_else(|e| e.into_inner())
}

/// Initialize `index` from `page` and remember the vectors in the cache
async fn build_index(
    index: RagIndex,
    cache: Arc<Mutex<ContentCache>>,
    page: PageContent,
) -> Result<InitOutcome> {
    let outcome = index.initialize(&page).await?;
    if outcome == InitOutcome::Initialized {
        if let Some(embeddings) = index.embeddings() {
            let mut cache = lock_cache(&cache);
            if !cache.attach_embeddings(&page.url, &page.title, embeddings.clone()) {
                cache.set(&page.url, &page.title, page.clone(), Some(embeddings));
            }
        }
    }
    Ok(outcome)
}

async fn report(task: impl std::future::Future<Output = Result<InitOutcome>>) {
    match task.await {
        Ok(outcome) => log::debug!("background RAG initialization: {:?}", outcome),
        Err(e) if e.is_cancelled() => log::debug!("background RAG initialization cancelled"),
        Err(e) => log::warn!("RAG unavailable, using full page context: {}", e),
    }
}
