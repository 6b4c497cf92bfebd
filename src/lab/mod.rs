//! The lab service root. Owns the cache and the assistant; everything else
//! borrows from it.

mod links;
mod repo;
mod snapshot;

use tracing::{debug, info, warn};

use crate::assistant::{Assistant, AssistantReply, ChatContext};
use crate::cache::{CacheManager, CacheStats, ChangeKind};
use crate::config::LabConfig;
use crate::error::{LabResult, ValidationError};
use crate::layout::LayoutEngine;
use crate::mindmap::{MapTemplate, MindMap, generate};
use crate::model::{
    CalendarEvent, ChatMessage, ChatSession, Collection, Entity, EntityKind, ExperimentRecord,
    Note, Sample, Settings, Sop, Topic,
};
use crate::store::KeyValueStore;
use crate::util::truncate_chars;

pub use links::{
    BrokenReference, LabView, NoteLink, broken_references, note_links, records_for_topic,
};
pub use repo::Repo;
pub use snapshot::{ImportSummary, Snapshot};

const SESSION_TITLE_CHARS: usize = 40;
const CONTEXT_RECORDS: usize = 5;

/// A chat turn whose user message is stored and whose reply is pending.
#[derive(Clone, Debug)]
pub struct PendingChat {
    pub session_id: String,
    /// The session as it was before the user message was added.
    pub history: ChatSession,
    pub text: String,
    pub context: ChatContext,
}

pub struct Lab<S: KeyValueStore> {
    cache: CacheManager<S>,
    config: LabConfig,
    assistant: Assistant,
}

impl<S: KeyValueStore> Lab<S> {
    /// Builds the cache over `store`, warms the frequently used collections
    /// and sets up the assistant from stored settings and `config`.
    pub fn open(store: S, config: LabConfig) -> Self {
        let mut cache = CacheManager::new(store, config.cache.clone());
        let report = cache.preload(&EntityKind::FREQUENT);
        for (kind, error) in &report.failed {
            warn!(%kind, %error, "collection unavailable at start-up");
        }

        let assistant = Assistant::http(config.assistant_config(&cache.settings().assistant));
        info!(
            preloaded = report.loaded.len(),
            assistant = assistant.config().is_configured(),
            "lab opened"
        );
        Self {
            cache,
            config,
            assistant,
        }
    }

    pub fn with_assistant(mut self, assistant: Assistant) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn cache(&mut self) -> &mut CacheManager<S> {
        &mut self.cache
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn repo<T: Entity>(&mut self) -> Repo<'_, T, S> {
        Repo::new(&mut self.cache)
    }

    pub fn topics(&mut self) -> Repo<'_, Topic, S> {
        self.repo()
    }

    pub fn records(&mut self) -> Repo<'_, ExperimentRecord, S> {
        self.repo()
    }

    pub fn notes(&mut self) -> Repo<'_, Note, S> {
        self.repo()
    }

    pub fn sops(&mut self) -> Repo<'_, Sop, S> {
        self.repo()
    }

    pub fn samples(&mut self) -> Repo<'_, Sample, S> {
        self.repo()
    }

    pub fn calendar(&mut self) -> Repo<'_, CalendarEvent, S> {
        self.repo()
    }

    pub fn chats(&mut self) -> Repo<'_, ChatSession, S> {
        self.repo()
    }

    pub fn mind_maps(&mut self) -> Repo<'_, MindMap, S> {
        self.repo()
    }

    pub fn settings(&mut self) -> Settings {
        self.cache.settings()
    }

    /// Edits and stores the settings, then rebuilds the assistant so new
    /// connection values take effect.
    pub fn update_settings<F>(&mut self, edit: F) -> LabResult<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.cache.try_settings()?;
        edit(&mut settings);
        settings.validate()?;
        self.cache.set_with(
            Collection::Settings(settings.clone()),
            ChangeKind::Updated,
            Vec::new(),
        )?;
        self.rebuild_assistant(&settings);
        Ok(settings)
    }

    fn rebuild_assistant(&mut self, settings: &Settings) {
        self.assistant = Assistant::http(self.config.assistant_config(&settings.assistant));
    }

    pub fn records_for_topic(&mut self, topic_id: &str) -> Vec<ExperimentRecord> {
        let topics = self.cache.list::<Topic>();
        records_for_topic(&topics, self.cache.list(), topic_id)
    }

    pub fn note_links(&mut self, note: &Note) -> Vec<NoteLink> {
        note_links(note, &self.cache.list::<ExperimentRecord>())
    }

    pub fn broken_references(&mut self) -> Vec<BrokenReference> {
        let topics = self.cache.list::<Topic>();
        let records = self.cache.list::<ExperimentRecord>();
        let notes = self.cache.list::<Note>();
        let sops = self.cache.list::<Sop>();
        let samples = self.cache.list::<Sample>();
        let calendar = self.cache.list::<CalendarEvent>();
        let mind_maps = self.cache.list::<MindMap>();
        broken_references(&LabView {
            topics: &topics,
            records: &records,
            notes: &notes,
            sops: &sops,
            samples: &samples,
            calendar: &calendar,
            mind_maps: &mind_maps,
        })
    }

    /// Prompt context for a topic: its title and its newest records.
    pub fn chat_context(&mut self, topic_id: Option<&str>) -> ChatContext {
        let Some(topic) = topic_id.and_then(|id| self.topics().get(id)) else {
            return ChatContext::default();
        };
        let mut records = self.records_for_topic(&topic.id);
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        ChatContext {
            topic: Some(topic.title),
            recent_records: records
                .into_iter()
                .take(CONTEXT_RECORDS)
                .map(|record| record.title)
                .collect(),
            notes: topic.description,
        }
    }

    /// Stores the user message, creating a session if `session_id` is
    /// `None`. The reply is produced separately so it can run off-thread.
    pub fn begin_chat(
        &mut self,
        session_id: Option<&str>,
        text: &str,
        topic_id: Option<&str>,
    ) -> LabResult<PendingChat> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::required("message").into());
        }

        let history = match session_id {
            Some(id) => self.chats().require(id)?,
            None => self
                .chats()
                .create(ChatSession::new(truncate_chars(text, SESSION_TITLE_CHARS)))?,
        };
        self.chats()
            .update(&history.id, |session| session.messages.push(ChatMessage::user(text)))?;

        Ok(PendingChat {
            session_id: history.id.clone(),
            history,
            text: text.to_owned(),
            context: self.chat_context(topic_id),
        })
    }

    pub fn finish_chat(
        &mut self,
        session_id: &str,
        reply: &AssistantReply,
    ) -> LabResult<ChatSession> {
        self.chats()
            .update(session_id, |session| session.messages.push(reply.to_message()))
    }

    /// One full chat turn. Assistant failures become a fallback reply; only
    /// storage and validation problems are errors.
    pub fn chat(
        &mut self,
        session_id: Option<&str>,
        text: &str,
        topic_id: Option<&str>,
    ) -> LabResult<(ChatSession, AssistantReply)> {
        let pending = self.begin_chat(session_id, text, topic_id)?;
        let reply = self
            .assistant
            .send(&pending.history, &pending.text, &pending.context);
        let session = self.finish_chat(&pending.session_id, &reply)?;
        Ok((session, reply))
    }

    pub fn new_mind_map(&mut self, title: &str, template: MapTemplate) -> LabResult<MindMap> {
        let spacing = self.settings().mind_map_spacing;
        let mut map = template.build(title);
        map.layout.spacing = spacing;
        self.mind_maps().create(map)
    }

    /// Drafts a map with the assistant, lays it out and stores it.
    pub fn generate_mind_map(&mut self, prompt: &str) -> LabResult<MindMap> {
        let map = generate::generate(&self.assistant, prompt)?;
        self.save_generated(map)
    }

    /// Settles the layout of a drafted map and stores it.
    pub fn save_generated(&mut self, mut map: MindMap) -> LabResult<MindMap> {
        map.layout.spacing = self.settings().mind_map_spacing;

        let mut engine = LayoutEngine::from_map(&map);
        let ticks = engine.run_to_rest();
        engine.reset_zoom();
        engine.write_back(&mut map);
        engine.dispose();
        debug!(ticks, nodes = map.nodes.len(), "generated map laid out");

        self.mind_maps().create(map)
    }

    /// Every collection as stored. Fails rather than exporting an empty
    /// collection when one cannot be read.
    pub fn export(&mut self) -> LabResult<Snapshot> {
        Snapshot::capture(&mut self.cache)
    }

    /// Replaces every collection in `snapshot`. Settings included, so the
    /// assistant is rebuilt afterwards.
    pub fn import(&mut self, snapshot: Snapshot) -> LabResult<ImportSummary> {
        let summary = snapshot.restore(&mut self.cache)?;
        let settings = self.cache.settings();
        self.rebuild_assistant(&settings);
        Ok(summary)
    }

    /// Drops cached state and subscribers and returns the store.
    pub fn dispose(self) -> S {
        info!("lab disposed");
        self.cache.dispose()
    }
}
