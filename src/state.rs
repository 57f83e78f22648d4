//! Application state: the lesson store, live sessions, engine tuning, and
//! the optional persistence-boundary client.
//!
//! Sessions are keyed by id and shared behind a Mutex so the WS loop, the
//! HTTP handlers, and the per-session poll task all drive the same engine
//! instance.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use crate::backend::ProgressBackend;
use crate::config::{load_engine_config_from_env, EngineTuning};
use crate::domain::Lesson;
use crate::seeds::seed_lessons;
use crate::session::DictationSession;

pub type SharedSession = Arc<Mutex<DictationSession>>;

#[derive(Clone)]
pub struct AppState {
    pub lessons: Arc<RwLock<HashMap<String, Lesson>>>,
    pub sessions: Arc<RwLock<HashMap<String, SharedSession>>>,
    pub backend: Option<ProgressBackend>,
    pub tuning: Arc<EngineTuning>,
}

impl AppState {
    /// Build state from env: load config, register lessons, init the
    /// persistence client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_engine_config_from_env().unwrap_or_default();
        let tuning = cfg.tuning.clone();

        let mut lesson_map = HashMap::<String, Lesson>::new();

        // Config-bank lessons first; they win over built-in seeds by id.
        for lesson in cfg.lessons {
            if lesson.transcript.is_empty() && lesson.transcript_url.is_none() {
                warn!(target: "lesson", id = %lesson.id, "Skipping bank lesson: no transcript or transcript_url");
                continue;
            }
            lesson_map.insert(lesson.id.clone(), lesson);
        }
        for lesson in seed_lessons() {
            lesson_map.entry(lesson.id.clone()).or_insert(lesson);
        }
        info!(target: "lesson", count = lesson_map.len(), "Startup lesson inventory");

        let backend = ProgressBackend::from_env(Duration::from_secs(tuning.request_timeout_sec));
        if let Some(b) = &backend {
            info!(target: "diktat_backend", base_url = %b.base_url, "Persistence backend enabled.");
        } else {
            info!(target: "diktat_backend", "Persistence backend disabled (no PROGRESS_API_URL). Running local-only.");
        }

        Self {
            lessons: Arc::new(RwLock::new(lesson_map)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            tuning: Arc::new(tuning),
        }
    }

    pub async fn get_lesson(&self, id: &str) -> Option<Lesson> {
        self.lessons.read().await.get(id).cloned()
    }

    pub async fn list_lessons(&self) -> Vec<Lesson> {
        let mut lessons: Vec<Lesson> = self.lessons.read().await.values().cloned().collect();
        lessons.sort_by(|a, b| a.id.cmp(&b.id));
        lessons
    }

    pub async fn insert_session(&self, session: DictationSession) -> SharedSession {
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get_session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove_session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(id)
    }
}
