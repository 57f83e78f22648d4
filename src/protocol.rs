//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::completion::{CompletionRestore, Verdict};
use crate::domain::{HideLevel, Lesson};
use crate::masking::MaskedToken;
use crate::playback::{PlaybackState, SeekDirection};
use crate::session::{RevealAllResult, SessionSummary, WordCheckResult};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListLessons,
    StartSession {
        #[serde(rename = "lessonId")]
        lesson_id: String,
        learner: String,
        #[serde(default)]
        hide_level: Option<HideLevel>,
        /// Previously persisted progress to pre-seed the session with.
        #[serde(default)]
        restore: Option<CompletionRestore>,
    },
    EndSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    RenderSentence {
        #[serde(rename = "sessionId")]
        session_id: String,
        sentence: usize,
    },
    CheckWord {
        #[serde(rename = "sessionId")]
        session_id: String,
        sentence: usize,
        word: usize,
        typed: String,
    },
    Hint {
        #[serde(rename = "sessionId")]
        session_id: String,
        sentence: usize,
        word: usize,
    },
    RevealAll {
        #[serde(rename = "sessionId")]
        session_id: String,
        sentence: usize,
    },
    PlaySentence {
        #[serde(rename = "sessionId")]
        session_id: String,
        sentence: usize,
    },
    TogglePlayPause {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SeekRelative {
        #[serde(rename = "sessionId")]
        session_id: String,
        direction: SeekDirection,
    },
    NextSentence {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    PreviousSentence {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SetHideLevel {
        #[serde(rename = "sessionId")]
        session_id: String,
        hide_level: HideLevel,
    },
    SetAutoStop {
        #[serde(rename = "sessionId")]
        session_id: String,
        enabled: bool,
    },
    SetRate {
        #[serde(rename = "sessionId")]
        session_id: String,
        rate: f64,
    },
    PlaybackStatus {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lessons {
        lessons: Vec<LessonOut>,
    },
    SessionStarted {
        session: SessionOut,
    },
    SessionEnded {
        #[serde(rename = "sessionId")]
        session_id: String,
        summary: SummaryOut,
    },
    MaskedSentence {
        sentence: usize,
        tokens: Vec<MaskedToken>,
    },
    WordResult {
        sentence: usize,
        word: usize,
        verdict: Verdict,
        #[serde(skip_serializing_if = "Option::is_none")]
        resolved_word: Option<String>,
        sentence_completed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        points_delta: Option<f64>,
        total_points: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        streak: Option<u32>,
    },
    Revealed {
        sentence: usize,
        revealed: Vec<RevealedWordOut>,
        sentence_completed: bool,
        total_points: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        streak: Option<u32>,
    },
    Playback {
        status: PlaybackOut,
    },
    HideLevelSet {
        hide_level: HideLevel,
    },
    AutoStopSet {
        enabled: bool,
    },
    RateSet {
        rate: f64,
    },
    Error {
        message: String,
    },
}

/// Lesson DTO without the transcript body (clients render sentences through
/// the session, never from raw transcript text).
#[derive(Debug, Serialize)]
pub struct LessonOut {
    pub id: String,
    pub title: String,
    pub audio_url: String,
    pub total_sentences: usize,
}

pub fn lesson_to_out(lesson: &Lesson) -> LessonOut {
    LessonOut {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        audio_url: lesson.audio_url.clone(),
        total_sentences: lesson.transcript.len(),
    }
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    pub hide_level: HideLevel,
    pub total_sentences: usize,
    pub current_sentence: usize,
    pub completion_percent: u32,
}

#[derive(Debug, Serialize)]
pub struct SummaryOut {
    pub completion_percent: u32,
    pub total_points: f64,
    pub study_seconds: u64,
}

impl From<SessionSummary> for SummaryOut {
    fn from(s: SessionSummary) -> Self {
        Self {
            completion_percent: s.completion_percent,
            total_points: s.total_points,
            study_seconds: s.study_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevealedWordOut {
    pub word: usize,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PlaybackOut {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub position: f64,
    pub current_sentence: usize,
    pub auto_stop: bool,
}

pub fn word_result_msg(sentence: usize, word: usize, r: WordCheckResult) -> ServerWsMessage {
    ServerWsMessage::WordResult {
        sentence,
        word,
        verdict: r.verdict,
        resolved_word: r.resolved_word,
        sentence_completed: r.sentence_completed,
        points_delta: r.points_delta,
        total_points: r.total_points,
        streak: r.streak_notification,
    }
}

pub fn revealed_msg(sentence: usize, r: RevealAllResult) -> ServerWsMessage {
    ServerWsMessage::Revealed {
        sentence,
        revealed: r
            .revealed
            .into_iter()
            .map(|(word, text)| RevealedWordOut { word, text })
            .collect(),
        sentence_completed: r.sentence_completed,
        total_points: r.total_points,
        streak: r.streak_notification,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    pub learner: String,
    #[serde(default)]
    pub hide_level: Option<HideLevel>,
    #[serde(default)]
    pub restore: Option<CompletionRestore>,
}

#[derive(Debug, Deserialize)]
pub struct CheckWordIn {
    pub sentence: usize,
    pub word: usize,
    pub typed: String,
}

#[derive(Debug, Deserialize)]
pub struct WordRefIn {
    pub sentence: usize,
    pub word: usize,
}

#[derive(Debug, Deserialize)]
pub struct SentenceRefIn {
    pub sentence: usize,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_message_carries_its_direction() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"seek_relative","sessionId":"s1","direction":"forward"}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::SeekRelative { session_id, direction } => {
                assert_eq!(session_id, "s1");
                assert_eq!(direction, SeekDirection::Forward);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn start_session_defaults_are_optional() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"start_session","lessonId":"demo-morgen","learner":"lena"}"#,
        )
        .unwrap();
        match msg {
            ClientWsMessage::StartSession { lesson_id, hide_level, restore, .. } => {
                assert_eq!(lesson_id, "demo-morgen");
                assert!(hide_level.is_none());
                assert!(restore.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
