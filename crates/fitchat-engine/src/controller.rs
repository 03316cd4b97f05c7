use fitchat_contracts::events::{EventPayload, EventWriter};
use fitchat_contracts::session::{ChatTurn, ImageMarker, SessionState, TaskKind};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::inference::InferenceBackend;
use crate::normalize::{self, NormalizePolicy};

pub const ANALYSIS_COMPLETE: &str = "Analysis complete!";
pub const ANALYSIS_EMPTY: &str = "Failed to analyze image. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient status line for the presentation layer. Never stored in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Whatever shows the conversation. `render` is called once at the end of
/// every interaction with the full current history.
pub trait Presenter {
    fn render(&mut self, history: &[ChatTurn]);
    fn notice(&mut self, notice: &Notice);
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub task: TaskKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    Ignored,
    Responded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Analyzed,
    Duplicate,
    Failed,
}

/// Drives one chat session: routes user input through the normalizer and the
/// inference backend and records the resulting turns.
pub struct ConversationController<B: InferenceBackend> {
    state: SessionState,
    backend: B,
    policy: NormalizePolicy,
    events: Option<EventWriter>,
}

impl<B: InferenceBackend> ConversationController<B> {
    pub fn new(backend: B) -> Self {
        let mut state = SessionState::new();
        state.initialize();
        Self {
            state,
            backend,
            policy: NormalizePolicy::default(),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: NormalizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self.emit(
            "session_started",
            json!({
                "backend": self.backend.name(),
                "history_len": self.state.len(),
            }),
        );
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.state.history()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn submit_text(&mut self, text: &str, presenter: &mut dyn Presenter) -> TextOutcome {
        if text.trim().is_empty() {
            presenter.render(self.state.history());
            return TextOutcome::Ignored;
        }

        self.append(ChatTurn::user(text));
        let reply = self.backend.chat(text);
        self.append(ChatTurn::assistant(reply));

        presenter.render(self.state.history());
        TextOutcome::Responded
    }

    pub fn upload_image(&mut self, upload: ImageUpload, presenter: &mut dyn Presenter) -> ImageOutcome {
        let outcome = self.process_upload(upload, presenter);
        self.state.set_processing(false);
        presenter.render(self.state.history());
        outcome
    }

    /// Clears the chat and restores the welcome turn.
    pub fn clear(&mut self, presenter: &mut dyn Presenter) {
        let dropped = self.state.len();
        self.state.clear();
        self.state.initialize();
        info!(dropped, "chat history cleared");
        self.emit("history_cleared", json!({ "dropped_turns": dropped }));
        presenter.render(self.state.history());
    }

    fn process_upload(&mut self, upload: ImageUpload, presenter: &mut dyn Presenter) -> ImageOutcome {
        let ImageUpload { bytes, task } = upload;
        let marker = ImageMarker::for_upload(&bytes, task);
        if self.state.is_already_processed(&marker) {
            debug!(marker = %marker, "skipping image that was already processed");
            self.emit(
                "image_duplicate_skipped",
                json!({ "task": task.as_str(), "marker": marker.as_str() }),
            );
            return ImageOutcome::Duplicate;
        }
        self.state.mark_processing(marker.clone());

        let bitmap = match normalize::normalize_bytes(&bytes, self.policy) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                warn!(task = task.as_str(), error = %err, "image could not be processed");
                presenter.notice(&Notice::error(format!("Error processing image: {err:#}")));
                self.emit(
                    "image_failed",
                    json!({ "task": task.as_str(), "marker": marker.as_str(), "reason": "decode" }),
                );
                return ImageOutcome::Failed;
            }
        };

        self.state.set_processing(true);
        presenter.notice(&Notice::info(format!("Analyzing {task}...")));
        let analysis = self.backend.analyze_image(&bitmap, task);
        if analysis.trim().is_empty() {
            presenter.notice(&Notice::error(ANALYSIS_EMPTY));
            self.emit(
                "image_failed",
                json!({ "task": task.as_str(), "marker": marker.as_str(), "reason": "empty_analysis" }),
            );
            return ImageOutcome::Failed;
        }
        presenter.notice(&Notice::success(ANALYSIS_COMPLETE));

        self.append(ChatTurn::user_with_image(
            format!("[Uploaded {task} image]"),
            bitmap,
        ));
        self.append(ChatTurn::assistant(analysis));
        ImageOutcome::Analyzed
    }

    fn append(&mut self, turn: ChatTurn) {
        let payload = json!({
            "role": turn.role().as_str(),
            "chars": turn.content().chars().count(),
            "has_image": turn.image().is_some(),
            "index": self.state.len(),
        });
        self.state.append(turn);
        self.emit("turn_appended", payload);
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
        if let Err(err) = events.emit(event_type, payload) {
            warn!(event_type, error = %err, "failed to write session event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use fitchat_contracts::session::{EncodedBitmap, Role, WELCOME_MESSAGE};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;

    #[derive(Default)]
    struct ScriptedBackend {
        analysis: String,
        chat_calls: RefCell<Vec<String>>,
        analysis_calls: RefCell<Vec<(TaskKind, u32, u32)>>,
    }

    impl ScriptedBackend {
        fn answering(analysis: &str) -> Self {
            Self {
                analysis: analysis.to_string(),
                ..Self::default()
            }
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn analyze_image(&self, bitmap: &EncodedBitmap, task: TaskKind) -> String {
            self.analysis_calls
                .borrow_mut()
                .push((task, bitmap.width(), bitmap.height()));
            self.analysis.clone()
        }

        fn chat(&self, user_text: &str) -> String {
            self.chat_calls.borrow_mut().push(user_text.to_string());
            format!("reply to {user_text}")
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        renders: Vec<usize>,
        notices: Vec<Notice>,
    }

    impl Presenter for RecordingPresenter {
        fn render(&mut self, history: &[ChatTurn]) {
            self.renders.push(history.len());
        }

        fn notice(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> anyhow::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    #[test]
    fn new_controller_starts_with_welcome_turn() {
        let controller = ConversationController::new(ScriptedBackend::default());
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history()[0].content(), WELCOME_MESSAGE);
    }

    #[test]
    fn whitespace_submission_is_ignored_but_rerenders() {
        let mut controller = ConversationController::new(ScriptedBackend::default());
        let mut presenter = RecordingPresenter::default();

        assert_eq!(controller.submit_text("   \n", &mut presenter), TextOutcome::Ignored);
        assert_eq!(controller.submit_text("", &mut presenter), TextOutcome::Ignored);
        assert_eq!(controller.history().len(), 1);
        assert!(controller.backend().chat_calls.borrow().is_empty());
        assert_eq!(presenter.renders, vec![1, 1]);
    }

    #[test]
    fn text_submission_appends_user_then_assistant() {
        let mut controller = ConversationController::new(ScriptedBackend::default());
        let mut presenter = RecordingPresenter::default();

        let outcome = controller.submit_text("how much protein per day?", &mut presenter);
        assert_eq!(outcome, TextOutcome::Responded);

        let history = controller.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role(), Role::User);
        assert_eq!(history[1].content(), "how much protein per day?");
        assert_eq!(history[2].role(), Role::Assistant);
        assert_eq!(history[2].content(), "reply to how much protein per day?");
        assert_eq!(presenter.renders, vec![3]);
    }

    #[test]
    fn image_upload_appends_labelled_image_then_analysis() -> anyhow::Result<()> {
        let mut controller =
            ConversationController::new(ScriptedBackend::answering("Grilled chicken, ~450 kcal"));
        let mut presenter = RecordingPresenter::default();

        let outcome = controller.upload_image(
            ImageUpload {
                bytes: png_bytes(1000, 500, [10, 200, 10, 255])?,
                task: TaskKind::Food,
            },
            &mut presenter,
        );
        assert_eq!(outcome, ImageOutcome::Analyzed);

        let history = controller.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content(), "[Uploaded food image]");
        let image = history[1].image().map(|bitmap| (bitmap.width(), bitmap.height()));
        assert_eq!(image, Some((800, 400)));
        assert_eq!(history[2].content(), "Grilled chicken, ~450 kcal");
        assert_eq!(
            *controller.backend().analysis_calls.borrow(),
            vec![(TaskKind::Food, 800, 400)]
        );
        assert_eq!(
            presenter.notices,
            vec![
                Notice::info("Analyzing food..."),
                Notice::success(ANALYSIS_COMPLETE)
            ]
        );
        assert!(!controller.state().is_processing());
        Ok(())
    }

    #[test]
    fn same_upload_twice_is_processed_once() -> anyhow::Result<()> {
        let mut controller = ConversationController::new(ScriptedBackend::answering("Bench press"));
        let mut presenter = RecordingPresenter::default();
        let bytes = png_bytes(16, 16, [90, 90, 90, 255])?;

        let first = controller.upload_image(
            ImageUpload {
                bytes: bytes.clone(),
                task: TaskKind::Equipment,
            },
            &mut presenter,
        );
        let second = controller.upload_image(
            ImageUpload {
                bytes: bytes.clone(),
                task: TaskKind::Equipment,
            },
            &mut presenter,
        );

        assert_eq!(first, ImageOutcome::Analyzed);
        assert_eq!(second, ImageOutcome::Duplicate);
        assert_eq!(controller.history().len(), 3);
        assert_eq!(controller.backend().analysis_calls.borrow().len(), 1);
        assert_eq!(presenter.renders, vec![3, 3]);

        let other_task = controller.upload_image(
            ImageUpload {
                bytes,
                task: TaskKind::Food,
            },
            &mut presenter,
        );
        assert_eq!(other_task, ImageOutcome::Analyzed);
        assert_eq!(controller.history().len(), 5);
        Ok(())
    }

    #[test]
    fn undecodable_upload_surfaces_notice_without_touching_history() {
        let mut controller = ConversationController::new(ScriptedBackend::answering("unused"));
        let mut presenter = RecordingPresenter::default();

        let outcome = controller.upload_image(
            ImageUpload {
                bytes: b"not an image".to_vec(),
                task: TaskKind::Food,
            },
            &mut presenter,
        );

        assert_eq!(outcome, ImageOutcome::Failed);
        assert_eq!(controller.history().len(), 1);
        assert!(controller.backend().analysis_calls.borrow().is_empty());
        assert_eq!(presenter.notices.len(), 1);
        assert_eq!(presenter.notices[0].level, NoticeLevel::Error);
        assert!(presenter.notices[0]
            .message
            .starts_with("Error processing image: "));
        assert_eq!(presenter.renders, vec![1]);

        let retry = controller.upload_image(
            ImageUpload {
                bytes: b"not an image".to_vec(),
                task: TaskKind::Food,
            },
            &mut presenter,
        );
        assert_eq!(retry, ImageOutcome::Duplicate);
    }

    #[test]
    fn empty_analysis_appends_nothing() -> anyhow::Result<()> {
        let mut controller = ConversationController::new(ScriptedBackend::answering("  "));
        let mut presenter = RecordingPresenter::default();

        let outcome = controller.upload_image(
            ImageUpload {
                bytes: png_bytes(8, 8, [0, 0, 0, 255])?,
                task: TaskKind::Equipment,
            },
            &mut presenter,
        );

        assert_eq!(outcome, ImageOutcome::Failed);
        assert_eq!(controller.history().len(), 1);
        assert_eq!(presenter.notices.last(), Some(&Notice::error(ANALYSIS_EMPTY)));
        assert!(!controller.state().is_processing());
        Ok(())
    }

    #[test]
    fn clear_restores_single_welcome_turn_and_forgets_marker() -> anyhow::Result<()> {
        let mut controller = ConversationController::new(ScriptedBackend::answering("Dumbbells"));
        let mut presenter = RecordingPresenter::default();
        let bytes = png_bytes(4, 4, [1, 2, 3, 255])?;

        controller.submit_text("hi", &mut presenter);
        controller.upload_image(
            ImageUpload {
                bytes: bytes.clone(),
                task: TaskKind::Equipment,
            },
            &mut presenter,
        );
        controller.clear(&mut presenter);

        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history()[0].content(), WELCOME_MESSAGE);
        assert!(controller.state().current_marker().is_none());

        let again = controller.upload_image(
            ImageUpload {
                bytes,
                task: TaskKind::Equipment,
            },
            &mut presenter,
        );
        assert_eq!(again, ImageOutcome::Analyzed);
        Ok(())
    }

    #[test]
    fn session_events_are_written_when_attached() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let mut controller = ConversationController::new(ScriptedBackend::default())
            .with_events(EventWriter::new(&path, "session-test"));
        let mut presenter = RecordingPresenter::default();

        controller.submit_text("warm-up ideas?", &mut presenter);
        controller.clear(&mut presenter);

        let types: Vec<String> = fs::read_to_string(&path)?
            .lines()
            .map(|line| serde_json::from_str::<Value>(line))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            types,
            vec![
                "session_started",
                "turn_appended",
                "turn_appended",
                "history_cleared"
            ]
        );
        Ok(())
    }
}
