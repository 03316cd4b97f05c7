use super::marker::ImageMarker;
use super::turn::ChatTurn;

pub const WELCOME_MESSAGE: &str = "Hello! 👋 I'm your AI Fitness Trainer and Nutritionist.
I'm here to help you with:
• Nutrition advice and meal analysis 🍎
• Exercise recommendations 💪
• Fitness equipment guidance 🏋️‍♂️
• General health and wellness questions ❤️

Feel free to ask me anything or upload images of food/equipment for analysis!";

const UPLOAD_LABEL_TAG: &str = "[Uploaded";
const LABEL_MAX_CHARS: usize = 30;
const LABEL_KEEP_CHARS: usize = 27;

/// Per-session chat state: ordered history, the marker of the last image that
/// started processing, and the in-flight flag for image analysis.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    history: Vec<ChatTurn>,
    marker: Option<ImageMarker>,
    processing: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the welcome turn when history is empty and resets the marker.
    pub fn initialize(&mut self) {
        if self.history.is_empty() {
            self.history.push(ChatTurn::assistant(WELCOME_MESSAGE));
        }
        self.marker = None;
    }

    pub fn append(&mut self, turn: ChatTurn) {
        self.history.push(turn);
    }

    /// Empties history and marker. Does not re-seed the welcome turn; call
    /// [`SessionState::initialize`] afterwards for that.
    pub fn clear(&mut self) {
        self.history.clear();
        self.marker = None;
        self.processing = false;
    }

    pub fn mark_processing(&mut self, marker: ImageMarker) {
        self.marker = Some(marker);
    }

    pub fn is_already_processed(&self, marker: &ImageMarker) -> bool {
        self.marker.as_ref() == Some(marker)
    }

    pub fn current_marker(&self) -> Option<&ImageMarker> {
        self.marker.as_ref()
    }

    pub fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Short labels for the user turns, numbered by their position in the
    /// full history. Upload labels are kept whole.
    pub fn history_labels(&self) -> Vec<String> {
        self.history
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.is_user())
            .map(|(idx, turn)| format!("Message {}: {}", idx + 1, label_text(turn.content())))
            .collect()
    }
}

fn label_text(content: &str) -> String {
    if content.contains(UPLOAD_LABEL_TAG) || content.chars().count() <= LABEL_MAX_CHARS {
        return content.to_string();
    }
    let kept: String = content.chars().take(LABEL_KEEP_CHARS).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::turn::{EncodedBitmap, Role, TaskKind};

    #[test]
    fn initialize_seeds_single_welcome_turn() {
        let mut state = SessionState::new();
        state.initialize();
        state.initialize();
        assert_eq!(state.len(), 1);
        assert_eq!(state.history()[0].role(), Role::Assistant);
        assert_eq!(state.history()[0].content(), WELCOME_MESSAGE);
        assert!(state.current_marker().is_none());
    }

    #[test]
    fn initialize_keeps_existing_history_but_resets_marker() {
        let mut state = SessionState::new();
        state.append(ChatTurn::user("hello"));
        state.mark_processing(ImageMarker::for_upload(b"x", TaskKind::Food));
        state.initialize();
        assert_eq!(state.len(), 1);
        assert_eq!(state.history()[0].content(), "hello");
        assert!(state.current_marker().is_none());
    }

    #[test]
    fn clear_empties_until_initialized_again() {
        let mut state = SessionState::new();
        state.initialize();
        state.append(ChatTurn::user("squat form?"));
        state.append(ChatTurn::assistant("keep your chest up"));
        state.mark_processing(ImageMarker::for_upload(b"img", TaskKind::Equipment));
        state.set_processing(true);

        state.clear();
        assert!(state.is_empty());
        assert!(state.current_marker().is_none());
        assert!(!state.is_processing());

        state.initialize();
        assert_eq!(state.len(), 1);
        assert_eq!(state.history()[0].content(), WELCOME_MESSAGE);
    }

    #[test]
    fn already_processed_matches_only_stored_marker() {
        let mut state = SessionState::new();
        let food = ImageMarker::for_upload(b"plate", TaskKind::Food);
        let equipment = ImageMarker::for_upload(b"plate", TaskKind::Equipment);
        assert!(!state.is_already_processed(&food));

        state.mark_processing(food.clone());
        assert!(state.is_already_processed(&food));
        assert!(!state.is_already_processed(&equipment));

        state.mark_processing(equipment.clone());
        assert!(!state.is_already_processed(&food));
        assert!(state.is_already_processed(&equipment));
    }

    #[test]
    fn history_labels_truncate_text_and_keep_upload_labels() {
        let mut state = SessionState::new();
        state.initialize();
        state.append(ChatTurn::user("short question"));
        state.append(ChatTurn::assistant("answer"));
        state.append(ChatTurn::user(
            "what should I eat before a long morning run?",
        ));
        state.append(ChatTurn::assistant("oats"));
        state.append(ChatTurn::user_with_image(
            "[Uploaded equipment image]",
            EncodedBitmap::from_jpeg_bytes(b"jpeg", 1, 1),
        ));

        assert_eq!(
            state.history_labels(),
            vec![
                "Message 2: short question".to_string(),
                "Message 4: what should I eat before a ...".to_string(),
                "Message 6: [Uploaded equipment image]".to_string(),
            ]
        );
    }

    #[test]
    fn history_labels_count_chars_not_bytes() {
        let mut state = SessionState::new();
        let content = "é".repeat(31);
        state.append(ChatTurn::user(content));
        let labels = state.history_labels();
        assert_eq!(labels[0], format!("Message 1: {}...", "é".repeat(27)));
    }
}
