/// Where a document's stream currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterPhase {
    /// Nothing written yet.
    Empty,
    /// The last chunk ended inside an unterminated tag that is held back.
    BeginPending,
    /// Chunk boundaries and the open ancestor chain are known.
    Tracking,
    /// An open `<script>`, `<style>` or other text-only element is collecting text until its end tag.
    ContentAccumulating,
}

/// Per-document stream state, owned by one streamer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentWriterState {
    /// Start of a tag held back until a later chunk completes it.
    pub pending_tail: String,
    /// Tags left open by previous chunks, outermost first.
    pub parent_tag_chain: Vec<String>,
    /// Whether the last chunk's begin marker parsed as an element.
    pub begin_marker_present: bool,
    /// Whether the last chunk's end marker parsed as an element.
    pub end_marker_present: bool,
    /// Tag of the open text-only element, if the stream ended inside one.
    pub non_closed_element: Option<String>,
    /// Text of `non_closed_element` written so far, not yet processed.
    pub buffered_raw_text: String,
    pub non_closed_comment: bool,
    pub chunks_written: u64,
}

impl DocumentWriterState {
    pub fn phase(&self) -> WriterPhase {
        if self.non_closed_element.is_some() {
            WriterPhase::ContentAccumulating
        } else if !self.pending_tail.is_empty() {
            WriterPhase::BeginPending
        } else if self.chunks_written == 0 {
            WriterPhase::Empty
        } else {
            WriterPhase::Tracking
        }
    }

    /// Markup that reopens the chain and any open comment, so a chunk parsed
    /// on its own lands where the document will put it.
    pub fn context_prefix(&self) -> String {
        let mut prefix = String::new();
        for tag in &self.parent_tag_chain {
            prefix.push('<');
            prefix.push_str(tag);
            prefix.push('>');
        }
        if self.non_closed_comment {
            prefix.push_str("<!--");
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentWriterState;
    use super::WriterPhase;

    #[test]
    fn phase_follows_state() {
        let mut state = DocumentWriterState::default();
        assert_eq!(state.phase(), WriterPhase::Empty);

        state.pending_tail = "<di".to_owned();
        assert_eq!(state.phase(), WriterPhase::BeginPending);

        state.pending_tail.clear();
        state.chunks_written = 1;
        assert_eq!(state.phase(), WriterPhase::Tracking);

        state.non_closed_element = Some("script".to_owned());
        assert_eq!(state.phase(), WriterPhase::ContentAccumulating);
    }

    #[test]
    fn prefix_reopens_chain_and_comment() {
        let state = DocumentWriterState {
            parent_tag_chain: vec!["div".to_owned(), "span".to_owned()],
            non_closed_comment: true,
            ..DocumentWriterState::default()
        };
        assert_eq!(state.context_prefix(), "<div><span><!--");
    }
}
