//! The streamed-write state machine.
//!
//! Each chunk is rewritten, wrapped between two markers behind markup that
//! reopens whatever the previous chunks left open, and parsed into a detached
//! container of the host document. The markers show where the chunk landed;
//! the markup between them is what gets written to the live document.

use crate::markers::BEGIN_MARKUP;
use crate::markers::END_MARKUP;
use crate::markers::MarkerPosition;
use crate::markers::ancestor_tags;
use crate::markers::locate_begin;
use crate::markers::locate_end;
use crate::markers::split_pending;
use crate::state::DocumentWriterState;
use crate::state::WriterPhase;
use tracing::debug;
use tracing::warn;
use vn_core::VeneerError;
use vn_core::VeneerResult;
use vn_dom::NodeKind;
use vn_dom::WritableDocument;
use vn_html::FragmentContext;
use vn_html::MarkupRewriter;

pub const DEFAULT_RECOVERY_HOOK: &str = "__veneerReattach";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Global function the recovery script calls after the document was recreated.
    pub recovery_hook: String,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            recovery_hook: DEFAULT_RECOVERY_HOOK.to_owned(),
        }
    }
}

impl StreamerConfig {
    pub fn validate(&self) -> VeneerResult<()> {
        let mut chars = self.recovery_hook.chars();
        let valid = chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == '$')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$');

        if valid {
            Ok(())
        } else {
            Err(VeneerError::new(
                "config.recovery_hook_invalid",
                format!("`{}` is not a script identifier", self.recovery_hook),
            ))
        }
    }
}

/// Result of reconstructing one chunk, committed only once it is complete.
#[derive(Debug)]
struct Reconstructed {
    html: String,
    parent_tag_chain: Vec<String>,
    begin_marker_present: bool,
    end_marker_present: bool,
    non_closed_element: Option<String>,
    buffered_raw_text: String,
    non_closed_comment: bool,
}

/// Rewrites streamed writes for one live document.
#[derive(Debug)]
pub struct DocumentWriteStreamer<'a> {
    rewriter: MarkupRewriter<'a>,
    config: StreamerConfig,
    state: DocumentWriterState,
}

impl<'a> DocumentWriteStreamer<'a> {
    pub fn new(rewriter: MarkupRewriter<'a>, config: StreamerConfig) -> VeneerResult<Self> {
        config.validate()?;
        Ok(Self {
            rewriter,
            config,
            state: DocumentWriterState::default(),
        })
    }

    pub fn state(&self) -> &DocumentWriterState {
        &self.state
    }

    pub fn phase(&self) -> WriterPhase {
        self.state.phase()
    }

    /// Drops everything known about the previous document, including the
    /// resolver's cached base for it.
    pub fn on_document_recreated(&mut self) {
        debug!(phase = ?self.state.phase(), "document recreated, resetting stream state");
        self.state = DocumentWriterState::default();
        if let Some(doc) = self.rewriter.document() {
            self.rewriter.codec().resolver().forget_document(doc.id);
        }
    }

    /// Handles one `write`/`writeln` call. `recreated` reports that the
    /// document was reopened since the previous call.
    pub fn write<D: WritableDocument>(
        &mut self,
        document: &mut D,
        chunk: &str,
        writeln: bool,
        recreated: bool,
    ) {
        let mut out = String::new();
        if recreated {
            self.on_document_recreated();
            out.push_str(&self.recovery_script());
        }

        let mut combined = std::mem::take(&mut self.state.pending_tail);
        combined.push_str(chunk);
        if writeln {
            combined.push('\n');
        }

        let (terminated, tail) = split_pending(&combined);
        if !terminated.is_empty() {
            match self.reconstruct(document, terminated) {
                Ok(reconstructed) => {
                    out.push_str(&reconstructed.html);
                    self.commit(reconstructed, tail);
                }
                Err(error) => {
                    warn!(
                        %error,
                        chunk_len = combined.len(),
                        phase = ?self.state.phase(),
                        "writing chunk without rewriting"
                    );
                    out.push_str(&std::mem::take(&mut self.state.buffered_raw_text));
                    out.push_str(&combined);
                    self.state = DocumentWriterState {
                        chunks_written: self.state.chunks_written.saturating_add(1),
                        ..DocumentWriterState::default()
                    };
                }
            }
        } else {
            self.state.pending_tail = tail.to_owned();
        }

        // State is committed before the native write, so the host sees this chunk's final state.
        if !out.is_empty() {
            document.native_write(&out);
        }
    }

    fn commit(&mut self, reconstructed: Reconstructed, tail: &str) {
        self.state = DocumentWriterState {
            pending_tail: tail.to_owned(),
            parent_tag_chain: reconstructed.parent_tag_chain,
            begin_marker_present: reconstructed.begin_marker_present,
            end_marker_present: reconstructed.end_marker_present,
            non_closed_element: reconstructed.non_closed_element,
            buffered_raw_text: reconstructed.buffered_raw_text,
            non_closed_comment: reconstructed.non_closed_comment,
            chunks_written: self.state.chunks_written.saturating_add(1),
        };
    }

    fn reconstruct<D: WritableDocument>(
        &self,
        document: &mut D,
        terminated: &str,
    ) -> VeneerResult<Reconstructed> {
        let context = FragmentContext {
            open_raw_text: self.state.non_closed_element.as_deref(),
            in_comment: self.state.non_closed_comment,
        };
        let rewritten = self.rewriter.rewrite_continuation(terminated, context);
        let prefix = self.state.context_prefix();
        let wrapped = format!("{prefix}{BEGIN_MARKUP}{rewritten}{END_MARKUP}");

        let container = document.parse_fragment(&wrapped);
        let result = self.reconstruct_in(document, container, &prefix, &rewritten);
        document.discard_fragment(container);
        result
    }

    fn reconstruct_in<D: WritableDocument>(
        &self,
        document: &mut D,
        container: D::Node,
        prefix: &str,
        rewritten: &str,
    ) -> VeneerResult<Reconstructed> {
        let begin = locate_begin(&*document, container)
            .ok_or_else(|| marker_lost("begin marker not found"))?;
        let end =
            locate_end(&*document, container).ok_or_else(|| marker_lost("end marker not found"))?;

        let mut buffered_raw_text = self.state.buffered_raw_text.clone();
        let mut non_closed_element = None;
        let mut non_closed_comment = false;

        if let MarkerPosition::Text(node) = begin {
            let data = document.text_content(node);
            let stripped = data.strip_prefix(BEGIN_MARKUP).unwrap_or(&data).to_owned();
            document.set_text_content(node, &stripped);

            if document.kind(node) == NodeKind::Text && begin != end {
                // The open raw-text element was closed by this chunk.
                let element = document
                    .parent(node)
                    .ok_or_else(|| marker_lost("raw text has no element"))?;
                let tag = document.tag_name(element).unwrap_or_default().to_owned();
                let mut full = std::mem::take(&mut buffered_raw_text);
                full.push_str(&document.text_content(element));
                let processed = self.rewriter.process_raw_text(&tag, &full);
                document.set_text_content(element, &processed);
            }
        }

        if let MarkerPosition::Text(node) = end {
            let data = document.text_content(node);
            let stripped = data.strip_suffix(END_MARKUP).unwrap_or(&data).to_owned();

            match document.kind(node) {
                NodeKind::Comment => {
                    document.set_text_content(node, &stripped);
                    non_closed_comment = true;
                }
                _ => {
                    let element = document
                        .parent(node)
                        .ok_or_else(|| marker_lost("raw text has no element"))?;
                    if begin != end {
                        buffered_raw_text.clear();
                    }
                    buffered_raw_text.push_str(&stripped);
                    document.set_text_content(node, "");
                    non_closed_element = document.tag_name(element).map(str::to_owned);
                }
            }
        }

        let parent_tag_chain = ancestor_tags(&*document, end.node(), container);
        let html = if begin.is_element() && end.is_element() {
            rewritten.to_owned()
        } else {
            let serialized = document.serialize_children(container);
            unwrap_serialized(
                &serialized,
                begin,
                end,
                prefix,
                &parent_tag_chain,
                non_closed_comment,
            )?
        };

        Ok(Reconstructed {
            html,
            parent_tag_chain,
            begin_marker_present: begin.is_element(),
            end_marker_present: end.is_element(),
            non_closed_element,
            buffered_raw_text,
            non_closed_comment,
        })
    }

    fn recovery_script(&self) -> String {
        let hook = &self.config.recovery_hook;
        format!(
            "<script>(function(){{var s=document.currentScript;\
             if(s&&s.parentNode)s.parentNode.removeChild(s);\
             if(typeof window.{hook}==='function')window.{hook}();}})();</script>"
        )
    }
}

/// Cuts the chunk out of the serialized container. Used when a marker was
/// absorbed into text.
fn unwrap_serialized<N: Copy>(
    serialized: &str,
    begin: MarkerPosition<N>,
    end: MarkerPosition<N>,
    prefix: &str,
    chain: &[String],
    in_comment: bool,
) -> VeneerResult<String> {
    let start = match begin {
        MarkerPosition::Element(_) => serialized
            .find(BEGIN_MARKUP)
            .map(|idx| idx + BEGIN_MARKUP.len()),
        MarkerPosition::Text(_) => serialized.starts_with(prefix).then_some(prefix.len()),
    }
    .ok_or_else(|| marker_lost("begin boundary missing from serialized chunk"))?;

    let stop = match end {
        MarkerPosition::Element(_) => serialized.rfind(END_MARKUP),
        MarkerPosition::Text(_) => {
            let suffix = closing_suffix(chain, in_comment);
            serialized
                .ends_with(&suffix)
                .then(|| serialized.len() - suffix.len())
        }
    }
    .filter(|stop| *stop >= start)
    .ok_or_else(|| marker_lost("end boundary missing from serialized chunk"))?;

    Ok(serialized[start..stop].to_owned())
}

/// Markup the serializer appends after an end marker absorbed as text.
fn closing_suffix(chain: &[String], in_comment: bool) -> String {
    let mut suffix = String::new();
    if in_comment {
        suffix.push_str("-->");
    }
    for tag in chain.iter().rev() {
        suffix.push_str("</");
        suffix.push_str(tag);
        suffix.push('>');
    }
    suffix
}

fn marker_lost(reason: &str) -> VeneerError {
    VeneerError::new("write.marker_lost", reason.to_owned())
}
