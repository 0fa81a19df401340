//! Section-owning document model.
//!
//! A generated document is plain markdown in which some regions are owned
//! by the generator. Each owned region is delimited by a pair of HTML
//! comment markers that encode the owning `symbol_id` and the hash of the
//! source that produced it:
//!
//! ```text
//! <!-- BEGIN: auto:pkg.mod.Foo.bar (hash=3f2a…) -->
//! generated content
//! <!-- END: auto:pkg.mod.Foo.bar -->
//! ```
//!
//! [`Document::parse`] splits a file into an ordered list of
//! [`DocumentChunk`]s, either literal text or an owned [`Section`].
//! [`Document::render`] concatenates the chunks back, so a parse followed by
//! a render reproduces the input byte for byte. Replacing a section only
//! swaps that one chunk; everything else, including hand-written text
//! between sections, is carried through untouched.
//!
//! Sections are matched by `symbol_id` alone. The stored hash is
//! informational, since the reason to write a section again is usually that
//! the hash has changed.

const BEGIN_PREFIX: &str = "<!-- BEGIN: auto:";
const END_PREFIX: &str = "<!-- END: auto:";
const HASH_OPEN: &str = " (hash=";
const MARKER_CLOSE: &str = " -->";

/// Build the opening marker for a section.
pub fn begin_marker(symbol_id: &str, source_hash: &str) -> String {
    format!("{BEGIN_PREFIX}{symbol_id}{HASH_OPEN}{source_hash}){MARKER_CLOSE}")
}

/// Build the closing marker for a section.
pub fn end_marker(symbol_id: &str) -> String {
    format!("{END_PREFIX}{symbol_id}{MARKER_CLOSE}")
}

/// A machine-owned, replaceable region of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    symbol_id: String,
    source_hash: String,
    body: String,
    /// Exact bytes from the begin marker through the end marker.
    raw: String,
}

impl Section {
    /// Build a fresh section. Trailing newlines of `body` are dropped so the
    /// end marker always sits on the line after the content.
    pub fn new(symbol_id: &str, source_hash: &str, body: &str) -> Self {
        let body = body.trim_end_matches(['\n', '\r']).to_string();
        let raw = format!(
            "{}\n{}\n{}",
            begin_marker(symbol_id, source_hash),
            body,
            end_marker(symbol_id)
        );
        Self {
            symbol_id: symbol_id.to_string(),
            source_hash: source_hash.to_string(),
            body,
            raw,
        }
    }

    pub fn symbol_id(&self) -> &str {
        &self.symbol_id
    }

    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One piece of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChunk {
    Text(String),
    Section(Section),
}

impl DocumentChunk {
    fn as_str(&self) -> &str {
        match self {
            DocumentChunk::Text(t) => t,
            DocumentChunk::Section(s) => s.as_str(),
        }
    }
}

/// What [`Document::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// An existing section for the symbol was replaced in place.
    Replaced,
    /// No section existed; a new one was appended at the end.
    Appended,
}

/// A parsed document: literal text interleaved with owned sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    chunks: Vec<DocumentChunk>,
}

impl Document {
    /// A new document containing only a level-one heading.
    pub fn with_title(title: &str) -> Self {
        Self {
            chunks: vec![DocumentChunk::Text(format!("# {title}\n\n"))],
        }
    }

    /// Parse document text. Never fails: malformed or unterminated markers
    /// are kept as literal text.
    pub fn parse(text: &str) -> Self {
        let mut chunks = Vec::new();
        let mut literal_start = 0;
        let mut cursor = 0;

        while let Some(offset) = text[cursor..].find(BEGIN_PREFIX) {
            let begin_at = cursor + offset;
            match parse_section_at(text, begin_at) {
                Some((section, section_end)) => {
                    if begin_at > literal_start {
                        chunks.push(DocumentChunk::Text(
                            text[literal_start..begin_at].to_string(),
                        ));
                    }
                    chunks.push(DocumentChunk::Section(section));
                    cursor = section_end;
                    literal_start = section_end;
                }
                None => cursor = begin_at + BEGIN_PREFIX.len(),
            }
        }

        if literal_start < text.len() {
            chunks.push(DocumentChunk::Text(text[literal_start..].to_string()));
        }

        Self { chunks }
    }

    /// Render the document back to text.
    pub fn render(&self) -> String {
        self.chunks.iter().map(DocumentChunk::as_str).collect()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// All owned sections, in document order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.chunks.iter().filter_map(|c| match c {
            DocumentChunk::Section(s) => Some(s),
            DocumentChunk::Text(_) => None,
        })
    }

    /// The section owned by `symbol_id`, if any.
    pub fn section(&self, symbol_id: &str) -> Option<&Section> {
        self.sections().find(|s| s.symbol_id == symbol_id)
    }

    /// Replace the section owned by `section.symbol_id()` in place, or append
    /// it after the existing content separated by a blank line.
    ///
    /// If the file somehow holds several sections for the same symbol, the
    /// first is replaced and the others are removed.
    pub fn upsert(&mut self, section: Section) -> Upsert {
        let positions: Vec<usize> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(i, c)| match c {
                DocumentChunk::Section(s) if s.symbol_id == section.symbol_id => Some(i),
                _ => None,
            })
            .collect();

        let Some((&first, duplicates)) = positions.split_first() else {
            self.append(section);
            return Upsert::Appended;
        };

        self.chunks[first] = DocumentChunk::Section(section);
        for &i in duplicates.iter().rev() {
            self.chunks.remove(i);
        }
        Upsert::Replaced
    }

    fn append(&mut self, section: Section) {
        let rendered = self.render();
        let separator = if rendered.is_empty() || rendered.ends_with("\n\n") {
            ""
        } else if rendered.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        };
        if !separator.is_empty() {
            self.chunks.push(DocumentChunk::Text(separator.to_string()));
        }
        self.chunks.push(DocumentChunk::Section(section));
        self.chunks.push(DocumentChunk::Text("\n".to_string()));
    }
}

/// Parse `symbol_id` and hash out of a begin marker starting at `at`.
/// Returns them with the byte offset just past the marker.
fn parse_begin_marker(text: &str, at: usize) -> Option<(&str, &str, usize)> {
    let rest = &text[at + BEGIN_PREFIX.len()..];
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];

    let hash_at = line.find(HASH_OPEN)?;
    let symbol_id = &line[..hash_at];
    if symbol_id.is_empty() || symbol_id.contains(char::is_whitespace) {
        return None;
    }

    let after_hash = &line[hash_at + HASH_OPEN.len()..];
    let close_at = after_hash.find(')')?;
    let hash = &after_hash[..close_at];
    if !after_hash[close_at + 1..].starts_with(MARKER_CLOSE) {
        return None;
    }

    let consumed = hash_at + HASH_OPEN.len() + close_at + 1 + MARKER_CLOSE.len();
    Some((symbol_id, hash, at + BEGIN_PREFIX.len() + consumed))
}

/// Parse a complete section whose begin marker starts at `at`.
fn parse_section_at(text: &str, at: usize) -> Option<(Section, usize)> {
    let (symbol_id, hash, begin_end) = parse_begin_marker(text, at)?;
    let end = end_marker(symbol_id);
    let end_at = begin_end + text[begin_end..].find(&end)?;
    let section_end = end_at + end.len();

    let inner = &text[begin_end..end_at];
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    let body = inner.strip_suffix('\n').unwrap_or(inner);

    Some((
        Section {
            symbol_id: symbol_id.to_string(),
            source_hash: hash.to_string(),
            body: body.to_string(),
            raw: text[at..section_end].to_string(),
        },
        section_end,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_sections(text: &str, id: &str) -> usize {
        text.matches(&format!("{BEGIN_PREFIX}{id} ")).count()
    }

    #[test]
    fn parse_render_is_byte_identical() {
        let text = "# mod\n\nintro\n\n<!-- BEGIN: auto:a.b (hash=11) -->\nA\n<!-- END: auto:a.b -->\n\nmanual note\n<!-- BEGIN: auto:a.c (hash=22) -->\nC\n\n<!-- END: auto:a.c -->";
        let doc = Document::parse(text);
        assert_eq!(doc.render(), text);
        assert_eq!(doc.sections().count(), 2);
        assert_eq!(doc.section("a.b").unwrap().body(), "A");
        assert_eq!(doc.section("a.c").unwrap().body(), "C\n");
        assert_eq!(doc.section("a.c").unwrap().source_hash(), "22");
    }

    #[test]
    fn upsert_twice_leaves_one_section_with_latest_content() {
        let mut doc = Document::with_title("mod");
        assert_eq!(doc.upsert(Section::new("pkg.mod.f", "h1", "first")), Upsert::Appended);
        let text = doc.render();

        let mut doc = Document::parse(&text);
        assert_eq!(doc.upsert(Section::new("pkg.mod.f", "h2", "second")), Upsert::Replaced);
        let text = doc.render();

        assert_eq!(count_sections(&text, "pkg.mod.f"), 1);
        assert!(text.contains("second"));
        assert!(!text.contains("first"));
        assert!(text.contains("(hash=h2)"));
    }

    #[test]
    fn identical_upsert_is_a_no_op() {
        let mut doc = Document::with_title("mod");
        doc.upsert(Section::new("x", "h", "body"));
        let once = doc.render();
        let mut again = Document::parse(&once);
        again.upsert(Section::new("x", "h", "body"));
        assert_eq!(again.render(), once);
    }

    #[test]
    fn replacement_preserves_surrounding_manual_text() {
        let mut doc = Document::with_title("mod");
        doc.upsert(Section::new("m.A", "1", "class A docs"));
        doc.upsert(Section::new("m.B", "1", "class B docs"));
        let edited = doc
            .render()
            .replace("<!-- BEGIN: auto:m.B", "Hand-written note.\n\n<!-- BEGIN: auto:m.B");
        let edited = format!("{edited}\nFooter kept.\n");

        let mut doc = Document::parse(&edited);
        doc.upsert(Section::new("m.A", "2", "new A docs"));
        let out = doc.render();

        let expected = edited.replace(
            "<!-- BEGIN: auto:m.A (hash=1) -->\nclass A docs",
            "<!-- BEGIN: auto:m.A (hash=2) -->\nnew A docs",
        );
        assert_eq!(out, expected);
        assert!(out.find("m.A").unwrap() < out.find("m.B").unwrap());
    }

    #[test]
    fn append_separates_with_blank_line() {
        let mut doc = Document::parse("# mod\nsome text");
        doc.upsert(Section::new("m.f", "h", "F"));
        assert_eq!(
            doc.render(),
            "# mod\nsome text\n\n<!-- BEGIN: auto:m.f (hash=h) -->\nF\n<!-- END: auto:m.f -->\n"
        );
    }

    #[test]
    fn matching_ignores_stored_hash() {
        let text = "<!-- BEGIN: auto:m.f (hash=old) -->\nF\n<!-- END: auto:m.f -->\n";
        let mut doc = Document::parse(text);
        assert_eq!(doc.upsert(Section::new("m.f", "new", "G")), Upsert::Replaced);
        assert_eq!(
            doc.render(),
            "<!-- BEGIN: auto:m.f (hash=new) -->\nG\n<!-- END: auto:m.f -->\n"
        );
    }

    #[test]
    fn prefix_ids_do_not_collide() {
        let mut doc = Document::with_title("mod");
        doc.upsert(Section::new("m.Foo", "1", "Foo"));
        doc.upsert(Section::new("m.Foo.bar", "1", "bar"));
        let mut doc = Document::parse(&doc.render());
        doc.upsert(Section::new("m.Foo", "2", "Foo v2"));
        assert_eq!(doc.section("m.Foo.bar").unwrap().body(), "bar");
        assert_eq!(doc.section("m.Foo").unwrap().body(), "Foo v2");
    }

    #[test]
    fn unterminated_marker_is_literal_text() {
        let text = "intro\n<!-- BEGIN: auto:m.f (hash=h) -->\ndangling\n";
        let doc = Document::parse(text);
        assert_eq!(doc.sections().count(), 0);
        assert_eq!(doc.render(), text);
    }

    #[test]
    fn duplicate_sections_collapse_on_upsert() {
        let one = "<!-- BEGIN: auto:m.f (hash=1) -->\nA\n<!-- END: auto:m.f -->";
        let text = format!("{one}\nmiddle\n{one}\n");
        let mut doc = Document::parse(&text);
        doc.upsert(Section::new("m.f", "2", "B"));
        let out = doc.render();
        assert_eq!(count_sections(&out, "m.f"), 1);
        assert!(out.contains("middle"));
    }
}
