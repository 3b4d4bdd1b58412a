use std::fmt::Display;

use serde::Serialize;
use serde::Serializer;

use crate::lines::LineIndex;
use crate::lines::dedent;
use crate::lines::indent_of;
use crate::lines::is_blank;
use crate::lines::trim_trailing_blank;

/// Keyword used when no keyword is configured.
pub const DEFAULT_KEYWORD: &str = "@pugdoc";

/// Line comment prefix of the host template language. Unbuffered comments
/// (`//-`) never reach the rendered output.
pub const COMMENT_PREFIX: &str = "//-";

/// Adjacent blocks taken in the default capture mode. The annotation block
/// itself counts as the first, so the default captures one code block and an
/// explicit `capture: n` spans `n + 1` blocks.
const DEFAULT_BLOCK_SPAN: usize = 2;

/// Characters removed from captured code before it is handed on.
const INVISIBLE_CHARACTERS: [char; 2] = ['\u{2028}', '\u{200B}'];

/// Location of a doc marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocMarker {
	/// 1-indexed line number.
	pub line: usize,
	/// 0-indexed column of the marker, the anchor indentation of the block.
	pub column: usize,
}

/// How many adjacent code blocks follow a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
	/// One code block.
	#[default]
	Default,
	/// `n` code blocks.
	Count(u32),
	/// Every following block until the marker's scope ends.
	All,
	/// Like [`CaptureMode::All`], trimmed at the next doc marker inside the
	/// captured window.
	Section,
}

impl CaptureMode {
	/// Parse the textual form of a capture directive (`all`, `section`, or a
	/// positive integer).
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim() {
			"all" => Some(Self::All),
			"section" => Some(Self::Section),
			other => {
				match other.parse::<u32>() {
					Ok(count) if count > 0 => Some(Self::Count(count)),
					_ => None,
				}
			}
		}
	}

	/// Total number of adjacent blocks spanned, including the annotation
	/// block. `None` means unbounded.
	fn block_span(self) -> Option<usize> {
		match self {
			Self::Default => Some(DEFAULT_BLOCK_SPAN),
			Self::Count(count) => Some(count as usize + 1),
			Self::All | Self::Section => None,
		}
	}
}

impl Display for CaptureMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Default => write!(f, "default"),
			Self::Count(count) => write!(f, "{count}"),
			Self::All => write!(f, "all"),
			Self::Section => write!(f, "section"),
		}
	}
}

impl Serialize for CaptureMode {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Count(count) => serializer.serialize_u32(*count),
			other => serializer.serialize_str(&other.to_string()),
		}
	}
}

/// Options needed to locate doc markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
	/// The keyword following the comment prefix, e.g. `@pugdoc`.
	pub keyword: String,
}

impl Default for ExtractOptions {
	fn default() -> Self {
		Self {
			keyword: DEFAULT_KEYWORD.to_string(),
		}
	}
}

impl ExtractOptions {
	pub fn new(keyword: impl Into<String>) -> Self {
		Self {
			keyword: keyword.into(),
		}
	}

	/// The full marker token, e.g. `//- @pugdoc`.
	pub fn marker(&self) -> String {
		format!("{COMMENT_PREFIX} {}", self.keyword)
	}
}

/// A doc block as found in the source: the annotation lines (marker line
/// included) and the captured code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
	pub marker: DocMarker,
	/// Annotation lines exactly as they appear in the source, starting with
	/// the marker line.
	pub comment: Vec<String>,
	/// Captured code, rebased so the marker column becomes column 0.
	pub code: Vec<String>,
	/// Capture mode read provisionally from the annotation.
	pub capture: CaptureMode,
}

impl RawBlock {
	pub fn comment_text(&self) -> String {
		self.comment.join("\n")
	}

	pub fn code_text(&self) -> String {
		self.code.join("\n")
	}

	/// Annotation lines after the marker line.
	pub fn annotation(&self) -> &[String] {
		self.comment.get(1..).unwrap_or_default()
	}
}

/// Lazily yields one [`RawBlock`] per marker line. Create a new extractor to
/// restart the scan; the line index is never mutated.
#[derive(Debug, Clone)]
pub struct BlockExtractor<'i, 'a> {
	index: &'i LineIndex<'a>,
	marker: String,
	cursor: usize,
}

/// Scan `index` for doc blocks.
pub fn extract_blocks<'i, 'a>(
	index: &'i LineIndex<'a>,
	options: &ExtractOptions,
) -> BlockExtractor<'i, 'a> {
	BlockExtractor {
		index,
		marker: options.marker(),
		cursor: 0,
	}
}

impl BlockExtractor<'_, '_> {
	fn is_marker(&self, line: &str) -> bool {
		line.trim() == self.marker
	}

	/// Build the block anchored at the marker on line `at`.
	fn capture_at(&self, at: usize) -> Option<RawBlock> {
		let marker_line = self.index.line(at)?;
		let column = indent_of(marker_line);

		let (annotation_end, mut comment) = self.scope_after(at, column);
		comment.insert(0, marker_line);
		trim_trailing_blank(&mut comment);

		let capture = provisional_capture(&comment[1..]);
		let mut code = self.capture_code(annotation_end, column, capture);

		if capture == CaptureMode::Section {
			// The block's own marker is not part of `code`, so any marker
			// here belongs to the next section.
			if let Some(end) = code.iter().position(|line| self.is_marker(line)) {
				code.truncate(end);
			}
		}
		trim_trailing_blank(&mut code);

		if comment.len() == 1 && code.is_empty() {
			return None;
		}

		let code = dedent(&code, column)
			.into_iter()
			.map(|line| line.replace(INVISIBLE_CHARACTERS, ""))
			.collect();

		Some(RawBlock {
			marker: DocMarker {
				line: at + 1,
				column,
			},
			comment: comment.into_iter().map(str::to_string).collect(),
			code,
			capture,
		})
	}

	/// Lines after `head` that belong to its scope: blank lines and lines
	/// indented deeper than `column`. Returns the index after the scope and the
	/// collected lines.
	fn scope_after(&self, head: usize, column: usize) -> (usize, Vec<&str>) {
		let mut lines = Vec::new();
		let mut cursor = head + 1;

		while let Some(line) = self.index.line(cursor) {
			if !is_blank(line) && indent_of(line) <= column {
				break;
			}
			lines.push(line);
			cursor += 1;
		}

		(cursor, lines)
	}

	/// Capture code blocks starting at `start`. Each block is a head line at
	/// the anchor column followed by its deeper-indented body. Blank lines
	/// between sibling blocks belong to the preceding body.
	fn capture_code(&self, start: usize, column: usize, capture: CaptureMode) -> Vec<&str> {
		let span = capture.block_span();
		let mut spanned = 1;
		let mut code = Vec::new();
		let mut cursor = start;

		loop {
			if span.is_some_and(|span| spanned >= span) {
				break;
			}

			while self.index.line(cursor).is_some_and(is_blank) {
				cursor += 1;
			}

			let Some(head) = self.index.line(cursor) else {
				break;
			};

			if indent_of(head) < column {
				break;
			}

			let (next, body) = self.scope_after(cursor, column);
			code.push(head);
			code.extend(body);
			spanned += 1;
			cursor = next;
		}

		code
	}
}

impl Iterator for BlockExtractor<'_, '_> {
	type Item = RawBlock;

	fn next(&mut self) -> Option<Self::Item> {
		while self.cursor < self.index.len() {
			let at = self.cursor;
			self.cursor += 1;

			let is_marker = self.index.line(at).is_some_and(|line| self.is_marker(line));
			if !is_marker {
				continue;
			}

			if let Some(block) = self.capture_at(at) {
				return Some(block);
			}
		}

		None
	}
}

/// Read the `capture` directive from the top level of an annotation body
/// without parsing the full document. Unknown values fall back to the default
/// mode here; the metadata parser reports them.
fn provisional_capture(annotation: &[&str]) -> CaptureMode {
	let base = annotation
		.iter()
		.filter(|line| !is_blank(line))
		.map(|line| indent_of(line))
		.min()
		.unwrap_or(0);

	annotation
		.iter()
		.filter(|line| !is_blank(line) && indent_of(line) == base)
		.find_map(|line| {
			let value = line.trim().strip_prefix("capture:")?;
			let value = value.split(" #").next().unwrap_or(value);
			CaptureMode::parse(value.trim().trim_matches(['"', '\'']))
		})
		.unwrap_or_default()
}
