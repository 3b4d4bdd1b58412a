use derive_more::Deref;

/// A read-only line view over template source. Every other stage addresses
/// the source through 0-indexed positions into this array.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct LineIndex<'a> {
	lines: Vec<&'a str>,
}

impl<'a> LineIndex<'a> {
	/// Split `source` on `\n`. The source is expected to be LF-normalized (see
	/// [`normalize_line_endings`]).
	pub fn new(source: &'a str) -> Self {
		if source.is_empty() {
			return Self { lines: Vec::new() };
		}

		Self {
			lines: source.split('\n').collect(),
		}
	}

	/// The line at `index`, or `None` past the end of the file.
	pub fn line(&self, index: usize) -> Option<&'a str> {
		self.lines.get(index).copied()
	}

	/// Indentation of the line at `index`.
	pub fn indent_at(&self, index: usize) -> Option<usize> {
		self.line(index).map(indent_of)
	}
}

/// Number of leading whitespace characters on `line`. Tabs count as a single
/// column, the same as spaces.
pub fn indent_of(line: &str) -> usize {
	line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Whether the line contains only whitespace.
pub fn is_blank(line: &str) -> bool {
	line.trim().is_empty()
}

/// Normalize CRLF line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}

/// Remove the first `columns` whitespace characters from every line, leaving
/// lines with less indentation untouched past their own whitespace.
pub fn dedent(lines: &[&str], columns: usize) -> Vec<String> {
	lines
		.iter()
		.map(|line| {
			let strip = indent_of(line).min(columns);
			let offset = line
				.char_indices()
				.nth(strip)
				.map_or(line.len(), |(offset, _)| offset);
			line[offset..].to_string()
		})
		.collect()
}

/// Drop trailing blank lines.
pub fn trim_trailing_blank<T: AsRef<str>>(lines: &mut Vec<T>) {
	while lines.last().is_some_and(|line| is_blank(line.as_ref())) {
		lines.pop();
	}
}
