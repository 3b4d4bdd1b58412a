//! A reader for the indentation-based key-value subset used in doc block
//! annotations.
//!
//! Supported: block mappings, block sequences (including compact mappings
//! such as `- name: foo`), literal (`|`) and folded (`>`) block scalars with
//! chomping indicators, single and double quoted scalars, flow sequences and
//! flow mappings, multi-line plain scalars, `#` comments, and typed plain
//! scalars (null, booleans, integers, floats). Anchors, aliases, tags and
//! multiple documents are not supported; they read as plain text.

use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use snailquote::unescape;

use crate::PugdocError;
use crate::PugdocResult;
use crate::lines::dedent;
use crate::lines::indent_of;

/// Read `source` into a JSON value. `first_line` is the 1-indexed line number
/// of the first line of `source` within its file, used in error messages.
pub fn read_document(source: &str, first_line: usize) -> PugdocResult<Value> {
	let mut reader = Reader::new(source, first_line);

	if reader.peek_significant().is_some_and(|line| line.text == "---") {
		reader.cursor += 1;
	}

	let value = reader.parse_node(None)?;

	if let Some(line) = reader.peek_significant() {
		return Err(error_at(line.number, "unexpected content after the document"));
	}

	Ok(value)
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
	number: usize,
	indent: usize,
	/// Content after the indentation, without trailing whitespace.
	text: &'a str,
	raw: &'a str,
}

impl Line<'_> {
	fn is_insignificant(&self) -> bool {
		self.text.is_empty() || self.text.starts_with('#')
	}
}

struct Reader<'a> {
	lines: Vec<Line<'a>>,
	cursor: usize,
}

impl<'a> Reader<'a> {
	fn new(source: &'a str, first_line: usize) -> Self {
		let lines = source
			.split('\n')
			.enumerate()
			.map(|(idx, raw)| {
				Line {
					number: first_line + idx,
					indent: indent_of(raw),
					text: raw.trim(),
					raw,
				}
			})
			.collect();

		Self { lines, cursor: 0 }
	}

	/// Skip blank and comment lines, returning the next line with content.
	fn peek_significant(&mut self) -> Option<Line<'a>> {
		while let Some(line) = self.lines.get(self.cursor) {
			if !line.is_insignificant() {
				return Some(*line);
			}
			self.cursor += 1;
		}

		None
	}

	fn parse_node(&mut self, parent: Option<usize>) -> PugdocResult<Value> {
		let Some(line) = self.peek_significant() else {
			return Ok(Value::Null);
		};

		if is_sequence_item(line.text) {
			return self.parse_sequence(line.indent);
		}

		if split_key(line.text).is_some() {
			return self.parse_mapping(line.indent);
		}

		self.cursor += 1;
		self.parse_inline(line.text, line, parent)
	}

	fn parse_mapping(&mut self, indent: usize) -> PugdocResult<Value> {
		let mut map = Map::new();

		while let Some(line) = self.peek_significant() {
			if line.indent < indent {
				break;
			}

			if line.indent > indent {
				return Err(error_at(line.number, "unexpected indentation"));
			}

			let Some((key, rest)) = split_key(line.text) else {
				return Err(error_at(line.number, "expected a `key: value` entry"));
			};

			if map.contains_key(&key) {
				return Err(error_at(line.number, format!("duplicate key `{key}`")));
			}

			self.cursor += 1;
			let value = self.parse_value(rest.trim(), line, indent)?;
			map.insert(key, value);
		}

		Ok(Value::Object(map))
	}

	fn parse_sequence(&mut self, indent: usize) -> PugdocResult<Value> {
		let mut items = Vec::new();

		while let Some(line) = self.peek_significant() {
			if line.indent < indent {
				break;
			}

			if line.indent > indent {
				return Err(error_at(line.number, "unexpected indentation"));
			}

			if !is_sequence_item(line.text) {
				break;
			}

			let rest = &line.text[1..];
			let content = rest.trim_start();

			if content.is_empty() || content.starts_with('#') {
				self.cursor += 1;
				let value = match self.peek_significant() {
					Some(next) if next.indent > indent => self.parse_node(Some(indent))?,
					_ => Value::Null,
				};
				items.push(value);
				continue;
			}

			// Re-read the item content as a node anchored at its own column.
			let offset = rest.chars().count() - content.chars().count();
			self.lines[self.cursor] = Line {
				indent: indent + 1 + offset,
				text: content,
				..line
			};
			items.push(self.parse_node(Some(indent))?);
		}

		Ok(Value::Array(items))
	}

	/// Parse the value following `key:` on a mapping line.
	fn parse_value(&mut self, rest: &'a str, line: Line<'a>, indent: usize) -> PugdocResult<Value> {
		if rest.is_empty() || rest.starts_with('#') {
			return match self.peek_significant() {
				Some(next) if next.indent > indent => self.parse_node(Some(indent)),
				Some(next) if next.indent == indent && is_sequence_item(next.text) => {
					self.parse_sequence(indent)
				}
				_ => Ok(Value::Null),
			};
		}

		self.parse_inline(rest, line, Some(indent))
	}

	fn parse_inline(
		&mut self,
		text: &'a str,
		line: Line<'a>,
		parent: Option<usize>,
	) -> PugdocResult<Value> {
		match text.chars().next() {
			Some('|' | '>') => self.parse_block_scalar(text, line, parent),
			Some('"' | '\'') => self.parse_quoted(text, line),
			Some('[' | '{') => self.parse_flow(text, line),
			_ => Ok(self.parse_plain(text, parent)),
		}
	}

	fn parse_plain(&mut self, text: &str, parent: Option<usize>) -> Value {
		let mut parts = vec![strip_comment(text).trim_end().to_string()];

		while let Some(next) = self.peek_significant() {
			if !is_deeper(next.indent, parent) {
				break;
			}
			parts.push(strip_comment(next.text).trim_end().to_string());
			self.cursor += 1;
		}

		resolve_plain(&parts.join(" "))
	}

	fn parse_quoted(&mut self, text: &str, line: Line<'a>) -> PugdocResult<Value> {
		let mut buffer = text.to_string();

		let end = loop {
			if let Some(end) = closing_quote(&buffer) {
				break end;
			}

			let Some(next) = self.lines.get(self.cursor) else {
				return Err(error_at(line.number, "unterminated quoted scalar"));
			};
			buffer.push(' ');
			buffer.push_str(next.text);
			self.cursor += 1;
		};

		let trailing = buffer[end + 1..].trim();
		if !trailing.is_empty() && !trailing.starts_with('#') {
			return Err(error_at(
				line.number,
				format!("unexpected `{trailing}` after quoted scalar"),
			));
		}

		unquote(&buffer[..=end])
			.map(Value::String)
			.map_err(|message| error_at(line.number, message))
	}

	fn parse_flow(&mut self, text: &str, line: Line<'a>) -> PugdocResult<Value> {
		let mut buffer = text.to_string();

		let end = loop {
			if let Some(end) = flow_end(&buffer) {
				break end;
			}

			let Some(next) = self.lines.get(self.cursor) else {
				return Err(error_at(line.number, "unterminated flow collection"));
			};
			buffer.push(' ');
			buffer.push_str(next.text);
			self.cursor += 1;
		};

		let trailing = buffer[end + 1..].trim();
		if !trailing.is_empty() && !trailing.starts_with('#') {
			return Err(error_at(
				line.number,
				format!("unexpected `{trailing}` after flow collection"),
			));
		}

		let mut flow = FlowReader {
			chars: buffer[..=end].chars().collect(),
			pos: 0,
		};
		flow.value()
			.map_err(|message| error_at(line.number, message))
	}

	fn parse_block_scalar(
		&mut self,
		header: &str,
		line: Line<'a>,
		parent: Option<usize>,
	) -> PugdocResult<Value> {
		let header = strip_comment(header).trim_end();
		let folded = header.starts_with('>');
		let mut chomp = Chomp::Clip;
		let mut explicit_indent = None;

		for ch in header.chars().skip(1) {
			match ch {
				'-' => chomp = Chomp::Strip,
				'+' => chomp = Chomp::Keep,
				'1'..='9' => explicit_indent = ch.to_digit(10).map(|digit| digit as usize),
				_ => {
					return Err(error_at(
						line.number,
						format!("invalid block scalar header `{header}`"),
					));
				}
			}
		}

		let base = parent.map_or(0, |parent| parent + 1);
		let block_indent = match explicit_indent {
			Some(digit) => parent.unwrap_or(0) + digit,
			None => {
				self.lines[self.cursor..]
					.iter()
					.find(|next| !next.text.is_empty())
					.map_or(base, |next| next.indent)
			}
		};

		let mut raw = Vec::new();
		if block_indent >= base {
			while let Some(next) = self.lines.get(self.cursor) {
				if !next.text.is_empty() && next.indent < block_indent {
					break;
				}
				raw.push(next.raw);
				self.cursor += 1;
			}
		}

		let mut content = dedent(&raw, block_indent);
		let mut trailing_blank = 0;
		while content.last().is_some_and(|line| line.trim().is_empty()) {
			content.pop();
			trailing_blank += 1;
		}

		let mut body = if folded {
			fold_lines(&content)
		} else {
			content.join("\n")
		};

		match chomp {
			Chomp::Strip => {}
			Chomp::Clip => {
				if !body.is_empty() {
					body.push('\n');
				}
			}
			Chomp::Keep => {
				body.push('\n');
				body.push_str(&"\n".repeat(trailing_blank));
			}
		}

		Ok(Value::String(body))
	}
}

#[derive(Debug, Clone, Copy)]
enum Chomp {
	Strip,
	Clip,
	Keep,
}

/// Character-level reader for flow collections (`[a, b]`, `{a: 1}`).
struct FlowReader {
	chars: Vec<char>,
	pos: usize,
}

impl FlowReader {
	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.pos += 1;
		}
	}

	fn expect(&mut self, expected: char) -> Result<(), String> {
		self.skip_whitespace();
		match self.peek() {
			Some(ch) if ch == expected => {
				self.pos += 1;
				Ok(())
			}
			Some(ch) => Err(format!("expected `{expected}` but found `{ch}`")),
			None => Err(format!("expected `{expected}`")),
		}
	}

	fn value(&mut self) -> Result<Value, String> {
		self.skip_whitespace();
		match self.peek() {
			Some('[') => self.sequence(),
			Some('{') => self.mapping(),
			Some('"' | '\'') => self.quoted().map(Value::String),
			_ => Ok(resolve_plain(&self.plain(false))),
		}
	}

	fn sequence(&mut self) -> Result<Value, String> {
		self.expect('[')?;
		let mut items = Vec::new();

		loop {
			self.skip_whitespace();
			if self.peek() == Some(']') {
				self.pos += 1;
				return Ok(Value::Array(items));
			}

			items.push(self.value()?);
			self.skip_whitespace();

			match self.peek() {
				Some(',') => self.pos += 1,
				Some(']') => {}
				_ => return Err("expected `,` or `]` in flow sequence".to_string()),
			}
		}
	}

	fn mapping(&mut self) -> Result<Value, String> {
		self.expect('{')?;
		let mut map = Map::new();

		loop {
			self.skip_whitespace();
			if self.peek() == Some('}') {
				self.pos += 1;
				return Ok(Value::Object(map));
			}

			let key = match self.peek() {
				Some('"' | '\'') => self.quoted()?,
				_ => self.plain(true),
			};
			if key.is_empty() {
				return Err("expected a key in flow mapping".to_string());
			}

			self.skip_whitespace();
			let value = if self.peek() == Some(':') {
				self.pos += 1;
				self.value()?
			} else {
				Value::Null
			};

			if map.insert(key.clone(), value).is_some() {
				return Err(format!("duplicate key `{key}`"));
			}

			self.skip_whitespace();
			match self.peek() {
				Some(',') => self.pos += 1,
				Some('}') => {}
				_ => return Err("expected `,` or `}` in flow mapping".to_string()),
			}
		}
	}

	fn quoted(&mut self) -> Result<String, String> {
		let rest: String = self.chars[self.pos..].iter().collect();
		let Some(end) = closing_quote(&rest) else {
			return Err("unterminated quoted scalar".to_string());
		};
		let quoted = &rest[..=end];
		self.pos += quoted.chars().count();
		unquote(quoted)
	}

	/// Read a plain scalar up to the next flow indicator. Keys also stop at a
	/// `:` separator.
	fn plain(&mut self, is_key: bool) -> String {
		let start = self.pos;

		while let Some(ch) = self.peek() {
			if matches!(ch, ',' | ']' | '}') {
				break;
			}
			if ch == ':' && is_key {
				break;
			}
			if ch == ':'
				&& self
					.chars
					.get(self.pos + 1)
					.is_none_or(|next| next.is_whitespace() || matches!(next, ',' | '}' | ']'))
			{
				break;
			}
			self.pos += 1;
		}

		self.chars[start..self.pos]
			.iter()
			.collect::<String>()
			.trim()
			.to_string()
	}
}

fn error_at(line: usize, message: impl Into<String>) -> PugdocError {
	PugdocError::MetadataParse {
		line,
		message: message.into(),
	}
}

fn is_deeper(indent: usize, parent: Option<usize>) -> bool {
	parent.is_none_or(|parent| indent > parent)
}

fn is_sequence_item(text: &str) -> bool {
	text == "-" || text.starts_with("- ") || text.starts_with("-\t")
}

/// Split a mapping entry into its key and the text after the `:` separator.
fn split_key(text: &str) -> Option<(String, &str)> {
	if text.starts_with('"') || text.starts_with('\'') {
		let end = closing_quote(text)?;
		let rest = text[end + 1..].trim_start().strip_prefix(':')?;
		if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
			return None;
		}
		let key = unquote(&text[..=end]).ok()?;
		return Some((key, rest));
	}

	if text.starts_with(['[', '{', '|', '>', '#']) || is_sequence_item(text) {
		return None;
	}

	for (idx, ch) in text.char_indices() {
		if ch == '#' && text[..idx].ends_with([' ', '\t']) {
			return None;
		}

		if ch != ':' {
			continue;
		}

		let rest = &text[idx + 1..];
		if rest.is_empty() || rest.starts_with([' ', '\t']) {
			let key = text[..idx].trim_end();
			if key.is_empty() {
				return None;
			}
			return Some((key.to_string(), rest));
		}
	}

	None
}

/// Byte index of the quote closing the quoted scalar at the start of `text`.
fn closing_quote(text: &str) -> Option<usize> {
	let quote = text.chars().next()?;
	let mut chars = text.char_indices().skip(1).peekable();

	while let Some((idx, ch)) = chars.next() {
		if quote == '"' && ch == '\\' {
			chars.next();
			continue;
		}

		if ch == quote {
			if quote == '\'' && chars.peek().is_some_and(|(_, next)| *next == '\'') {
				chars.next();
				continue;
			}
			return Some(idx);
		}
	}

	None
}

/// Byte index of the bracket closing the flow collection at the start of
/// `text`, skipping quoted content.
fn flow_end(text: &str) -> Option<usize> {
	let mut depth = 0usize;
	let mut idx = 0;

	while idx < text.len() {
		let ch = text[idx..].chars().next()?;

		match ch {
			'"' | '\'' => {
				let end = closing_quote(&text[idx..])?;
				idx += end + 1;
				continue;
			}
			'[' | '{' => depth += 1,
			']' | '}' => {
				depth = depth.saturating_sub(1);
				if depth == 0 {
					return Some(idx);
				}
			}
			_ => {}
		}

		idx += ch.len_utf8();
	}

	None
}

/// Remove the surrounding quotes of a quoted scalar and resolve escapes.
fn unquote(quoted: &str) -> Result<String, String> {
	if quoted.starts_with('\'') {
		let inner = &quoted[1..quoted.len() - 1];
		return Ok(inner.replace("''", "'"));
	}

	unescape(quoted).map_err(|e| format!("invalid escape sequence in {quoted}: {e}"))
}

/// Cut a trailing ` # comment` from a plain scalar.
fn strip_comment(text: &str) -> &str {
	if text.starts_with('#') {
		return "";
	}

	text.match_indices('#')
		.find(|(idx, _)| text[..*idx].ends_with([' ', '\t']))
		.map_or(text, |(idx, _)| &text[..idx])
}

fn fold_lines(lines: &[String]) -> String {
	let mut folded = String::new();
	let mut previous_is_text = false;

	for (idx, line) in lines.iter().enumerate() {
		if line.trim().is_empty() {
			folded.push('\n');
			previous_is_text = false;
			continue;
		}

		let more_indented = line.starts_with([' ', '\t']);
		if idx > 0 {
			if previous_is_text && !more_indented {
				folded.push(' ');
			} else if !folded.ends_with('\n') {
				folded.push('\n');
			}
		}

		folded.push_str(line);
		previous_is_text = !more_indented;
	}

	folded
}

/// Resolve the type of a plain scalar.
fn resolve_plain(text: &str) -> Value {
	match text {
		"" | "~" | "null" | "Null" | "NULL" => return Value::Null,
		"true" | "True" | "TRUE" => return Value::Bool(true),
		"false" | "False" | "FALSE" => return Value::Bool(false),
		_ => {}
	}

	if let Ok(int) = text.parse::<i64>() {
		return Value::Number(int.into());
	}

	let is_numeric = text
		.chars()
		.all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
		&& text.chars().any(|ch| ch.is_ascii_digit());

	if is_numeric {
		if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
			return Value::Number(number);
		}
	}

	Value::String(text.to_string())
}
