use logos::Logos;
use serde::Serialize;

use crate::PugdocError;
use crate::PugdocResult;

/// The type reported for a parameter: a single name or the members of a
/// union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamType {
	Single(String),
	Union(Vec<String>),
}

impl Default for ParamType {
	fn default() -> Self {
		Self::Single(String::new())
	}
}

impl ParamType {
	fn into_names(self) -> Vec<String> {
		match self {
			Self::Single(name) => vec![name],
			Self::Union(names) => names,
		}
	}
}

/// A parsed `arguments` or `attributes` entry such as
/// `{string} [label=Submit] - the button text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
	pub name: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: ParamType,
	pub default: Option<String>,
	pub nullable: bool,
	pub optional: bool,
	/// The entry exactly as written.
	pub original: String,
}

/// Parse one parameter line: an optional `{Type}` annotation, a name
/// (optionally bracketed as `[name]` or `[name=default]`), and a description
/// with an optional leading `-`.
pub fn parse_parameter(text: &str) -> PugdocResult<ParameterSpec> {
	let original = text.trim();
	let invalid = |reason: &str| {
		PugdocError::InvalidParameter {
			text: original.to_string(),
			reason: reason.to_string(),
		}
	};

	let (annotation, rest) = match split_annotation(original) {
		Some(split) => split.map_err(|reason| invalid(reason))?,
		None => (None, original),
	};

	let rest = rest.trim_start();
	let (name, default, bracketed, rest) = if let Some(inner) = rest.strip_prefix('[') {
		let close = inner
			.find(']')
			.ok_or_else(|| invalid("unterminated optional parameter name"))?;
		let (name, default) = match inner[..close].split_once('=') {
			Some((name, default)) => (name.trim(), Some(default.trim().to_string())),
			None => (inner[..close].trim(), None),
		};
		(name, default, true, &inner[close + 1..])
	} else {
		let end = rest
			.char_indices()
			.find(|(_, ch)| !is_name_char(*ch))
			.map_or(rest.len(), |(idx, _)| idx);
		(&rest[..end], None, false, &rest[end..])
	};

	if !name.starts_with(is_name_start) {
		return Err(invalid("missing parameter name"));
	}

	let info = match annotation {
		Some(expression) => {
			TypeParser::new(expression)
				.and_then(TypeParser::parse)
				.map_err(|reason| invalid(&reason))?
		}
		None => TypeInfo::default(),
	};

	let rest = rest.trim_start();
	let description = rest.strip_prefix('-').unwrap_or(rest).trim();

	Ok(ParameterSpec {
		name: name.to_string(),
		description: description.to_string(),
		kind: info.kind,
		default,
		nullable: info.nullable,
		optional: info.optional || bracketed,
		original: original.to_string(),
	})
}

/// Characters a parameter name may start with.
fn is_name_start(ch: char) -> bool {
	ch.is_alphanumeric() || matches!(ch, '_' | '$')
}

/// Characters allowed in a parameter name. Hyphens are included so attribute
/// names such as `data-id` survive.
fn is_name_char(ch: char) -> bool {
	ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '$')
}

/// Split a leading `{...}` annotation from the rest of the line, honouring
/// nested braces.
fn split_annotation(text: &str) -> Option<Result<(Option<&str>, &str), &'static str>> {
	if !text.starts_with('{') {
		return None;
	}

	let mut depth = 0usize;
	for (idx, ch) in text.char_indices() {
		match ch {
			'{' => depth += 1,
			'}' => {
				depth -= 1;
				if depth == 0 {
					return Some(Ok((Some(&text[1..idx]), &text[idx + 1..])));
				}
			}
			_ => {}
		}
	}

	Some(Err("unterminated type annotation"))
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum TypeToken {
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[token("{")]
	BraceOpen,
	#[token("}")]
	BraceClose,
	#[token(".<")]
	#[token("<")]
	AngleOpen,
	#[token(">")]
	AngleClose,
	#[token("[]")]
	ArraySuffix,
	#[token("|")]
	Pipe,
	#[token(",")]
	Comma,
	#[token(":")]
	Colon,
	#[token("?")]
	Question,
	#[token("!")]
	Bang,
	#[token("=")]
	Equals,
	#[token("...")]
	Ellipsis,
	#[token("*")]
	Star,
	#[token("function")]
	Function,
	#[regex(r"[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*")]
	Name,
	#[regex(r#""([^"\\]|\\.)*""#)]
	#[regex(r"'([^'\\]|\\.)*'")]
	#[regex(r"-?[0-9]+(\.[0-9]+)?")]
	Literal,
}

#[derive(Debug, Default)]
struct TypeInfo {
	kind: ParamType,
	nullable: bool,
	optional: bool,
}

impl TypeInfo {
	fn named(name: impl Into<String>) -> Self {
		Self {
			kind: ParamType::Single(name.into()),
			..Self::default()
		}
	}
}

/// Recursive descent over the tokens of a type expression.
struct TypeParser<'a> {
	tokens: Vec<(TypeToken, &'a str)>,
	cursor: usize,
}

impl<'a> TypeParser<'a> {
	fn new(expression: &'a str) -> Result<Self, String> {
		let mut tokens = Vec::new();

		for (token, span) in TypeToken::lexer(expression).spanned() {
			let slice = &expression[span];
			match token {
				Ok(token) => tokens.push((token, slice)),
				Err(()) => return Err(format!("unexpected character `{slice}` in type")),
			}
		}

		Ok(Self { tokens, cursor: 0 })
	}

	fn parse(mut self) -> Result<TypeInfo, String> {
		if self.tokens.is_empty() {
			return Err("empty type annotation".to_string());
		}

		let info = self.top()?;
		match self.tokens.get(self.cursor) {
			Some((_, slice)) => Err(format!("unexpected `{slice}` in type")),
			None => Ok(info),
		}
	}

	fn peek(&self) -> Option<TypeToken> {
		self.tokens.get(self.cursor).map(|(token, _)| *token)
	}

	fn eat(&mut self, expected: TypeToken) -> bool {
		if self.peek() == Some(expected) {
			self.cursor += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, expected: TypeToken, display: &str) -> Result<(), String> {
		if self.eat(expected) {
			Ok(())
		} else {
			Err(format!("expected `{display}` in type"))
		}
	}

	/// `unary ('|' unary)*`
	fn top(&mut self) -> Result<TypeInfo, String> {
		let first = self.unary()?;
		if self.peek() != Some(TypeToken::Pipe) {
			return Ok(first);
		}

		let mut names = first.kind.into_names();
		while self.eat(TypeToken::Pipe) {
			names.extend(self.unary()?.kind.into_names());
		}

		Ok(TypeInfo {
			kind: ParamType::Union(names),
			..TypeInfo::default()
		})
	}

	fn unary(&mut self) -> Result<TypeInfo, String> {
		let Some((token, slice)) = self.tokens.get(self.cursor).copied() else {
			return Err("expected a type".to_string());
		};
		self.cursor += 1;

		let info = match token {
			TypeToken::Question => {
				let mut inner = self.unary()?;
				inner.nullable = true;
				inner
			}
			TypeToken::Bang => {
				let mut inner = self.unary()?;
				inner.nullable = false;
				inner
			}
			TypeToken::Ellipsis => self.unary()?,
			TypeToken::Star => TypeInfo::named("*"),
			TypeToken::ParenOpen => {
				let inner = self.top()?;
				self.expect(TypeToken::ParenClose, ")")?;
				inner
			}
			TypeToken::BraceOpen => {
				self.skip_until_closed(TypeToken::BraceOpen, TypeToken::BraceClose, "}")?;
				TypeInfo::named("Object")
			}
			TypeToken::Function => {
				if self.eat(TypeToken::ParenOpen) {
					self.skip_until_closed(TypeToken::ParenOpen, TypeToken::ParenClose, ")")?;
				}
				if self.eat(TypeToken::Colon) {
					self.unary()?;
				}
				TypeInfo::named("Function")
			}
			TypeToken::Name => {
				if self.eat(TypeToken::AngleOpen) {
					self.skip_until_closed(TypeToken::AngleOpen, TypeToken::AngleClose, ">")?;
				}
				TypeInfo::named(slice)
			}
			TypeToken::Literal => TypeInfo::named(slice),
			_ => return Err(format!("unexpected `{slice}` in type")),
		};

		Ok(self.postfix(info))
	}

	fn postfix(&mut self, mut info: TypeInfo) -> TypeInfo {
		loop {
			match self.peek() {
				Some(TypeToken::ArraySuffix) => info.kind = ParamType::Single("Array".to_string()),
				Some(TypeToken::Equals) => info.optional = true,
				Some(TypeToken::Question) => info.nullable = true,
				Some(TypeToken::Bang) => info.nullable = false,
				_ => return info,
			}
			self.cursor += 1;
		}
	}

	/// Skip tokens up to and including the `close` matching an already
	/// consumed `open`.
	fn skip_until_closed(
		&mut self,
		open: TypeToken,
		close: TypeToken,
		display: &str,
	) -> Result<(), String> {
		let mut depth = 1usize;

		while let Some(token) = self.peek() {
			self.cursor += 1;
			if token == open {
				depth += 1;
			} else if token == close {
				depth -= 1;
				if depth == 0 {
					return Ok(());
				}
			}
		}

		Err(format!("expected `{display}` in type"))
	}
}
