use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::PugdocError;
use crate::PugdocResult;
use crate::extractor::CaptureMode;
use crate::extractor::RawBlock;
use crate::lines::indent_of;
use crate::params::ParameterSpec;
use crate::params::parse_parameter;
use crate::reader::read_document;

/// Keys whose list items use the parameter micro-grammar.
const PARAMETER_LIST_KEYS: [&str; 2] = ["arguments", "attributes"];

pub type Locals = Map<String, Value>;

/// Structured metadata decoded from a doc block annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub arguments: Option<Vec<ParameterSpec>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub attributes: Option<Vec<ParameterSpec>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub example: Option<ExampleField>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub examples: Option<ExampleField>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub before_each: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub after_each: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locals: Option<Locals>,
	/// The capture directive as written. See [`Metadata::capture_mode`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub capture: Option<Value>,
	/// Keys without a dedicated field, kept verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
	/// `arguments` and `attributes` entries left out because they could not
	/// be parsed.
	#[serde(skip)]
	pub rejected: Vec<RejectedParameter>,
}

/// A parameter entry dropped from its list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedParameter {
	/// `arguments` or `attributes`.
	pub key: String,
	pub text: String,
	pub reason: String,
}

/// The value of an `example` or `examples` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExampleField {
	/// `example: false` suppresses rendering of the block's own output.
	Flag(bool),
	One(ExampleSpec),
	Many(Vec<ExampleSpec>),
}

impl ExampleField {
	pub fn is_suppressed(&self) -> bool {
		matches!(self, Self::Flag(false))
	}

	/// The example entries, in order. Flags contribute nothing.
	pub fn specs(&self) -> &[ExampleSpec] {
		match self {
			Self::Flag(_) => &[],
			Self::One(spec) => std::slice::from_ref(spec),
			Self::Many(specs) => specs,
		}
	}
}

/// One example entry: template source, or an override object that carries
/// its own examples and settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExampleSpec {
	Source(String),
	Override(Box<ExampleOverride>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleOverride {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub example: Option<ExampleField>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub examples: Option<ExampleField>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub before_each: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub after_each: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub locals: Option<Locals>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Metadata {
	/// Whether `example: false` was given.
	pub fn is_suppressed(&self) -> bool {
		self.example.as_ref().is_some_and(ExampleField::is_suppressed)
	}

	/// The validated capture directive. An unrecognised value is returned as
	/// `Err` with its textual form.
	pub fn capture_mode(&self) -> Result<CaptureMode, String> {
		let Some(value) = &self.capture else {
			return Ok(CaptureMode::Default);
		};

		let text = match value {
			Value::String(text) => text.clone(),
			other => other.to_string(),
		};

		CaptureMode::parse(&text).ok_or(text)
	}

	fn from_value(value: Value, line: usize) -> PugdocResult<Self> {
		let mut map = match value {
			Value::Null => return Ok(Self::default()),
			Value::Object(map) => map,
			_ => return Err(shape_error(line, "doc block metadata must be a mapping")),
		};

		let mut rejected = Vec::new();
		let arguments = take_parameters(&mut map, "arguments", line, &mut rejected)?;
		let attributes = take_parameters(&mut map, "attributes", line, &mut rejected)?;

		Ok(Self {
			name: take_text(&mut map, "name", line)?,
			description: take_text(&mut map, "description", line)?,
			arguments,
			attributes,
			example: take_example(&mut map, "example", line)?,
			examples: take_example(&mut map, "examples", line)?,
			before_each: take_text(&mut map, "beforeEach", line)?,
			after_each: take_text(&mut map, "afterEach", line)?,
			locals: take_locals(&mut map, line)?,
			capture: map.remove("capture").filter(|value| !value.is_null()),
			extra: map,
			rejected,
		})
	}
}

impl ExampleOverride {
	fn from_map(mut map: Map<String, Value>, line: usize) -> PugdocResult<Self> {
		Ok(Self {
			name: take_text(&mut map, "name", line)?,
			description: take_text(&mut map, "description", line)?,
			example: take_example(&mut map, "example", line)?,
			examples: take_example(&mut map, "examples", line)?,
			before_each: take_text(&mut map, "beforeEach", line)?,
			after_each: take_text(&mut map, "afterEach", line)?,
			locals: take_locals(&mut map, line)?,
			extra: map,
		})
	}
}

/// Parse the annotation of `block` into [`Metadata`].
pub fn parse_metadata(block: &RawBlock) -> PugdocResult<Metadata> {
	let annotation = block.annotation().join("\n");
	let escaped = escape_parameter_lists(&annotation);
	let value = read_document(&escaped, block.marker.line + 1)?;

	Metadata::from_value(value, block.marker.line)
}

/// Quote the free-text items of `arguments:` and `attributes:` block lists so
/// a leading `{Type}` is read as text rather than as a flow mapping. Items
/// that are already quoted, and every other key, are left untouched, so
/// running this twice is the same as running it once.
pub fn escape_parameter_lists(text: &str) -> String {
	let mut output = Vec::new();
	let mut list_indent: Option<usize> = None;

	for line in text.split('\n') {
		let trimmed = line.trim();
		let indent = indent_of(line);

		if let Some(key_indent) = list_indent {
			let is_item = trimmed == "-" || trimmed.starts_with("- ");
			let in_list = trimmed.is_empty()
				|| indent > key_indent
				|| (indent == key_indent && is_item);

			if !in_list {
				list_indent = None;
			} else if is_item {
				output.push(quote_item(line, indent));
				continue;
			}
		}

		if list_indent.is_none() && opens_parameter_list(trimmed) {
			list_indent = Some(indent);
		}

		output.push(line.to_string());
	}

	output.join("\n")
}

fn opens_parameter_list(trimmed: &str) -> bool {
	PARAMETER_LIST_KEYS.iter().any(|key| {
		trimmed
			.strip_prefix(key)
			.and_then(|rest| rest.strip_prefix(':'))
			.is_some_and(|rest| rest.trim().is_empty())
	})
}

fn quote_item(line: &str, indent: usize) -> String {
	let prefix: String = line.chars().take(indent).collect();
	let item = line.trim()[1..].trim();

	if item.is_empty() || item.starts_with(['"', '\'', '|', '>', '#']) {
		return line.to_string();
	}

	let escaped = item.replace('\\', "\\\\").replace('"', "\\\"");
	format!("{prefix}- \"{escaped}\"")
}

fn shape_error(line: usize, message: impl Into<String>) -> PugdocError {
	PugdocError::MetadataParse {
		line,
		message: message.into(),
	}
}

fn take_text(map: &mut Map<String, Value>, key: &str, line: usize) -> PugdocResult<Option<String>> {
	match map.remove(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(text)) => Ok(Some(text)),
		Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
		Some(_) => Err(shape_error(line, format!("`{key}` must be a string"))),
	}
}

fn take_locals(map: &mut Map<String, Value>, line: usize) -> PugdocResult<Option<Locals>> {
	match map.remove("locals") {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Object(locals)) => Ok(Some(locals)),
		Some(_) => Err(shape_error(line, "`locals` must be a mapping")),
	}
}

/// Parse a parameter list. Entries that fail the micro-grammar are moved to
/// `rejected` so the rest of the block survives.
fn take_parameters(
	map: &mut Map<String, Value>,
	key: &str,
	line: usize,
	rejected: &mut Vec<RejectedParameter>,
) -> PugdocResult<Option<Vec<ParameterSpec>>> {
	let items = match map.remove(key) {
		None | Some(Value::Null) => return Ok(None),
		Some(Value::Array(items)) => items,
		Some(single @ Value::String(_)) => vec![single],
		Some(_) => return Err(shape_error(line, format!("`{key}` must be a list"))),
	};

	let mut specs = Vec::with_capacity(items.len());
	for item in items {
		let parsed = match item {
			Value::String(text) => parse_parameter(&text),
			other => {
				Err(PugdocError::InvalidParameter {
					text: other.to_string(),
					reason: "expected a text entry".to_string(),
				})
			}
		};

		match parsed {
			Ok(spec) => specs.push(spec),
			Err(PugdocError::InvalidParameter { text, reason }) => {
				rejected.push(RejectedParameter {
					key: key.to_string(),
					text,
					reason,
				});
			}
			Err(error) => return Err(error),
		}
	}

	Ok(Some(specs))
}

fn take_example(
	map: &mut Map<String, Value>,
	key: &str,
	line: usize,
) -> PugdocResult<Option<ExampleField>> {
	let field = match map.remove(key) {
		None | Some(Value::Null) => None,
		Some(Value::Bool(flag)) => Some(ExampleField::Flag(flag)),
		Some(Value::Array(items)) => {
			let mut specs = Vec::new();
			for item in items {
				if let Some(spec) = example_spec(item, line)? {
					specs.push(spec);
				}
			}
			Some(ExampleField::Many(specs))
		}
		Some(other) => example_spec(other, line)?.map(ExampleField::One),
	};

	Ok(field)
}

fn example_spec(value: Value, line: usize) -> PugdocResult<Option<ExampleSpec>> {
	match value {
		Value::Null => Ok(None),
		Value::String(source) => Ok(Some(ExampleSpec::Source(source))),
		Value::Number(number) => Ok(Some(ExampleSpec::Source(number.to_string()))),
		Value::Object(map) => {
			let spec = ExampleOverride::from_map(map, line)?;
			Ok(Some(ExampleSpec::Override(Box::new(spec))))
		}
		Value::Bool(_) | Value::Array(_) => {
			Err(shape_error(
				line,
				"example entries must be template source or override objects",
			))
		}
	}
}
