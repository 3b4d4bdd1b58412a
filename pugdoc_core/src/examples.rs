use crate::metadata::ExampleField;
use crate::metadata::ExampleOverride;
use crate::metadata::ExampleSpec;
use crate::metadata::Locals;
use crate::metadata::Metadata;
use crate::mixins::mixin_name;

/// Line that marks where captured code is inserted into an example.
const PLACEHOLDER: &str = "block";

/// One renderable source.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
	/// Human-readable name used in diagnostics.
	pub label: String,
	pub source: String,
	/// Block locals, overlaid with fragment locals where applicable. Global
	/// locals are applied underneath at render time.
	pub locals: Locals,
	/// Index into [`Assembly::fragments`] when the variant came from an
	/// override object.
	pub fragment: Option<usize>,
}

/// Everything the renderer needs for one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
	/// Every variant in example order. Fragment variants are included; their
	/// output counts towards both the block and the fragment.
	pub variants: Vec<Variant>,
	/// Override objects, each rendered into a named sub-document.
	pub fragments: Vec<ExampleOverride>,
	/// `example: false` was given; the block's own output is dropped.
	pub suppressed: bool,
	/// Labels of override objects skipped for nesting deeper than one level.
	pub too_deep: Vec<String>,
}

/// Whether the captured code declares a mixin (`mixin name`).
pub fn is_mixin(code: &str) -> bool {
	code.lines()
		.find(|line| !line.trim().is_empty())
		.and_then(mixin_name)
		.is_some()
}

/// Combine `code` with one example. Mixin declarations get the example
/// appended as an invocation; other code is replaced by the example, with a
/// lone `block` line standing in for the code.
pub fn merge_source(code: &str, example: &str) -> String {
	if is_mixin(code) {
		return format!("{code}\n{example}");
	}

	let mut merged = Vec::new();
	for line in example.split('\n') {
		if line.trim() != PLACEHOLDER {
			merged.push(line.to_string());
			continue;
		}

		let prefix: String = line.chars().take_while(|ch| ch.is_whitespace()).collect();
		merged.extend(code.split('\n').map(|code_line| {
			if code_line.is_empty() {
				String::new()
			} else {
				format!("{prefix}{code_line}")
			}
		}));
	}

	merged.join("\n")
}

/// Flatten the `example` and `examples` fields of `meta` into render
/// variants and fragments.
pub fn assemble(meta: &Metadata, code: &str) -> Assembly {
	let block_label = meta.name.clone().unwrap_or_else(|| "block".to_string());
	let block_locals = meta.locals.clone().unwrap_or_default();
	let hooks = Hooks {
		before: meta.before_each.as_deref(),
		after: meta.after_each.as_deref(),
	};

	let mut assembly = Assembly {
		suppressed: meta.is_suppressed(),
		..Assembly::default()
	};

	for spec in entries(meta.example.as_ref(), meta.examples.as_ref()) {
		match spec {
			ExampleSpec::Source(source) => {
				if source.trim().is_empty() {
					continue;
				}
				let label = format!("{block_label} example {}", assembly.variants.len() + 1);
				assembly.variants.push(Variant {
					label,
					source: merge_source(code, &hooks.wrap(source)),
					locals: block_locals.clone(),
					fragment: None,
				});
			}
			ExampleSpec::Override(spec) => {
				let index = assembly.fragments.len();
				let label = spec
					.name
					.clone()
					.unwrap_or_else(|| format!("{block_label} fragment {}", index + 1));
				let variants = flatten_override(
					spec,
					&OverrideContext {
						index,
						label: &label,
						code,
						parent_hooks: hooks,
						block_locals: &block_locals,
					},
					&mut assembly.too_deep,
				);
				assembly.variants.extend(variants);
				assembly.fragments.push(spec.as_ref().clone());
			}
		}
	}

	if assembly.variants.is_empty() {
		assembly.variants.push(Variant {
			label: block_label,
			source: code.to_string(),
			locals: block_locals,
			fragment: None,
		});
	}

	assembly
}

#[derive(Debug, Clone, Copy)]
struct Hooks<'a> {
	before: Option<&'a str>,
	after: Option<&'a str>,
}

impl Hooks<'_> {
	fn wrap(&self, example: &str) -> String {
		[self.before, Some(example), self.after]
			.into_iter()
			.flatten()
			.filter(|part| !part.trim().is_empty())
			.collect::<Vec<_>>()
			.join("\n")
	}
}

fn entries<'a>(
	example: Option<&'a ExampleField>,
	examples: Option<&'a ExampleField>,
) -> impl Iterator<Item = &'a ExampleSpec> {
	example
		.into_iter()
		.chain(examples)
		.flat_map(ExampleField::specs)
}

struct OverrideContext<'a> {
	index: usize,
	label: &'a str,
	code: &'a str,
	parent_hooks: Hooks<'a>,
	block_locals: &'a Locals,
}

/// Turn one override object into fragment variants. Its own hooks replace the
/// parent's; override objects nested inside it are skipped and reported.
fn flatten_override(
	spec: &ExampleOverride,
	context: &OverrideContext<'_>,
	too_deep: &mut Vec<String>,
) -> Vec<Variant> {
	let hooks = Hooks {
		before: spec.before_each.as_deref().or(context.parent_hooks.before),
		after: spec.after_each.as_deref().or(context.parent_hooks.after),
	};

	let mut locals = context.block_locals.clone();
	if let Some(own) = &spec.locals {
		locals.extend(own.clone());
	}

	let variant = |source: String| {
		Variant {
			label: context.label.to_string(),
			source,
			locals: locals.clone(),
			fragment: Some(context.index),
		}
	};

	let mut variants = Vec::new();
	for entry in entries(spec.example.as_ref(), spec.examples.as_ref()) {
		match entry {
			ExampleSpec::Source(source) => {
				if source.trim().is_empty() {
					continue;
				}
				variants.push(variant(merge_source(context.code, &hooks.wrap(source))));
			}
			ExampleSpec::Override(nested) => {
				let nested_label = nested.name.as_deref().unwrap_or("unnamed");
				too_deep.push(format!("{} > {nested_label}", context.label));
			}
		}
	}

	if variants.is_empty() {
		variants.push(variant(context.code.to_string()));
	}

	variants
}
