use std::collections::HashSet;

use crate::examples::Assembly;
use crate::lines::LineIndex;
use crate::lines::dedent;
use crate::lines::indent_of;
use crate::lines::is_blank;
use crate::lines::trim_trailing_blank;

/// The name declared by a `mixin <name>` line, if `line` is one.
pub fn mixin_name(line: &str) -> Option<&str> {
	let rest = line.trim_start().strip_prefix("mixin")?;
	let name = rest.trim_start_matches(' ');
	if name.len() == rest.len() {
		return None;
	}

	let end = name
		.char_indices()
		.find(|(_, ch)| !is_mixin_char(*ch))
		.map_or(name.len(), |(idx, _)| idx);

	(end > 0).then(|| &name[..end])
}

fn is_mixin_char(ch: char) -> bool {
	ch.is_alphanumeric() || matches!(ch, '_' | '-')
}

/// Names called as `+name` in `source`, in order of first appearance.
pub fn mixin_calls(source: &str) -> Vec<&str> {
	let mut calls = Vec::new();

	for line in source.lines() {
		for (idx, _) in line.match_indices('+') {
			let preceded_by_text = line[..idx]
				.chars()
				.next_back()
				.is_some_and(|ch| !ch.is_whitespace() && ch != ':');
			if preceded_by_text {
				continue;
			}

			let rest = &line[idx + 1..];
			let end = rest
				.char_indices()
				.find(|(_, ch)| !is_mixin_char(*ch))
				.map_or(rest.len(), |(end, _)| end);
			let name = &rest[..end];
			if !name.is_empty() && !calls.contains(&name) {
				calls.push(name);
			}
		}
	}

	calls
}

/// The mixin declarations of one template file. Each entry is the `mixin`
/// head line and its deeper-indented body, rebased to column 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixinTable {
	mixins: Vec<(String, String)>,
}

impl MixinTable {
	pub fn from_index(index: &LineIndex<'_>) -> Self {
		let mut mixins: Vec<(String, String)> = Vec::new();

		for (at, line) in index.iter().enumerate() {
			let Some(name) = mixin_name(line) else {
				continue;
			};
			// The first declaration of a name wins.
			if mixins.iter().any(|(known, _)| known == name) {
				continue;
			}

			let column = indent_of(line);
			let mut lines = vec![*line];
			lines.extend(
				index
					.iter()
					.skip(at + 1)
					.take_while(|next| is_blank(next) || indent_of(next) > column),
			);
			trim_trailing_blank(&mut lines);

			mixins.push((name.to_string(), dedent(&lines, column).join("\n")));
		}

		Self { mixins }
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.mixins
			.iter()
			.find(|(known, _)| known == name)
			.map(|(_, declaration)| declaration.as_str())
	}

	pub fn is_empty(&self) -> bool {
		self.mixins.is_empty()
	}

	/// Declarations `source` needs but does not contain, dependencies first.
	/// Calls to mixins that are not declared in the file are left to the
	/// engine.
	pub fn dependencies<'s>(&'s self, source: &'s str) -> Vec<&'s str> {
		let mut seen: HashSet<&str> = source.lines().filter_map(mixin_name).collect();
		let mut ordered = Vec::new();

		for name in mixin_calls(source) {
			self.visit(name, &mut seen, &mut ordered);
		}

		ordered
	}

	fn visit<'s>(&'s self, name: &str, seen: &mut HashSet<&'s str>, ordered: &mut Vec<&'s str>) {
		let Some((known, declaration)) = self.mixins.iter().find(|(known, _)| known == name) else {
			return;
		};
		if !seen.insert(known.as_str()) {
			return;
		}

		for call in mixin_calls(declaration) {
			self.visit(call, seen, ordered);
		}
		ordered.push(declaration.as_str());
	}
}

/// Prepend the same-file mixin declarations each variant calls, so every
/// variant renders on its own.
pub fn link_mixins(assembly: &mut Assembly, mixins: &MixinTable) {
	if mixins.is_empty() {
		return;
	}

	for variant in &mut assembly.variants {
		let dependencies = mixins.dependencies(&variant.source);
		if dependencies.is_empty() {
			continue;
		}

		tracing::debug!(label = %variant.label, count = dependencies.len(), "linking mixins");
		variant.source = format!("{}\n{}", dependencies.join("\n"), variant.source);
	}
}
