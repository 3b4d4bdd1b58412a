use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::PugdocError;
use crate::PugdocResult;
use crate::extractor::DEFAULT_KEYWORD;
use crate::extractor::ExtractOptions;
use crate::metadata::Locals;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["pugdoc.toml", ".pugdoc.toml", ".config/pugdoc.toml"];

/// Input globs used when none are configured.
pub const DEFAULT_INPUT: [&str; 2] = ["**/*.pug", "**/*.jade"];

/// Configuration loaded from a `pugdoc.toml` file.
///
/// ```toml
/// keyword = "@pugdoc"
/// input = ["src/components/**/*.pug"]
/// output = "dist/docs.json"
/// locals_file = "fixtures/locals.yaml"
/// jobs = 4
///
/// [locals]
/// site = "Example"
///
/// [exclude]
/// patterns = ["vendor/", "*.draft.pug"]
///
/// [engine]
/// kind = "command"
/// program = "pug"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PugdocConfig {
	/// Keyword following `//-` on doc marker lines.
	#[serde(default = "default_keyword")]
	pub keyword: String,
	/// Glob patterns, relative to the project root, of templates to scan.
	#[serde(default = "default_input")]
	pub input: Vec<String>,
	/// Path of the JSON file to write.
	#[serde(default)]
	pub output: Option<PathBuf>,
	/// Maximum file size in bytes to scan. Larger files are skipped with a
	/// warning.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
	/// Number of worker threads processing files.
	#[serde(default = "default_jobs")]
	pub jobs: usize,
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Global locals available to every example. These win over values from
	/// `locals_file`.
	#[serde(default)]
	pub locals: toml::Table,
	/// A json, toml or yaml file with global locals.
	#[serde(default)]
	pub locals_file: Option<PathBuf>,
	#[serde(default)]
	pub engine: EngineConfig,
}

/// Gitignore-style patterns for files and directories to skip, relative to
/// the project root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Which template engine renders examples.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
	#[serde(default)]
	pub kind: EngineKind,
	/// Program run by the `command` engine. Defaults to `pug`.
	#[serde(default)]
	pub program: Option<String>,
	/// Extra arguments passed before the generated ones.
	#[serde(default)]
	pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
	/// In-process `minijinja` rendering. Pug markup is not understood and
	/// comes back as written.
	#[default]
	Jinja,
	/// An external compiler reading the template on stdin.
	Command,
}

fn default_keyword() -> String {
	DEFAULT_KEYWORD.to_string()
}

fn default_input() -> Vec<String> {
	DEFAULT_INPUT.iter().map(ToString::to_string).collect()
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

fn default_jobs() -> usize {
	1
}

impl Default for PugdocConfig {
	fn default() -> Self {
		Self {
			keyword: default_keyword(),
			input: default_input(),
			output: None,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			disable_gitignore: false,
			jobs: default_jobs(),
			exclude: ExcludeConfig::default(),
			locals: toml::Table::new(),
			locals_file: None,
			engine: EngineConfig::default(),
		}
	}
}

impl PugdocConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> PugdocResult<Option<Self>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		tracing::debug!(path = %config_path.display(), "loading config");
		let content = std::fs::read_to_string(&config_path)?;
		let config: Self =
			toml::from_str(&content).map_err(|e| PugdocError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}

	/// Like [`PugdocConfig::load`], falling back to the defaults.
	pub fn load_or_default(root: &Path) -> PugdocResult<Self> {
		Ok(Self::load(root)?.unwrap_or_default())
	}

	pub fn extract_options(&self) -> ExtractOptions {
		ExtractOptions::new(self.keyword.clone())
	}

	/// Merge `locals_file` and the inline `[locals]` table into one map.
	pub fn load_locals(&self, root: &Path) -> PugdocResult<Locals> {
		let mut locals = Locals::new();

		if let Some(rel_path) = &self.locals_file {
			let path_display = rel_path.display().to_string();
			let abs_path = root.join(rel_path);
			let content =
				std::fs::read_to_string(&abs_path).map_err(|e| PugdocError::LocalsFile {
					path: path_display.clone(),
					reason: e.to_string(),
				})?;
			let format = abs_path
				.extension()
				.and_then(|e| e.to_str())
				.unwrap_or("")
				.to_ascii_lowercase();

			match parse_data_file(&content, &format, &path_display)? {
				serde_json::Value::Object(map) => locals.extend(map),
				serde_json::Value::Null => {}
				_ => {
					return Err(PugdocError::LocalsFile {
						path: path_display,
						reason: "expected a mapping at the top level".to_string(),
					});
				}
			}
		}

		for (key, value) in &self.locals {
			locals.insert(key.clone(), toml_to_json(value.clone(), "pugdoc.toml")?);
		}

		Ok(locals)
	}
}

/// Parse a data file's content into a `serde_json::Value` based on its
/// format.
pub fn parse_data_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> PugdocResult<serde_json::Value> {
	match format {
		"json" => {
			serde_json::from_str(content).map_err(|e| {
				PugdocError::LocalsFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		"toml" => {
			let toml_value: toml::Value = toml::from_str(content).map_err(|e| {
				PugdocError::LocalsFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})?;
			toml_to_json(toml_value, path_display)
		}
		"yaml" | "yml" => {
			serde_yaml_ng::from_str(content).map_err(|e| {
				PugdocError::LocalsFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		other => Err(PugdocError::UnsupportedLocalsFormat(other.to_string())),
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`.
fn toml_to_json(value: toml::Value, path_display: &str) -> PugdocResult<serde_json::Value> {
	let json = match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
		toml::Value::Float(f) => {
			serde_json::Value::Number(serde_json::Number::from_f64(f).ok_or_else(|| {
				PugdocError::UnconvertibleFloat {
					path: path_display.to_string(),
					value: f.to_string(),
				}
			})?)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(arr) => {
			let items: PugdocResult<Vec<serde_json::Value>> = arr
				.into_iter()
				.map(|v| toml_to_json(v, path_display))
				.collect();
			serde_json::Value::Array(items?)
		}
		toml::Value::Table(table) => {
			let mut map = serde_json::Map::new();
			for (k, v) in table {
				map.insert(k, toml_to_json(v, path_display)?);
			}
			serde_json::Value::Object(map)
		}
	};

	Ok(json)
}
