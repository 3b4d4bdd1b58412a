use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PugdocError {
	#[error(transparent)]
	#[diagnostic(code(pugdoc::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(pugdoc::config_parse),
		help("check that pugdoc.toml is valid TOML with optional [locals], [exclude] and [engine] sections")
	)]
	ConfigParse(String),

	#[error("failed to load locals file `{path}`: {reason}")]
	#[diagnostic(code(pugdoc::locals_file))]
	LocalsFile { path: String, reason: String },

	#[error("unsupported locals file format: `{0}`")]
	#[diagnostic(
		code(pugdoc::unsupported_format),
		help("supported formats: json, toml, yaml, yml")
	)]
	UnsupportedLocalsFormat(String),

	#[error("unconvertible float value in `{path}`: {value}")]
	#[diagnostic(
		code(pugdoc::unconvertible_float),
		help("NaN and Infinity are not valid JSON numbers")
	)]
	UnconvertibleFloat { path: String, value: String },

	#[error("invalid glob pattern `{pattern}`: {reason}")]
	#[diagnostic(code(pugdoc::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("required key `name` not found in doc block at {file}:{line}")]
	#[diagnostic(
		code(pugdoc::missing_name),
		help("add a `name:` entry to the doc block's metadata")
	)]
	MissingName { file: String, line: usize },

	#[error("invalid doc block metadata at line {line}: {message}")]
	#[diagnostic(code(pugdoc::metadata_parse))]
	MetadataParse { line: usize, message: String },

	#[error("invalid parameter annotation `{text}`: {reason}")]
	#[diagnostic(
		code(pugdoc::invalid_parameter),
		help("parameters follow the form `{{Type}} name - description`")
	)]
	InvalidParameter { text: String, reason: String },

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(pugdoc::file_too_large),
		help("increase `max_file_size` in pugdoc.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("failed to start worker threads: {0}")]
	#[diagnostic(
		code(pugdoc::thread_pool),
		help("lower `jobs` in pugdoc.toml or pass a smaller `--jobs`")
	)]
	ThreadPool(String),

	#[error("generation run was cancelled")]
	#[diagnostic(code(pugdoc::cancelled))]
	Cancelled,
}

pub type PugdocResult<T> = Result<T, PugdocError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
