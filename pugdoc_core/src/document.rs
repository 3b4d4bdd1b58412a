use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::PugdocError;
use crate::PugdocResult;
use crate::extractor::RawBlock;
use crate::metadata::ExampleOverride;
use crate::metadata::Metadata;
use crate::render::BlockRender;

/// A named sub-document rendered from an example override object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
	pub meta: ExampleOverride,
	pub output: String,
}

/// The documentation record for one doc block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
	/// Path of the template relative to the generation root, `/`-separated.
	pub file: String,
	/// 1-indexed line of the doc marker.
	#[serde(skip)]
	pub line: usize,
	pub meta: Metadata,
	/// The captured code.
	pub source: String,
	pub output: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub fragments: Vec<Fragment>,
}

impl Document {
	/// Whether the block produced neither output nor fragments. Such documents
	/// are dropped from results.
	pub fn is_empty(&self) -> bool {
		self.output.is_none() && self.fragments.is_empty()
	}

	/// The block name. Documents are only built for named metadata.
	pub fn name(&self) -> &str {
		self.meta.name.as_deref().unwrap_or_default()
	}
}

/// Assemble the document for `block`. Metadata without a `name` is rejected.
pub fn build_document(
	file: &str,
	block: &RawBlock,
	meta: Metadata,
	render: BlockRender,
) -> PugdocResult<Document> {
	if meta.name.is_none() {
		return Err(PugdocError::MissingName {
			file: file.to_string(),
			line: block.marker.line,
		});
	}

	Ok(Document {
		file: file.to_string(),
		line: block.marker.line,
		meta,
		source: block.code_text(),
		output: render.output,
		fragments: render.fragments,
	})
}

/// `path` relative to `root` with `/` separators. Paths outside `root` are
/// returned unchanged.
pub fn relative_file(root: &Path, path: &Path) -> String {
	let relative = path.strip_prefix(root).unwrap_or(path);

	relative
		.components()
		.map(|component| component.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}

/// Write `documents` as a JSON array, one record at a time.
pub fn write_documents<W: Write>(writer: &mut W, documents: &[Document]) -> PugdocResult<()> {
	writer.write_all(b"[")?;

	for (index, document) in documents.iter().enumerate() {
		if index > 0 {
			writer.write_all(b",")?;
		}
		writer.write_all(b"\n")?;
		serde_json::to_writer_pretty(&mut *writer, document).map_err(std::io::Error::from)?;
	}

	if !documents.is_empty() {
		writer.write_all(b"\n")?;
	}
	writer.write_all(b"]\n")?;
	writer.flush()?;

	Ok(())
}

/// Write `documents` to `path`, creating parent directories as needed.
pub fn write_documents_to_path(path: &Path, documents: &[Document]) -> PugdocResult<()> {
	if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}

	let mut writer = BufWriter::new(File::create(path)?);
	write_documents(&mut writer, documents)?;
	tracing::info!(path = %path.display(), count = documents.len(), "wrote documents");

	Ok(())
}
