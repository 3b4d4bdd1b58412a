//! `pugdoc_core` is the core library for [pugdoc](https://github.com/pugdoc/pugdoc). It finds documentation blocks embedded in indentation-based templates (Pug, Jade), decodes their metadata, assembles usage examples and renders each example in isolation through a pluggable template engine.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template file
//!   -> Line index (LF-normalized line array)
//!   -> Block extractor (doc markers, annotation body, captured code)
//!   -> Metadata parser (annotation reader + parameter micro-grammar)
//!   -> Example assembler (flat variants + fragments)
//!   -> Renderer (compile + render per variant, failures isolated)
//!   -> Document builder (drops blocks without output)
//! ```
//!
//! ## Doc Blocks
//!
//! A doc block starts at a line that reads exactly `//- @pugdoc` (the keyword
//! is configurable). The lines indented deeper than the marker form the
//! annotation, and the code block that follows at the marker's indentation is
//! captured as the block's source:
//!
//! ```pug
//! //- @pugdoc
//!   name: button
//!   description: A call to action
//!   arguments:
//!     - {string} label - the button text
//!   examples:
//!     - +button('Save')
//! mixin button(label)
//!   button.btn= label
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `pugdoc.toml`, including global locals and the engine selection.
//! - [`extractor`]: Marker scanning and capture modes (`capture: 2`, `all`, `section`).
//! - [`metadata`]: Typed metadata, example fields and parameter lists.
//! - [`MixinTable`]: Same-file mixin lookup, so examples calling `+helper` render on their own.
//! - [`generator`]: File collection and the per-file and whole-run pipeline.
//!
//! ## Key Types
//!
//! - [`RawBlock`]: An extracted doc block before parsing.
//! - [`Metadata`]: The decoded annotation.
//! - [`ParameterSpec`]: One `arguments` or `attributes` entry.
//! - [`TemplateEngine`]: The capability used to compile and render examples.
//! - [`Document`]: The output record for a block.
//! - [`GenerateResult`]: Documents plus the non-fatal [`Diagnostic`]s of a run.

pub use config::*;
pub use document::*;
pub use engine::*;
pub use error::*;
pub use examples::*;
pub use extractor::*;
pub use generator::*;
pub use lines::*;
pub use metadata::*;
pub use mixins::*;
pub use params::*;
pub use reader::*;
pub use render::*;

pub mod config;
mod document;
mod engine;
#[allow(unused_assignments)]
mod error;
mod examples;
pub mod extractor;
pub mod generator;
mod lines;
pub mod metadata;
mod mixins;
mod params;
mod reader;
mod render;
