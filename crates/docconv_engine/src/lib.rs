//! Doc converter engine: turns batches of web pages into Markdown files with
//! YAML frontmatter.
mod config;
mod converter;
mod decode;
mod extract;
mod fetch;
mod filename;
mod frontmatter;
mod job;
mod markdown;
mod metadata;
mod persist;
mod types;
mod validate;

pub use config::{Clock, ConverterSettings};
pub use converter::{ConversionRun, Converter};
pub use decode::{decode_html, DecodedHtml};
pub use extract::{extract_content, parse_selector};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::{document_filename, sanitize_filename};
pub use frontmatter::{build_markdown_document, metadata_to_yaml, FrontmatterError};
pub use job::ConversionJob;
pub use markdown::{collapse_blank_lines, MarkdownRenderer, SimpleMarkdownRenderer};
pub use metadata::{extract_metadata, page_title, PageMetadata};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    ConversionResult, FailureKind, FetchError, FetchFailure, FetchMetadata, FetchOutput,
    FetchResponse, PipelineError, RunError, SetupError, Summary,
};
pub use validate::{is_public_ip, validate_public_url, HostResolver, SystemResolver, SSRF_MESSAGE};

/// Metadata keys written into the frontmatter.
pub mod keys {
    pub use crate::metadata::{DESCRIPTION, KEYWORDS, RETRIEVED_AT, SOURCE, TITLE};
}
