use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docconv_logging::{docconv_debug, docconv_error, docconv_info, docconv_warn};
use futures_util::FutureExt;
use scraper::Html;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::config::{Clock, ConverterSettings};
use crate::decode::decode_html;
use crate::extract::{extract_content, parse_selector};
use crate::filename::document_filename;
use crate::frontmatter::build_markdown_document;
use crate::markdown::{MarkdownRenderer, SimpleMarkdownRenderer};
use crate::metadata::{extract_metadata, page_title, RETRIEVED_AT};
use crate::persist::{ensure_output_dir, AtomicFileWriter};
use crate::validate::{validate_public_url, HostResolver, SystemResolver};
use crate::{
    ConversionResult, FailureKind, FetchError, FetchFailure, FetchOutput, FetchResponse, Fetcher,
    PipelineError, ReqwestFetcher, RunError, SetupError, Summary,
};

/// Converts batches of URLs into Markdown files inside one output directory.
///
/// Construct once per run; the output directory is created up front so that
/// a run never starts against an unusable destination.
pub struct Converter {
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<dyn HostResolver>,
    renderer: Arc<dyn MarkdownRenderer>,
    writer: AtomicFileWriter,
    job_id: Option<String>,
    max_concurrency: usize,
    redirect_limit: usize,
    clock: Clock,
}

impl Converter {
    /// Job mode: output goes to `<downloads_root>/<job_id>` and the summary
    /// carries the job id.
    pub fn for_job(job_id: &str, settings: ConverterSettings) -> Result<Self, SetupError> {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return Err(SetupError::EmptyJobId);
        }
        let mut components = Path::new(job_id).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !single_normal {
            return Err(SetupError::InvalidJobId(job_id.to_string()));
        }
        let dir = settings.downloads_root.join(job_id);
        Self::build(dir, Some(job_id.to_string()), settings)
    }

    /// Directory mode: output goes to a caller-chosen directory.
    pub fn for_output_dir(
        dir: impl Into<PathBuf>,
        settings: ConverterSettings,
    ) -> Result<Self, SetupError> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(SetupError::EmptyOutputDir);
        }
        Self::build(dir, None, settings)
    }

    fn build(
        dir: PathBuf,
        job_id: Option<String>,
        settings: ConverterSettings,
    ) -> Result<Self, SetupError> {
        ensure_output_dir(&dir).map_err(|source| SetupError::OutputDir {
            path: dir.clone(),
            source,
        })?;
        let fetcher = ReqwestFetcher::new(&settings.fetch)
            .map_err(|err| SetupError::HttpClient(err.message))?;

        Ok(Self {
            fetcher: Arc::new(fetcher),
            resolver: Arc::new(SystemResolver),
            renderer: Arc::new(SimpleMarkdownRenderer),
            writer: AtomicFileWriter::new(dir),
            job_id,
            max_concurrency: settings.effective_concurrency(),
            redirect_limit: settings.fetch.redirect_limit,
            clock: settings.retrieved_at,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn output_dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Start converting `urls` with one shared `selector`.
    ///
    /// Each URL runs as its own task, at most `max_concurrency` at a time.
    /// Results arrive in completion order; the summary is sent only after
    /// the result stream has closed. Must be called within a tokio runtime.
    pub fn convert<I, S>(&self, urls: I, selector: &str) -> ConversionRun
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        let pipeline = Arc::new(Pipeline {
            fetcher: Arc::clone(&self.fetcher),
            resolver: Arc::clone(&self.resolver),
            renderer: Arc::clone(&self.renderer),
            writer: self.writer.clone(),
            clock: Arc::clone(&self.clock),
            selector: selector.to_string(),
            redirect_limit: self.redirect_limit,
        });

        let (result_tx, result_rx) = mpsc::channel(self.max_concurrency);
        let (summary_tx, summary_rx) = oneshot::channel();
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let job_id = self.job_id.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut tally = Tally::new(urls.len());
            docconv_info!(
                "Starting conversion of {} urls (job {:?})",
                urls.len(),
                job_id
            );

            let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
            for url in urls {
                let pipeline = Arc::clone(&pipeline);
                let permits = Arc::clone(&permits);
                let outcome_tx = outcome_tx.clone();
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquisition only waits.
                    let _permit = permits.acquire_owned().await.ok();
                    let result = AssertUnwindSafe(pipeline.process(&url))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            docconv_error!("worker for {url} panicked");
                            ConversionResult::failure(
                                url.as_str(),
                                PipelineError::new(
                                    FailureKind::Parse,
                                    format!("internal error while processing {url}"),
                                ),
                            )
                        });
                    let _ = outcome_tx.send(result);
                });
            }
            drop(outcome_tx);

            while let Some(result) = outcome_rx.recv().await {
                tally.record(&result);
                // A consumer that stopped listening still gets a summary.
                let _ = result_tx.send(result).await;
            }
            drop(result_tx);

            let summary = tally.finish(started.elapsed(), job_id);
            docconv_info!(
                "Conversion finished: {} successful, {} failed in {}",
                summary.successful,
                summary.failed,
                summary.processing_time
            );
            let _ = summary_tx.send(summary);
        });

        ConversionRun {
            results: result_rx,
            summary: summary_rx,
        }
    }
}

/// Handle to an in-progress run: a stream of per-URL results followed by
/// exactly one summary.
pub struct ConversionRun {
    results: mpsc::Receiver<ConversionResult>,
    summary: oneshot::Receiver<Summary>,
}

impl ConversionRun {
    /// Next finished URL, or `None` once every URL has been reported.
    pub async fn next_result(&mut self) -> Option<ConversionResult> {
        self.results.recv().await
    }

    /// Drain any remaining results and wait for the summary.
    pub async fn summary(mut self) -> Result<Summary, RunError> {
        while self.results.recv().await.is_some() {}
        self.summary.await.map_err(|_| RunError::SummaryLost)
    }

    /// Collect every result, then the summary.
    pub async fn collect(mut self) -> Result<(Vec<ConversionResult>, Summary), RunError> {
        let mut results = Vec::new();
        while let Some(result) = self.results.recv().await {
            results.push(result);
        }
        let summary = self.summary.await.map_err(|_| RunError::SummaryLost)?;
        Ok((results, summary))
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<ConversionResult>,
        oneshot::Receiver<Summary>,
    ) {
        (self.results, self.summary)
    }
}

/// Sequential fold of per-URL outcomes; owned by the aggregator task only.
#[derive(Debug)]
struct Tally {
    total: usize,
    successful: usize,
    failed_urls: Vec<String>,
}

impl Tally {
    fn new(total: usize) -> Self {
        Self {
            total,
            successful: 0,
            failed_urls: Vec::new(),
        }
    }

    fn record(&mut self, result: &ConversionResult) {
        if result.is_success {
            self.successful += 1;
        } else {
            self.failed_urls.push(result.url.clone());
        }
    }

    fn finish(self, elapsed: Duration, download_id: Option<String>) -> Summary {
        Summary {
            total_urls: self.total,
            successful: self.successful,
            failed: self.failed_urls.len(),
            failed_urls: self.failed_urls,
            processing_time: format!("{elapsed:?}"),
            download_id,
            elapsed,
        }
    }
}

struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<dyn HostResolver>,
    renderer: Arc<dyn MarkdownRenderer>,
    writer: AtomicFileWriter,
    clock: Clock,
    selector: String,
    redirect_limit: usize,
}

/// A document ready to be written.
struct PreparedDocument {
    file_name: String,
    content: Vec<u8>,
}

impl Pipeline {
    async fn process(&self, url: &str) -> ConversionResult {
        match self.try_process(url).await {
            Ok(doc) => {
                docconv_debug!("Wrote {} for {url}", doc.file_name);
                ConversionResult::success(url, doc.file_name, doc.content)
            }
            Err(err) => {
                docconv_error!("Failed to process {url}: {err}");
                ConversionResult::failure(url, err)
            }
        }
    }

    async fn try_process(&self, url: &str) -> Result<PreparedDocument, PipelineError> {
        let fetched = self.fetch_public(url).await?;
        docconv_debug!("Fetched {} bytes from {url}", fetched.metadata.byte_len);
        let doc = self.prepare(url, &fetched)?;
        self.write(doc).await
    }

    /// Fetch `url`, following redirects by hand so every hop passes the SSRF
    /// guard before it is requested.
    async fn fetch_public(&self, url: &str) -> Result<FetchOutput, PipelineError> {
        let resolver = self.resolver.as_ref();
        let mut current = validate_public_url(url, resolver).await?;
        for _ in 0..=self.redirect_limit {
            docconv_debug!("Fetching {current}");
            let location = match self.fetcher.fetch(current.as_str()).await? {
                FetchResponse::Page(output) => return Ok(output),
                FetchResponse::Redirect { location } => location,
            };
            let next = current.join(&location).map_err(|err| {
                PipelineError::new(
                    FailureKind::Validation,
                    format!("URL validation failed: redirect from {current} to '{location}': {err}"),
                )
            })?;
            docconv_debug!("{current} redirects to {next}");
            current = validate_public_url(next.as_str(), resolver).await?;
        }
        Err(FetchError::new(
            FetchFailure::RedirectLimitExceeded,
            format!(
                "failed to fetch URL {url}: stopped after {} redirects",
                self.redirect_limit
            ),
        )
        .into())
    }

    /// Decode, parse once, and derive content, metadata and filename from the
    /// same document. Kept synchronous: the parsed tree never crosses an await.
    fn prepare(&self, url: &str, fetched: &FetchOutput) -> Result<PreparedDocument, PipelineError> {
        let decoded = decode_html(&fetched.bytes, fetched.metadata.content_type.as_deref());
        if decoded.had_errors {
            docconv_warn!(
                "Invalid {} byte sequences in {url} were replaced",
                decoded.encoding_label
            );
        }
        let document = Html::parse_document(&decoded.html);

        let selector = parse_selector(url, &self.selector)?;
        let content_html = extract_content(&document, url, &self.selector, &selector)?;

        let mut metadata = extract_metadata(&document, url);
        metadata.insert(RETRIEVED_AT, (self.clock)());
        let file_name = document_filename(page_title(&document).as_deref(), url);
        drop(document);

        let markdown = self.renderer.to_markdown(&content_html);
        if markdown.is_empty() {
            return Err(PipelineError::new(
                FailureKind::Parse,
                format!(
                    "no renderable content in {url} using selector '{}'",
                    self.selector
                ),
            ));
        }

        let content = build_markdown_document(&metadata, &markdown).map_err(|err| {
            PipelineError::new(
                FailureKind::Serialization,
                format!("failed to marshal YAML: {err}"),
            )
        })?;

        Ok(PreparedDocument {
            file_name,
            content: content.into_bytes(),
        })
    }

    async fn write(&self, doc: PreparedDocument) -> Result<PreparedDocument, PipelineError> {
        let writer = self.writer.clone();
        let written = tokio::task::spawn_blocking(move || {
            let outcome = writer.write(&doc.file_name, &doc.content);
            (outcome, doc)
        })
        .await;

        match written {
            Ok((Ok(_path), doc)) => Ok(doc),
            Ok((Err(err), _)) => Err(PipelineError::new(
                FailureKind::Write,
                format!("failed to write file: {err}"),
            )),
            Err(err) => Err(PipelineError::new(
                FailureKind::Write,
                format!("failed to write file: {err}"),
            )),
        }
    }
}
