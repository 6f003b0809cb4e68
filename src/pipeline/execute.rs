//! Fetch → transform execution.
//!
//! # Data Flow
//! ```text
//!  SourceFetcher stream ──pump──▶ mpsc(channel_depth) ──transform──▶ spawn_blocking(engine.run)
//!        (size limit)                 (backpressure)                  (decode once, encode once)
//! ```
//!
//! Both halves are joined with `try_join!`, so whichever fails first fails the
//! operation. The whole thing sits under one deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::engine::{ImageEngine, RasterEngine, TransformPlan, TransformResult};
use super::fetch::{FetchError, HttpSourceFetcher, SourceFetcher};
use super::format::{resolve_format, OutputFormat};
use super::params::{TransformRequest, OBJECT_NAME};
use super::TransformError;
use crate::config::ServiceConfig;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::validation::ValidationError;

/// Resource bounds of a single transform operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    /// Source chunks buffered between the pump and the transform.
    pub channel_depth: usize,
    pub max_source_bytes: u64,
    /// Deadline for fetch + transform together.
    pub deadline: Duration,
}

impl PipelineLimits {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            channel_depth: config.fetch.channel_depth,
            max_source_bytes: config.fetch.max_source_bytes,
            deadline: Duration::from_secs(config.transform.deadline_secs),
        }
    }
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self::from_config(&ServiceConfig::default())
    }
}

/// Image transform pipeline over a fetcher and an engine.
pub struct TransformPipeline<F, E> {
    fetcher: F,
    engine: Arc<E>,
    limits: PipelineLimits,
}

/// The pipeline the server runs.
pub type DefaultPipeline = TransformPipeline<HttpSourceFetcher, RasterEngine>;

impl DefaultPipeline {
    /// Build the production pipeline from configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, FetchError> {
        Ok(TransformPipeline::new(
            HttpSourceFetcher::new(&config.fetch)?,
            RasterEngine::new(&config.transform),
            PipelineLimits::from_config(config),
        ))
    }
}

impl<F, E> TransformPipeline<F, E>
where
    F: SourceFetcher,
    E: ImageEngine,
{
    pub fn new(fetcher: F, engine: E, limits: PipelineLimits) -> Self {
        Self {
            fetcher,
            engine: Arc::new(engine),
            limits,
        }
    }

    /// Resolve the output format and build the engine plan.
    pub fn plan(&self, request: &TransformRequest, accept: &str) -> Result<TransformPlan, ValidationError> {
        let format = match resolve_format(request.format.as_deref(), accept, &request.source_image_url) {
            None => None,
            Some(name) => Some(OutputFormat::from_name(&name).ok_or_else(|| {
                ValidationError::field(
                    OBJECT_NAME,
                    "format",
                    format!("'{}' is not a supported output format", name),
                )
            })?),
        };
        Ok(TransformPlan::new(request, format))
    }

    /// Fetch the source, transform it and encode the result.
    pub async fn execute(
        &self,
        request: &TransformRequest,
        accept: &str,
    ) -> Result<TransformResult, TransformError> {
        let plan = self.plan(request, accept)?;
        let start = Instant::now();

        let result = with_deadline(self.limits.deadline, self.run(&request.source_image_url, plan))
            .await
            .inspect_err(|_| {
                tracing::warn!(
                    url = %request.source_image_url,
                    deadline_ms = self.limits.deadline.as_millis() as u64,
                    "Transform deadline exceeded"
                );
            })??;

        tracing::info!(
            url = %request.source_image_url,
            format = result.format.as_deref().unwrap_or("-"),
            width = result.width,
            height = result.height,
            bytes = result.size(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transform complete"
        );
        Ok(result)
    }

    async fn run(&self, url: &str, plan: TransformPlan) -> Result<TransformResult, TransformError> {
        let (tx, rx) = mpsc::channel(self.limits.channel_depth.max(1));
        let ((), result) = tokio::try_join!(self.pump(url, tx), self.transform(rx, plan))?;
        Ok(result)
    }

    /// Drive the fetch stream into the channel.
    async fn pump(&self, url: &str, tx: mpsc::Sender<Bytes>) -> Result<(), TransformError> {
        let pumped = async {
            let mut stream = self.fetcher.fetch_stream(url).await?;
            let max = self.limits.max_source_bytes;
            let mut received: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                received += chunk.len() as u64;
                if received > max {
                    return Err(FetchError::TooLarge { size: received, max });
                }
                if tx.send(chunk).await.is_err() {
                    // transform side already failed; its error wins
                    return Ok(());
                }
            }

            tracing::debug!(url, bytes = received, "Source fetched");
            Ok(())
        };

        pumped.await.map_err(|e: FetchError| {
            metrics::record_fetch_failure(e.kind());
            TransformError::Fetch(e)
        })
    }

    /// Collect the source, then run the engine off the async workers.
    async fn transform(
        &self,
        mut rx: mpsc::Receiver<Bytes>,
        plan: TransformPlan,
    ) -> Result<TransformResult, TransformError> {
        let mut source = Vec::new();
        while let Some(chunk) = rx.recv().await {
            source.extend_from_slice(&chunk);
        }

        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.run(&source, &plan))
            .await
            .map_err(|e| TransformError::Internal(format!("engine task failed: {}", e)))??;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;

    use futures_util::stream;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use super::*;
    use crate::pipeline::engine::EngineError;
    use crate::pipeline::fetch::ByteStream;
    use crate::resilience::DeadlineExceeded;

    enum Source {
        Bytes(Vec<u8>),
        FailAfterFirstChunk(Vec<u8>),
        Stall,
    }

    /// Serves registered sources in small chunks.
    struct MemoryFetcher {
        sources: HashMap<String, Source>,
        chunk: usize,
    }

    impl MemoryFetcher {
        fn new() -> Self {
            Self {
                sources: HashMap::new(),
                chunk: 64,
            }
        }

        fn with(mut self, url: &str, source: Source) -> Self {
            self.sources.insert(url.to_string(), source);
            self
        }
    }

    impl SourceFetcher for MemoryFetcher {
        async fn fetch_stream(&self, url: &str) -> Result<ByteStream, FetchError> {
            let chunks = |data: &[u8]| -> Vec<Result<Bytes, FetchError>> {
                data.chunks(self.chunk)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect()
            };

            match self.sources.get(url) {
                None => Err(FetchError::Status(404)),
                Some(Source::Bytes(data)) => Ok(stream::iter(chunks(data)).boxed()),
                Some(Source::FailAfterFirstChunk(data)) => {
                    let mut items = chunks(data);
                    items.truncate(1);
                    items.push(Err(FetchError::Stream("connection reset".into())));
                    Ok(stream::iter(items).boxed())
                }
                Some(Source::Stall) => Ok(stream::pending::<Result<Bytes, FetchError>>().boxed()),
            }
        }
    }

    fn solid_png(width: u32, height: u32, colour: [u8; 4]) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(colour)));
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn pipeline(fetcher: MemoryFetcher) -> TransformPipeline<MemoryFetcher, RasterEngine> {
        TransformPipeline::new(fetcher, RasterEngine::default(), PipelineLimits::default())
    }

    #[tokio::test]
    async fn test_execute_resizes_and_keeps_format() {
        let url = "http://images.test/photo.png";
        let p = pipeline(MemoryFetcher::new().with(url, Source::Bytes(solid_png(80, 40, [9, 9, 9, 255]))));

        let mut request = TransformRequest::new(url);
        request.width = Some(20);

        let result = p.execute(&request, "").await.unwrap();
        assert_eq!((result.width, result.height), (20, 10));
        assert_eq!(result.format.as_deref(), Some("png"));
        assert!(result.data.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_auto_format_follows_accept_header() {
        let url = "http://images.test/photo.png";
        let p = pipeline(MemoryFetcher::new().with(url, Source::Bytes(solid_png(8, 8, [1, 2, 3, 255]))));

        let mut request = TransformRequest::new(url);
        request.format = Some("auto".into());

        let result = p.execute(&request, "image/webp,*/*").await.unwrap();
        assert_eq!(result.format.as_deref(), Some("webp"));

        // no acceptable match keeps the input format
        let result = p.execute(&request, "text/html").await.unwrap();
        assert_eq!(result.format.as_deref(), Some("png"));
    }

    #[tokio::test]
    async fn test_unknown_format_is_validation_error() {
        let p = pipeline(MemoryFetcher::new());
        let mut request = TransformRequest::new("http://images.test/a.png");
        request.format = Some("bmp".into());

        match p.execute(&request, "").await {
            Err(TransformError::Validation(e)) => assert!(e.has_field("format")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_status_error_propagates() {
        let p = pipeline(MemoryFetcher::new());
        let request = TransformRequest::new("http://images.test/missing.png");

        let result = p.execute(&request, "").await;
        assert!(matches!(result, Err(TransformError::Fetch(FetchError::Status(404)))));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_fails_operation() {
        let url = "http://images.test/broken.png";
        let p = pipeline(
            MemoryFetcher::new().with(url, Source::FailAfterFirstChunk(solid_png(64, 64, [5, 5, 5, 255]))),
        );

        let result = p.execute(&TransformRequest::new(url), "").await;
        assert!(matches!(result, Err(TransformError::Fetch(FetchError::Stream(_)))));
    }

    #[tokio::test]
    async fn test_source_size_limit_enforced_while_streaming() {
        let url = "http://images.test/big.png";
        let fetcher = MemoryFetcher::new().with(url, Source::Bytes(vec![0u8; 1024]));
        let limits = PipelineLimits {
            max_source_bytes: 100,
            ..PipelineLimits::default()
        };
        let p = TransformPipeline::new(fetcher, RasterEngine::default(), limits);

        let result = p.execute(&TransformRequest::new(url), "").await;
        assert!(matches!(
            result,
            Err(TransformError::Fetch(FetchError::TooLarge { max: 100, .. }))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_source_is_engine_error() {
        let url = "http://images.test/page.png";
        let p = pipeline(MemoryFetcher::new().with(url, Source::Bytes(b"<html></html>".to_vec())));

        let result = p.execute(&TransformRequest::new(url), "").await;
        assert!(matches!(result, Err(TransformError::Engine(EngineError::Decode(_)))));
    }

    #[tokio::test]
    async fn test_deadline_bounds_stalled_fetch() {
        let url = "http://images.test/slow.png";
        let limits = PipelineLimits {
            deadline: Duration::from_millis(50),
            ..PipelineLimits::default()
        };
        let p = TransformPipeline::new(
            MemoryFetcher::new().with(url, Source::Stall),
            RasterEngine::default(),
            limits,
        );

        let result = p.execute(&TransformRequest::new(url), "").await;
        assert!(matches!(
            result,
            Err(TransformError::Deadline(DeadlineExceeded(d))) if d == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_isolated() {
        let red = "http://images.test/red.png";
        let blue = "http://images.test/blue.png";
        let p = Arc::new(pipeline(
            MemoryFetcher::new()
                .with(red, Source::Bytes(solid_png(30, 10, [255, 0, 0, 255])))
                .with(blue, Source::Bytes(solid_png(12, 24, [0, 0, 255, 255]))),
        ));

        let mut handles = Vec::new();
        for i in 0..16 {
            let p = Arc::clone(&p);
            let url = if i % 2 == 0 { red } else { blue };
            handles.push(tokio::spawn(async move {
                let result = p.execute(&TransformRequest::new(url), "").await.unwrap();
                (url, result)
            }));
        }

        for handle in handles {
            let (url, result) = handle.await.unwrap();
            let decoded = image::load_from_memory(&result.data).unwrap().to_rgba8();
            let (dims, colour) = if url == red {
                ((30, 10), Rgba([255, 0, 0, 255]))
            } else {
                ((12, 24), Rgba([0, 0, 255, 255]))
            };
            assert_eq!(decoded.dimensions(), dims);
            assert!(decoded.pixels().all(|px| *px == colour));
        }
    }
}
