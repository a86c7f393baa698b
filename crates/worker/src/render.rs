//! Cached frame rendering.

use sino_core::reply::{MediaSource, Reply};
use sino_pipeline::{FrameFetcher, PipelineError, RenderRequest};

use crate::context::AppContext;

/// A rendered animation and where it came from.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub reply: Reply,
    pub fingerprint: String,
    pub from_cache: bool,
}

/// Render `request`, reusing a cached artifact for an identical request.
pub async fn render_frames<F: FrameFetcher>(
    ctx: &AppContext<F>,
    request: &RenderRequest,
    caption: Option<String>,
) -> Result<RenderOutcome, PipelineError> {
    let fingerprint = request.fingerprint();
    let stem = &fingerprint[..12];

    if let Some(bytes) = ctx.renders().get(&fingerprint) {
        tracing::debug!(fingerprint = %fingerprint, "Render cache hit");
        let filename = format!("{stem}.{}", request.options.container().extension());
        return Ok(RenderOutcome {
            reply: Reply::Animation {
                media: MediaSource::upload(filename, bytes),
                caption,
            },
            fingerprint,
            from_cache: true,
        });
    }

    let artifact = ctx.pipeline().render(request).await?;
    ctx.renders().set(fingerprint.clone(), artifact.bytes.clone());

    Ok(RenderOutcome {
        reply: artifact.into_reply(stem, caption),
        fingerprint,
        from_cache: false,
    })
}
