use sdi_types::PipelineFrame;

/**
    Downstream consumer of captured frames.

    Called from driver threads. Implementations must not block indefinitely;
    a sink that cannot take a frame returns `false` and drops it, which runs
    the frame's release hook.
*/
pub trait FrameSink: Send + Sync {
    fn enqueue(&self, frame: PipelineFrame) -> bool;
}
