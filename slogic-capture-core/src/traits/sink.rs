/// Downstream consumer of the captured byte stream.
///
/// All methods are called from the host's pump thread. `accept` hands over
/// a borrowed view of the transfer payload; implementations must copy what
/// they need and must not retain the slice beyond the call.
pub trait StreamSink: Send + Sync {
    /// Called once, before the first transfer is submitted.
    fn begin_stream(&self);

    /// Called once after `begin_stream`, marking the start of the capture
    /// frame.
    fn begin_frame(&self);

    /// Called once per non-empty successful transfer with the payload bytes.
    fn accept(&self, payload: &[u8]);

    /// Called exactly once when the acquisition has fully drained.
    fn end_stream(&self);
}
