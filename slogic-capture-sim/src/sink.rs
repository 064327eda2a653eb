use parking_lot::Mutex;

use slogic_capture_core::StreamSink;

#[derive(Debug, Default)]
struct SinkLog {
    begin_streams: u64,
    begin_frames: u64,
    end_streams: u64,
    accepts: u64,
    payload: Vec<u8>,
}

/// Sink that accumulates everything it is handed, for assertion in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    log: Mutex<SinkLog>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_streams(&self) -> u64 {
        self.log.lock().begin_streams
    }

    pub fn begin_frames(&self) -> u64 {
        self.log.lock().begin_frames
    }

    pub fn end_streams(&self) -> u64 {
        self.log.lock().end_streams
    }

    pub fn accepts(&self) -> u64 {
        self.log.lock().accepts
    }

    pub fn payload_len(&self) -> usize {
        self.log.lock().payload.len()
    }

    pub fn payload(&self) -> Vec<u8> {
        self.log.lock().payload.clone()
    }
}

impl StreamSink for RecordingSink {
    fn begin_stream(&self) {
        self.log.lock().begin_streams += 1;
    }

    fn begin_frame(&self) {
        self.log.lock().begin_frames += 1;
    }

    fn accept(&self, payload: &[u8]) {
        let mut log = self.log.lock();
        log.accepts += 1;
        log.payload.extend_from_slice(payload);
    }

    fn end_stream(&self) {
        self.log.lock().end_streams += 1;
    }
}
