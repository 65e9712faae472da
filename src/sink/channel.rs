use super::{PoseSink, SinkError};

/// Hands payloads to an in-process host over a flume channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: flume::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: flume::Sender<String>) -> Self {
        Self { tx }
    }

    /// Unbounded sink plus the receiving end for the host.
    pub fn unbounded() -> (Self, flume::Receiver<String>) {
        let (tx, rx) = flume::unbounded();
        (Self::new(tx), rx)
    }
}

impl PoseSink for ChannelSink {
    fn post(&mut self, message: &str) -> Result<(), SinkError> {
        self.tx
            .send(message.to_owned())
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_until_host_drops_receiver() {
        let (mut sink, rx) = ChannelSink::unbounded();
        sink.post("{\"data\":[]}").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "{\"data\":[]}");
        drop(rx);
        assert!(matches!(sink.post("x"), Err(SinkError::Closed)));
    }
}
