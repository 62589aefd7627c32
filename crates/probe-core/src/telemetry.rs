//! Global tracing setup for the `probe` binary and embedders of the library.
//!
//! Log lines always go to stderr so stdout carries only reports.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the process-wide subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is the floor. With `json`
/// every line is a JSON object. Later calls are no-ops because the global
/// subscriber can only be installed once.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(log_layer(json, std::io::stderr))
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Text or JSON formatting layer writing to `writer`.
fn log_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_target(false).with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(json: bool) -> String {
        let buf = Buffer::default();
        let sink = buf.clone();
        let subscriber = tracing_subscriber::registry().with(log_layer(json, move || sink.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(event = "probe.error", property = "consistency", "task failed");
        });
        buf.contents()
    }

    #[test]
    fn test_json_lines_go_to_the_given_writer() {
        let out = capture(true);
        let line: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["fields"]["event"], "probe.error");
        assert_eq!(line["fields"]["message"], "task failed");
    }

    #[test]
    fn test_text_lines_go_to_the_given_writer() {
        let out = capture(false);
        assert!(out.contains("WARN"));
        assert!(out.contains("task failed"));
        assert!(serde_json::from_str::<serde_json::Value>(out.trim()).is_err());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
