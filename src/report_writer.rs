//! JSON writer for result payloads

use crate::types::ResultPayload;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use tracing::debug;

/// One written report: the payload tagged with the file it answers.
#[derive(Serialize)]
struct ReportEnvelope<'a> {
    source: &'a str,
    request_id: &'a str,
    #[serde(flatten)]
    payload: &'a ResultPayload,
}

/// Writes result payloads as JSON documents to a shared sink
pub struct ReportWriter<W: Write + Send> {
    sink: Mutex<W>,
    pretty: bool,
}

impl<W: Write + Send> ReportWriter<W> {
    pub fn new(sink: W, pretty: bool) -> Self {
        Self {
            sink: Mutex::new(sink),
            pretty,
        }
    }

    /// Write one payload followed by a newline
    pub fn publish(&self, source: &str, request_id: &str, payload: &ResultPayload) -> Result<()> {
        let envelope = ReportEnvelope {
            source,
            request_id,
            payload,
        };

        let document = if self.pretty {
            serde_json::to_vec_pretty(&envelope)?
        } else {
            serde_json::to_vec(&envelope)?
        };

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink lock poisoned"))?;
        sink.write_all(&document)?;
        sink.write_all(b"\n")?;
        sink.flush()?;

        debug!(
            source = source,
            request_id = request_id,
            model = payload.model_id(),
            success = payload.is_success(),
            bytes = document.len(),
            "Report written"
        );

        Ok(())
    }

    /// Recover the sink
    pub fn into_inner(self) -> Result<W> {
        self.sink
            .into_inner()
            .map_err(|_| anyhow!("report sink lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_compact_report() {
        let writer = ReportWriter::new(Vec::new(), false);
        let payload =
            ResultPayload::failure("xgb_model", FailureKind::InvalidModelId, "Invalid model ID");

        writer.publish("prices.csv", "req-1", &payload).unwrap();
        writer.publish("other.csv", "req-2", &payload).unwrap();

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["source"], "prices.csv");
        assert_eq!(first["request_id"], "req-1");
        assert_eq!(first["model_id"], "xgb_model");
        assert_eq!(first["success"], false);
        assert_eq!(first["error_kind"], "invalid_model_id");
    }

    #[test]
    fn test_pretty_report() {
        let writer = ReportWriter::new(Vec::new(), true);
        let payload = ResultPayload::failure("lr_model", FailureKind::ModelNotFound, "missing");

        writer.publish("prices.csv", "req-1", &payload).unwrap();

        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(output.lines().count() > 1);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["error"], "missing");
    }
}
