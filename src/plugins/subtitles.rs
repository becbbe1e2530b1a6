//! Reference subtitles plugin (WebVTT). Declares `needs_transcript = true` so
//! GENERATE can exercise its "skip when the transcript is missing" path
//! (direct mode, §8 scenario 4) honestly rather than against a stub.

use super::{Plugin, RenderInput, RenderedArtifact};
use crate::Result;

pub struct SubtitlesPlugin;

fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as i64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

impl Plugin for SubtitlesPlugin {
    fn name(&self) -> &'static str {
        "subtitles"
    }

    fn extension(&self) -> &'static str {
        "vtt"
    }

    fn needs_transcript(&self, _template_name: &str) -> bool {
        true
    }

    fn render(&self, input: RenderInput<'_>) -> Result<RenderedArtifact> {
        let transcript = input.raw_transcript.ok_or_else(|| {
            crate::Error::validation("subtitles plugin requires a raw transcript but none was supplied")
        })?;

        let mut out = String::from("WEBVTT\n\n");
        for segment in &transcript.segments {
            out.push_str(&format!(
                "{} --> {}\n{}: {}\n\n",
                format_timestamp(segment.start_time),
                format_timestamp(segment.end_time),
                segment.speaker_id,
                segment.text
            ));
        }

        Ok(RenderedArtifact {
            bytes: out.into_bytes(),
            suggested_filename: format!("{}.{}", input.template_name, self.extension()),
        })
    }
}
