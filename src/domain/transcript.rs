//! The transcript segment model (`raw_transcript.json`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub speaker_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub confidence: Option<f32>,
}

impl TranscriptSegment {
    /// Per the boundary behavior in §8: a segment whose `end_time < start_time`
    /// is a fatal `SegmentOrderingViolation`, not silently clamped.
    pub fn validate_ordering(&self) -> crate::Result<()> {
        if self.end_time < self.start_time {
            return Err(crate::Error::SegmentOrderingViolation {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }
}

/// An ordered, finite sequence of segments, monotone-nondecreasing in `start_time`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn push_validated(&mut self, segment: TranscriptSegment) -> crate::Result<()> {
        segment.validate_ordering()?;
        if let Some(last) = self.segments.last() {
            if segment.start_time < last.start_time {
                return Err(crate::Error::Validation(format!(
                    "segments must be monotone-nondecreasing in start_time: {} after {}",
                    segment.start_time, last.start_time
                )));
            }
        }
        self.segments.push(segment);
        Ok(())
    }

    /// A compact plain-text rendering used as the REFINE stage's standard-mode input.
    pub fn to_compact_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{:.1}-{:.1}] {}: {}", s.start_time, s.end_time, s.speaker_id, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            speaker_id: "spk0".into(),
            start_time: start,
            end_time: end,
            text: "hello".into(),
            confidence: None,
        }
    }

    #[test]
    fn rejects_end_before_start() {
        let err = seg(5.0, 2.0).validate_ordering().unwrap_err();
        assert!(matches!(err, crate::Error::SegmentOrderingViolation { .. }));
    }

    #[test]
    fn rejects_out_of_order_segments() {
        let mut t = Transcript::default();
        t.push_validated(seg(2.0, 3.0)).unwrap();
        let err = t.push_validated(seg(1.0, 1.5)).unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
    }
}
