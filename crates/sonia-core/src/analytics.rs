//! Derived aggregations behind the dashboard and wellness path views.
//!
//! Everything here is a pure function over a user's stored messages and
//! journal entries; nothing is persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EmotionData, EmotionLabel, JournalEntry, Message};

/// Where an emotion data point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointSource {
    Chat,
    Journal,
}

/// One emotion reading on the combined timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionPoint {
    pub timestamp: i64,
    pub label: EmotionLabel,
    pub intensity: f64,
    pub confidence: f64,
    pub source: PointSource,
}

/// Number of chat messages tagged with a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: EmotionLabel,
    pub count: usize,
}

/// Headline scores, each on a 0..=100 scale except `improvement_rate`
/// which is a signed delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub health_score: i32,
    pub stability_index: i32,
    pub burnout_risk: i32,
    pub improvement_rate: i32,
}

/// Progress along the four-step wellness path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathProgress {
    pub eq: f64,
    pub stability: i32,
    pub growth: i32,
    pub active_nodes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub title: &'static str,
    pub description: &'static str,
    pub milestone: u32,
}

pub const MILESTONES: [Milestone; 4] = [
    Milestone {
        title: "Neural Baseline Establishment",
        description: "Initial calibration of emotional resonance patterns.",
        milestone: 1,
    },
    Milestone {
        title: "Cognitive Pattern Recognition",
        description: "Identifying recurring emotional drift triggers.",
        milestone: 2,
    },
    Milestone {
        title: "Regulation & Drift Control",
        description: "Mastery over high-intensity emotional peaks.",
        milestone: 3,
    },
    Milestone {
        title: "Sustained Resilience",
        description: "Achieving a stable state of psychological flow.",
        milestone: 4,
    },
];

/// Emotions recorded on a single UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    pub emotions: Vec<EmotionData>,
}

/// Chat messages carrying an emotion plus every journal entry, oldest first.
pub fn timeline(messages: &[Message], entries: &[JournalEntry]) -> Vec<EmotionPoint> {
    let chat = messages.iter().filter_map(|m| {
        let e = m.emotion.as_ref()?;
        Some(EmotionPoint {
            timestamp: m.timestamp,
            label: e.label,
            intensity: e.intensity,
            confidence: e.confidence,
            source: PointSource::Chat,
        })
    });
    let journal = entries.iter().map(|e| EmotionPoint {
        timestamp: e.timestamp,
        label: e.emotion.label,
        intensity: e.emotion.intensity,
        confidence: e.emotion.confidence,
        source: PointSource::Journal,
    });

    let mut points: Vec<EmotionPoint> = chat.chain(journal).collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Label counts over chat messages, in label order.
pub fn distribution(messages: &[Message]) -> Vec<LabelCount> {
    let mut counts: BTreeMap<EmotionLabel, usize> = BTreeMap::new();
    for e in messages.iter().filter_map(|m| m.emotion.as_ref()) {
        *counts.entry(e.label).or_default() += 1;
    }
    counts.into_iter().map(|(label, count)| LabelCount { label, count }).collect()
}

/// Per-point wellbeing on a 0..=100 scale.
pub fn wellbeing(point: &EmotionPoint) -> f64 {
    match point.label {
        EmotionLabel::Neutral => 60.0,
        l if l.is_positive() => 50.0 + point.intensity / 2.0,
        _ => 50.0 - point.intensity / 2.0,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// 100 minus the mean distance of intensity from the 50% midpoint.
fn raw_stability(points: &[EmotionPoint]) -> Option<f64> {
    mean(points.iter().map(|p| (50.0 - p.intensity).abs())).map(|d| 100.0 - d)
}

pub fn summarize(points: &[EmotionPoint]) -> AnalyticsSummary {
    let Some(stability) = raw_stability(points) else {
        return AnalyticsSummary::default();
    };
    let n = points.len() as f64;

    let health = mean(points.iter().map(wellbeing)).unwrap_or(0.0);

    let strained: f64 = points
        .iter()
        .filter(|p| matches!(p.label, EmotionLabel::Burnout | EmotionLabel::Stress))
        .map(|p| p.intensity)
        .sum();
    let burnout = (strained / n).clamp(0.0, 100.0);

    let improvement = if points.len() < 2 {
        0.0
    } else {
        let (earlier, later) = points.split_at(points.len() / 2);
        let before = mean(earlier.iter().map(wellbeing)).unwrap_or(0.0);
        let after = mean(later.iter().map(wellbeing)).unwrap_or(0.0);
        after - before
    };

    AnalyticsSummary {
        health_score: health.round() as i32,
        stability_index: stability.round() as i32,
        burnout_risk: burnout.round() as i32,
        improvement_rate: improvement.round() as i32,
    }
}

pub fn path_progress(points: &[EmotionPoint]) -> PathProgress {
    let Some(stability) = raw_stability(points) else {
        return PathProgress::default();
    };
    let n = points.len();

    let eq = (n as f64 / 5.0 + stability / 20.0).min(10.0);
    let growth = (n as f64 / 20.0 * 100.0).min(100.0);

    PathProgress {
        eq: (eq * 10.0).round() / 10.0,
        stability: stability.round() as i32,
        growth: growth.round() as i32,
        active_nodes: (n as u32 / 4 + 1).min(4),
    }
}

fn utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_default()
}

/// Groups points by calendar day, preserving chronological order.
pub fn history_by_day(points: &[EmotionPoint]) -> Vec<HistoryEntry> {
    let mut days: Vec<HistoryEntry> = Vec::new();
    for p in points {
        let date = utc(p.timestamp).format("%Y-%m-%d").to_string();
        let emotion = EmotionData::new(p.label, p.confidence, p.intensity);
        match days.last_mut() {
            Some(day) if day.date == date => day.emotions.push(emotion),
            _ => days.push(HistoryEntry { date, emotions: vec![emotion] }),
        }
    }
    days
}

/// Trajectory lines fed to the report prompt, journal entries first.
pub fn report_lines(entries: &[JournalEntry], messages: &[Message]) -> String {
    let journal = entries.iter().map(|e| {
        format!(
            "[Journal] {}: {} ({}%)",
            utc(e.timestamp).format("%a %b %d %Y"),
            e.emotion.label,
            e.emotion.intensity
        )
    });
    let chat = messages.iter().filter_map(|m| {
        let e = m.emotion.as_ref()?;
        Some(format!(
            "[Chat] {}: {} ({}%)",
            utc(m.timestamp).format("%a %b %d %Y"),
            e.label,
            e.intensity
        ))
    });
    journal.chain(chat).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;

    const DAY_MS: i64 = 86_400_000;

    fn tagged(ts: i64, label: EmotionLabel, intensity: f64) -> Message {
        Message::new(ts.to_string(), MessageRole::Assistant, "reply", ts)
            .with_emotion(EmotionData::new(label, 0.9, intensity))
    }

    fn sample_points() -> Vec<EmotionPoint> {
        let messages = vec![
            tagged(1, EmotionLabel::Happy, 80.0),
            tagged(2, EmotionLabel::Stress, 60.0),
            tagged(3, EmotionLabel::Burnout, 90.0),
            tagged(4, EmotionLabel::Neutral, 50.0),
        ];
        timeline(&messages, &[])
    }

    #[test]
    fn test_timeline_merges_and_sorts() {
        let messages = vec![
            tagged(30, EmotionLabel::Sad, 40.0),
            Message::new("u", MessageRole::User, "no emotion", 10),
        ];
        let entries = vec![JournalEntry {
            id: "j".into(),
            title: "t".into(),
            content: "c".into(),
            timestamp: 20,
            emotion: EmotionData::neutral(),
        }];

        let points = timeline(&messages, &entries);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].source, PointSource::Journal);
        assert_eq!(points[1].source, PointSource::Chat);
    }

    #[test]
    fn test_distribution_counts_labels() {
        let messages = vec![
            tagged(1, EmotionLabel::Sad, 10.0),
            tagged(2, EmotionLabel::Happy, 10.0),
            tagged(3, EmotionLabel::Sad, 10.0),
        ];
        let dist = distribution(&messages);
        assert_eq!(
            dist,
            vec![
                LabelCount { label: EmotionLabel::Happy, count: 1 },
                LabelCount { label: EmotionLabel::Sad, count: 2 },
            ]
        );
    }

    #[test]
    fn test_summary_scores() {
        let summary = summarize(&sample_points());
        assert_eq!(summary.stability_index, 80);
        assert_eq!(summary.health_score, 44);
        assert_eq!(summary.burnout_risk, 38);
        assert_eq!(summary.improvement_rate, -23);
    }

    #[test]
    fn test_empty_inputs_are_zero() {
        assert_eq!(summarize(&[]), AnalyticsSummary::default());
        assert_eq!(path_progress(&[]), PathProgress::default());
        assert!(history_by_day(&[]).is_empty());
    }

    #[test]
    fn test_path_progress() {
        let progress = path_progress(&sample_points());
        assert_eq!(progress.stability, 80);
        assert_eq!(progress.eq, 4.8);
        assert_eq!(progress.growth, 20);
        assert_eq!(progress.active_nodes, 2);
    }

    #[test]
    fn test_path_progress_caps() {
        let messages: Vec<Message> =
            (0..40).map(|i| tagged(i, EmotionLabel::Neutral, 50.0)).collect();
        let progress = path_progress(&timeline(&messages, &[]));
        assert_eq!(progress.eq, 10.0);
        assert_eq!(progress.growth, 100);
        assert_eq!(progress.active_nodes, 4);
    }

    #[test]
    fn test_history_groups_by_day() {
        let messages = vec![
            tagged(0, EmotionLabel::Happy, 70.0),
            tagged(1000, EmotionLabel::Sad, 30.0),
            tagged(DAY_MS + 5, EmotionLabel::Anger, 90.0),
        ];
        let history = history_by_day(&timeline(&messages, &[]));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, "1970-01-01");
        assert_eq!(history[0].emotions.len(), 2);
        assert_eq!(history[1].date, "1970-01-02");
    }

    #[test]
    fn test_report_lines_format() {
        let entries = vec![JournalEntry {
            id: "j".into(),
            title: "t".into(),
            content: "c".into(),
            timestamp: 0,
            emotion: EmotionData::new(EmotionLabel::Anxiety, 0.5, 65.0),
        }];
        let messages = vec![tagged(DAY_MS, EmotionLabel::Happy, 80.0)];

        let lines = report_lines(&entries, &messages);
        assert_eq!(
            lines,
            "[Journal] Thu Jan 01 1970: Anxiety (65%)\n[Chat] Fri Jan 02 1970: Happy (80%)"
        );
    }
}
