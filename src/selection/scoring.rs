//! Candidate scoring and the randomized top-N pick.
//!
//! `score = 0.6 * tag_score + 0.4 * duration_score`, both in `[0, 1]`.

use std::collections::HashSet;

use rand::prelude::*;

use crate::ports::Track;

/// Weight of the tag overlap in the combined score.
pub const TAG_WEIGHT: f64 = 0.6;

/// Weight of the duration fit in the combined score.
pub const DURATION_WEIGHT: f64 = 0.4;

/// Fraction of the target inside which the duration score stays at or above 0.5.
pub const DURATION_TOLERANCE: f64 = 0.3;

/// The random pick draws from this many best-scored candidates.
pub const TOP_CANDIDATES: usize = 3;

/// Inclusive `[0.7 * target, 1.5 * target]` duration window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationWindow {
    pub min: f64,
    pub max: f64,
}

impl DurationWindow {
    pub const MIN_FACTOR: f64 = 0.7;
    pub const MAX_FACTOR: f64 = 1.5;

    pub fn around(target_seconds: f64) -> Self {
        Self {
            min: target_seconds * Self::MIN_FACTOR,
            max: target_seconds * Self::MAX_FACTOR,
        }
    }

    pub fn contains(&self, duration_seconds: f64) -> bool {
        duration_seconds >= self.min && duration_seconds <= self.max
    }
}

/// Share of requested tags the candidate carries, case-insensitive.
/// Returns 1.0 when no tags were requested.
pub fn tag_score(requested: &[String], candidate: &[String]) -> f64 {
    let requested: HashSet<String> = requested
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if requested.is_empty() {
        return 1.0;
    }

    let candidate: HashSet<String> = candidate.iter().map(|t| t.trim().to_lowercase()).collect();
    let matched = requested.intersection(&candidate).count();
    matched as f64 / requested.len() as f64
}

/// How well `duration` fits `target`.
///
/// Within 30% of the target the score falls linearly from 1.0 to 0.5;
/// beyond that it keeps falling at `1 / target` per second, floored at 0.
pub fn duration_score(duration: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }

    let diff = (duration - target).abs();
    let tolerance = DURATION_TOLERANCE * target;
    if diff <= tolerance {
        1.0 - 0.5 * diff / tolerance
    } else {
        (0.5 - (diff - tolerance) / target).max(0.0)
    }
}

/// Combined score for one candidate.
pub fn score(track: &Track, tags: &[String], target_seconds: f64) -> f64 {
    TAG_WEIGHT * tag_score(tags, &track.tags)
        + DURATION_WEIGHT * duration_score(track.duration_seconds, target_seconds)
}

/// Sorts candidates by descending score.
pub fn rank(candidates: Vec<Track>, tags: &[String], target_seconds: f64) -> Vec<(Track, f64)> {
    let mut scored: Vec<(Track, f64)> = candidates
        .into_iter()
        .map(|track| {
            let s = score(&track, tags, target_seconds);
            (track, s)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

/// Scores the candidates and draws uniformly from the top three.
pub fn pick_top<R: Rng + ?Sized>(
    candidates: Vec<Track>,
    tags: &[String],
    target_seconds: f64,
    rng: &mut R,
) -> Option<Track> {
    let mut ranked = rank(candidates, tags, target_seconds);
    ranked.truncate(TOP_CANDIDATES);
    ranked.choose(rng).map(|(track, _)| track.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn track(id: &str, duration: f64, t: &[&str]) -> Track {
        Track::new(id, format!("https://music.example.com/{}.mp3", id), duration).with_tags(t.to_vec())
    }

    #[test]
    fn test_tag_score_case_insensitive() {
        let score = tag_score(&tags(&["Upbeat", "corporate"]), &tags(&["upbeat", "ambient"]));
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_tag_score_without_request_is_one() {
        assert!((tag_score(&[], &tags(&["any"])) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_score_exact_match() {
        assert!((duration_score(60.0, 60.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_window_boundaries_score_positive() {
        let target = 60.0;
        let window = DurationWindow::around(target);
        assert!(window.contains(42.0));
        assert!(window.contains(90.0));
        assert!(!window.contains(41.9));
        assert!(!window.contains(90.1));

        let low = duration_score(0.7 * target, target);
        let high = duration_score(1.5 * target, target);
        assert!((low - 0.5).abs() < 1e-9);
        assert!((high - 0.3).abs() < 1e-9);
        assert!(low > 0.0 && high > 0.0);
    }

    #[test]
    fn test_duration_score_far_off_is_zero() {
        assert_eq!(duration_score(300.0, 60.0), 0.0);
    }

    #[test]
    fn test_combined_score_weights() {
        let t = track("a", 60.0, &["upbeat"]);
        let s = score(&t, &tags(&["upbeat", "calm"]), 60.0);
        assert!((s - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pick_top_only_draws_from_best_three() {
        let candidates = vec![
            track("best", 60.0, &["upbeat"]),
            track("second", 65.0, &["upbeat"]),
            track("third", 70.0, &["upbeat"]),
            track("worst", 200.0, &[]),
            track("bad", 5.0, &[]),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let picked = pick_top(candidates.clone(), &tags(&["upbeat"]), 60.0, &mut rng).unwrap();
            assert!(["best", "second", "third"].contains(&picked.id.as_str()));
        }
    }

    #[test]
    fn test_pick_top_is_deterministic_with_seed() {
        let candidates = vec![
            track("a", 60.0, &[]),
            track("b", 60.0, &[]),
            track("c", 60.0, &[]),
        ];
        let first = pick_top(candidates.clone(), &[], 60.0, &mut ChaCha8Rng::seed_from_u64(7));
        let second = pick_top(candidates, &[], 60.0, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(first, second);
    }

    #[test]
    fn test_pick_top_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(pick_top(Vec::new(), &[], 60.0, &mut rng).is_none());
    }
}
