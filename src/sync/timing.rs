//! Timing normalizer.
//!
//! Turns a sparse, possibly empty alignment into a complete per-word timing
//! table: one entry per word, starts strictly increasing, no entry shorter
//! than a floor derived from the average word duration. The table is a pure
//! function of its inputs; call it again when the real audio duration
//! becomes known.

use crate::defaults;
use crate::sync::aligner::AlignedWord;
use serde::{Deserialize, Serialize};

/// Start and end time in seconds of one word within a chunk's audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub word_index: usize,
    pub start: f64,
    pub end: f64,
}

/// Builds a complete timing table for `word_count` words.
///
/// `audio_duration` is used for the average-duration fallback and, when no
/// word was aligned, to spread the words uniformly over the whole audio.
pub fn normalize(
    word_count: usize,
    sparse: &[AlignedWord],
    audio_duration: Option<f64>,
) -> Vec<TimingEntry> {
    if word_count == 0 {
        return Vec::new();
    }

    let duration = audio_duration.filter(|d| d.is_finite() && *d > 0.0);

    let mut slots: Vec<Option<(f64, f64)>> = vec![None; word_count];
    for aligned in sparse {
        if aligned.word_index < word_count && slots[aligned.word_index].is_none() {
            let start = aligned.start.max(0.0);
            slots[aligned.word_index] = Some((start, aligned.end.max(start)));
        }
    }

    let avg = average_duration(&slots, duration);

    let Some(anchor) = slots.iter().position(Option::is_some) else {
        let step = duration.map_or(avg, |d| d / word_count as f64);
        return (0..word_count)
            .map(|i| TimingEntry {
                word_index: i,
                start: i as f64 * step,
                end: (i + 1) as f64 * step,
            })
            .collect();
    };

    // Backfill words before the first aligned one.
    for i in (0..anchor).rev() {
        let end = slots[i + 1].map_or(0.0, |(start, _)| start);
        slots[i] = Some(((end - avg).max(0.0), end));
    }

    // Forward-fill interior and trailing gaps.
    let mut i = anchor + 1;
    while i < word_count {
        if slots[i].is_some() {
            i += 1;
            continue;
        }
        let gap_start = i;
        let gap_end = (gap_start..word_count)
            .find(|&k| slots[k].is_some())
            .unwrap_or(word_count);
        let prev_end = slots[gap_start - 1].map_or(0.0, |(_, end)| end);

        if gap_end < word_count {
            let next_start = slots[gap_end].map_or(prev_end, |(start, _)| start);
            let step = (next_start - prev_end).max(0.0) / (gap_end - gap_start) as f64;
            for (n, k) in (gap_start..gap_end).enumerate() {
                let start = prev_end + n as f64 * step;
                slots[k] = Some((start, start + step));
            }
        } else {
            // Trailing words share what is left of the audio, at most `avg` each.
            let step = match duration {
                Some(d) if d > prev_end => avg.min((d - prev_end) / (gap_end - gap_start) as f64),
                _ => avg,
            };
            for (n, k) in (gap_start..gap_end).enumerate() {
                let start = prev_end + n as f64 * step;
                slots[k] = Some((start, start + step));
            }
        }
        i = gap_end;
    }

    enforce_monotonic(&slots, avg)
}

/// Mean duration of the aligned words, falling back to the audio duration
/// split evenly, then to [`defaults::DEFAULT_WORD_SECS`].
fn average_duration(slots: &[Option<(f64, f64)>], duration: Option<f64>) -> f64 {
    let (sum, count) = slots
        .iter()
        .flatten()
        .filter(|(start, end)| end > start)
        .fold((0.0, 0usize), |(sum, count), (start, end)| {
            (sum + (end - start), count + 1)
        });

    if count > 0 {
        sum / count as f64
    } else if let Some(d) = duration {
        d / slots.len() as f64
    } else {
        defaults::DEFAULT_WORD_SECS
    }
}

fn enforce_monotonic(slots: &[Option<(f64, f64)>], avg: f64) -> Vec<TimingEntry> {
    let min_duration = (avg * defaults::MIN_WORD_FRACTION).max(defaults::MIN_WORD_SECS);
    let mut prev_end = 0.0f64;

    slots
        .iter()
        .enumerate()
        .map(|(word_index, slot)| {
            let (start, end) = slot.unwrap_or((prev_end, prev_end));
            let start = start.max(prev_end);
            let end = end.max(start + min_duration);
            prev_end = end;
            TimingEntry {
                word_index,
                start,
                end,
            }
        })
        .collect()
}

/// Index of the word active at `time`.
///
/// Before the first word returns 0, at or past the last end returns the last
/// index; in a gap between two words returns the earlier word.
pub fn word_index_at(table: &[TimingEntry], time: f64) -> usize {
    let Some(last) = table.last() else {
        return 0;
    };
    if time < table[0].start {
        return 0;
    }
    if time >= last.end {
        return table.len() - 1;
    }
    // First entry whose start is after `time`, minus one.
    let after = table.partition_point(|entry| entry.start <= time);
    after.saturating_sub(1)
}

/// Audio offset where `word_index` starts, clamped to the table.
pub fn start_time_of(table: &[TimingEntry], word_index: usize) -> f64 {
    table
        .get(word_index)
        .or(table.last())
        .map_or(0.0, |entry| entry.start)
}

/// End of the last entry, i.e. the duration the table covers.
pub fn table_end(table: &[TimingEntry]) -> f64 {
    table.last().map_or(0.0, |entry| entry.end)
}
