use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::info;
use rand::Rng;

pub fn compute_cosine_similarity(vec1: &[f32], vec2: &[f32]) -> f32 {
    let dot: f32 = vec1.iter().zip(vec2).map(|(a, b)| a * b).sum();
    let norm1: f32 = (vec1.iter().map(|x| x * x).sum::<f32>()).sqrt();
    let norm2: f32 = (vec2.iter().map(|x| x * x).sum::<f32>()).sqrt();
    dot / (norm1 * norm2).max(1e-10)
}

/// Timestamp used in generated file names.
pub fn file_timestamp() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Randomised sleeps that keep the crawl polite. Ranges are in seconds.
#[derive(Debug, Clone)]
pub struct Pacer {
    pub detail: RangeInclusive<f64>,
    pub page: RangeInclusive<f64>,
}

impl Default for Pacer {
    fn default() -> Self {
        Pacer {
            detail: 1.0..=3.0,
            page: 2.0..=5.0,
        }
    }
}

impl Pacer {
    /// No waiting at all.
    #[cfg(test)]
    pub fn none() -> Self {
        Pacer {
            detail: 0.0..=0.0,
            page: 0.0..=0.0,
        }
    }

    /// Before each detail page request.
    pub fn detail_delay(&self) {
        let secs = pick(&self.detail);
        sleep_secs(secs);
    }

    /// Between two index pages.
    pub fn page_delay(&self) {
        let secs = pick(&self.page);
        if secs > 0.0 {
            info!("Waiting {:.2} seconds before next page...", secs);
        }
        sleep_secs(secs);
    }
}

fn pick(range: &RangeInclusive<f64>) -> f64 {
    if range.end() <= range.start() {
        return range.start().max(0.0);
    }
    rand::thread_rng().gen_range(range.clone())
}

fn sleep_secs(secs: f64) {
    if secs > 0.0 {
        thread::sleep(Duration::from_secs_f64(secs));
    }
}
