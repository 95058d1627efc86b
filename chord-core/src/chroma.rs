//! # Chroma Extraction Module
//!
//! Folds an amplitude spectrum into 12 pitch classes, biased toward
//! fundamentals. Instead of binning the whole spectrum, only the strongest
//! spectral peaks are used, each spread over its neighbouring semitones with
//! a narrow Gaussian. That keeps the floor noise and the smeared energy
//! between partials out of the chroma signature.

use crate::ChromaVector;
use crate::pitch;

/// Absolute magnitude floor for a bin to count as a peak.
pub const PEAK_FLOOR: f32 = 0.05;
/// Number of strongest peaks kept per analysis.
pub const MAX_PEAKS: usize = 15;
/// Peaks at or below this frequency are ignored (Hz).
pub const MIN_FREQUENCY: f32 = 60.0;
/// Peaks at or above this frequency are ignored (Hz).
pub const MAX_FREQUENCY: f32 = 1500.0;
/// Gaussian spread in note-number units.
pub const GAUSSIAN_SIGMA: f64 = 0.15;
/// Peaks below this frequency are treated as likely fundamentals (Hz).
pub const HARMONIC_SPLIT: f32 = 500.0;
/// Multiplier for peaks above the split, which are likely overtones.
pub const HARMONIC_DAMPING: f32 = 0.6;

/// A local maximum of the spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub bin: usize,
    pub magnitude: f32,
}

/// Finds local maxima above [`PEAK_FLOOR`] in `2..len-2`.
pub fn find_peaks(spectrum: &[f32]) -> Vec<Peak> {
    if spectrum.len() < 5 {
        return Vec::new();
    }
    (2..spectrum.len() - 2)
        .filter(|&i| {
            let m = spectrum[i];
            m > spectrum[i - 1] && m > spectrum[i + 1] && m > PEAK_FLOOR
        })
        .map(|i| Peak { bin: i, magnitude: spectrum[i] })
        .collect()
}

/// Keeps the `MAX_PEAKS` strongest peaks, strongest first.
///
/// The sort is stable, so equal peaks stay in ascending bin order.
pub fn strongest_peaks(mut peaks: Vec<Peak>) -> Vec<Peak> {
    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    peaks.truncate(MAX_PEAKS);
    peaks
}

/// Gaussian weight of a bucket at `distance` note numbers from the peak.
fn gaussian(distance: f64) -> f32 {
    (-(distance * distance) / (2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA)).exp() as f32
}

/// Multiplier applied to a peak depending on how likely it is an overtone.
fn harmonic_weight(freq: f32) -> f32 {
    if freq < HARMONIC_SPLIT { 1.0 } else { HARMONIC_DAMPING }
}

/// Divides every bin by the maximum. An all-zero vector stays all-zero.
pub fn normalize(chroma: &mut ChromaVector) {
    let max = chroma.iter().copied().fold(0.0_f32, f32::max);
    if max > 0.0 {
        for value in chroma.iter_mut() {
            *value /= max;
        }
    }
}

/// Peak-picking chroma extractor for one window size.
#[derive(Debug, Clone, Copy)]
pub struct ChromaExtractor {
    window_size: usize,
}

impl ChromaExtractor {
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }

    /// Computes a normalised chroma vector from an amplitude spectrum.
    ///
    /// `spectrum` is the output of [`crate::fft::SpectralAnalyzer::analyze`]
    /// for the same window size, recorded at `sample_rate`.
    pub fn extract(&self, spectrum: &[f32], sample_rate: f32) -> ChromaVector {
        let mut chroma = [0.0_f32; 12];
        let bin_width = sample_rate / self.window_size as f32;

        for peak in strongest_peaks(find_peaks(spectrum)) {
            let freq = peak.bin as f32 * bin_width;
            if freq <= MIN_FREQUENCY || freq >= MAX_FREQUENCY {
                continue;
            }

            let note = pitch::frequency_to_note(freq as f64);
            let nearest = note.round() as i64;
            let freq_weight = harmonic_weight(freq);

            for bucket in nearest - 1..=nearest + 1 {
                let weight = gaussian(bucket as f64 - note);
                chroma[pitch::pitch_class(bucket)] += peak.magnitude * weight * freq_weight;
            }
        }

        normalize(&mut chroma);
        chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: usize = 8192;

    /// Spectrum with a single triangular peak at `bin`.
    fn single_peak(bin: usize, magnitude: f32) -> Vec<f32> {
        let mut spectrum = vec![0.0; WINDOW / 2];
        spectrum[bin] = magnitude;
        spectrum[bin - 1] = magnitude * 0.5;
        spectrum[bin + 1] = magnitude * 0.5;
        spectrum
    }

    #[test]
    fn peaks_need_strict_local_max_above_floor() {
        let spectrum = [0.0, 0.0, 0.2, 0.1, 0.04, 0.03, 0.3, 0.3, 0.0, 0.0];
        let peaks = find_peaks(&spectrum);
        assert_eq!(peaks, vec![Peak { bin: 2, magnitude: 0.2 }]);
    }

    #[test]
    fn peaks_ignore_the_first_and_last_two_bins() {
        let spectrum = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert!(find_peaks(&spectrum).is_empty());
        assert!(find_peaks(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn keeps_only_fifteen_strongest() {
        let peaks: Vec<Peak> = (0..40)
            .map(|i| Peak { bin: i * 4 + 2, magnitude: 1.0 + i as f32 })
            .collect();
        let kept = strongest_peaks(peaks);
        assert_eq!(kept.len(), MAX_PEAKS);
        assert_eq!(kept[0].magnitude, 40.0);
        assert_eq!(kept[14].magnitude, 26.0);
    }

    #[test]
    fn silence_gives_zero_chroma() {
        let extractor = ChromaExtractor::new(WINDOW);
        let chroma = extractor.extract(&vec![0.0; WINDOW / 2], 44_100.0);
        assert_eq!(chroma, [0.0; 12]);
    }

    #[test]
    fn middle_c_concentrates_on_pitch_class_zero() {
        // Bin 100 at this rate is 261.6 Hz.
        let sample_rate = 261.6 * WINDOW as f32 / 100.0;
        let extractor = ChromaExtractor::new(WINDOW);
        let chroma = extractor.extract(&single_peak(100, 2.0), sample_rate);

        assert_eq!(chroma[0], 1.0);
        // 261.6 Hz is just below C4, so B is the closer neighbour.
        assert!(chroma[11] > 0.0);
        assert!(chroma[1] > 0.0);
        assert!(chroma[11] > chroma[1]);
        assert!(chroma[11] < 1e-6);
        for pc in 2..11 {
            assert_eq!(chroma[pc], 0.0, "pitch class {pc}");
        }
    }

    #[test]
    fn spillover_shrinks_with_distance() {
        let sample_rate = 44_100.0;
        let extractor = ChromaExtractor::new(WINDOW);
        // Bin 49 is ~263.8 Hz, sharp of C4: C# is the closer neighbour.
        let chroma = extractor.extract(&single_peak(49, 2.0), sample_rate);
        assert_eq!(chroma[0], 1.0);
        assert!(chroma[1] > chroma[11]);
        assert!(chroma[11] > 0.0);
    }

    #[test]
    fn out_of_range_peaks_are_gated() {
        let sample_rate = 44_100.0;
        let extractor = ChromaExtractor::new(WINDOW);
        // Bin 10 is ~54 Hz, bin 300 is ~1615 Hz.
        let mut spectrum = single_peak(10, 5.0);
        spectrum[299] = 2.5;
        spectrum[300] = 5.0;
        spectrum[301] = 2.5;
        assert_eq!(extractor.extract(&spectrum, sample_rate), [0.0; 12]);
    }

    #[test]
    fn overtones_are_dampened() {
        // 8 Hz bins: bin 55 = 440 Hz (A4), bin 110 = 880 Hz (A5), bin 41 = 328 Hz (~E4).
        let sample_rate = 8.0 * WINDOW as f32;
        let extractor = ChromaExtractor::new(WINDOW);

        let mut low = vec![0.0; WINDOW / 2];
        low[55] = 1.0;
        low[41] = 1.0;
        let mut high = vec![0.0; WINDOW / 2];
        high[110] = 1.0;
        high[41] = 1.0;

        let low_chroma = extractor.extract(&low, sample_rate);
        let high_chroma = extractor.extract(&high, sample_rate);
        // Relative to the E peak, the A5 overtone counts 0.6x as much as A4.
        let ratio = (high_chroma[9] / high_chroma[4]) / (low_chroma[9] / low_chroma[4]);
        assert!((ratio - HARMONIC_DAMPING).abs() < 1e-4);
    }

    // 5 Hz bins: 60 Hz is bin 12, 500 Hz is bin 100 and 1500 Hz is bin 300.
    const FIVE_HZ_RATE: f32 = 5.0 * WINDOW as f32;

    fn lone_peak(bin: usize) -> Vec<f32> {
        let mut spectrum = vec![0.0; WINDOW / 2];
        spectrum[bin] = 1.0;
        spectrum
    }

    #[test]
    fn gate_edges_are_exclusive() {
        let extractor = ChromaExtractor::new(WINDOW);
        assert_eq!(extractor.extract(&lone_peak(12), FIVE_HZ_RATE), [0.0; 12]);
        assert_eq!(extractor.extract(&lone_peak(300), FIVE_HZ_RATE), [0.0; 12]);
        // One bin inside either edge is kept.
        assert_ne!(extractor.extract(&lone_peak(13), FIVE_HZ_RATE), [0.0; 12]);
        assert_ne!(extractor.extract(&lone_peak(299), FIVE_HZ_RATE), [0.0; 12]);
    }

    #[test]
    fn damping_starts_at_the_split() {
        assert_eq!(harmonic_weight(HARMONIC_SPLIT), HARMONIC_DAMPING);
        assert_eq!(harmonic_weight(499.9), 1.0);

        // A 500 Hz peak (~B4) against an undamped 330 Hz peak (~E4).
        let extractor = ChromaExtractor::new(WINDOW);
        let mut spectrum = lone_peak(100);
        spectrum[66] = 1.0;
        let chroma = extractor.extract(&spectrum, FIVE_HZ_RATE);

        let b = HARMONIC_DAMPING * gaussian(71.0 - pitch::frequency_to_note(500.0));
        let e = gaussian(64.0 - pitch::frequency_to_note(330.0));
        let expected = b / e;
        assert!((chroma[11] / chroma[4] - expected).abs() < 1e-5);
    }

    #[test]
    fn normalized_max_is_exactly_one() {
        let mut chroma = [0.2, 0.0, 0.0, 0.0, 0.7, 0.0, 0.0, 0.35, 0.0, 0.0, 0.0, 0.0];
        normalize(&mut chroma);
        assert_eq!(chroma.iter().copied().fold(0.0, f32::max), 1.0);
        assert!(chroma.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
