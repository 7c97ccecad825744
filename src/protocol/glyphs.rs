//! Plain-text renderings of small charts, used inside table cells and by the
//! text output of `deck run`.

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// Sparkline of the last `width` values, scaled between their min and max.
pub fn sparkline(values: &[f64], width: usize) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    let tail = &values[values.len().saturating_sub(width)..];
    let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    tail.iter()
        .map(|v| {
            let level = if span <= f64::EPSILON {
                SPARK_LEVELS.len() / 2
            } else {
                (((v - min) / span) * (SPARK_LEVELS.len() - 1) as f64).round() as usize
            };
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

/// Horizontal bar for a percentage in `[0, 100]`.
pub fn bar(percent: f64, width: usize) -> String {
    let percent = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };
    let filled = ((percent / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let mut out = String::with_capacity(width * 3);
    out.extend(std::iter::repeat(BAR_FILLED).take(filled));
    out.extend(std::iter::repeat(BAR_EMPTY).take(width - filled));
    out
}
