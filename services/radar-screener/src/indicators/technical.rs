//! Default indicator engine over daily bars.
//!
//! Each function takes the full history and returns the latest value, or
//! `None` when the history is shorter than the indicator's warm-up.

use super::{names, IndicatorEngine, IndicatorSet};
use crate::data::PriceSeries;

/// Standard daily-chart indicator engine.
#[derive(Debug, Clone, Default)]
pub struct TechnicalIndicatorEngine;

impl TechnicalIndicatorEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IndicatorEngine for TechnicalIndicatorEngine {
    fn compute(&self, series: &PriceSeries) -> Option<IndicatorSet> {
        if series.is_empty() {
            return None;
        }

        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        let volumes = series.volumes();

        let mut set = IndicatorSet::new();

        set.insert(names::SMA_20, sma(&closes, 20));
        set.insert(names::SMA_50, sma(&closes, 50));
        set.insert(names::SMA_200, sma(&closes, 200));

        set.insert(names::EMA_12, ema_series(&closes, 12).last().copied());
        set.insert(names::EMA_26, ema_series(&closes, 26).last().copied());

        set.insert(names::RSI, rsi(&closes, 14));

        let (macd_line, signal) = macd(&closes, 12, 26, 9);
        set.insert(names::MACD, macd_line);
        set.insert(names::MACD_SIGNAL, signal);
        set.insert(
            names::MACD_HISTOGRAM,
            macd_line.zip(signal).map(|(m, s)| m - s),
        );

        let (stoch_k, stoch_d) = stochastic(&highs, &lows, &closes, 14, 3);
        set.insert(names::STOCHASTIC_K, stoch_k);
        set.insert(names::STOCHASTIC_D, stoch_d);

        let bands = bollinger(&closes, 20, 2.0);
        set.insert(names::BOLLINGER_UPPER, bands.map(|b| b.0));
        set.insert(names::BOLLINGER_MIDDLE, bands.map(|b| b.1));
        set.insert(names::BOLLINGER_LOWER, bands.map(|b| b.2));

        set.insert(names::ATR, atr(&highs, &lows, &closes, 14));
        set.insert(names::VOLUME_SMA, sma(&volumes, 20));
        set.insert(names::OBV, obv(&closes, &volumes));
        set.insert(names::ADX, adx(&highs, &lows, &closes, 14));

        Some(set)
    }
}

/// Simple moving average of the last `period` values.
pub(crate) fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// EMA seeded with the SMA of the first `period` values.
///
/// Element `i` of the result corresponds to input index `period - 1 + i`.
pub(crate) fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    for &value in &values[period..] {
        let prev = out[out.len() - 1];
        out.push(value * k + prev * (1.0 - k));
    }
    out
}

/// RSI with Wilder smoothing.
pub(crate) fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line and signal line. The signal may be absent while the line is not.
pub(crate) fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Option<f64>, Option<f64>) {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);
    if slow_ema.is_empty() || fast_ema.len() < slow_ema.len() {
        return (None, None);
    }

    // Align the fast EMA to the slow one's first index.
    let offset = fast_ema.len() - slow_ema.len();
    let line: Vec<f64> = slow_ema
        .iter()
        .zip(&fast_ema[offset..])
        .map(|(slow, fast)| fast - slow)
        .collect();

    let signal_line = ema_series(&line, signal);
    (line.last().copied(), signal_line.last().copied())
}

/// Bollinger bands `(upper, middle, lower)` using population deviation.
pub(crate) fn bollinger(closes: &[f64], period: usize, width: f64) -> Option<(f64, f64, f64)> {
    let middle = sma(closes, period)?;
    let window = &closes[closes.len() - period..];
    let variance = window.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / period as f64;
    let deviation = variance.sqrt() * width;
    Some((middle + deviation, middle, middle - deviation))
}

fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (1..closes.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            let up = (highs[i] - closes[i - 1]).abs();
            let down = (lows[i] - closes[i - 1]).abs();
            range.max(up).max(down)
        })
        .collect()
}

/// Average true range with Wilder smoothing.
pub(crate) fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() <= period {
        return None;
    }

    let ranges = true_ranges(highs, lows, closes);
    let p = period as f64;
    let mut value = ranges[..period].iter().sum::<f64>() / p;
    for &tr in &ranges[period..] {
        value = (value * (p - 1.0) + tr) / p;
    }
    Some(value)
}

/// On-balance volume over the whole series.
pub(crate) fn obv(closes: &[f64], volumes: &[f64]) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }

    let mut total = 0.0;
    for i in 1..closes.len() {
        if closes[i] > closes[i - 1] {
            total += volumes[i];
        } else if closes[i] < closes[i - 1] {
            total -= volumes[i];
        }
    }
    Some(total)
}

/// Slow stochastic `(%K, %D)`.
pub(crate) fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    smooth: usize,
) -> (Option<f64>, Option<f64>) {
    if period == 0 || closes.len() < period {
        return (None, None);
    }

    let k_values: Vec<f64> = (period - 1..closes.len())
        .map(|i| {
            let start = i + 1 - period;
            let highest = highs[start..=i].iter().copied().fold(f64::MIN, f64::max);
            let lowest = lows[start..=i].iter().copied().fold(f64::MAX, f64::min);
            if highest > lowest {
                (closes[i] - lowest) / (highest - lowest) * 100.0
            } else {
                50.0
            }
        })
        .collect();

    (k_values.last().copied(), sma(&k_values, smooth))
}

/// Average directional index with Wilder smoothing.
pub(crate) fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period * 2 {
        return None;
    }

    let ranges = true_ranges(highs, lows, closes);
    let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = (1..closes.len())
        .map(|i| {
            let up = highs[i] - highs[i - 1];
            let down = lows[i - 1] - lows[i];
            let plus = if up > down && up > 0.0 { up } else { 0.0 };
            let minus = if down > up && down > 0.0 { down } else { 0.0 };
            (plus, minus)
        })
        .unzip();

    let p = period as f64;
    let mut tr_s = ranges[..period].iter().sum::<f64>();
    let mut plus_s = plus_dm[..period].iter().sum::<f64>();
    let mut minus_s = minus_dm[..period].iter().sum::<f64>();

    let dx = |tr: f64, plus: f64, minus: f64| -> f64 {
        if tr == 0.0 {
            return 0.0;
        }
        let plus_di = plus / tr * 100.0;
        let minus_di = minus / tr * 100.0;
        let sum = plus_di + minus_di;
        if sum == 0.0 {
            0.0
        } else {
            (plus_di - minus_di).abs() / sum * 100.0
        }
    };

    let mut dx_values = vec![dx(tr_s, plus_s, minus_s)];
    for i in period..ranges.len() {
        tr_s = tr_s - tr_s / p + ranges[i];
        plus_s = plus_s - plus_s / p + plus_dm[i];
        minus_s = minus_s - minus_s / p + minus_dm[i];
        dx_values.push(dx(tr_s, plus_s, minus_s));
    }

    let mut value = dx_values[..period].iter().sum::<f64>() / p;
    for &d in &dx_values[period..] {
        value = (value * (p - 1.0) + d) / p;
    }
    Some(value)
}
