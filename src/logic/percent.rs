// src/logic/percent.rs
//! レイアウト定義のパーセント値を 0-100 の数値に正規化する。
//!
//! 受け付ける形式:
//! - 0 以上 1 以下の数値 → 割合とみなして 100 倍 (`0.25` → 25)
//! - 1 より大きい数値 → もうパーセント (`80` → 80)
//! - 数値文字列、末尾の `%` は任意 (`"75%"` → 75, `"0.25"` → 25)
//! - `"a/b"` の分数文字列 (`"1/2"` → 50)
//!
//! 変な値 (数値じゃない、0 除算、NaN、負の数) はエラーにせず 0 にする。

/// 小数点以下4桁に丸める。f64 → f32 変換の誤差でテストがぶれないように。
fn round4(value: f64) -> f32 {
    ((value * 10_000.0).round() / 10_000.0) as f32
}

/// 数値のパーセント値を正規化する。
pub fn normalize_number(value: f64) -> f32 {
    if !value.is_finite() || value < 0.0 {
        return 0.0;
    }
    if value <= 1.0 {
        round4(value * 100.0)
    } else {
        round4(value)
    }
}

/// 文字列のパーセント値を正規化する。
pub fn parse_percent(text: &str) -> f32 {
    let trimmed = text.trim();

    // "75%" は割合ではなく必ずパーセント。"0.5%" は 0.5。
    if let Some(number) = trimmed.strip_suffix('%') {
        return match number.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => round4(value),
            _ => 0.0,
        };
    }

    if let Some((numerator, denominator)) = trimmed.split_once('/') {
        let numerator = numerator.trim().parse::<f64>();
        let denominator = denominator.trim().parse::<f64>();
        return match (numerator, denominator) {
            (Ok(n), Ok(d)) if d != 0.0 => normalize_fraction(n / d),
            _ => 0.0,
        };
    }

    match trimmed.parse::<f64>() {
        Ok(value) => normalize_number(value),
        Err(_) => 0.0,
    }
}

/// 分数は常に割合として扱う。"3/2" は 150。
fn normalize_fraction(fraction: f64) -> f32 {
    if !fraction.is_finite() || fraction < 0.0 {
        return 0.0;
    }
    round4(fraction * 100.0)
}

/// 正規化済みの値を "NN%" 形式の文字列にする。余分な 0 は付けない。
pub fn format_percent(value: f32) -> String {
    let rounded = (value as f64 * 100.0).round() / 100.0;
    let mut text = format!("{:.2}", rounded);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{}%", text)
}
