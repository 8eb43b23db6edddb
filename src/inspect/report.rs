//! Inspect report types and terminal formatting.

use std::fmt;

use serde::Serialize;

use crate::normalize::FrameSize;

/// Inner width of the report boxes, in characters.
const BOX_WIDTH: usize = 59;

/// The result of inspecting a dataset.
#[derive(Clone, Debug, Serialize)]
pub struct InspectReport {
    pub summary: SummarySection,
    pub throttle: AxisHistogram,
    pub steering: AxisHistogram,
    /// Occurring (throttle, steering) pairs, most frequent first.
    pub combinations: Vec<CombinationCount>,
    #[serde(skip)]
    pub(crate) bar_width: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SummarySection {
    pub model_name: String,
    pub frames: usize,
    pub frame_size: FrameSize,
    /// Size of the pixel payload in bytes.
    pub payload_bytes: usize,
    /// Start of the build that produced the artifact, in seconds since the Unix epoch.
    pub built_at_unix_secs: u64,
    pub recordings_root: String,
}

/// Label distribution on one axis. Every class appears, including empty ones.
#[derive(Clone, Debug, Serialize)]
pub struct AxisHistogram {
    pub axis: String,
    pub total: usize,
    pub entries: Vec<LabelCount>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LabelCount {
    /// Display name of the class (neutral classes get a parenthesized name).
    pub label: String,
    pub index: u8,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CombinationCount {
    pub throttle: String,
    pub steering: String,
    pub count: usize,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "╭{}╮", "─".repeat(BOX_WIDTH))?;
        row(f, format!("{:^BOX_WIDTH$}", "Stig Dataset Report"))?;
        writeln!(f, "╰{}╯", "─".repeat(BOX_WIDTH))?;
        writeln!(f)?;

        self.fmt_summary(f)?;
        writeln!(f)?;

        self.fmt_axis(f, &self.throttle)?;
        writeln!(f)?;

        self.fmt_axis(f, &self.steering)?;
        writeln!(f)?;

        self.fmt_combinations(f)?;

        Ok(())
    }
}

impl InspectReport {
    fn fmt_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;

        open_box(f, "Summary")?;
        row(f, format!("   Model:         {}", truncate_label(&s.model_name, 40)))?;
        row(f, format!("   Frames:        {:>8}", format_number(s.frames)))?;
        row(
            f,
            format!(
                "   Frame size:    {:>8}  (height x width)",
                format!("{}x{}", s.frame_size.height, s.frame_size.width)
            ),
        )?;
        row(f, format!("   Payload:       {:>8} bytes", format_number(s.payload_bytes)))?;
        row(f, format!("   Built at:      {} (unix)", s.built_at_unix_secs))?;
        row(f, format!("   Recordings:    {}", truncate_label(&s.recordings_root, 40)))?;
        close_box(f)
    }

    fn fmt_axis(&self, f: &mut fmt::Formatter<'_>, axis: &AxisHistogram) -> fmt::Result {
        open_box(f, &format!("{} labels", capitalize(&axis.axis)))?;

        if axis.total == 0 {
            row(f, "   No frames.")?;
        } else {
            let max_count = axis.entries.iter().map(|e| e.count).max().unwrap_or(0);
            for entry in &axis.entries {
                row(
                    f,
                    format!(
                        "   {:<12} {:>8} {:>6}  {}",
                        entry.label,
                        format_number(entry.count),
                        fmt_percent(entry.count, axis.total),
                        render_bar(entry.count, max_count, self.bar_width)
                    ),
                )?;
            }
        }

        close_box(f)
    }

    fn fmt_combinations(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        open_box(f, "Combinations (throttle, steering)")?;

        if self.combinations.is_empty() {
            row(f, "   No frames.")?;
        } else {
            let total: usize = self.combinations.iter().map(|c| c.count).sum();
            for combo in &self.combinations {
                row(
                    f,
                    format!(
                        "   {:<12} {:<12} {:>8} {:>6}",
                        combo.throttle,
                        combo.steering,
                        format_number(combo.count),
                        fmt_percent(combo.count, total)
                    ),
                )?;
            }
        }

        close_box(f)
    }
}

fn open_box(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let fill = BOX_WIDTH.saturating_sub(title.chars().count() + 3);
    writeln!(f, "┌─ {} {}┐", title, "─".repeat(fill))?;
    row(f, "")
}

fn close_box(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    row(f, "")?;
    writeln!(f, "└{}┘", "─".repeat(BOX_WIDTH))
}

/// Writes one boxed line, padding `content` to the box width.
fn row(f: &mut fmt::Formatter<'_>, content: impl AsRef<str>) -> fmt::Result {
    let content = content.as_ref();
    let padding = BOX_WIDTH.saturating_sub(content.chars().count());
    writeln!(f, "│{}{}│", content, " ".repeat(padding))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }

    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// Shortens long text from the left, keeping the informative tail.
fn truncate_label(label: &str, max_len: usize) -> String {
    let len = label.chars().count();
    if len <= max_len {
        label.to_string()
    } else {
        let tail: String = label.chars().skip(len - (max_len - 1)).collect();
        format!("…{tail}")
    }
}
