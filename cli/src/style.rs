use std::time::Duration;

use colored::{Color, ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use kjudge_core::{
    testing::{RunSummary, TestOutcome},
    verdict::{Verdict, VerdictRecord},
};
use strum::IntoEnumIterator;

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {{
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }}
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false;
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for Verdict {
    fn color(&self) -> Color {
        use Verdict::*;
        if !self::is_truecolor_supported() {
            return match self {
                Accepted => Color::Green,
                ParseError | Wrong => Color::Yellow,
                TimeLimitExceeded => Color::Red,
                RuntimeError => Color::Magenta,
                Fail | EngineException => Color::Blue,
            };
        }
        let (r, g, b) = match self {
            Accepted => (30, 180, 40),
            ParseError => (190, 160, 10),
            Wrong => (210, 138, 4),
            TimeLimitExceeded => (220, 42, 42),
            RuntimeError => (171, 40, 200),
            Fail | EngineException => (60, 90, 220),
        };
        Color::TrueColor { r, g, b }
    }
}

pub fn verdict_icon(verdict: Verdict) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {:<4}", verdict.abbr())
        .on_color(verdict.color())
        .bold()
        .color(fg)
}

pub fn spinner(msg: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(msg);
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(50));
    bar
}

pub fn outcome_line(outcome: &TestOutcome) -> String {
    let elapsed = outcome
        .elapsed
        .map(|d| format!(" [{}ms]", d.as_millis()))
        .unwrap_or_default();
    let mut line = format!(
        "Testcase {} ... {}{}",
        outcome.name,
        verdict_icon(outcome.verdict()),
        elapsed.cyan()
    );
    if !outcome.record.message.is_empty() {
        line.push_str(&format!(" {}", outcome.record.message.dimmed()));
    }
    line
}

pub fn print_summary(summary: &RunSummary) {
    let bar = "-".repeat(5);
    let total = summary.outcomes.len();
    let passed = summary.count(Verdict::Accepted);

    let msg = if passed == total {
        format!("All {} tests passed", total).green().to_string()
    } else {
        let detail = Verdict::iter()
            .filter(|&v| !v.is_accepted())
            .filter_map(|v| match summary.count(v) {
                0 => None,
                n => Some(format!(
                    "{}{}{}",
                    verdict_icon(v),
                    "x".dimmed(),
                    n.to_string().bold().bright_white()
                )),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} ({})",
            format!("{}/{} tests failed", total - passed, total).bright_red(),
            detail
        )
    };
    println!("{} {} {}", bar, msg, bar);
    print_record(&summary.verdict);
}

pub fn print_record(record: &VerdictRecord) {
    print!("{} score {}", verdict_icon(record.verdict), record.score.to_string().bold());
    if record.message.is_empty() {
        println!();
    } else {
        println!(": {}", record.message);
    }
}
