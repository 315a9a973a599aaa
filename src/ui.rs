//! Report rendering.
//!
//! The renderer works from a [`DiffResult`] alone; nothing here feeds back
//! into the pipeline.

use crate::DiffResult;

struct Palette {
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    cyan: &'static str,
    bold: &'static str,
    reset: &'static str,
}

impl Palette {
    const PLAIN: Palette =
        Palette { red: "", green: "", yellow: "", cyan: "", bold: "", reset: "" };

    const ANSI: Palette = Palette {
        red: "\x1b[31m",
        green: "\x1b[32m",
        yellow: "\x1b[33m",
        cyan: "\x1b[36m",
        bold: "\x1b[1m",
        reset: "\x1b[0m",
    };
}

pub struct DiffUI;

impl DiffUI {
    /// Plain-text report.
    pub fn render_report(result: &DiffResult) -> String {
        Self::render(result, &Palette::PLAIN)
    }

    /// Same report with ANSI colors.
    pub fn render_colored_report(result: &DiffResult) -> String {
        Self::render(result, &Palette::ANSI)
    }

    fn render(result: &DiffResult, p: &Palette) -> String {
        let mut report = String::new();
        let rule = "=".repeat(60);
        let thin_rule = "-".repeat(60);

        report.push_str(&format!("{}{}{}{}\n", p.bold, p.cyan, rule, p.reset));
        report.push_str(&format!("{}{}                 BINARY DIFF REPORT{}\n", p.bold, p.cyan, p.reset));
        report.push_str(&format!("{}{}{}{}\n\n", p.bold, p.cyan, rule, p.reset));

        report.push_str(&format!("{}SUMMARY:{}\n", p.bold, p.reset));
        report.push_str(&format!(
            "  {}Unchanged:{} {}\n",
            p.green,
            p.reset,
            result.unchanged_count()
        ));
        report.push_str(&format!(
            "  {}Modified:{}  {}\n",
            p.yellow,
            p.reset,
            result.modified_count()
        ));
        report.push_str(&format!(
            "  {}Removed:{}   {}\n",
            p.red,
            p.reset,
            result.unmatched_primary.len()
        ));
        report.push_str(&format!(
            "  {}Added:{}     {}\n",
            p.red,
            p.reset,
            result.unmatched_secondary.len()
        ));
        report.push_str(&format!(
            "  {}Overall similarity:{} {:.4}\n\n",
            p.cyan,
            p.reset,
            result.overall_similarity()
        ));

        if !result.matched.is_empty() {
            report.push_str(&format!("{}FUNCTION MATCHES:{}\n{}\n", p.bold, p.reset, thin_rule));
            for m in &result.matched {
                let color = if m.is_unchanged() { p.green } else { p.yellow };
                report.push_str(&format!(
                    "{}{:016x} -> {:016x}{} (similarity: {:.2}%)\n",
                    color,
                    m.primary.start_address,
                    m.secondary.start_address,
                    p.reset,
                    m.similarity() * 100.0
                ));

                if !m.is_unchanged() && !m.primary.diff_details.is_empty() {
                    report.push_str("  Changes:\n");
                    for detail in &m.primary.diff_details {
                        for line in detail.lines() {
                            report.push_str(&format!("  {line}\n"));
                        }
                    }
                }
            }
            report.push('\n');
        }

        if !result.unmatched_primary.is_empty() {
            report.push_str(&format!(
                "{}REMOVED FUNCTIONS (primary only):{}\n{}\n",
                p.bold, p.reset, thin_rule
            ));
            for f in &result.unmatched_primary {
                report.push_str(&format!(
                    "  {}{:016x}{} - {} blocks, {} instructions\n",
                    p.red,
                    f.start_address,
                    p.reset,
                    f.basic_blocks.len(),
                    f.instruction_count()
                ));
            }
            report.push('\n');
        }

        if !result.unmatched_secondary.is_empty() {
            report.push_str(&format!(
                "{}ADDED FUNCTIONS (secondary only):{}\n{}\n",
                p.bold, p.reset, thin_rule
            ));
            for f in &result.unmatched_secondary {
                report.push_str(&format!(
                    "  {}{:016x}{} - {} blocks, {} instructions\n",
                    p.red,
                    f.start_address,
                    p.reset,
                    f.basic_blocks.len(),
                    f.instruction_count()
                ));
            }
            report.push('\n');
        }

        report
    }
}
