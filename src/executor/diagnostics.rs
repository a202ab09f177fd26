use std::collections::HashMap;
use std::fmt::{self, Write};
use std::time::{Duration, Instant};

use crate::hash::Hash32;
use crate::plan::ExecutionPlan;

/// Wall-clock timing of a single stage.
#[derive(Debug, Clone, Copy)]
pub struct StageExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Timings collected while executing a plan, keyed by stage hash.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub executions: HashMap<Hash32, StageExecution>,
}

impl Diagnostics {
    pub(crate) fn record(&mut self, stage: Hash32, start: Instant, duration: Duration) {
        self.executions
            .insert(stage, StageExecution { start, duration });
    }

    /// Sum of all recorded stage durations.
    pub fn total(&self) -> Duration {
        self.executions.values().map(|exec| exec.duration).sum()
    }

    /// Renders the executed plan as an SVG waterfall chart, one row per stage
    /// ordered by start time.
    pub fn render_waterfall(&self, plan: &ExecutionPlan) -> String {
        let mut output = String::new();
        // writing into a String cannot fail
        let _ = self.write_waterfall(plan, &mut output);
        output
    }

    pub fn render_waterfall_to_file(
        &self,
        plan: &ExecutionPlan,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), std::io::Error> {
        std::fs::write(path, self.render_waterfall(plan))
    }

    /// Renders the plan as a Mermaid flowchart with every stage coloured by
    /// its duration, green for the fastest and red for the slowest. Stages
    /// that never ran are marked as pending.
    pub fn render_mermaid(&self, plan: &ExecutionPlan) -> String {
        let mut output = String::new();
        let _ = self.write_mermaid(plan, &mut output);
        output
    }

    fn write_waterfall(&self, plan: &ExecutionPlan, f: &mut String) -> fmt::Result {
        let mut ran: Vec<(&Hash32, &StageExecution)> = self.executions.iter().collect();
        ran.sort_by_key(|(hash, exec)| (exec.start, **hash));

        let Some(global_start) = ran.first().map(|(_, exec)| exec.start) else {
            return write!(
                f,
                "<svg width=\"200\" height=\"50\" xmlns=\"http://www.w3.org/2000/svg\"><text x=\"10\" y=\"30\" font-family=\"sans-serif\">No stages ran</text></svg>"
            );
        };

        let global_end = ran
            .iter()
            .map(|(_, exec)| exec.start + exec.duration)
            .max()
            .unwrap_or(global_start);

        let total_micros = global_end.duration_since(global_start).as_micros().max(1) as f64;

        let row_height = 30;
        let label_width = 300;
        let chart_width = 800;
        let padding = 10;
        let header_height = 30;
        let text_space = 80;

        let width = label_width + chart_width + (padding * 3) + text_space;
        let height = header_height + (ran.len() as u32 * row_height) + padding;

        write!(
            f,
            r#"<svg width="{width}" height="{height}" xmlns="http://www.w3.org/2000/svg">
    <style>
        .stage-row:nth-child(even) {{ fill: #f9f9f9; }}
        .stage-row:nth-child(odd) {{ fill: #ffffff; }}
        text {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif; font-size: 12px; }}
        .bar {{ fill: #3b82f6; rx: 4; }}
        .label {{ fill: #333; }}
        .time {{ fill: #666; font-size: 11px; }}
        .grid-line {{ stroke: #e5e7eb; stroke-width: 1; }}
        .axis-label {{ fill: #9ca3af; font-size: 10px; }}
    </style>
    <rect width="100%" height="100%" fill="white" />
"#
        )?;

        for i in 0..=5 {
            let pct = i as f64 / 5.0;
            let x = label_width as f64 + padding as f64 + (chart_width as f64 * pct);

            writeln!(
                f,
                r#"    <line x1="{x}" y1="{header_height}" x2="{x}" y2="{height}" class="grid-line" />"#
            )?;
            writeln!(
                f,
                r#"    <text x="{x}" y="{y}" text-anchor="middle" class="axis-label">{label}</text>"#,
                y = header_height - 5,
                label = format_micros(total_micros * pct),
            )?;
        }

        for (i, (hash, exec)) in ran.iter().enumerate() {
            let name = plan
                .stage(hash)
                .map(|stage| escape_xml(stage.identifier()))
                .unwrap_or_else(|| hash.short());

            let y = header_height + (i as u32 * row_height);

            writeln!(
                f,
                r#"    <rect x="0" y="{y}" width="{width}" height="{row_height}" class="stage-row" />"#
            )?;
            writeln!(
                f,
                r#"    <text x="{padding}" y="{y}" class="label" dominant-baseline="middle">{name}</text>"#,
                y = y + row_height / 2,
            )?;

            let offset_micros = exec.start.duration_since(global_start).as_micros() as f64;
            let duration_micros = exec.duration.as_micros() as f64;

            let bar_x = label_width as f64
                + padding as f64
                + (offset_micros / total_micros * chart_width as f64);
            let bar_width = (duration_micros / total_micros * chart_width as f64).max(1.0);

            writeln!(
                f,
                r#"    <rect x="{bar_x}" y="{y}" width="{bar_width}" height="{h}" class="bar"><title>{name}: {dur:.2?}</title></rect>"#,
                y = y + 5,
                h = row_height - 10,
                dur = exec.duration,
            )?;
            writeln!(
                f,
                r#"    <text x="{x}" y="{y}" class="time" dominant-baseline="middle">{label}</text>"#,
                x = bar_x + bar_width + 5.0,
                y = y + row_height / 2,
                label = format_micros(duration_micros),
            )?;
        }

        f.write_str("</svg>")
    }

    fn write_mermaid(&self, plan: &ExecutionPlan, f: &mut String) -> fmt::Result {
        writeln!(f, "graph LR")?;

        let (min, max) = self
            .executions
            .values()
            .map(|exec| exec.duration.as_secs_f64())
            .fold(None, |range: Option<(f64, f64)>, secs| match range {
                None => Some((secs, secs)),
                Some((min, max)) => Some((min.min(secs), max.max(secs))),
            })
            .unwrap_or((0.0, 0.0));

        let span = if (max - min).abs() < f64::EPSILON {
            1.0
        } else {
            max - min
        };

        for stage in plan.ordered_stages() {
            let id = stage.calculated_hash();
            let name = stage.identifier().replace('"', "\\\"");

            let (label, color) = match self.executions.get(&stage.calculated_hash()) {
                Some(exec) => {
                    let t = (exec.duration.as_secs_f64() - min) / span;
                    (format!("{:.2?}", exec.duration), heat(t))
                }
                None => ("Pending".to_string(), "#ADD8E6".to_string()),
            };

            writeln!(f, "    s{id}[\"{name}\\n{label}\"]")?;
            writeln!(f, "    style s{id} fill:{color}")?;
        }

        let graph = plan.graph();
        for edge in graph.raw_edges() {
            writeln!(
                f,
                "    s{} --> s{}",
                graph[edge.source()].calculated_hash(),
                graph[edge.target()].calculated_hash(),
            )?;
        }

        Ok(())
    }
}

/// Green at `0.0`, yellow at `0.5`, red at `1.0`.
fn heat(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let (r, g) = if t < 0.5 {
        ((255.0 * t * 2.0) as u8, 255)
    } else {
        (255, (255.0 * (1.0 - (t - 0.5) * 2.0)) as u8)
    };

    format!("#{r:02X}{g:02X}00")
}

fn format_micros(micros: f64) -> String {
    if micros < 1000.0 {
        format!("{micros:.0}µs")
    } else {
        format!("{:.2}ms", micros / 1000.0)
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Planner;
    use crate::testing::{counting_source, mock};

    #[test]
    fn test_heat() {
        assert_eq!(heat(0.0), "#00FF00");
        assert_eq!(heat(0.5), "#FFFF00");
        assert_eq!(heat(1.0), "#FF0000");
        assert_eq!(heat(7.0), "#FF0000");
    }

    #[test]
    fn test_mermaid_marks_pending() {
        let mut planner = Planner::new();
        let a = planner.add_source(counting_source("a", 1)).unwrap();
        planner.add(mock("b", 1, 1), &a).unwrap();
        let plan = planner.get_plan();

        let source = plan.producer_of(&a[0]).unwrap().calculated_hash();
        let mut diagnostics = Diagnostics::default();
        diagnostics.record(source, Instant::now(), Duration::from_millis(3));

        let text = diagnostics.render_mermaid(&plan);
        assert!(text.starts_with("graph LR\n"));
        assert!(text.contains(&format!("style s{} fill:#00FF00", source.to_hex())));
        assert!(text.contains("Pending"));
        assert!(text.contains(" --> "));
    }

    #[test]
    fn test_waterfall() {
        let diagnostics = Diagnostics::default();
        let plan = ExecutionPlan::default();
        assert!(diagnostics.render_waterfall(&plan).contains("No stages ran"));

        let mut planner = Planner::new();
        let a = planner.add_source(counting_source("a<b>", 1)).unwrap();
        let plan = planner.get_plan();

        let mut diagnostics = Diagnostics::default();
        let stage = plan.producer_of(&a[0]).unwrap().calculated_hash();
        diagnostics.record(stage, Instant::now(), Duration::from_micros(250));

        let svg = diagnostics.render_waterfall(&plan);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("a&lt;b&gt;"));
        assert_eq!(diagnostics.total(), Duration::from_micros(250));
    }
}
