//! Text output formatting.

use serde_json::Value;
use tm1_core::{CellMap, CellProperty, Chore};

use super::InfoOutput;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn flag(&self, on: bool) -> String {
        if on {
            self.paint(GREEN, "yes")
        } else {
            self.paint(RED, "no")
        }
    }

    /// Server and session summary.
    pub fn format_info(&self, info: &InfoOutput) -> String {
        [
            format!("{:<12} {}", "Server:", info.base_url),
            format!("{:<12} {}", "Version:", self.bold(&info.version)),
            format!("{:<12} {}", "User:", info.user),
            format!("{:<12} {}", "Admin:", self.flag(info.admin)),
            format!("{:<12} {}", "DataAdmin:", self.flag(info.data_admin)),
        ]
        .join("\n")
    }

    /// One line per cell: coordinates, then the formatted value.
    pub fn format_cells(&self, cells: &CellMap) -> String {
        if cells.is_empty() {
            return self.paint(DIM, "(no cells)");
        }

        let width = cells.keys().map(String::len).max().unwrap_or(0);
        cells
            .iter()
            .map(|(coord, props)| {
                let shown = match props.get("FormattedValue") {
                    Some(CellProperty::FormattedValue(f)) => f.clone(),
                    _ => props
                        .get("Value")
                        .and_then(CellProperty::as_value)
                        .map(display_value)
                        .unwrap_or_default(),
                };
                format!("{coord:<width$}  {shown}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// A titled list of names.
    pub fn format_names(&self, title: &str, names: &[String]) -> String {
        let mut lines = vec![self.bold(title), "─".repeat(40)];
        if names.is_empty() {
            lines.push(self.paint(DIM, "(none)"));
        }
        lines.extend(names.iter().map(|n| format!("  • {n}")));
        lines.join("\n")
    }

    /// Chore settings and tasks.
    pub fn format_chore(&self, chore: &Chore) -> String {
        let mut lines = vec![
            self.bold(&chore.name),
            "─".repeat(40),
            format!("{:<14} {}", "Active:", self.flag(chore.active)),
            format!(
                "{:<14} {}",
                "Start:",
                chore.start_time.as_deref().unwrap_or("-")
            ),
            format!("{:<14} {}", "Frequency:", chore.frequency),
            format!("{:<14} {:?}", "Mode:", chore.execution_mode),
            format!("{:<14} {}", "DST-sensitive:", self.flag(chore.dst_sensitive)),
            String::new(),
            "Tasks:".to_string(),
        ];

        for task in &chore.tasks {
            let params: Vec<String> = task
                .parameters
                .iter()
                .map(|p| format!("{}={}", p.name, display_value(&p.value)))
                .collect();
            lines.push(format!(
                "  {:>2}. {} {}",
                task.step,
                task.process_name,
                self.paint(DIM, &params.join(" "))
            ));
        }
        lines.join("\n")
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm1_core::{CellProperties, ChoreTask, ChoreTaskParameter};

    #[test]
    fn test_format_cells_aligns_and_prefers_formatted() {
        let mut cells = CellMap::new();
        let mut a = CellProperties::new();
        a.insert("Value".into(), CellProperty::Value(serde_json::json!(1234.5)));
        a.insert(
            "FormattedValue".into(),
            CellProperty::FormattedValue("1,234.50".into()),
        );
        let mut b = CellProperties::new();
        b.insert("Value".into(), CellProperty::Value(serde_json::json!("text")));
        cells.insert("[A].[A].[long name]".into(), a);
        cells.insert("[A].[A].[x]".into(), b);

        let output = TextFormatter::new(false).format_cells(&cells);
        assert_eq!(
            output,
            "[A].[A].[long name]  1,234.50\n[A].[A].[x]          text"
        );
    }

    #[test]
    fn test_format_empty_cells() {
        assert_eq!(
            TextFormatter::new(false).format_cells(&CellMap::new()),
            "(no cells)"
        );
    }

    #[test]
    fn test_format_chore() {
        let chore = Chore {
            name: "Nightly".into(),
            active: true,
            tasks: vec![ChoreTask::new(
                0,
                "Load",
                vec![ChoreTaskParameter::new("pYear", 2025)],
            )],
            ..Chore::default()
        };

        let output = TextFormatter::new(false).format_chore(&chore);
        assert!(output.starts_with("Nightly\n"));
        assert!(output.contains("Active:        yes"));
        assert!(output.contains("Frequency:     P00DT00H00M00S"));
        assert!(output.contains("   0. Load pYear=2025"));
    }

    #[test]
    fn test_colors_only_when_enabled() {
        let names = vec!["Sales".to_string()];
        assert!(!TextFormatter::new(false)
            .format_names("Cubes", &names)
            .contains('\x1b'));
        assert!(TextFormatter::new(true)
            .format_names("Cubes", &names)
            .contains('\x1b'));
    }
}
